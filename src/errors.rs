use std::fmt::{self, Display, Formatter};

use thiserror::Error;

/// The kind of PNML element an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementKind {
    Net,
    Place,
    Transition,
    Arc,
}

impl Display for ElementKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ElementKind::Net => "net",
                ElementKind::Place => "place",
                ElementKind::Transition => "transition",
                ElementKind::Arc => "arc",
            }
        )
    }
}

/**
 * Everything that can go wrong while decoding a PNML document or resolving
 * references within a decoded net. Decoding is all-or-nothing per file: the
 * first of these aborts the whole decode.
 */
#[derive(Debug, Error)]
pub enum PnmlError {
    /// The input is not well-formed XML. This covers both what quick-xml
    /// rejects and what the tag stack catches itself: a close tag that does
    /// not match the open one, and a file that ends with tags still open.
    #[error("not well-formed XML at position {position}: {message}")]
    Syntax { position: u64, message: String },

    /// A required attribute or child node is absent.
    #[error("net `{net}`: {kind} `{element}` lacks required {field}")]
    MissingField {
        net: String,
        kind: ElementKind,
        element: String,
        field: &'static str,
    },

    /// A required field is present but its text cannot be interpreted.
    #[error("net `{net}`: {kind} `{element}` has unparsable {field} `{text}`")]
    UnparsableField {
        net: String,
        kind: ElementKind,
        element: String,
        field: &'static str,
        text: String,
    },

    /// Two places or two transitions within one net share an id.
    #[error("net `{net}`: two {kind}s have the id `{element}`")]
    DuplicateId {
        net: String,
        kind: ElementKind,
        element: String,
    },

    /// An arc connects two places or two transitions.
    #[error("net `{net}`: arc `{arc}` connects two {kind}s")]
    InvalidArcEndpoints {
        net: String,
        arc: String,
        kind: ElementKind,
    },

    /// An arc endpoint id resolves to neither a transition nor a place.
    #[error(
        "net `{net}`: arc `{arc}` references `{reference}`, which is neither a transition nor a place"
    )]
    DanglingReference {
        net: String,
        arc: String,
        reference: String,
    },

    /// The document structure is invalid in a way quick-xml does not catch,
    /// such as a `net` element nested inside another `net`.
    #[error("{0}")]
    Structure(String),
}
