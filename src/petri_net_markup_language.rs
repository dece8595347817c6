use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
    str::FromStr,
};

use anyhow::{Context, Result};
use quick_xml::{
    Reader,
    events::{BytesEnd, BytesStart, BytesText, Event},
};

use crate::{
    errors::{ElementKind, PnmlError},
    importable::Importable,
    petri_net::{Arc, PetriNet, Place, Point, Transition},
};

/**
 * A decoded PNML document: one Petri net per top-level `net` element, in
 * document order.
 *
 * Two decoding rules are observable contracts and deliberate:
 * - the human-readable `name/text` of places and transitions is discarded;
 *   the label is always the element's id.
 * - the `inscription` text of arcs is never read; every arc keeps the
 *   default weight "1".
 */
pub struct PetriNetMarkupLanguage {
    pub nets: Vec<PetriNet>,
}

impl PetriNetMarkupLanguage {
    /**
     * Decode all Petri nets of a PNML document. Decoding is all-or-nothing:
     * the first violation aborts the decode and no nets are returned.
     */
    pub fn decode(reader: &mut dyn BufRead) -> Result<Vec<PetriNet>, PnmlError> {
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.config_mut().trim_text(true);

        let mut state = State::new();
        let mut buf = vec![];
        loop {
            buf.clear();
            let position = xml_reader.buffer_position();
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => state.open_tag(e)?,
                Ok(Event::End(e)) => state.close_tag(e, position)?,
                Ok(Event::Empty(e)) => state.empty_tag(e, position)?,
                Ok(Event::Text(t)) => state.text(&t),
                Ok(Event::Eof) => return state.finish(position),
                Ok(_) => (),
                Err(source) => {
                    return Err(PnmlError::Syntax {
                        position: xml_reader.buffer_position(),
                        message: source.to_string(),
                    });
                }
            }
        }
    }
}

impl Importable for PetriNetMarkupLanguage {
    fn import(reader: &mut dyn BufRead) -> Result<Self>
    where
        Self: Sized,
    {
        Ok(Self {
            nets: Self::decode(reader)?,
        })
    }
}

impl FromStr for PetriNetMarkupLanguage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut reader = io::Cursor::new(s);
        Self::import(&mut reader)
    }
}

/// Parse all Petri nets of the PNML file at the given path.
pub fn parse_pnml_file(path: impl AsRef<Path>) -> Result<Vec<PetriNet>> {
    let path = path.as_ref();
    log::info!("parse PNML file {}", path.display());
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = BufReader::new(file);
    PetriNetMarkupLanguage::decode(&mut reader)
        .with_context(|| format!("decoding {}", path.display()))
}

#[derive(Clone, Copy, PartialEq)]
enum NodeKind {
    Place,
    Transition,
}

impl NodeKind {
    fn element_kind(self) -> ElementKind {
        match self {
            NodeKind::Place => ElementKind::Place,
            NodeKind::Transition => ElementKind::Transition,
        }
    }
}

/// A place or transition element whose children are still streaming in.
struct PendingNode {
    kind: NodeKind,
    id: String,
    /// Stack depth at which the element was opened; child tags live above it.
    depth: usize,
    offset: Option<Point>,
    position: Option<Point>,
    marking: Option<String>,
}

/// An arc element whose children are still streaming in.
struct PendingArc {
    id: String,
    source: String,
    target: String,
    depth: usize,
    /// Set by the required `type` child; None at close is a violation.
    inhibitor: Option<bool>,
}

struct State {
    nets: Vec<PetriNet>,
    in_tags: Vec<Vec<u8>>,
    net: Option<PetriNet>,
    node: Option<PendingNode>,
    arc: Option<PendingArc>,
}

impl State {
    fn new() -> Self {
        Self {
            nets: vec![],
            in_tags: vec![],
            net: None,
            node: None,
            arc: None,
        }
    }

    fn attr(e: &BytesStart, name: &str) -> Option<String> {
        match e.try_get_attribute(name) {
            Ok(Some(attribute)) => Some(String::from_utf8_lossy(&attribute.value).into_owned()),
            _ => None,
        }
    }

    fn net_name(&self) -> String {
        match &self.net {
            Some(net) => net.name().to_string(),
            None => String::new(),
        }
    }

    /// Whether the open tags above the current node element match `rest`
    /// exactly. Mirrors the original's fixed child paths, e.g.
    /// `name/graphics/offset` versus `graphics/position`.
    fn node_path_is(&self, rest: &[&[u8]]) -> bool {
        match &self.node {
            Some(node) => {
                let path = &self.in_tags[node.depth + 1..];
                path.len() == rest.len()
                    && path.iter().zip(rest.iter()).all(|(a, b)| a.as_slice() == *b)
            }
            None => false,
        }
    }

    fn empty_tag(&mut self, e: BytesStart, position: u64) -> Result<(), PnmlError> {
        self.open_tag(e.clone())?;
        self.close_tag(e.to_end(), position)
    }

    fn open_tag(&mut self, e: BytesStart) -> Result<(), PnmlError> {
        match e.name().as_ref() {
            b"net" => {
                if self.net.is_some() {
                    return Err(PnmlError::Structure(format!(
                        "net `{}` contains a nested net element",
                        self.net_name()
                    )));
                }
                let id = Self::attr(&e, "id").ok_or(PnmlError::MissingField {
                    net: String::new(),
                    kind: ElementKind::Net,
                    element: "?".to_string(),
                    field: "id",
                })?;
                log::debug!("decode net `{}`", id);
                self.net = Some(PetriNet::new(id));
            }
            b"transition" if self.net.is_some() && self.node.is_none() => {
                self.open_node(NodeKind::Transition, &e)?;
            }
            b"place" if self.net.is_some() && self.node.is_none() => {
                self.open_node(NodeKind::Place, &e)?;
            }
            b"arc" if self.net.is_some() && self.arc.is_none() => {
                let id = Self::attr(&e, "id").ok_or_else(|| PnmlError::MissingField {
                    net: self.net_name(),
                    kind: ElementKind::Arc,
                    element: "?".to_string(),
                    field: "id",
                })?;
                let source = Self::attr(&e, "source").ok_or_else(|| PnmlError::MissingField {
                    net: self.net_name(),
                    kind: ElementKind::Arc,
                    element: id.clone(),
                    field: "source",
                })?;
                let target = Self::attr(&e, "target").ok_or_else(|| PnmlError::MissingField {
                    net: self.net_name(),
                    kind: ElementKind::Arc,
                    element: id.clone(),
                    field: "target",
                })?;
                self.arc = Some(PendingArc {
                    id,
                    source,
                    target,
                    depth: self.in_tags.len(),
                    inhibitor: None,
                });
            }
            b"offset" => {
                if self.node_path_is(&[b"name".as_slice(), b"graphics".as_slice()]) {
                    let point = self.point_of(&e, "label offset")?;
                    if let Some(node) = self.node.as_mut() {
                        node.offset = Some(point);
                    }
                }
            }
            b"position" => {
                if self.node_path_is(&[b"graphics".as_slice()]) {
                    let point = self.point_of(&e, "position")?;
                    if let Some(node) = self.node.as_mut() {
                        node.position = Some(point);
                    }
                }
            }
            b"type" => {
                let value = Self::attr(&e, "value");
                let net = self.net_name();
                if let Some(arc) = self.arc.as_mut() {
                    match value {
                        Some(value) => arc.inhibitor = Some(value == "inhibitor"),
                        None => {
                            return Err(PnmlError::MissingField {
                                net,
                                kind: ElementKind::Arc,
                                element: arc.id.clone(),
                                field: "type value",
                            });
                        }
                    }
                }
            }
            _ => {}
        }

        self.in_tags.push(e.name().as_ref().to_owned());
        Ok(())
    }

    fn open_node(&mut self, kind: NodeKind, e: &BytesStart) -> Result<(), PnmlError> {
        let id = Self::attr(e, "id").ok_or_else(|| PnmlError::MissingField {
            net: self.net_name(),
            kind: kind.element_kind(),
            element: "?".to_string(),
            field: "id",
        })?;
        self.node = Some(PendingNode {
            kind,
            id,
            depth: self.in_tags.len(),
            offset: None,
            position: None,
            marking: None,
        });
        Ok(())
    }

    /// Parse the required x/y attributes of an offset or position node.
    fn point_of(&self, e: &BytesStart, field: &'static str) -> Result<Point, PnmlError> {
        let (kind, element) = match &self.node {
            Some(node) => (node.kind.element_kind(), node.id.clone()),
            None => (ElementKind::Net, self.net_name()),
        };
        let mut coordinates = [0.0; 2];
        for (axis, value) in coordinates.iter_mut().zip(["x", "y"]) {
            let text = Self::attr(e, value).ok_or_else(|| PnmlError::MissingField {
                net: self.net_name(),
                kind,
                element: element.clone(),
                field,
            })?;
            *axis = text.parse().map_err(|_| PnmlError::UnparsableField {
                net: self.net_name(),
                kind,
                element: element.clone(),
                field,
                text,
            })?;
        }
        Ok(Point::new(coordinates[0], coordinates[1]))
    }

    fn text(&mut self, t: &BytesText) {
        //only the initialMarking value text of a place is ever read
        if self.node_path_is(&[b"initialMarking".as_slice(), b"value".as_slice()]) {
            if let Some(node) = self.node.as_mut() {
                if node.kind == NodeKind::Place {
                    node.marking = Some(String::from_utf8_lossy(t.as_ref()).into_owned());
                }
            }
        }
    }

    fn close_tag(&mut self, e: BytesEnd, position: u64) -> Result<(), PnmlError> {
        if let Some(last_tag) = self.in_tags.pop() {
            if last_tag != e.name().as_ref() {
                return Err(PnmlError::Syntax {
                    position,
                    message: format!(
                        "attempted to close tag `{}` but `{}` was open",
                        String::from_utf8_lossy(e.name().as_ref()),
                        String::from_utf8_lossy(&last_tag)
                    ),
                });
            }
        } else {
            return Err(PnmlError::Syntax {
                position,
                message: format!(
                    "attempted to close tag `{}` that was not open",
                    String::from_utf8_lossy(e.name().as_ref())
                ),
            });
        }

        match e.name().as_ref() {
            b"net" => self.close_net(),
            b"transition" | b"place" => self.close_node(),
            b"arc" => self.close_arc(),
            _ => Ok(()),
        }
    }

    fn close_node(&mut self) -> Result<(), PnmlError> {
        //a transition or place outside a net was never opened as a node;
        //the depth check keeps ignored nested elements from closing it
        let Some(node) = self
            .node
            .take_if(|node| node.depth == self.in_tags.len())
        else {
            return Ok(());
        };
        let net_name = self.net_name();
        let offset = node.offset.ok_or_else(|| PnmlError::MissingField {
            net: net_name.clone(),
            kind: node.kind.element_kind(),
            element: node.id.clone(),
            field: "label offset",
        })?;
        let position = node.position.ok_or_else(|| PnmlError::MissingField {
            net: net_name.clone(),
            kind: node.kind.element_kind(),
            element: node.id.clone(),
            field: "position",
        })?;
        let Some(net) = self.net.as_mut() else {
            return Err(PnmlError::Structure(format!(
                "element `{}` closed outside a net",
                node.id
            )));
        };
        match node.kind {
            NodeKind::Transition => {
                let mut transition = Transition::new(node.id);
                transition.offset = offset;
                transition.position = position;
                net.add_transition(transition)
            }
            NodeKind::Place => {
                let marking = parse_marking(&net_name, &node.id, node.marking.as_deref())?;
                let mut place = Place::new(node.id);
                place.offset = offset;
                place.position = position;
                place.marking = marking;
                net.add_place(place)
            }
        }
    }

    fn close_arc(&mut self) -> Result<(), PnmlError> {
        let Some(pending) = self
            .arc
            .take_if(|pending| pending.depth == self.in_tags.len())
        else {
            return Ok(());
        };
        let inhibitor = pending.inhibitor.ok_or_else(|| PnmlError::MissingField {
            net: self.net_name(),
            kind: ElementKind::Arc,
            element: pending.id.clone(),
            field: "type",
        })?;
        let mut arc = Arc::new(pending.id, pending.source, pending.target);
        arc.inhibitor = inhibitor;
        if let Some(net) = self.net.as_mut() {
            //endpoints may not have been decoded yet; checked at net close
            net.push_arc_unchecked(arc);
        }
        Ok(())
    }

    fn close_net(&mut self) -> Result<(), PnmlError> {
        let Some(net) = self.net.take() else {
            return Ok(());
        };
        //every arc must connect one place and one transition of this net
        for arc in net.arcs() {
            net.check_arc(arc)?;
        }
        log::info!(
            "decoded net `{}`: {} places, {} transitions, {} arcs",
            net.name(),
            net.places().len(),
            net.transitions().len(),
            net.arcs().len()
        );
        self.nets.push(net);
        Ok(())
    }

    fn finish(self, position: u64) -> Result<Vec<PetriNet>, PnmlError> {
        if let Some(tag) = self.in_tags.first() {
            return Err(PnmlError::Syntax {
                position,
                message: format!(
                    "file ended while tag `{}` was still open",
                    String::from_utf8_lossy(tag)
                ),
            });
        }
        Ok(self.nets)
    }
}

/// Interpret the text of an `initialMarking/value` node. The source format
/// encodes a `token-type,count` pair; the second field is the marking.
/// Absent or empty text is a marking of 0; any other shape is a violation.
fn parse_marking(net: &str, place: &str, text: Option<&str>) -> Result<u64, PnmlError> {
    let Some(text) = text else {
        return Ok(0);
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(0);
    }
    let violation = || PnmlError::UnparsableField {
        net: net.to_string(),
        kind: ElementKind::Place,
        element: place.to_string(),
        field: "initial marking",
        text: text.to_string(),
    };
    let mut fields = text.split(',');
    match (fields.next(), fields.next(), fields.next()) {
        (Some(_), Some(count), None) => count.trim().parse().map_err(|_| violation()),
        _ => Err(violation()),
    }
}
