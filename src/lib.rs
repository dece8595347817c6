//! Load PNML documents as P/T-net state machines.
//!
//! The crate decodes Petri nets from PNML files into a labelled graph model
//! ([petri_net]) and flattens one net into a marking vector plus a keyed
//! transition table ([net_index]), ready to be handed to an external firing
//! engine. The two semantic passes that enrich the index (role assignment
//! and arc application) are injected through traits; this crate never fires
//! a transition itself.

pub mod errors;
pub mod importable;
pub mod net_index;
pub mod petri_net;
pub mod petri_net_markup_language;
pub mod pt_net;
pub mod schema_catalog;
