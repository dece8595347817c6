use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;

use crate::errors::{ElementKind, PnmlError};

/// A 2D coordinate used for layout metadata (element positions and label
/// offsets).
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/**
 * A labelled place of a Petri net. A place represents a resource; its
 * marking is the number of tokens it currently holds.
 *
 * Layout information:
 *   position: centre of the circle the place is drawn as.
 *   offset: translation of the label inscription from its usual position.
 */
#[derive(Clone, Debug)]
pub struct Place {
    pub id: String,
    pub label: String,
    pub position: Point,
    pub offset: Point,
    pub marking: u64,
}

impl Place {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            position: Point::default(),
            offset: Point::default(),
            marking: 0,
        }
    }
}

impl Display for Place {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/**
 * A labelled transition of a Petri net. A transition represents an activity.
 */
#[derive(Clone, Debug)]
pub struct Transition {
    pub id: String,
    pub label: String,
    pub position: Point,
    pub offset: Point,
}

impl Transition {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            position: Point::default(),
            offset: Point::default(),
        }
    }
}

impl Display for Transition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/**
 * An arc between a place and a transition, or a transition and a place.
 * Arcs hold only the ids of their endpoints; resolution happens through the
 * owning net (see PetriNet::find_source and PetriNet::find_target).
 */
#[derive(Clone, Debug)]
pub struct Arc {
    pub id: String,
    pub source: String,
    pub target: String,
    /// The weight of this arc. The PNML decoder never reads the inscription
    /// text; it is always "1".
    pub inscription: String,
    pub inhibitor: bool,
    pub role: Option<String>,
}

impl Arc {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            inscription: "1".to_string(),
            inhibitor: false,
            role: None,
        }
    }
}

impl Display for Arc {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}-->{}", self.source, self.target)
    }
}

/// A resolved arc endpoint.
#[derive(Clone, Copy, Debug)]
pub enum NodeRef<'a> {
    Transition(&'a Transition),
    Place(&'a Place),
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> &'a str {
        match self {
            NodeRef::Transition(transition) => &transition.id,
            NodeRef::Place(place) => &place.id,
        }
    }

    pub fn label(&self) -> &'a str {
        match self {
            NodeRef::Transition(transition) => &transition.label,
            NodeRef::Place(place) => &place.label,
        }
    }

    pub fn is_place(&self) -> bool {
        matches!(self, NodeRef::Place(_))
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            NodeRef::Transition(_) => ElementKind::Transition,
            NodeRef::Place(_) => ElementKind::Place,
        }
    }
}

/**
 * A Petri net: labelled transitions, labelled places, and arcs from places
 * to transitions or transitions to places. Places and transitions are kept
 * in insertion order, which for decoded nets is document order; the net
 * indexer relies on this ordering for vector offsets.
 */
#[derive(Clone, Debug)]
pub struct PetriNet {
    name: String,
    places: IndexMap<String, Place>,
    transitions: IndexMap<String, Transition>,
    arcs: Vec<Arc>,
    /// Role identifiers, recorded by the role-assignment pass to model
    /// inhibitor-arc actors.
    roles: Vec<String>,
    /// Monotonic counter behind fresh_id.
    next_id: u64,
}

impl PetriNet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            places: IndexMap::new(),
            transitions: IndexMap::new(),
            arcs: Vec::new(),
            roles: Vec::new(),
            next_id: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn places(&self) -> &IndexMap<String, Place> {
        &self.places
    }

    pub fn transitions(&self) -> &IndexMap<String, Transition> {
        &self.transitions
    }

    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    /// Mutable access to the arcs, for the injected passes that attach
    /// roles to them.
    pub fn arcs_mut(&mut self) -> &mut [Arc] {
        &mut self.arcs
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn add_role(&mut self, role: impl Into<String>) {
        self.roles.push(role.into());
    }

    /**
     * Generate an id for a programmatically constructed entity. Ids are
     * drawn from a per-net monotonic counter, so construction is
     * deterministic; ids already present in the net are skipped.
     */
    pub fn fresh_id(&mut self, prefix: &str) -> String {
        loop {
            self.next_id += 1;
            let id = format!("{}{}", prefix, self.next_id);
            if !self.places.contains_key(&id) && !self.transitions.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn add_place(&mut self, place: Place) -> Result<(), PnmlError> {
        if self.places.contains_key(&place.id) {
            return Err(PnmlError::DuplicateId {
                net: self.name.clone(),
                kind: ElementKind::Place,
                element: place.id,
            });
        }
        self.places.insert(place.id.clone(), place);
        Ok(())
    }

    pub fn add_transition(&mut self, transition: Transition) -> Result<(), PnmlError> {
        if self.transitions.contains_key(&transition.id) {
            return Err(PnmlError::DuplicateId {
                net: self.name.clone(),
                kind: ElementKind::Transition,
                element: transition.id,
            });
        }
        self.transitions.insert(transition.id.clone(), transition);
        Ok(())
    }

    /**
     * Add an arc, checking that both endpoints resolve and that the arc
     * connects a place to a transition or a transition to a place.
     */
    pub fn add_arc(&mut self, arc: Arc) -> Result<(), PnmlError> {
        self.check_arc(&arc)?;
        self.arcs.push(arc);
        Ok(())
    }

    /// Add an arc without endpoint validation. The decoder uses this while
    /// elements are still streaming in; it validates every arc once the net
    /// is complete.
    pub(crate) fn push_arc_unchecked(&mut self, arc: Arc) {
        self.arcs.push(arc);
    }

    pub(crate) fn check_arc(&self, arc: &Arc) -> Result<(), PnmlError> {
        let source = self.find_source(arc)?;
        let target = self.find_target(arc)?;
        if source.is_place() == target.is_place() {
            return Err(PnmlError::InvalidArcEndpoints {
                net: self.name.clone(),
                arc: arc.id.clone(),
                kind: source.kind(),
            });
        }
        Ok(())
    }

    /// Resolve the source endpoint of an arc of this net.
    pub fn find_source(&self, arc: &Arc) -> Result<NodeRef<'_>, PnmlError> {
        self.resolve(&arc.id, &arc.source)
    }

    /// Resolve the target endpoint of an arc of this net.
    pub fn find_target(&self, arc: &Arc) -> Result<NodeRef<'_>, PnmlError> {
        self.resolve(&arc.id, &arc.target)
    }

    // transitions take precedence over places when an id occurs in both
    fn resolve(&self, arc_id: &str, reference: &str) -> Result<NodeRef<'_>, PnmlError> {
        if let Some(transition) = self.transitions.get(reference) {
            return Ok(NodeRef::Transition(transition));
        }
        if let Some(place) = self.places.get(reference) {
            return Ok(NodeRef::Place(place));
        }
        Err(PnmlError::DanglingReference {
            net: self.name.clone(),
            arc: arc_id.to_string(),
            reference: reference.to_string(),
        })
    }
}

impl Display for PetriNet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "--- Net: {}\nTransitions: ", self.name)?;
        for transition in self.transitions.values() {
            write!(f, "{} ", transition)?;
        }
        write!(f, "\nPlaces: ")?;
        for place in self.places.values() {
            write!(f, "{} ", place)?;
        }
        writeln!(f)?;
        for arc in &self.arcs {
            match (self.find_source(arc), self.find_target(arc)) {
                (Ok(source), Ok(target)) => {
                    writeln!(f, "{}-->{}", source.label(), target.label())?
                }
                _ => writeln!(f, "{}", arc)?,
            }
        }
        write!(f, "---")
    }
}
