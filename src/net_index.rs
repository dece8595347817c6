use std::sync::Arc;

use anyhow::Result;
use indexmap::IndexMap;

use crate::petri_net::PetriNet;

/// The vector slot of a place: its offset and its initial marking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaceEntry {
    pub offset: usize,
    pub initial: u64,
}

/// Which way an attached arc points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArcDirection {
    PlaceToTransition,
    TransitionToPlace,
}

/// Resolved arc data attached to a transition entry by the arc-application
/// pass: the incident place's vector offset, the weight, the inhibitor flag
/// and the role, if any.
#[derive(Clone, Debug)]
pub struct AttachedArc {
    pub place: usize,
    pub weight: u64,
    pub inhibitor: bool,
    pub role: Option<String>,
    pub direction: ArcDirection,
}

/// One entry of the keyed transition table. The arcs are attached by the
/// arc-application pass; the indexer itself only creates the entry.
#[derive(Clone, Debug)]
pub struct TransitionEntry {
    pub label: String,
    pub role: Option<String>,
    pub arcs: Vec<AttachedArc>,
}

/**
 * The role-assignment pass: examines inhibitor arcs and records role
 * identifiers on the net before places are indexed. Supplied by the
 * semantics module; the indexer invokes it exactly once and treats it as
 * opaque.
 */
pub trait RoleAssignment {
    fn assign_roles(&self, net: &mut PetriNet) -> Result<()>;
}

/**
 * The arc-application pass: consumes the built place and transition indices
 * and attaches resolved arc information onto the transition entries.
 * Supplied by the semantics module; the indexer invokes it exactly once,
 * after both indices exist, and treats it as opaque.
 */
pub trait ArcApplication {
    fn apply_arcs(
        &self,
        net: &PetriNet,
        places: &IndexMap<String, PlaceEntry>,
        transitions: &mut IndexMap<String, TransitionEntry>,
    ) -> Result<()>;
}

/// The flattened snapshot handed to a firing engine: a fresh marking vector
/// and the shared transition table. The vector is an independent allocation
/// per snapshot; the table is shared across snapshots and must not be
/// mutated in place.
pub struct Machine {
    pub state: Vec<u64>,
    pub transitions: Arc<IndexMap<String, TransitionEntry>>,
}

/**
 * The flattened P/T-net index of one net: a place-id to vector-offset
 * mapping and a keyed transition table. Offsets are assigned zero-based in
 * document order; this assignment is the single source of truth for vector
 * positions. The index is rebuilt fully on every load.
 */
#[derive(Debug)]
pub struct NetIndex {
    places: IndexMap<String, PlaceEntry>,
    transitions: Arc<IndexMap<String, TransitionEntry>>,
}

impl NetIndex {
    /**
     * Build the index of one net. Runs the role pass, assigns place
     * offsets, creates the transition table, then runs the arc pass.
     * A failing pass aborts the build; no partial index is exposed.
     */
    pub fn build(
        net: &mut PetriNet,
        roles: &dyn RoleAssignment,
        arcs: &dyn ArcApplication,
    ) -> Result<Self> {
        roles.assign_roles(net)?;

        let mut places = IndexMap::new();
        for (offset, (id, place)) in net.places().iter().enumerate() {
            places.insert(
                id.clone(),
                PlaceEntry {
                    offset,
                    initial: place.marking,
                },
            );
        }

        let mut transitions: IndexMap<String, TransitionEntry> = net
            .transitions()
            .iter()
            .map(|(id, transition)| {
                (
                    id.clone(),
                    TransitionEntry {
                        label: transition.label.clone(),
                        role: None,
                        arcs: vec![],
                    },
                )
            })
            .collect();

        arcs.apply_arcs(net, &places, &mut transitions)?;

        log::debug!(
            "indexed net `{}`: {} places, {} transitions",
            net.name(),
            places.len(),
            transitions.len()
        );
        Ok(Self {
            places,
            transitions: Arc::new(transitions),
        })
    }

    pub fn places(&self) -> &IndexMap<String, PlaceEntry> {
        &self.places
    }

    pub fn transitions(&self) -> &Arc<IndexMap<String, TransitionEntry>> {
        &self.transitions
    }

    /// A zeroed marking vector. Every call returns a fresh allocation.
    pub fn empty_vector(&self) -> Vec<u64> {
        vec![0; self.places.len()]
    }

    /// The initial marking vector. Every call returns a fresh allocation.
    pub fn initial_vector(&self) -> Vec<u64> {
        let mut vector = self.empty_vector();
        for place in self.places.values() {
            vector[place.offset] = place.initial;
        }
        vector
    }

    /// Open the net as a state machine: a fresh initial vector plus the
    /// shared transition table.
    pub fn snapshot(&self) -> Machine {
        Machine {
            state: self.initial_vector(),
            transitions: Arc::clone(&self.transitions),
        }
    }
}

#[cfg(test)]
pub(crate) mod stubs {
    use anyhow::{Result, anyhow};
    use indexmap::IndexMap;

    use super::{ArcApplication, ArcDirection, AttachedArc, PlaceEntry, RoleAssignment, TransitionEntry};
    use crate::petri_net::PetriNet;

    /// Records one role per inhibitor arc, named after the arc's source.
    pub struct InhibitorRoles;

    impl RoleAssignment for InhibitorRoles {
        fn assign_roles(&self, net: &mut PetriNet) -> Result<()> {
            let roles: Vec<String> = net
                .arcs()
                .iter()
                .filter(|arc| arc.inhibitor)
                .map(|arc| arc.source.clone())
                .collect();
            for (arc, role) in net
                .arcs_mut()
                .iter_mut()
                .filter(|arc| arc.inhibitor)
                .zip(roles.iter())
            {
                arc.role = Some(role.clone());
            }
            for role in roles {
                net.add_role(role);
            }
            Ok(())
        }
    }

    /// Attaches every arc to its incident transition, resolving the place
    /// side to its vector offset.
    pub struct ResolveArcs;

    impl ArcApplication for ResolveArcs {
        fn apply_arcs(
            &self,
            net: &PetriNet,
            places: &IndexMap<String, PlaceEntry>,
            transitions: &mut IndexMap<String, TransitionEntry>,
        ) -> Result<()> {
            for arc in net.arcs() {
                let source = net.find_source(arc)?;
                let target = net.find_target(arc)?;
                let (transition, place, direction) = if source.is_place() {
                    (target, source, ArcDirection::PlaceToTransition)
                } else {
                    (source, target, ArcDirection::TransitionToPlace)
                };
                let offset = places
                    .get(place.id())
                    .ok_or_else(|| anyhow!("place `{}` is not indexed", place.id()))?
                    .offset;
                let entry = transitions
                    .get_mut(transition.id())
                    .ok_or_else(|| anyhow!("transition `{}` is not indexed", transition.id()))?;
                entry.arcs.push(AttachedArc {
                    place: offset,
                    weight: arc.inscription.parse()?,
                    inhibitor: arc.inhibitor,
                    role: arc.role.clone(),
                    direction,
                });
            }
            Ok(())
        }
    }

    /// A pass that always fails, for propagation tests.
    pub struct FailingPass;

    impl RoleAssignment for FailingPass {
        fn assign_roles(&self, _: &mut PetriNet) -> Result<()> {
            Err(anyhow!("role pass rejected the net"))
        }
    }

    impl ArcApplication for FailingPass {
        fn apply_arcs(
            &self,
            _: &PetriNet,
            _: &IndexMap<String, PlaceEntry>,
            _: &mut IndexMap<String, TransitionEntry>,
        ) -> Result<()> {
            Err(anyhow!("arc pass rejected the net"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc as SharedTable;

    use super::{ArcDirection, NetIndex, stubs};
    use crate::petri_net::{Arc, PetriNet, Place, Transition};

    fn counter_net() -> PetriNet {
        let mut net = PetriNet::new("counter");
        let mut p1 = Place::new("p1");
        p1.marking = 3;
        net.add_place(p1).unwrap();
        net.add_place(Place::new("p2")).unwrap();
        net.add_transition(Transition::new("t1")).unwrap();
        net.add_arc(Arc::new("a1", "p1", "t1")).unwrap();
        let mut a2 = Arc::new("a2", "t1", "p2");
        a2.inhibitor = true;
        net.add_arc(a2).unwrap();
        net
    }

    fn counter_index() -> NetIndex {
        let mut net = counter_net();
        NetIndex::build(&mut net, &stubs::InhibitorRoles, &stubs::ResolveArcs).unwrap()
    }

    #[test]
    fn offsets_follow_document_order() {
        let index = counter_index();
        let offsets: Vec<usize> = index.places().values().map(|entry| entry.offset).collect();
        assert_eq!(offsets, vec![0, 1]);
        assert_eq!(index.places()["p1"].initial, 3);
        assert_eq!(index.places()["p2"].initial, 0);
    }

    #[test]
    fn empty_vector_is_zeroed() {
        let index = counter_index();
        let vector = index.empty_vector();
        assert_eq!(vector.len(), 2);
        assert!(vector.iter().all(|&tokens| tokens == 0));
    }

    #[test]
    fn initial_vector_places_markings_at_offsets() {
        let index = counter_index();
        assert_eq!(index.initial_vector(), vec![3, 0]);
        for entry in index.places().values() {
            assert_eq!(index.initial_vector()[entry.offset], entry.initial);
        }
    }

    #[test]
    fn vectors_are_independent_allocations() {
        let index = counter_index();
        let mut first = index.initial_vector();
        let second = index.initial_vector();
        first[0] = 99;
        assert_eq!(second[0], 3);
    }

    #[test]
    fn snapshot_shares_the_transition_table() {
        let index = counter_index();
        let one = index.snapshot();
        let two = index.snapshot();
        assert!(SharedTable::ptr_eq(&one.transitions, &two.transitions));
        assert_eq!(one.state, vec![3, 0]);

        //state vectors stay fresh per snapshot
        let mut mutated = one.state;
        mutated[0] = 0;
        assert_eq!(two.state, vec![3, 0]);
    }

    #[test]
    fn arc_pass_enriches_the_transition_table() {
        let index = counter_index();
        let entry = &index.transitions()["t1"];
        assert_eq!(entry.label, "t1");
        assert_eq!(entry.arcs.len(), 2);

        let consuming = &entry.arcs[0];
        assert_eq!(consuming.place, 0);
        assert_eq!(consuming.weight, 1);
        assert!(!consuming.inhibitor);
        assert_eq!(consuming.direction, ArcDirection::PlaceToTransition);

        let inhibiting = &entry.arcs[1];
        assert_eq!(inhibiting.place, 1);
        assert!(inhibiting.inhibitor);
        assert_eq!(inhibiting.direction, ArcDirection::TransitionToPlace);
        assert_eq!(inhibiting.role.as_deref(), Some("t1"));
    }

    #[test]
    fn role_pass_runs_before_indexing() {
        let mut net = counter_net();
        NetIndex::build(&mut net, &stubs::InhibitorRoles, &stubs::ResolveArcs).unwrap();
        //one inhibitor arc, one recorded role
        assert_eq!(net.roles(), ["t1"]);
    }

    #[test]
    fn net_without_places_indexes_to_an_empty_vector() {
        let mut net = PetriNet::new("empty");
        net.add_transition(Transition::new("t1")).unwrap();
        let index = NetIndex::build(&mut net, &stubs::InhibitorRoles, &stubs::ResolveArcs).unwrap();
        assert!(index.empty_vector().is_empty());
        assert!(index.initial_vector().is_empty());
        assert_eq!(index.transitions().len(), 1);
    }

    #[test]
    fn failing_role_pass_aborts_the_build() {
        let mut net = counter_net();
        let err = NetIndex::build(&mut net, &stubs::FailingPass, &stubs::ResolveArcs).unwrap_err();
        assert_eq!(err.to_string(), "role pass rejected the net");
    }

    #[test]
    fn failing_arc_pass_aborts_the_build() {
        let mut net = counter_net();
        let err =
            NetIndex::build(&mut net, &stubs::InhibitorRoles, &stubs::FailingPass).unwrap_err();
        assert_eq!(err.to_string(), "arc pass rejected the net");
    }
}
