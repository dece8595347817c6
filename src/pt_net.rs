use std::path::PathBuf;

use anyhow::{Result, anyhow};

use crate::{
    net_index::{ArcApplication, Machine, NetIndex, RoleAssignment},
    petri_net::PetriNet,
    petri_net_markup_language::parse_pnml_file,
    schema_catalog,
};

/**
 * A P/T net loaded from the schema catalog: the first net of
 * `<schema dir>/<name>.xml`, indexed with the supplied passes and ready to
 * be opened as a state machine.
 */
pub struct PtNet {
    pub name: String,
    pub filename: PathBuf,
    pub net: PetriNet,
    index: NetIndex,
}

impl PtNet {
    pub fn load(
        name: &str,
        roles: &dyn RoleAssignment,
        arcs: &dyn ArcApplication,
    ) -> Result<Self> {
        let filename = schema_catalog::schema_to_file(name);
        log::info!("load P/T net `{}` from {}", name, filename.display());

        let nets = parse_pnml_file(&filename)?;
        let mut net = nets
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("{} contains no net", filename.display()))?;
        let index = NetIndex::build(&mut net, roles, arcs)?;

        Ok(Self {
            name: name.to_string(),
            filename,
            net,
            index,
        })
    }

    pub fn index(&self) -> &NetIndex {
        &self.index
    }

    /// Rebuild the index from scratch. There is no incremental update.
    pub fn reindex(
        &mut self,
        roles: &dyn RoleAssignment,
        arcs: &dyn ArcApplication,
    ) -> Result<()> {
        self.index = NetIndex::build(&mut self.net, roles, arcs)?;
        Ok(())
    }

    pub fn empty_vector(&self) -> Vec<u64> {
        self.index.empty_vector()
    }

    pub fn initial_vector(&self) -> Vec<u64> {
        self.index.initial_vector()
    }

    /// Open the P/T net as a state machine.
    pub fn to_machine(&self) -> Machine {
        self.index.snapshot()
    }
}
