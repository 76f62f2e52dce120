use super::config::NeighborConfig;
use super::error::ComputeError;
use super::tasks::aggregate::{self, LigandCandidates};
use super::tasks::atom_pool::{self, AtomPools};
use super::tasks::classify::{Classification, ConnectionIndex, classify};
use super::utils::spatial::SpatialIndex;
use crate::core::models::atom::AtomRecord;
use crate::core::models::entry::EntryData;
use crate::core::models::neighbor::{EntryResult, NeighborRecord};
use tracing::{debug, instrument, warn};

/// Computes the ligand neighbor result of a single entry.
///
/// The computation is a pure function of the entry data and the configuration:
/// identical inputs produce identical record order and index positions.
#[derive(Debug, Clone, Default)]
pub struct EntryComputer {
    config: NeighborConfig,
}

impl EntryComputer {
    pub fn new(config: NeighborConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NeighborConfig {
        &self.config
    }

    /// Computes the result for `model_id`, or for the representative model
    /// when `None`.
    ///
    /// Entries without coordinates or without ligands give an empty result.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError`] for an explicitly requested model that does not
    /// exist and for inconsistent instance data.
    #[instrument(skip_all, name = "entry_compute", fields(entry_id = %entry.entry_id))]
    pub fn try_compute(
        &self,
        entry: &EntryData,
        model_id: Option<&str>,
    ) -> Result<EntryResult, ComputeError> {
        let model_id = match model_id {
            Some(id) => {
                if !entry.atom_sites.iter().any(|site| site.model_id == id) {
                    return Err(ComputeError::ModelNotFound {
                        entry_id: entry.entry_id.clone(),
                        model_id: id.to_string(),
                    });
                }
                id.to_string()
            }
            None => match entry.representative_model_id() {
                Some(id) => id,
                None => {
                    warn!("Entry has no coordinate data; returning an empty result.");
                    return Ok(EntryResult::default());
                }
            },
        };

        let pools = atom_pool::run(entry, &model_id)?;
        if !pools.has_ligands() {
            debug!(model_id = %model_id, "Entry has no ligand instances.");
            return Ok(EntryResult::default());
        }

        let candidates = self.collect_candidates(entry, &pools);
        let mut result = EntryResult {
            ligand_atom_count: pools.atom_counts,
            ligand_hydrogen_atom_count: pools.hydrogen_counts,
            ..Default::default()
        };
        aggregate::run(candidates, &mut result);

        debug!(
            model_id = %model_id,
            ligands = result.ligand_is_bound.len(),
            records = result.nearest_neighbors.len(),
            "Computed ligand neighbors."
        );
        Ok(result)
    }

    /// Like [`EntryComputer::try_compute`] on the representative model, but
    /// degrades any failure to an empty result.
    pub fn compute(&self, entry: &EntryData) -> EntryResult {
        self.try_compute(entry, None).unwrap_or_else(|e| {
            warn!(entry_id = %entry.entry_id, error = %e, "Neighbor computation failed; using an empty result.");
            EntryResult::default()
        })
    }

    /// Unreduced, classified contacts for every ligand of the pools.
    fn collect_candidates(&self, entry: &EntryData, pools: &AtomPools) -> Vec<LigandCandidates> {
        let index = SpatialIndex::build(&pools.target_coords());
        let connections = ConnectionIndex::new(&entry.connections);
        let cutoff = self.config.cutoff;

        pools
            .ligands
            .iter()
            .map(|ligand| {
                let k = self.config.k_for(ligand.atoms.len());
                let mut candidates = Vec::new();
                for atom in &ligand.atoms {
                    for hit in index.nearest_within(&atom.coords(), k, cutoff) {
                        let target = &pools.targets[hit.index];
                        let class = classify(atom, target, hit.distance, cutoff, &connections);
                        candidates.push(neighbor_record(atom, target, class));
                    }
                }
                LigandCandidates {
                    asym_id: ligand.asym_id.clone(),
                    comp_id: ligand.comp_id.clone(),
                    candidates,
                }
            })
            .collect()
    }
}

fn neighbor_record(ligand: &AtomRecord, target: &AtomRecord, class: Classification) -> NeighborRecord {
    NeighborRecord {
        ligand_model_id: ligand.model_id.clone(),
        ligand_asym_id: ligand.asym_id.clone(),
        ligand_comp_id: ligand.comp_id.clone(),
        ligand_atom_id: ligand.atom_id.clone(),
        ligand_alt_id: ligand.alt_id.clone(),
        connect_type: class.connect_type,
        partner_model_id: target.model_id.clone(),
        partner_entity_type: target.entity_type,
        partner_entity_id: target.entity_id.clone(),
        partner_comp_id: target.comp_id.clone(),
        partner_asym_id: target.asym_id.clone(),
        partner_seq_id: target.seq_id,
        partner_auth_seq_id: target.auth_seq_id.clone(),
        partner_atom_id: target.atom_id.clone(),
        partner_alt_id: target.alt_id.clone(),
        distance: class.distance,
    }
}

/// Synthetic entries shared by the engine and workflow tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use crate::core::models::atom::{AtomSite, InstanceType, PolymerType};
    use crate::core::models::connection::{BondedConnection, ConnectType};
    use crate::core::models::entry::EntryData;
    use nalgebra::Point3;

    /// Ligand "C" (ATP) near residues A/45 (2.1 Å, no connectivity) and A/12
    /// (2.0 Å measured, deposited metal coordination at 2.05 Å).
    pub fn scenario_entry(entry_id: &str) -> EntryData {
        let mut entry = EntryData::new(entry_id);
        entry.add_instance("A", "1", InstanceType::Polymer, Some(PolymerType::Protein));
        entry.add_instance("C", "2", InstanceType::NonPolymer, None);
        entry.atom_sites = vec![
            AtomSite::new("1", "A", "ASP", "12", "OD1", Point3::new(10.0, 2.0, 0.0)),
            AtomSite::new("1", "A", "ASP", "12", "CG", Point3::new(10.0, 3.3, 0.0)),
            AtomSite::new("1", "A", "LYS", "45", "NZ", Point3::new(2.1, 0.0, 0.0)),
            AtomSite::new("1", "A", "LYS", "45", "CE", Point3::new(3.5, 0.0, 0.0)),
            AtomSite::new("1", "C", "ATP", "1", "O1", Point3::new(0.0, 0.0, 0.0)),
            AtomSite::new("1", "C", "ATP", "1", "PG", Point3::new(10.0, 0.0, 0.0)),
        ];
        entry.connections = vec![BondedConnection {
            ligand_asym_id: "C".into(),
            ligand_comp_id: "ATP".into(),
            ligand_atom_id: "PG".into(),
            ligand_alt_id: None,
            connect_type: ConnectType::MetalCoordination,
            partner_entity_type: InstanceType::Polymer,
            partner_entity_id: "1".into(),
            partner_comp_id: "ASP".into(),
            partner_asym_id: "A".into(),
            partner_seq_id: Some(12),
            partner_auth_seq_id: Some("12".into()),
            partner_atom_id: "OD1".into(),
            partner_alt_id: None,
            bond_distance: Some(2.05),
            bond_order: None,
        }];
        entry
    }
}
