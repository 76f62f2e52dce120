use crate::core::models::atom::{AtomRecord, AtomSite, InstanceType};
use crate::core::models::entry::EntryData;
use crate::core::models::neighbor::{AltAtomCounts, FULL_OCCUPANCY_KEY};
use crate::engine::error::ComputeError;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Atoms of one ligand instance in coordinate order.
#[derive(Debug, Clone, PartialEq)]
pub struct LigandAtomGroup {
    pub asym_id: String,
    pub comp_id: String,
    pub atoms: Vec<AtomRecord>,
}

impl LigandAtomGroup {
    pub fn is_single_atom(&self) -> bool {
        self.atoms.len() == 1
    }
}

/// The partition of one model's atoms into a target pool and ligand groups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtomPools {
    pub targets: Vec<AtomRecord>,
    /// Ligand instances in order of first appearance.
    pub ligands: Vec<LigandAtomGroup>,
    pub atom_counts: AltAtomCounts,
    pub hydrogen_counts: AltAtomCounts,
}

impl AtomPools {
    pub fn has_ligands(&self) -> bool {
        !self.ligands.is_empty()
    }

    pub fn target_coords(&self) -> Vec<[f64; 3]> {
        self.targets.iter().map(AtomRecord::coords).collect()
    }
}

enum Role {
    Target,
    Ligand,
    Ignored,
}

fn role_of(entry: &EntryData, site: &AtomSite) -> Result<(Role, InstanceType), ComputeError> {
    let instance_type = *entry
        .instance_types
        .get(&site.asym_id)
        .ok_or_else(|| ComputeError::UnknownInstance {
            asym_id: site.asym_id.clone(),
        })?;
    let role = match instance_type {
        InstanceType::Polymer => {
            let eligible = entry
                .polymer_types
                .get(&site.asym_id)
                .is_some_and(|ty| ty.is_target_eligible());
            if eligible { Role::Target } else { Role::Ignored }
        }
        InstanceType::Branched => Role::Target,
        InstanceType::NonPolymer => Role::Ligand,
        InstanceType::Water | InstanceType::Macrolide => Role::Ignored,
    };
    Ok((role, instance_type))
}

/// Partitions the atoms of `model_id` into eligible targets and per-instance
/// ligand groups, counting ligand atoms per alternate conformer.
///
/// # Errors
///
/// Fails when an atom references an instance without type or entity
/// assignment, or carries a non-finite coordinate.
#[instrument(skip_all, name = "atom_pool_task", fields(entry_id = %entry.entry_id, model_id = %model_id))]
pub fn run(entry: &EntryData, model_id: &str) -> Result<AtomPools, ComputeError> {
    let mut pools = AtomPools::default();
    let mut ligand_slots: HashMap<String, usize> = HashMap::new();

    for site in entry.atom_sites.iter().filter(|s| s.model_id == model_id) {
        let (role, entity_type) = role_of(entry, site)?;
        if matches!(role, Role::Ignored) {
            continue;
        }

        let p = &site.position;
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            return Err(ComputeError::InvalidCoordinate {
                asym_id: site.asym_id.clone(),
                atom_id: site.atom_id.clone(),
            });
        }

        let entity_id = entry
            .instance_entities
            .get(&site.asym_id)
            .ok_or_else(|| ComputeError::UnknownInstance {
                asym_id: site.asym_id.clone(),
            })?;
        let record = AtomRecord::from_site(site, entity_id, entity_type);

        match role {
            Role::Target => pools.targets.push(record),
            Role::Ligand => {
                let alt_key = site
                    .alt_id
                    .clone()
                    .unwrap_or_else(|| FULL_OCCUPANCY_KEY.to_string());
                *pools
                    .atom_counts
                    .entry(site.asym_id.clone())
                    .or_default()
                    .entry(alt_key.clone())
                    .or_default() += 1;
                if site.is_hydrogen() {
                    *pools
                        .hydrogen_counts
                        .entry(site.asym_id.clone())
                        .or_default()
                        .entry(alt_key)
                        .or_default() += 1;
                }

                let slot = *ligand_slots
                    .entry(site.asym_id.clone())
                    .or_insert_with(|| {
                        pools.ligands.push(LigandAtomGroup {
                            asym_id: site.asym_id.clone(),
                            comp_id: site.comp_id.clone(),
                            atoms: Vec::new(),
                        });
                        pools.ligands.len() - 1
                    });
                pools.ligands[slot].atoms.push(record);
            }
            Role::Ignored => {}
        }
    }

    debug!(
        targets = pools.targets.len(),
        ligands = pools.ligands.len(),
        "Partitioned model atoms."
    );
    Ok(pools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::PolymerType;
    use nalgebra::Point3;

    fn entry() -> EntryData {
        let mut entry = EntryData::new("1ABC");
        entry.add_instance("A", "1", InstanceType::Polymer, Some(PolymerType::Protein));
        entry.add_instance("B", "2", InstanceType::Polymer, Some(PolymerType::Other));
        entry.add_instance("C", "3", InstanceType::NonPolymer, None);
        entry.add_instance("D", "4", InstanceType::Branched, None);
        entry.add_instance("E", "5", InstanceType::Water, None);
        entry.add_instance("F", "3", InstanceType::NonPolymer, None);
        let origin = Point3::origin();
        entry.atom_sites = vec![
            AtomSite::new("1", "A", "LYS", "45", "NZ", origin),
            AtomSite::new("1", "B", "UNK", "1", "CA", origin),
            AtomSite::new("1", "C", "ATP", "1", "PG", origin),
            AtomSite::new("1", "C", "ATP", "1", "H1", origin),
            AtomSite::new("1", "C", "ATP", "1", "O1", origin).with_alt_id("A"),
            AtomSite::new("1", "C", "ATP", "1", "H2", origin).with_alt_id("A"),
            AtomSite::new("1", "D", "NAG", "1", "C1", origin),
            AtomSite::new("1", "E", "HOH", "1", "O", origin),
            AtomSite::new("1", "F", "ZN", "1", "ZN", origin).with_type_symbol("ZN"),
            AtomSite::new("2", "A", "LYS", "45", "NZ", origin),
            AtomSite::new("2", "C", "ATP", "1", "PG", origin),
        ];
        entry
    }

    #[test]
    fn partitions_targets_and_ligands_for_one_model() {
        let pools = run(&entry(), "1").unwrap();
        let target_asyms: Vec<&str> = pools.targets.iter().map(|a| a.asym_id.as_str()).collect();
        assert_eq!(target_asyms, vec!["A", "D"]);
        assert_eq!(pools.targets[1].entity_type, InstanceType::Branched);

        let ligand_asyms: Vec<&str> = pools.ligands.iter().map(|g| g.asym_id.as_str()).collect();
        assert_eq!(ligand_asyms, vec!["C", "F"]);
        assert_eq!(pools.ligands[0].comp_id, "ATP");
        assert_eq!(pools.ligands[0].atoms.len(), 4);
        assert!(pools.ligands[1].is_single_atom());
        assert_eq!(pools.ligands[1].atoms[0].entity_id, "3");
    }

    #[test]
    fn counts_atoms_per_alt_conformer() {
        let pools = run(&entry(), "1").unwrap();
        let c_counts = &pools.atom_counts["C"];
        assert_eq!(c_counts[FULL_OCCUPANCY_KEY], 2);
        assert_eq!(c_counts["A"], 2);
        assert_eq!(pools.hydrogen_counts["C"][FULL_OCCUPANCY_KEY], 1);
        assert_eq!(pools.hydrogen_counts["C"]["A"], 1);
        assert_eq!(pools.atom_counts["F"][FULL_OCCUPANCY_KEY], 1);
        assert!(!pools.hydrogen_counts.contains_key("F"));
    }

    #[test]
    fn other_models_are_excluded() {
        let pools = run(&entry(), "2").unwrap();
        assert_eq!(pools.targets.len(), 1);
        assert_eq!(pools.ligands.len(), 1);
        assert_eq!(pools.atom_counts["C"][FULL_OCCUPANCY_KEY], 1);
    }

    #[test]
    fn empty_entry_gives_empty_pools() {
        let pools = run(&EntryData::new("0XXX"), "1").unwrap();
        assert!(pools.targets.is_empty());
        assert!(!pools.has_ligands());
        assert!(pools.target_coords().is_empty());
    }

    #[test]
    fn unregistered_instance_is_an_error() {
        let mut entry = entry();
        entry
            .atom_sites
            .push(AtomSite::new("1", "Z", "ALA", "1", "CA", Point3::origin()));
        assert!(matches!(
            run(&entry, "1"),
            Err(ComputeError::UnknownInstance { asym_id }) if asym_id == "Z"
        ));
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        let mut entry = entry();
        entry.atom_sites[0].position = Point3::new(f64::NAN, 0.0, 0.0);
        assert!(matches!(
            run(&entry, "1"),
            Err(ComputeError::InvalidCoordinate { .. })
        ));
    }
}
