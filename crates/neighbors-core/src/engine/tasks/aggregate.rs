use crate::core::models::neighbor::{EntryResult, LigandKey, NeighborRecord, ResidueKey};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Raw contacts of one ligand instance, before reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct LigandCandidates {
    pub asym_id: String,
    pub comp_id: String,
    pub candidates: Vec<NeighborRecord>,
}

/// Keeps the nearest record for each target residue.
///
/// Candidates are stably sorted by distance, so among equidistant records the
/// earlier one is kept, and residues come out ordered by their nearest
/// contact.
pub fn reduce(mut candidates: Vec<NeighborRecord>) -> Vec<NeighborRecord> {
    candidates.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
    let mut seen: HashSet<ResidueKey> = HashSet::new();
    candidates
        .into_iter()
        .filter(|nr| seen.insert(nr.residue_key()))
        .collect()
}

/// Reduces every ligand's candidates and lays the result out as one flat
/// record list with its three indices.
///
/// Positions are assigned ligand by ligand in the given order, then residue
/// by residue in reduction order. Every ligand gets a bound-state entry.
pub fn run(ligands: Vec<LigandCandidates>, result: &mut EntryResult) {
    for ligand in ligands {
        let reduced = reduce(ligand.candidates);
        let is_bound = reduced.iter().any(NeighborRecord::is_bonded);
        result.ligand_is_bound.insert(ligand.asym_id.clone(), is_bound);

        for record in reduced {
            let jj = result.nearest_neighbors.len();
            let residue = record.residue_key();

            result
                .ligand_neighbor_index
                .entry(ligand.asym_id.clone())
                .or_default()
                .insert(residue.clone(), jj);
            result
                .target_neighbor_index
                .entry(residue)
                .or_default()
                .insert(ligand.asym_id.clone(), jj);
            result
                .interaction_index
                .entry(record.partner_asym_id.clone())
                .or_default()
                .entry(LigandKey::new(&ligand.asym_id, &ligand.comp_id))
                .or_default()
                .push(jj);

            result.nearest_neighbors.push(record);
        }
    }
}
