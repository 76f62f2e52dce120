use super::atom::InstanceType;
use super::connection::ConnectType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Alt-conformer bucket used for atoms that have no alternate location id.
pub const FULL_OCCUPANCY_KEY: &str = "FL";

/// One resolved contact between a ligand atom and its nearest atom in a target
/// residue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborRecord {
    pub ligand_model_id: String,
    pub ligand_asym_id: String,
    pub ligand_comp_id: String,
    pub ligand_atom_id: String,
    pub ligand_alt_id: Option<String>,
    pub connect_type: ConnectType,
    pub partner_model_id: String,
    pub partner_entity_type: InstanceType,
    pub partner_entity_id: String,
    pub partner_comp_id: String,
    pub partner_asym_id: String,
    pub partner_seq_id: Option<i32>,
    pub partner_auth_seq_id: String,
    pub partner_atom_id: String,
    pub partner_alt_id: Option<String>,
    /// Contact distance in Angstroms, rounded to three decimals.
    pub distance: f64,
}

impl NeighborRecord {
    pub fn residue_key(&self) -> ResidueKey {
        ResidueKey::new(&self.partner_asym_id, &self.partner_auth_seq_id)
    }

    pub fn is_bonded(&self) -> bool {
        self.connect_type.is_bonded()
    }
}

/// A target residue, addressed by instance and author sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResidueKey {
    pub asym_id: String,
    pub auth_seq_id: String,
}

impl ResidueKey {
    pub fn new(asym_id: &str, auth_seq_id: &str) -> Self {
        Self {
            asym_id: asym_id.to_string(),
            auth_seq_id: auth_seq_id.to_string(),
        }
    }
}

/// A ligand instance together with its chemical component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LigandKey {
    pub asym_id: String,
    pub comp_id: String,
}

impl LigandKey {
    pub fn new(asym_id: &str, comp_id: &str) -> Self {
        Self {
            asym_id: asym_id.to_string(),
            comp_id: comp_id.to_string(),
        }
    }
}

/// `ligand asym -> target residue -> position in nearest_neighbors`
pub type LigandNeighborIndex = BTreeMap<String, BTreeMap<ResidueKey, usize>>;
/// `target residue -> ligand asym -> position in nearest_neighbors`
pub type TargetNeighborIndex = BTreeMap<ResidueKey, BTreeMap<String, usize>>;
/// `target asym -> (ligand asym, ligand comp) -> positions in nearest_neighbors`
pub type InteractionIndex = BTreeMap<String, BTreeMap<LigandKey, Vec<usize>>>;
/// `ligand asym -> alt id (or FULL_OCCUPANCY_KEY) -> atom count`
pub type AltAtomCounts = BTreeMap<String, BTreeMap<String, usize>>;

/// Everything computed for one entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryResult {
    pub nearest_neighbors: Vec<NeighborRecord>,
    pub ligand_neighbor_index: LigandNeighborIndex,
    pub target_neighbor_index: TargetNeighborIndex,
    pub interaction_index: InteractionIndex,
    pub ligand_is_bound: BTreeMap<String, bool>,
    pub ligand_atom_count: AltAtomCounts,
    pub ligand_hydrogen_atom_count: AltAtomCounts,
}

impl EntryResult {
    /// An empty result usable in `static` position.
    pub const EMPTY: EntryResult = EntryResult {
        nearest_neighbors: Vec::new(),
        ligand_neighbor_index: BTreeMap::new(),
        target_neighbor_index: BTreeMap::new(),
        interaction_index: BTreeMap::new(),
        ligand_is_bound: BTreeMap::new(),
        ligand_atom_count: BTreeMap::new(),
        ligand_hydrogen_atom_count: BTreeMap::new(),
    };

    pub fn is_empty(&self) -> bool {
        self.nearest_neighbors.is_empty() && self.ligand_atom_count.is_empty()
    }

    /// Reduced records that belong to one ligand instance, in index order.
    pub fn neighbors_of_ligand<'a>(
        &'a self,
        ligand_asym_id: &'a str,
    ) -> impl Iterator<Item = &'a NeighborRecord> + 'a {
        self.nearest_neighbors
            .iter()
            .filter(move |nr| nr.ligand_asym_id == ligand_asym_id)
    }
}
