use crate::core::models::atom::InstanceType;
use crate::core::models::connection::ConnectType;
use crate::core::models::neighbor::{
    AltAtomCounts, EntryResult, LigandKey, NeighborRecord, ResidueKey,
};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error for artifact '{path}': {source}", path = path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("Binary artifact encoding error: {0}")]
    Binary(#[from] bincode::Error),
    #[error("JSON artifact encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk encoding of a store artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactFormat {
    /// Compact native binary encoding; the operational default.
    #[default]
    Binary,
    /// Portable structured text for inspection and migration.
    Json,
}

impl ArtifactFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Binary => "bin",
            ArtifactFormat::Json => "json",
        }
    }
}

impl FromStr for ArtifactFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" | "bin" | "bincode" => Ok(ArtifactFormat::Binary),
            "json" => Ok(ArtifactFormat::Json),
            _ => Err(()),
        }
    }
}

/// The persisted content of a neighbor store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: String,
    pub created: String,
    pub entries: HashMap<String, EntryResult>,
}

pub fn write_snapshot(
    writer: &mut impl Write,
    snapshot: &StoreSnapshot,
    format: ArtifactFormat,
) -> Result<(), ArtifactError> {
    match format {
        ArtifactFormat::Binary => bincode::serialize_into(writer, snapshot)?,
        ArtifactFormat::Json => {
            serde_json::to_writer_pretty(writer, &JsonSnapshot::from(snapshot))?
        }
    }
    Ok(())
}

pub fn decode_snapshot(bytes: &[u8], format: ArtifactFormat) -> Result<StoreSnapshot, ArtifactError> {
    match format {
        ArtifactFormat::Binary => {
            // Bounding length prefixes by the input size keeps a corrupt
            // artifact from requesting a huge allocation.
            Ok(bincode::DefaultOptions::new()
                .with_fixint_encoding()
                .allow_trailing_bytes()
                .with_limit(bytes.len() as u64)
                .deserialize(bytes)?)
        }
        ArtifactFormat::Json => {
            let document: JsonSnapshot = serde_json::from_slice(bytes)?;
            Ok(document.into())
        }
    }
}

/// Writes the snapshot to a sibling temporary file and renames it over `path`,
/// so readers never observe a partially written artifact.
pub fn write_snapshot_file(
    path: &Path,
    snapshot: &StoreSnapshot,
    format: ArtifactFormat,
) -> Result<(), ArtifactError> {
    let io_err = |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".partial");
    let tmp_path = PathBuf::from(tmp_name);

    let write_result = (|| {
        let file = File::create(&tmp_path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        write_snapshot(&mut writer, snapshot, format)?;
        let file = writer
            .into_inner()
            .map_err(|e| io_err(e.into_error()))?;
        file.sync_all().map_err(io_err)
    })();

    if let Err(e) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    fs::rename(&tmp_path, path).map_err(io_err)
}

pub fn read_snapshot_file(
    path: &Path,
    format: ArtifactFormat,
) -> Result<StoreSnapshot, ArtifactError> {
    let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_snapshot(&bytes, format)
}

// --- Structured-text form ---
//
// Neighbor records are written as positional arrays and the tuple-keyed
// indices as flat rows, since JSON object keys must be strings.

#[derive(Debug, Serialize, Deserialize)]
struct JsonSnapshot {
    version: String,
    created: String,
    entries: BTreeMap<String, JsonEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonEntry {
    nearest_neighbors: Vec<NeighborRow>,
    /// (ligand asym, target asym, target auth seq, position)
    ligand_neighbor_index: Vec<(String, String, String, usize)>,
    /// (target asym, target auth seq, ligand asym, position)
    target_neighbor_index: Vec<(String, String, String, usize)>,
    /// (target asym, ligand asym, ligand comp, positions)
    interaction_index: Vec<(String, String, String, Vec<usize>)>,
    ligand_is_bound: BTreeMap<String, bool>,
    ligand_atom_count: AltAtomCounts,
    ligand_hydrogen_atom_count: AltAtomCounts,
}

#[derive(Debug, Serialize, Deserialize)]
struct NeighborRow(
    String,
    String,
    String,
    String,
    Option<String>,
    ConnectType,
    String,
    InstanceType,
    String,
    String,
    String,
    Option<i32>,
    String,
    String,
    Option<String>,
    f64,
);

impl From<&NeighborRecord> for NeighborRow {
    fn from(nr: &NeighborRecord) -> Self {
        NeighborRow(
            nr.ligand_model_id.clone(),
            nr.ligand_asym_id.clone(),
            nr.ligand_comp_id.clone(),
            nr.ligand_atom_id.clone(),
            nr.ligand_alt_id.clone(),
            nr.connect_type,
            nr.partner_model_id.clone(),
            nr.partner_entity_type,
            nr.partner_entity_id.clone(),
            nr.partner_comp_id.clone(),
            nr.partner_asym_id.clone(),
            nr.partner_seq_id,
            nr.partner_auth_seq_id.clone(),
            nr.partner_atom_id.clone(),
            nr.partner_alt_id.clone(),
            nr.distance,
        )
    }
}

impl From<NeighborRow> for NeighborRecord {
    fn from(row: NeighborRow) -> Self {
        NeighborRecord {
            ligand_model_id: row.0,
            ligand_asym_id: row.1,
            ligand_comp_id: row.2,
            ligand_atom_id: row.3,
            ligand_alt_id: row.4,
            connect_type: row.5,
            partner_model_id: row.6,
            partner_entity_type: row.7,
            partner_entity_id: row.8,
            partner_comp_id: row.9,
            partner_asym_id: row.10,
            partner_seq_id: row.11,
            partner_auth_seq_id: row.12,
            partner_atom_id: row.13,
            partner_alt_id: row.14,
            distance: row.15,
        }
    }
}

impl From<&EntryResult> for JsonEntry {
    fn from(result: &EntryResult) -> Self {
        let ligand_neighbor_index = result
            .ligand_neighbor_index
            .iter()
            .flat_map(|(ligand, residues)| {
                residues.iter().map(move |(key, &idx)| {
                    (ligand.clone(), key.asym_id.clone(), key.auth_seq_id.clone(), idx)
                })
            })
            .collect();
        let target_neighbor_index = result
            .target_neighbor_index
            .iter()
            .flat_map(|(key, ligands)| {
                ligands.iter().map(move |(ligand, &idx)| {
                    (key.asym_id.clone(), key.auth_seq_id.clone(), ligand.clone(), idx)
                })
            })
            .collect();
        let interaction_index = result
            .interaction_index
            .iter()
            .flat_map(|(target, ligands)| {
                ligands.iter().map(move |(key, positions)| {
                    (
                        target.clone(),
                        key.asym_id.clone(),
                        key.comp_id.clone(),
                        positions.clone(),
                    )
                })
            })
            .collect();

        Self {
            nearest_neighbors: result.nearest_neighbors.iter().map(NeighborRow::from).collect(),
            ligand_neighbor_index,
            target_neighbor_index,
            interaction_index,
            ligand_is_bound: result.ligand_is_bound.clone(),
            ligand_atom_count: result.ligand_atom_count.clone(),
            ligand_hydrogen_atom_count: result.ligand_hydrogen_atom_count.clone(),
        }
    }
}

impl From<JsonEntry> for EntryResult {
    fn from(entry: JsonEntry) -> Self {
        let mut result = EntryResult {
            nearest_neighbors: entry
                .nearest_neighbors
                .into_iter()
                .map(NeighborRecord::from)
                .collect(),
            ligand_is_bound: entry.ligand_is_bound,
            ligand_atom_count: entry.ligand_atom_count,
            ligand_hydrogen_atom_count: entry.ligand_hydrogen_atom_count,
            ..Default::default()
        };
        for (ligand, asym, seq, idx) in entry.ligand_neighbor_index {
            result
                .ligand_neighbor_index
                .entry(ligand)
                .or_default()
                .insert(ResidueKey { asym_id: asym, auth_seq_id: seq }, idx);
        }
        for (asym, seq, ligand, idx) in entry.target_neighbor_index {
            result
                .target_neighbor_index
                .entry(ResidueKey { asym_id: asym, auth_seq_id: seq })
                .or_default()
                .insert(ligand, idx);
        }
        for (target, ligand, comp, positions) in entry.interaction_index {
            result
                .interaction_index
                .entry(target)
                .or_default()
                .insert(LigandKey { asym_id: ligand, comp_id: comp }, positions);
        }
        result
    }
}

impl From<&StoreSnapshot> for JsonSnapshot {
    fn from(snapshot: &StoreSnapshot) -> Self {
        Self {
            version: snapshot.version.clone(),
            created: snapshot.created.clone(),
            entries: snapshot
                .entries
                .iter()
                .map(|(id, result)| (id.clone(), JsonEntry::from(result)))
                .collect(),
        }
    }
}

impl From<JsonSnapshot> for StoreSnapshot {
    fn from(document: JsonSnapshot) -> Self {
        Self {
            version: document.version,
            created: document.created,
            entries: document
                .entries
                .into_iter()
                .map(|(id, entry)| (id, EntryResult::from(entry)))
                .collect(),
        }
    }
}
