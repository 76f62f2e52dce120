use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of a structure instance (one `asym_id`) as supplied by the
/// entity/instance typing of the deposited record.
///
/// Only polymer and branched instances can act as interaction targets and only
/// non-polymer instances are treated as ligands. Water is never either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceType {
    /// A polymer instance (protein, nucleic acid, ...).
    Polymer,
    /// A small-molecule instance.
    NonPolymer,
    /// A branched (oligosaccharide) instance.
    Branched,
    /// Solvent water.
    Water,
    /// A macrolide instance.
    Macrolide,
}

impl InstanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceType::Polymer => "polymer",
            InstanceType::NonPolymer => "non-polymer",
            InstanceType::Branched => "branched",
            InstanceType::Water => "water",
            InstanceType::Macrolide => "macrolide",
        }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceType {
    type Err = ();

    /// Parses an instance type, case-insensitively, accepting both the
    /// hyphenated and underscored spellings of "non-polymer".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "polymer" => Ok(InstanceType::Polymer),
            "non-polymer" | "non_polymer" | "nonpolymer" => Ok(InstanceType::NonPolymer),
            "branched" => Ok(InstanceType::Branched),
            "water" => Ok(InstanceType::Water),
            "macrolide" => Ok(InstanceType::Macrolide),
            _ => Err(()),
        }
    }
}

/// Filtered polymer type of a polymer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolymerType {
    Protein,
    #[serde(rename = "DNA")]
    Dna,
    #[serde(rename = "RNA")]
    Rna,
    #[serde(rename = "NA-hybrid")]
    NaHybrid,
    Other,
}

impl PolymerType {
    /// Polymer types whose instances are eligible as interaction targets.
    pub fn is_target_eligible(&self) -> bool {
        !matches!(self, PolymerType::Other)
    }
}

impl FromStr for PolymerType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "protein" => Ok(PolymerType::Protein),
            "dna" => Ok(PolymerType::Dna),
            "rna" => Ok(PolymerType::Rna),
            "na-hybrid" | "na_hybrid" => Ok(PolymerType::NaHybrid),
            "other" => Ok(PolymerType::Other),
            _ => Err(()),
        }
    }
}

/// One coordinate row of an entry, exactly as supplied by the record parser.
///
/// Entity membership and instance typing are resolved later from the entry's
/// instance maps.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomSite {
    pub model_id: String,
    pub asym_id: String,
    pub comp_id: String,
    /// Label sequence number; `None` for non-polymer and unnumbered residues.
    pub seq_id: Option<i32>,
    /// Author sequence number. Falls back to the label number when absent.
    pub auth_seq_id: String,
    pub atom_id: String,
    pub alt_id: Option<String>,
    /// Element symbol (e.g. "C", "H", "ZN").
    pub type_symbol: String,
    pub position: Point3<f64>,
}

impl AtomSite {
    /// Creates an atom site with no alternate conformer and element taken
    /// from the first character of the atom name.
    pub fn new(
        model_id: &str,
        asym_id: &str,
        comp_id: &str,
        auth_seq_id: &str,
        atom_id: &str,
        position: Point3<f64>,
    ) -> Self {
        let type_symbol = atom_id
            .trim()
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase().to_string())
            .unwrap_or_default();
        Self {
            model_id: model_id.to_string(),
            asym_id: asym_id.to_string(),
            comp_id: comp_id.to_string(),
            seq_id: auth_seq_id.parse().ok(),
            auth_seq_id: auth_seq_id.to_string(),
            atom_id: atom_id.to_string(),
            alt_id: None,
            type_symbol,
            position,
        }
    }

    pub fn with_seq_id(mut self, seq_id: Option<i32>) -> Self {
        self.seq_id = seq_id;
        self
    }

    pub fn with_alt_id(mut self, alt_id: &str) -> Self {
        self.alt_id = Some(alt_id.to_string());
        self
    }

    pub fn with_type_symbol(mut self, type_symbol: &str) -> Self {
        self.type_symbol = type_symbol.to_string();
        self
    }

    pub fn is_hydrogen(&self) -> bool {
        self.type_symbol == "H"
    }
}

/// An atom selected into a target pool or a ligand group, with its entity
/// identity resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomRecord {
    pub entity_id: String,
    pub entity_type: InstanceType,
    pub asym_id: String,
    pub comp_id: String,
    pub seq_id: Option<i32>,
    pub auth_seq_id: String,
    pub atom_id: String,
    pub alt_id: Option<String>,
    pub position: Point3<f64>,
    pub model_id: String,
}

impl AtomRecord {
    pub fn from_site(site: &AtomSite, entity_id: &str, entity_type: InstanceType) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            entity_type,
            asym_id: site.asym_id.clone(),
            comp_id: site.comp_id.clone(),
            seq_id: site.seq_id,
            auth_seq_id: site.auth_seq_id.clone(),
            atom_id: site.atom_id.clone(),
            alt_id: site.alt_id.clone(),
            position: site.position,
            model_id: site.model_id.clone(),
        }
    }

    #[inline]
    pub fn coords(&self) -> [f64; 3] {
        [self.position.x, self.position.y, self.position.z]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_type_parses_common_spellings() {
        assert_eq!(InstanceType::from_str("polymer"), Ok(InstanceType::Polymer));
        assert_eq!(InstanceType::from_str("non-polymer"), Ok(InstanceType::NonPolymer));
        assert_eq!(InstanceType::from_str("NON_POLYMER"), Ok(InstanceType::NonPolymer));
        assert_eq!(InstanceType::from_str("Branched"), Ok(InstanceType::Branched));
        assert_eq!(InstanceType::from_str(" water "), Ok(InstanceType::Water));
        assert_eq!(InstanceType::from_str("solvent"), Err(()));
    }

    #[test]
    fn instance_type_display_round_trips_through_from_str() {
        for ty in [
            InstanceType::Polymer,
            InstanceType::NonPolymer,
            InstanceType::Branched,
            InstanceType::Water,
            InstanceType::Macrolide,
        ] {
            assert_eq!(InstanceType::from_str(&ty.to_string()), Ok(ty));
        }
    }

    #[test]
    fn only_other_polymer_type_is_ineligible() {
        assert!(PolymerType::Protein.is_target_eligible());
        assert!(PolymerType::Dna.is_target_eligible());
        assert!(PolymerType::Rna.is_target_eligible());
        assert!(PolymerType::NaHybrid.is_target_eligible());
        assert!(!PolymerType::Other.is_target_eligible());
        assert_eq!(PolymerType::from_str("NA-hybrid"), Ok(PolymerType::NaHybrid));
    }

    #[test]
    fn atom_site_new_derives_element_and_seq_id() {
        let site = AtomSite::new("1", "A", "LYS", "45", "NZ", Point3::new(1.0, 2.0, 3.0));
        assert_eq!(site.type_symbol, "N");
        assert_eq!(site.seq_id, Some(45));
        assert!(site.alt_id.is_none());
        assert!(!site.is_hydrogen());

        let h = AtomSite::new("1", "C", "ATP", "1", "H1", Point3::origin()).with_alt_id("B");
        assert!(h.is_hydrogen());
        assert_eq!(h.alt_id.as_deref(), Some("B"));
    }

    #[test]
    fn atom_record_copies_site_identity() {
        let site = AtomSite::new("2", "A", "GLY", "7", "CA", Point3::new(1.5, -2.0, 0.25))
            .with_seq_id(Some(6));
        let record = AtomRecord::from_site(&site, "1", InstanceType::Polymer);
        assert_eq!(record.entity_id, "1");
        assert_eq!(record.entity_type, InstanceType::Polymer);
        assert_eq!(record.seq_id, Some(6));
        assert_eq!(record.auth_seq_id, "7");
        assert_eq!(record.model_id, "2");
        assert_eq!(record.coords(), [1.5, -2.0, 0.25]);
    }
}
