use super::atom::InstanceType;
use phf::phf_map;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of contact between a ligand atom and a target atom.
///
/// Deposited connectivity uses the bonded variants; a purely geometric
/// contact is [`ConnectType::NonBonded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConnectType {
    #[serde(rename = "covalent bond")]
    CovalentBond,
    #[serde(rename = "metal coordination")]
    MetalCoordination,
    #[serde(rename = "disulfide bridge")]
    DisulfideBridge,
    #[serde(rename = "hydrogen bond")]
    HydrogenBond,
    #[serde(rename = "mismatched base pairs")]
    MismatchedBasePair,
    #[serde(rename = "ionic interaction")]
    IonicInteraction,
    #[serde(rename = "covalent residue modification")]
    CovalentModification,
    #[serde(rename = "non-bonded")]
    NonBonded,
}

static CONNECT_TYPE_NAMES: phf::Map<&'static str, ConnectType> = phf_map! {
    "covale" => ConnectType::CovalentBond,
    "covale_base" => ConnectType::CovalentBond,
    "covale_phosphate" => ConnectType::CovalentBond,
    "covale_sugar" => ConnectType::CovalentBond,
    "covalent bond" => ConnectType::CovalentBond,
    "metalc" => ConnectType::MetalCoordination,
    "metal coordination" => ConnectType::MetalCoordination,
    "disulf" => ConnectType::DisulfideBridge,
    "disulfide bridge" => ConnectType::DisulfideBridge,
    "hydrog" => ConnectType::HydrogenBond,
    "hydrogen bond" => ConnectType::HydrogenBond,
    "mismat" => ConnectType::MismatchedBasePair,
    "mismatched base pairs" => ConnectType::MismatchedBasePair,
    "saltbr" => ConnectType::IonicInteraction,
    "ionic interaction" => ConnectType::IonicInteraction,
    "modres" => ConnectType::CovalentModification,
    "covalent residue modification" => ConnectType::CovalentModification,
    "non-bonded" => ConnectType::NonBonded,
};

impl ConnectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectType::CovalentBond => "covalent bond",
            ConnectType::MetalCoordination => "metal coordination",
            ConnectType::DisulfideBridge => "disulfide bridge",
            ConnectType::HydrogenBond => "hydrogen bond",
            ConnectType::MismatchedBasePair => "mismatched base pairs",
            ConnectType::IonicInteraction => "ionic interaction",
            ConnectType::CovalentModification => "covalent residue modification",
            ConnectType::NonBonded => "non-bonded",
        }
    }

    /// Connection kinds allowed to override a geometric classification.
    pub fn overrides_geometry(&self) -> bool {
        matches!(
            self,
            ConnectType::CovalentBond | ConnectType::MetalCoordination
        )
    }

    pub fn is_bonded(&self) -> bool {
        !matches!(self, ConnectType::NonBonded)
    }
}

impl fmt::Display for ConnectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectType {
    type Err = ();

    /// Accepts both the short deposition codes (`covale`, `metalc`, ...) and
    /// the descriptive names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CONNECT_TYPE_NAMES
            .get(s.trim().to_ascii_lowercase().as_str())
            .copied()
            .ok_or(())
    }
}

/// Authoritative deposited connectivity between one ligand atom and a partner
/// atom of another instance.
///
/// The ligand side is what the deposition calls the connection "target"; the
/// partner side is the polymer/branched atom it is connected to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondedConnection {
    pub ligand_asym_id: String,
    pub ligand_comp_id: String,
    pub ligand_atom_id: String,
    pub ligand_alt_id: Option<String>,
    pub connect_type: ConnectType,
    pub partner_entity_type: InstanceType,
    pub partner_entity_id: String,
    pub partner_comp_id: String,
    pub partner_asym_id: String,
    pub partner_seq_id: Option<i32>,
    pub partner_auth_seq_id: Option<String>,
    pub partner_atom_id: String,
    pub partner_alt_id: Option<String>,
    /// Deposited bond distance in Angstroms.
    pub bond_distance: Option<f64>,
    pub bond_order: Option<String>,
}

impl BondedConnection {
    /// Whether the partner side can be an interaction target at all.
    pub fn has_target_partner(&self) -> bool {
        !matches!(
            self.partner_entity_type,
            InstanceType::NonPolymer | InstanceType::Water
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_type_parses_codes_and_names() {
        assert_eq!(ConnectType::from_str("covale"), Ok(ConnectType::CovalentBond));
        assert_eq!(ConnectType::from_str("METALC"), Ok(ConnectType::MetalCoordination));
        assert_eq!(
            ConnectType::from_str("metal coordination"),
            Ok(ConnectType::MetalCoordination)
        );
        assert_eq!(ConnectType::from_str("hydrog"), Ok(ConnectType::HydrogenBond));
        assert_eq!(ConnectType::from_str("non-bonded"), Ok(ConnectType::NonBonded));
        assert_eq!(ConnectType::from_str("vdw"), Err(()));
    }

    #[test]
    fn only_covalent_and_metal_override_geometry() {
        assert!(ConnectType::CovalentBond.overrides_geometry());
        assert!(ConnectType::MetalCoordination.overrides_geometry());
        assert!(!ConnectType::HydrogenBond.overrides_geometry());
        assert!(!ConnectType::DisulfideBridge.overrides_geometry());
        assert!(!ConnectType::NonBonded.overrides_geometry());
        assert!(!ConnectType::NonBonded.is_bonded());
        assert!(ConnectType::HydrogenBond.is_bonded());
    }

    #[test]
    fn serde_uses_descriptive_names() {
        let json = serde_json::to_string(&ConnectType::MetalCoordination).unwrap();
        assert_eq!(json, "\"metal coordination\"");
        let parsed: ConnectType = serde_json::from_str("\"non-bonded\"").unwrap();
        assert_eq!(parsed, ConnectType::NonBonded);
    }
}
