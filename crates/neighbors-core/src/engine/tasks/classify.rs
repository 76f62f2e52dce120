use crate::core::models::atom::AtomRecord;
use crate::core::models::connection::{BondedConnection, ConnectType};
use std::collections::HashMap;
use tracing::trace;

/// Outcome of classifying one ligand-target contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub connect_type: ConnectType,
    /// Reported distance, already rounded to three decimals.
    pub distance: f64,
}

/// Deposited connections of one entry, grouped by ligand instance and atom.
///
/// Only connections whose partner can be a target are kept.
pub struct ConnectionIndex<'a> {
    by_ligand_atom: HashMap<&'a str, HashMap<&'a str, Vec<&'a BondedConnection>>>,
}

impl<'a> ConnectionIndex<'a> {
    pub fn new(connections: &'a [BondedConnection]) -> Self {
        let mut by_ligand_atom: HashMap<&str, HashMap<&str, Vec<&BondedConnection>>> =
            HashMap::new();
        for conn in connections.iter().filter(|c| c.has_target_partner()) {
            by_ligand_atom
                .entry(conn.ligand_asym_id.as_str())
                .or_default()
                .entry(conn.ligand_atom_id.as_str())
                .or_default()
                .push(conn);
        }
        Self { by_ligand_atom }
    }

    pub fn is_empty(&self) -> bool {
        self.by_ligand_atom.is_empty()
    }

    /// First deposited covalent or metal-coordination connection between
    /// exactly these two atoms. Connections of other instances of the same
    /// component never match.
    pub fn find(&self, ligand: &AtomRecord, target: &AtomRecord) -> Option<&'a BondedConnection> {
        self.by_ligand_atom
            .get(ligand.asym_id.as_str())?
            .get(ligand.atom_id.as_str())?
            .iter()
            .copied()
            .find(|conn| {
                conn.connect_type.overrides_geometry()
                    && conn.ligand_comp_id == ligand.comp_id
                    && partner_matches(conn, target)
            })
    }
}

fn partner_matches(conn: &BondedConnection, target: &AtomRecord) -> bool {
    conn.partner_entity_id == target.entity_id
        && conn.partner_comp_id == target.comp_id
        && conn.partner_asym_id == target.asym_id
        && conn.partner_seq_id == target.seq_id
        && conn.partner_auth_seq_id.as_deref() == Some(target.auth_seq_id.as_str())
        && conn.partner_atom_id == target.atom_id
}

/// Rounds to three decimals without crossing `cutoff`.
pub fn round_distance(distance: f64, cutoff: f64) -> f64 {
    let rounded = (distance * 1000.0).round() / 1000.0;
    if rounded > cutoff {
        (distance * 1000.0).floor() / 1000.0
    } else {
        rounded
    }
}

/// Classifies a contact found at `measured` distance.
///
/// A matching deposited connection sets the connect type and, when it records
/// a usable distance within `cutoff`, the reported distance. Otherwise the
/// contact is non-bonded at the measured distance.
pub fn classify(
    ligand: &AtomRecord,
    target: &AtomRecord,
    measured: f64,
    cutoff: f64,
    connections: &ConnectionIndex,
) -> Classification {
    match connections.find(ligand, target) {
        Some(conn) => {
            let distance = conn
                .bond_distance
                .filter(|d| d.is_finite() && *d >= 0.0 && *d <= cutoff)
                .unwrap_or(measured);
            Classification {
                connect_type: conn.connect_type,
                distance: round_distance(distance, cutoff),
            }
        }
        None => {
            trace!(
                ligand_atom = %ligand.atom_id,
                target_asym = %target.asym_id,
                target_atom = %target.atom_id,
                "No deposited connection; contact is non-bonded."
            );
            Classification {
                connect_type: ConnectType::NonBonded,
                distance: round_distance(measured, cutoff),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::{AtomSite, InstanceType};
    use nalgebra::Point3;

    fn ligand_atom() -> AtomRecord {
        let site = AtomSite::new("1", "C", "ATP", "1", "O2G", Point3::origin()).with_seq_id(None);
        AtomRecord::from_site(&site, "2", InstanceType::NonPolymer)
    }

    fn target_atom(seq: &str, atom: &str) -> AtomRecord {
        let site = AtomSite::new("1", "A", "ASP", seq, atom, Point3::origin());
        AtomRecord::from_site(&site, "1", InstanceType::Polymer)
    }

    fn connection(
        connect_type: ConnectType,
        seq: &str,
        atom: &str,
        bond_distance: Option<f64>,
    ) -> BondedConnection {
        BondedConnection {
            ligand_asym_id: "C".into(),
            ligand_comp_id: "ATP".into(),
            ligand_atom_id: "O2G".into(),
            ligand_alt_id: None,
            connect_type,
            partner_entity_type: InstanceType::Polymer,
            partner_entity_id: "1".into(),
            partner_comp_id: "ASP".into(),
            partner_asym_id: "A".into(),
            partner_seq_id: seq.parse().ok(),
            partner_auth_seq_id: Some(seq.into()),
            partner_atom_id: atom.into(),
            partner_alt_id: None,
            bond_distance,
            bond_order: None,
        }
    }

    #[test]
    fn unmatched_contact_is_non_bonded_at_measured_distance() {
        let connections = [connection(ConnectType::CovalentBond, "12", "OD1", Some(1.4))];
        let index = ConnectionIndex::new(&connections);
        let result = classify(&ligand_atom(), &target_atom("45", "OD1"), 2.1234, 5.0, &index);
        assert_eq!(result.connect_type, ConnectType::NonBonded);
        assert_eq!(result.distance, 2.123);
    }

    #[test]
    fn covalent_connection_overrides_type_and_distance() {
        let connections = [connection(ConnectType::CovalentBond, "12", "OD1", Some(1.4))];
        let index = ConnectionIndex::new(&connections);
        let result = classify(&ligand_atom(), &target_atom("12", "OD1"), 2.5, 5.0, &index);
        assert_eq!(result.connect_type, ConnectType::CovalentBond);
        assert_eq!(result.distance, 1.4);
    }

    #[test]
    fn only_covalent_and_metal_connections_override() {
        let connections = [
            connection(ConnectType::HydrogenBond, "12", "OD1", Some(2.9)),
            connection(ConnectType::MetalCoordination, "12", "OD1", Some(2.05)),
        ];
        let index = ConnectionIndex::new(&connections);
        let result = classify(&ligand_atom(), &target_atom("12", "OD1"), 2.0, 5.0, &index);
        assert_eq!(result.connect_type, ConnectType::MetalCoordination);
        assert_eq!(result.distance, 2.05);
    }

    #[test]
    fn first_matching_connection_wins() {
        let connections = [
            connection(ConnectType::MetalCoordination, "12", "OD1", Some(2.2)),
            connection(ConnectType::CovalentBond, "12", "OD1", Some(1.5)),
        ];
        let index = ConnectionIndex::new(&connections);
        let result = classify(&ligand_atom(), &target_atom("12", "OD1"), 2.0, 5.0, &index);
        assert_eq!(result.connect_type, ConnectType::MetalCoordination);
        assert_eq!(result.distance, 2.2);
    }

    #[test]
    fn missing_or_out_of_range_bond_distance_uses_measured() {
        let connections = [connection(ConnectType::CovalentBond, "12", "OD1", None)];
        let index = ConnectionIndex::new(&connections);
        let result = classify(&ligand_atom(), &target_atom("12", "OD1"), 1.61, 5.0, &index);
        assert_eq!(result.connect_type, ConnectType::CovalentBond);
        assert_eq!(result.distance, 1.61);

        let connections = [connection(ConnectType::CovalentBond, "12", "OD1", Some(7.5))];
        let index = ConnectionIndex::new(&connections);
        let result = classify(&ligand_atom(), &target_atom("12", "OD1"), 1.61, 5.0, &index);
        assert_eq!(result.connect_type, ConnectType::CovalentBond);
        assert_eq!(result.distance, 1.61);
    }

    #[test]
    fn partner_fields_must_all_match() {
        let mut conn = connection(ConnectType::CovalentBond, "12", "OD1", Some(1.4));
        conn.partner_entity_id = "9".into();
        let connections = [conn];
        let index = ConnectionIndex::new(&connections);
        let result = classify(&ligand_atom(), &target_atom("12", "OD1"), 2.5, 5.0, &index);
        assert_eq!(result.connect_type, ConnectType::NonBonded);

        let connections = [connection(ConnectType::CovalentBond, "12", "OD2", Some(1.4))];
        let index = ConnectionIndex::new(&connections);
        let result = classify(&ligand_atom(), &target_atom("12", "OD1"), 2.5, 5.0, &index);
        assert_eq!(result.connect_type, ConnectType::NonBonded);
    }

    #[test]
    fn connections_to_non_target_partners_are_ignored() {
        let mut conn = connection(ConnectType::MetalCoordination, "12", "OD1", Some(2.0));
        conn.partner_entity_type = InstanceType::Water;
        let connections = [conn];
        let index = ConnectionIndex::new(&connections);
        assert!(index.is_empty());
    }

    #[test]
    fn connections_are_scoped_to_their_ligand_instance() {
        let connections = [connection(ConnectType::CovalentBond, "12", "OD1", Some(1.4))];
        let index = ConnectionIndex::new(&connections);

        let site = AtomSite::new("1", "D", "ATP", "2", "O2G", Point3::origin()).with_seq_id(None);
        let other_instance = AtomRecord::from_site(&site, "2", InstanceType::NonPolymer);
        let result = classify(&other_instance, &target_atom("12", "OD1"), 3.5, 5.0, &index);
        assert_eq!(result.connect_type, ConnectType::NonBonded);
        assert_eq!(result.distance, 3.5);

        let result = classify(&ligand_atom(), &target_atom("12", "OD1"), 2.5, 5.0, &index);
        assert_eq!(result.connect_type, ConnectType::CovalentBond);
    }

    #[test]
    fn rounding_never_exceeds_cutoff() {
        assert_eq!(round_distance(2.0499, 5.0), 2.05);
        assert_eq!(round_distance(4.99961, 4.9996), 4.999);
    }
}
