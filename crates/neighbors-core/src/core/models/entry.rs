use super::atom::{AtomSite, InstanceType, PolymerType};
use super::connection::BondedConnection;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// One model of an integrative/multi-state deposition and the size of the
/// assembly it represents (number of distinct instances).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrativeModel {
    pub model_id: String,
    pub assembly_size: usize,
    pub representative: bool,
}

/// Deposition metadata used to choose the representative model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelHints {
    /// Conformer ids explicitly designated as representative by an NMR
    /// ensemble description, in deposition order.
    pub nmr_representatives: Vec<String>,
    /// Model list of an integrative structure; empty for other methods.
    pub integrative_models: Vec<IntegrativeModel>,
}

/// All externally supplied data for one entry.
///
/// Parsing, instance typing and connectivity extraction happen upstream; this
/// struct is the hand-off point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryData {
    pub entry_id: String,
    pub atom_sites: Vec<AtomSite>,
    pub instance_types: HashMap<String, InstanceType>,
    pub polymer_types: HashMap<String, PolymerType>,
    pub instance_entities: HashMap<String, String>,
    pub connections: Vec<BondedConnection>,
    pub model_hints: ModelHints,
}

impl EntryData {
    pub fn new(entry_id: &str) -> Self {
        Self {
            entry_id: entry_id.to_string(),
            ..Default::default()
        }
    }

    /// Registers an instance with its entity and type.
    pub fn add_instance(
        &mut self,
        asym_id: &str,
        entity_id: &str,
        instance_type: InstanceType,
        polymer_type: Option<PolymerType>,
    ) {
        self.instance_types
            .insert(asym_id.to_string(), instance_type);
        self.instance_entities
            .insert(asym_id.to_string(), entity_id.to_string());
        if let Some(polymer_type) = polymer_type {
            self.polymer_types.insert(asym_id.to_string(), polymer_type);
        }
    }

    pub fn has_ligands(&self) -> bool {
        self.instance_types
            .values()
            .any(|ty| *ty == InstanceType::NonPolymer)
    }

    /// Distinct model ids in order of first appearance.
    pub fn model_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.atom_sites
            .iter()
            .filter(|site| seen.insert(site.model_id.as_str()))
            .map(|site| site.model_id.clone())
            .collect()
    }

    /// Chooses the representative model for this entry.
    ///
    /// Preference order: an NMR-designated conformer that exists in the
    /// coordinates; for integrative structures the largest assembly among the
    /// representative-flagged models (or all models if none is flagged);
    /// otherwise model "1" when present, else the first model.
    pub fn representative_model_id(&self) -> Option<String> {
        let model_ids = self.model_ids();
        if model_ids.is_empty() {
            return None;
        }

        if let Some(id) = self
            .model_hints
            .nmr_representatives
            .iter()
            .find(|id| model_ids.contains(id))
        {
            return Some(id.clone());
        }

        if let Some(id) = largest_integrative_model(&self.model_hints.integrative_models) {
            return Some(id);
        }

        debug!(entry_id = %self.entry_id, "Using the first model as the representative model.");
        if model_ids.iter().any(|id| id == "1") {
            Some("1".to_string())
        } else {
            model_ids.into_iter().next()
        }
    }
}

fn largest_integrative_model(models: &[IntegrativeModel]) -> Option<String> {
    let flagged: Vec<&IntegrativeModel> = models.iter().filter(|m| m.representative).collect();
    let mut candidates = if flagged.is_empty() {
        models.iter().collect()
    } else {
        flagged
    };
    candidates.sort_by_key(|m| (m.model_id.parse::<i64>().unwrap_or(i64::MAX), m.model_id.clone()));

    // First maximum wins, which after sorting is the lowest model id.
    let mut best: Option<&IntegrativeModel> = None;
    for model in candidates {
        if best.is_none_or(|b| model.assembly_size > b.assembly_size) {
            best = Some(model);
        }
    }
    best.map(|m| m.model_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn entry_with_models(models: &[&str]) -> EntryData {
        let mut entry = EntryData::new("1ABC");
        entry.add_instance("A", "1", InstanceType::Polymer, Some(PolymerType::Protein));
        for model in models {
            entry
                .atom_sites
                .push(AtomSite::new(model, "A", "ALA", "1", "CA", Point3::origin()));
            entry
                .atom_sites
                .push(AtomSite::new(model, "A", "ALA", "1", "CB", Point3::origin()));
        }
        entry
    }

    #[test]
    fn model_ids_are_distinct_and_ordered() {
        let entry = entry_with_models(&["3", "1", "2"]);
        assert_eq!(entry.model_ids(), vec!["3", "1", "2"]);
    }

    #[test]
    fn representative_defaults_to_model_one() {
        let entry = entry_with_models(&["3", "1", "2"]);
        assert_eq!(entry.representative_model_id().as_deref(), Some("1"));
    }

    #[test]
    fn representative_falls_back_to_first_model_without_model_one() {
        let entry = entry_with_models(&["5", "7"]);
        assert_eq!(entry.representative_model_id().as_deref(), Some("5"));
    }

    #[test]
    fn nmr_designated_conformer_wins_when_present() {
        let mut entry = entry_with_models(&["1", "2", "3"]);
        entry.model_hints.nmr_representatives = vec!["9".into(), "3".into()];
        assert_eq!(entry.representative_model_id().as_deref(), Some("3"));
    }

    #[test]
    fn integrative_structures_use_largest_assembly() {
        let mut entry = entry_with_models(&["1", "2", "3"]);
        entry.model_hints.integrative_models = vec![
            IntegrativeModel { model_id: "1".into(), assembly_size: 2, representative: false },
            IntegrativeModel { model_id: "2".into(), assembly_size: 5, representative: false },
            IntegrativeModel { model_id: "3".into(), assembly_size: 5, representative: false },
        ];
        assert_eq!(entry.representative_model_id().as_deref(), Some("2"));

        entry.model_hints.integrative_models[0].representative = true;
        assert_eq!(entry.representative_model_id().as_deref(), Some("1"));
    }

    #[test]
    fn no_coordinates_means_no_representative() {
        let entry = EntryData::new("0XXX");
        assert!(entry.representative_model_id().is_none());
        assert!(!entry.has_ligands());
    }
}
