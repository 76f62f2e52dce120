use super::cache::MemoCache;
use super::compute::EntryComputer;
use super::error::ComputeError;
use crate::core::models::entry::EntryData;
use crate::core::models::neighbor::EntryResult;
use std::sync::Arc;
use tracing::warn;

type NeighborKey = (String, u64);

/// Per-worker memoization of entry-level results.
///
/// A context is owned by exactly one worker and passed by `&mut` into each
/// call; nothing in it is shared between threads.
#[derive(Debug, Clone)]
pub struct NeighborContext {
    neighbor_info: MemoCache<NeighborKey, Arc<EntryResult>>,
    representative_model: MemoCache<String, Option<String>>,
}

impl NeighborContext {
    pub fn new(capacity: usize) -> Self {
        Self {
            neighbor_info: MemoCache::new("neighbor_info", capacity),
            representative_model: MemoCache::new("representative_model", capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.neighbor_info.capacity()
    }

    pub fn representative_model(&mut self, entry: &EntryData) -> Option<String> {
        self.representative_model
            .get_or_insert_with(entry.entry_id.to_ascii_uppercase(), || {
                entry.representative_model_id()
            })
            .clone()
    }

    /// Neighbor result of `entry` on its representative model, computed once
    /// per entry and cutoff. Failures are not cached.
    pub fn try_neighbor_info(
        &mut self,
        computer: &EntryComputer,
        entry: &EntryData,
    ) -> Result<Arc<EntryResult>, ComputeError> {
        let key = (
            entry.entry_id.to_ascii_uppercase(),
            computer.config().cutoff.to_bits(),
        );
        if let Some(hit) = self.neighbor_info.get(&key) {
            return Ok(Arc::clone(hit));
        }

        let model_id = self.representative_model(entry);
        let result = Arc::new(computer.try_compute(entry, model_id.as_deref())?);
        self.neighbor_info.insert(key, Arc::clone(&result));
        Ok(result)
    }

    /// Owned neighbor result of `entry`, for callers that consume each entry
    /// once. A memoized result is moved out of the cache; a fresh one is not
    /// retained.
    pub fn take_neighbor_info(
        &mut self,
        computer: &EntryComputer,
        entry: &EntryData,
    ) -> Result<EntryResult, ComputeError> {
        let key = (
            entry.entry_id.to_ascii_uppercase(),
            computer.config().cutoff.to_bits(),
        );
        if let Some(shared) = self.neighbor_info.remove(&key) {
            return Ok(Arc::try_unwrap(shared).unwrap_or_else(|shared| (*shared).clone()));
        }
        let model_id = self.representative_model(entry);
        computer.try_compute(entry, model_id.as_deref())
    }

    pub fn neighbor_info(&mut self, computer: &EntryComputer, entry: &EntryData) -> Arc<EntryResult> {
        self.try_neighbor_info(computer, entry).unwrap_or_else(|e| {
            warn!(entry_id = %entry.entry_id, error = %e, "Neighbor computation failed; using an empty result.");
            Arc::new(EntryResult::default())
        })
    }

    pub fn clear(&mut self) {
        self.neighbor_info.clear();
        self.representative_model.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::compute::fixtures::scenario_entry;
    use crate::engine::config::NeighborConfig;

    #[test]
    fn neighbor_info_is_memoized_per_entry() {
        let computer = EntryComputer::new(NeighborConfig::default());
        let mut context = NeighborContext::new(2);
        let entry = scenario_entry("9xyz");

        let first = context.neighbor_info(&computer, &entry);
        let second = context.neighbor_info(&computer, &entry);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.nearest_neighbors.len(), 2);
    }

    #[test]
    fn different_cutoffs_are_cached_separately() {
        let mut context = NeighborContext::new(4);
        let entry = scenario_entry("9XYZ");
        let wide = context.neighbor_info(&EntryComputer::new(NeighborConfig::default()), &entry);
        let narrow =
            context.neighbor_info(&EntryComputer::new(NeighborConfig::with_cutoff(2.06)), &entry);
        assert_eq!(wide.nearest_neighbors.len(), 2);
        assert_eq!(narrow.nearest_neighbors.len(), 1);
    }

    #[test]
    fn take_moves_results_out_of_the_memo() {
        let computer = EntryComputer::new(NeighborConfig::default());
        let mut context = NeighborContext::new(2);
        let entry = scenario_entry("9XYZ");

        let shared = context.neighbor_info(&computer, &entry);
        assert_eq!(Arc::strong_count(&shared), 2);
        let taken = context.take_neighbor_info(&computer, &entry).unwrap();
        assert_eq!(taken, *shared);
        assert_eq!(Arc::strong_count(&shared), 1);

        let fresh = context.take_neighbor_info(&computer, &entry).unwrap();
        assert_eq!(fresh, taken);
        let again = context.neighbor_info(&computer, &entry);
        assert!(!Arc::ptr_eq(&shared, &again));
    }

    #[test]
    fn capacity_bounds_memoized_entries() {
        let computer = EntryComputer::new(NeighborConfig::default());
        let mut context = NeighborContext::new(1);
        let a = scenario_entry("1AAA");
        let b = scenario_entry("2BBB");

        let first = context.neighbor_info(&computer, &a);
        context.neighbor_info(&computer, &b);
        let again = context.neighbor_info(&computer, &a);
        assert!(!Arc::ptr_eq(&first, &again));
        assert_eq!(*first, *again);
        assert_eq!(context.representative_model(&a).as_deref(), Some("1"));
        context.clear();
    }
}
