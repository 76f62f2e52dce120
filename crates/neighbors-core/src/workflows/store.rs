use crate::core::io::artifact::{
    ArtifactError, ArtifactFormat, StoreSnapshot, read_snapshot_file, write_snapshot_file,
};
use crate::core::io::traits::{EntrySource, SourceError};
use crate::core::models::neighbor::{
    AltAtomCounts, EntryResult, InteractionIndex, LigandNeighborIndex, NeighborRecord,
    TargetNeighborIndex,
};
use crate::engine::compute::EntryComputer;
use crate::engine::config::{BatchConfig, NeighborConfig};
use crate::engine::context::NeighborContext;
use crate::engine::progress::{Progress, ProgressReporter};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Directory, under the cache root, that holds the store artifacts.
pub const STORE_DIR_NAME: &str = "ligand-target-neighbors";
/// File stem of the store artifact; the extension follows the format.
pub const ARTIFACT_STEM: &str = "neighbor-data";

const CREATED_FORMAT: &str = "%Y %m %d %H:%M:%S";

static EMPTY_RESULT: EntryResult = EntryResult::EMPTY;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Failed to list entries: {0}")]
    Source(#[from] SourceError),
}

/// An entry that could not be computed during a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFailure {
    pub entry_id: String,
    pub reason: String,
}

/// Outcome of one call to [`BatchCacheStore::generate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    /// Entries computed in this run.
    pub computed: Vec<String>,
    /// Stored entries kept without recomputation.
    pub reused: usize,
    /// Entries excluded before dispatch by the size limit.
    pub skipped: Vec<String>,
    pub failures: Vec<WorkerFailure>,
}

impl GenerationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.entry_id.as_str()).collect()
    }
}

/// Persistent map of entry id to [`EntryResult`] for a whole corpus.
///
/// Entry ids are stored upper-cased and every accessor normalizes its argument
/// the same way. The store is only mutated by [`BatchCacheStore::generate`],
/// [`BatchCacheStore::load`] and [`BatchCacheStore::replace_snapshot`].
#[derive(Debug, Clone)]
pub struct BatchCacheStore {
    cache_dir: PathBuf,
    config: BatchConfig,
    snapshot: StoreSnapshot,
}

impl BatchCacheStore {
    /// An empty store rooted at `cache_dir`. Nothing is read from disk.
    pub fn new(cache_dir: impl Into<PathBuf>, config: BatchConfig) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            config,
            snapshot: StoreSnapshot::default(),
        }
    }

    /// A store rooted at `cache_dir`, populated from its artifact if one is
    /// readable.
    pub fn open(cache_dir: impl Into<PathBuf>, config: BatchConfig) -> Self {
        let mut store = Self::new(cache_dir, config);
        store.load();
        store
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn store_dir(&self) -> PathBuf {
        self.cache_dir.join(STORE_DIR_NAME)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.artifact_path_for(self.config.artifact_format)
    }

    pub fn artifact_path_for(&self, format: ArtifactFormat) -> PathBuf {
        self.store_dir()
            .join(format!("{}.{}", ARTIFACT_STEM, format.extension()))
    }

    /// Replaces the in-memory content with the artifact on disk.
    ///
    /// A missing or unreadable artifact leaves the store empty. Returns whether
    /// an artifact was read.
    #[instrument(skip_all, name = "store_load")]
    pub fn load(&mut self) -> bool {
        let path = self.artifact_path();
        self.snapshot = StoreSnapshot::default();
        if !path.exists() {
            debug!(path = %path.display(), "No store artifact found; starting empty.");
            return false;
        }
        match read_snapshot_file(&path, self.config.artifact_format) {
            Ok(snapshot) => {
                self.replace_snapshot(snapshot);
                info!(
                    path = %path.display(),
                    entries = self.len(),
                    version = %self.snapshot.version,
                    "Loaded neighbor store."
                );
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Store artifact is unreadable; treating the store as empty.");
                false
            }
        }
    }

    pub fn reload(&mut self) -> bool {
        self.load()
    }

    /// Installs `snapshot` as the store content, normalizing entry ids.
    pub fn replace_snapshot(&mut self, snapshot: StoreSnapshot) {
        let StoreSnapshot {
            version,
            created,
            entries,
        } = snapshot;
        self.snapshot = StoreSnapshot {
            version,
            created,
            entries: entries
                .into_iter()
                .map(|(id, result)| (id.to_ascii_uppercase(), result))
                .collect(),
        };
    }

    pub fn snapshot(&self) -> &StoreSnapshot {
        &self.snapshot
    }

    /// Computes entries of `source` across the worker pool and merges them
    /// into the store.
    ///
    /// In incremental mode only entries absent from the store are computed and
    /// stored results are kept untouched; otherwise every entry is recomputed
    /// and the store is rebuilt from this run alone. A failing or panicking
    /// entry is reported in [`GenerationReport::failures`] and left out; the
    /// run itself still succeeds.
    ///
    /// # Errors
    ///
    /// Fails only if the entry list cannot be obtained or the worker pool
    /// cannot be started.
    #[instrument(skip_all, name = "store_generate", fields(incremental = incremental))]
    pub fn generate<S>(
        &mut self,
        source: &S,
        neighbors: &NeighborConfig,
        incremental: bool,
        reporter: &ProgressReporter,
    ) -> Result<GenerationReport, StoreError>
    where
        S: EntrySource + ?Sized,
    {
        reporter.report(Progress::PhaseStart {
            name: "Generation",
        });

        let mut seen = HashSet::new();
        let mut corpus: Vec<String> = source
            .entry_ids()?
            .into_iter()
            .map(|id| id.to_ascii_uppercase())
            .filter(|id| seen.insert(id.clone()))
            .collect();
        if let Some(limit) = self.config.file_limit {
            corpus.truncate(limit);
        }

        let mut report = GenerationReport::default();
        let pending: Vec<String> = if incremental {
            let (stored, missing): (Vec<String>, Vec<String>) = corpus
                .into_iter()
                .partition(|id| self.snapshot.entries.contains_key(id));
            report.reused = stored.len();
            missing
        } else {
            corpus
        };

        let pending: Vec<String> = match self.config.max_entry_size {
            Some(max) => pending
                .into_iter()
                .filter(|id| match source.size_hint(id) {
                    Some(size) if size > max => {
                        warn!(entry_id = %id, size, max, "Entry exceeds the size limit; skipping.");
                        report.skipped.push(id.clone());
                        false
                    }
                    _ => true,
                })
                .collect(),
            None => pending,
        };

        info!(
            pending = pending.len(),
            reused = report.reused,
            skipped = report.skipped.len(),
            workers = self.config.num_workers,
            "Dispatching neighbor computation."
        );

        let outcomes = self.run_workers(source, neighbors, &pending, reporter)?;

        let mut computed: HashMap<String, EntryResult> = HashMap::with_capacity(outcomes.len());
        for (entry_id, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    report.computed.push(entry_id.clone());
                    computed.insert(entry_id, result);
                }
                Err(reason) => report.failures.push(WorkerFailure { entry_id, reason }),
            }
        }

        if incremental {
            self.snapshot.entries.extend(computed);
        } else {
            self.snapshot.entries = computed;
        }
        self.snapshot.version = env!("CARGO_PKG_VERSION").to_string();
        self.snapshot.created = chrono::Local::now().format(CREATED_FORMAT).to_string();

        if report.is_complete() {
            info!(
                computed = report.computed.len(),
                total = self.len(),
                "Neighbor store generation complete."
            );
        } else {
            warn!(
                computed = report.computed.len(),
                failed = report.failures.len(),
                total = self.len(),
                "Neighbor store generation finished with failures."
            );
        }
        reporter.report(Progress::PhaseFinish);
        Ok(report)
    }

    fn run_workers<S>(
        &self,
        source: &S,
        neighbors: &NeighborConfig,
        pending: &[String],
        reporter: &ProgressReporter,
    ) -> Result<Vec<(String, Result<EntryResult, String>)>, StoreError>
    where
        S: EntrySource + ?Sized,
    {
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_workers.max(1))
            .build()?;
        let computer = EntryComputer::new(*neighbors);
        let capacity = self.config.effective_memo_capacity();
        let chunk_size = self.config.chunk_size.max(1);

        reporter.report(Progress::TaskStart {
            total_steps: pending.len() as u64,
        });
        let outcomes = pool.install(|| {
            pending
                .par_chunks(chunk_size)
                .flat_map_iter(|chunk| {
                    let mut context = NeighborContext::new(capacity);
                    chunk
                        .iter()
                        .map(|entry_id| {
                            let outcome = compute_isolated(source, &computer, &mut context, entry_id);
                            match &outcome {
                                Ok(_) => reporter.report(Progress::EntryComputed {
                                    entry_id: entry_id.clone(),
                                }),
                                Err(reason) => {
                                    warn!(entry_id = %entry_id, reason = %reason, "Entry failed; excluding it from the store.");
                                    reporter.report(Progress::EntryFailed {
                                        entry_id: entry_id.clone(),
                                        reason: reason.clone(),
                                    });
                                }
                            }
                            reporter.report(Progress::TaskIncrement);
                            (entry_id.clone(), outcome)
                        })
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>()
        });
        reporter.report(Progress::TaskFinish);
        Ok(outcomes)
    }

    /// Writes the store to its artifact, replacing any previous file in one
    /// step. Returns the artifact path.
    #[instrument(skip_all, name = "store_persist")]
    pub fn persist(&self) -> Result<PathBuf, StoreError> {
        let path = self.artifact_path();
        write_snapshot_file(&path, &self.snapshot, self.config.artifact_format)?;
        info!(path = %path.display(), entries = self.len(), "Persisted neighbor store.");
        Ok(path)
    }

    /// Re-encodes the artifact stored in `from` format into `to` format.
    pub fn convert(&self, from: ArtifactFormat, to: ArtifactFormat) -> Result<PathBuf, StoreError> {
        let source_path = self.artifact_path_for(from);
        let target_path = self.artifact_path_for(to);
        let snapshot = read_snapshot_file(&source_path, from)?;
        write_snapshot_file(&target_path, &snapshot, to)?;
        info!(
            from = %source_path.display(),
            to = %target_path.display(),
            entries = snapshot.entries.len(),
            "Converted store artifact."
        );
        Ok(target_path)
    }

    fn entry(&self, entry_id: &str) -> &EntryResult {
        self.snapshot
            .entries
            .get(&entry_id.to_ascii_uppercase())
            .unwrap_or(&EMPTY_RESULT)
    }

    pub fn get_nearest_neighbor_list(&self, entry_id: &str) -> &[NeighborRecord] {
        &self.entry(entry_id).nearest_neighbors
    }

    pub fn get_ligand_neighbor_index(&self, entry_id: &str) -> &LigandNeighborIndex {
        &self.entry(entry_id).ligand_neighbor_index
    }

    pub fn get_target_neighbor_index(&self, entry_id: &str) -> &TargetNeighborIndex {
        &self.entry(entry_id).target_neighbor_index
    }

    pub fn get_interaction_index(&self, entry_id: &str) -> &InteractionIndex {
        &self.entry(entry_id).interaction_index
    }

    pub fn get_atom_counts(&self, entry_id: &str) -> &AltAtomCounts {
        &self.entry(entry_id).ligand_atom_count
    }

    pub fn get_hydrogen_atom_counts(&self, entry_id: &str) -> &AltAtomCounts {
        &self.entry(entry_id).ligand_hydrogen_atom_count
    }

    pub fn get_ligand_neighbor_bound_state(&self, entry_id: &str) -> &BTreeMap<String, bool> {
        &self.entry(entry_id).ligand_is_bound
    }

    pub fn get_entry_result(&self, entry_id: &str) -> Option<&EntryResult> {
        self.snapshot.entries.get(&entry_id.to_ascii_uppercase())
    }

    pub fn has_entry(&self, entry_id: &str) -> bool {
        self.snapshot
            .entries
            .contains_key(&entry_id.to_ascii_uppercase())
    }

    /// Stored entry ids in sorted order.
    pub fn get_entries(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.snapshot.entries.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.snapshot.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.entries.is_empty()
    }

    /// Whether the store holds at least `min_count` entries.
    pub fn test_cache(&self, min_count: usize) -> bool {
        let ok = self.len() >= min_count;
        if !ok {
            warn!(entries = self.len(), min_count, "Neighbor store is below the expected size.");
        }
        ok
    }

    pub fn version(&self) -> &str {
        &self.snapshot.version
    }

    pub fn created(&self) -> &str {
        &self.snapshot.created
    }
}

/// Loads and computes one entry, turning errors and panics into a reason.
fn compute_isolated<S>(
    source: &S,
    computer: &EntryComputer,
    context: &mut NeighborContext,
    entry_id: &str,
) -> Result<EntryResult, String>
where
    S: EntrySource + ?Sized,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let entry = source.load_entry(entry_id).map_err(|e| e.to_string())?;
        context
            .take_neighbor_info(computer, &entry)
            .map_err(|e| e.to_string())
    }));
    match outcome {
        Ok(result) => result,
        Err(payload) => {
            *context = NeighborContext::new(context.capacity());
            Err(panic_message(payload.as_ref()))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
