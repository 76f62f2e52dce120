use super::store::{BatchCacheStore, StoreError};
use super::sync::{ArtifactSyncManager, Channel};
use crate::core::io::artifact::ArtifactFormat;
use crate::core::io::traits::EntrySource;
use crate::engine::config::{ConfigError, Settings};
use crate::engine::progress::{Progress, ProgressReporter};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    Update,
    Backup,
    Restore,
    Convert,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [
        OperationKind::Update,
        OperationKind::Backup,
        OperationKind::Restore,
        OperationKind::Convert,
    ];
}

impl FromStr for OperationKind {
    type Err = WorkflowError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "update" => Ok(OperationKind::Update),
            "backup" => Ok(OperationKind::Backup),
            "restore" => Ok(OperationKind::Restore),
            "convert" => Ok(OperationKind::Convert),
            _ => Err(WorkflowError::UnknownOperation(s.to_string())),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                OperationKind::Update => "update",
                OperationKind::Backup => "backup",
                OperationKind::Restore => "restore",
                OperationKind::Convert => "convert",
            }
        )
    }
}

/// Everything an operation may act on: the settings, the store, its sync
/// manager and, for updates, the corpus.
pub struct WorkflowContext<'a> {
    pub settings: Settings,
    pub store: BatchCacheStore,
    pub sync: ArtifactSyncManager,
    pub source: Option<&'a dyn EntrySource>,
    pub reporter: ProgressReporter<'a>,
}

impl<'a> WorkflowContext<'a> {
    /// Opens the store under `cache_dir` using `settings`.
    pub fn open(cache_dir: impl Into<PathBuf>, settings: Settings) -> Result<Self, WorkflowError> {
        settings.validate()?;
        let store = BatchCacheStore::open(cache_dir, settings.batch.clone());
        let sync = ArtifactSyncManager::new(settings.sync.clone());
        Ok(Self {
            settings,
            store,
            sync,
            source: None,
            reporter: ProgressReporter::new(),
        })
    }

    pub fn with_source(mut self, source: &'a dyn EntrySource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_sync(mut self, sync: ArtifactSyncManager) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_reporter(mut self, reporter: ProgressReporter<'a>) -> Self {
        self.reporter = reporter;
        self
    }
}

/// A named maintenance step over the neighbor store.
///
/// `apply` returns `Ok(false)` for soft failures such as an unreachable remote
/// and `Err` only for failures the caller has to handle.
pub trait Operation {
    fn kind(&self) -> OperationKind;

    fn apply(&self, context: &mut WorkflowContext<'_>) -> Result<bool, WorkflowError>;
}

/// Regenerates the store from the context's source and persists it.
#[derive(Debug, Clone, Copy)]
pub struct UpdateOperation {
    pub incremental: bool,
}

impl Operation for UpdateOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Update
    }

    fn apply(&self, context: &mut WorkflowContext<'_>) -> Result<bool, WorkflowError> {
        let source = context
            .source
            .ok_or(ConfigError::MissingParameter("source"))?;
        let report = context.store.generate(
            source,
            &context.settings.neighbors,
            self.incremental,
            &context.reporter,
        )?;
        context.store.persist()?;
        Ok(report.is_complete())
    }
}

#[derive(Debug, Clone)]
pub struct BackupOperation {
    pub channels: Vec<Channel>,
}

impl Operation for BackupOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Backup
    }

    fn apply(&self, context: &mut WorkflowContext<'_>) -> Result<bool, WorkflowError> {
        Ok(context.sync.backup(&context.store, &self.channels))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RestoreOperation;

impl Operation for RestoreOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Restore
    }

    fn apply(&self, context: &mut WorkflowContext<'_>) -> Result<bool, WorkflowError> {
        Ok(context.sync.restore(&mut context.store))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConvertOperation {
    pub from: ArtifactFormat,
    pub to: ArtifactFormat,
}

impl Operation for ConvertOperation {
    fn kind(&self) -> OperationKind {
        OperationKind::Convert
    }

    fn apply(&self, context: &mut WorkflowContext<'_>) -> Result<bool, WorkflowError> {
        context.store.convert(self.from, self.to)?;
        Ok(true)
    }
}

/// Maps each [`OperationKind`] to the operation that performs it.
#[derive(Default)]
pub struct OperationRegistry {
    operations: HashMap<OperationKind, Box<dyn Operation>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Incremental update, backup to both channels, restore, and conversion
    /// from the text form to the binary form.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(UpdateOperation { incremental: true }));
        registry.register(Box::new(BackupOperation {
            channels: Channel::ALL.to_vec(),
        }));
        registry.register(Box::new(RestoreOperation));
        registry.register(Box::new(ConvertOperation {
            from: ArtifactFormat::Json,
            to: ArtifactFormat::Binary,
        }));
        registry
    }

    /// Registers `operation` under its kind, replacing any previous one.
    pub fn register(&mut self, operation: Box<dyn Operation>) {
        self.operations.insert(operation.kind(), operation);
    }

    pub fn contains(&self, kind: OperationKind) -> bool {
        self.operations.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<OperationKind> {
        let mut kinds: Vec<_> = self.operations.keys().copied().collect();
        kinds.sort();
        kinds
    }

    #[instrument(skip_all, name = "operation", fields(kind = %kind))]
    pub fn run(
        &self,
        kind: OperationKind,
        context: &mut WorkflowContext<'_>,
    ) -> Result<bool, WorkflowError> {
        let operation = self
            .operations
            .get(&kind)
            .ok_or_else(|| WorkflowError::UnknownOperation(kind.to_string()))?;
        context.reporter.report(Progress::Message(format!("Running {}", kind)));
        let ok = operation.apply(context)?;
        info!(ok, "Operation finished.");
        Ok(ok)
    }

    pub fn run_named(&self, name: &str, context: &mut WorkflowContext<'_>) -> Result<bool, WorkflowError> {
        self.run(name.parse()?, context)
    }
}
