use crate::core::io::artifact::ArtifactFormat;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CUTOFF_ANGSTROMS: f64 = 5.0;
pub const DEFAULT_K_SINGLE_ATOM: usize = 6;
pub const DEFAULT_K_MULTI_ATOM: usize = 3;
pub const DEFAULT_NUM_WORKERS: usize = 2;
pub const DEFAULT_CHUNK_SIZE: usize = 10;
pub const DEFAULT_MIN_ENTRIES: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("File I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Parameters of the per-entry contact search.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct NeighborConfig {
    /// Maximum ligand-target atom distance in Angstroms.
    pub cutoff: f64,
    /// Neighbors requested per atom for single-atom ligands (ions).
    pub k_single_atom: usize,
    /// Neighbors requested per atom for all other ligands.
    pub k_multi_atom: usize,
}

impl Default for NeighborConfig {
    fn default() -> Self {
        Self {
            cutoff: DEFAULT_CUTOFF_ANGSTROMS,
            k_single_atom: DEFAULT_K_SINGLE_ATOM,
            k_multi_atom: DEFAULT_K_MULTI_ATOM,
        }
    }
}

impl NeighborConfig {
    pub fn with_cutoff(cutoff: f64) -> Self {
        Self {
            cutoff,
            ..Self::default()
        }
    }

    #[inline]
    pub fn k_for(&self, ligand_atom_count: usize) -> usize {
        if ligand_atom_count == 1 {
            self.k_single_atom
        } else {
            self.k_multi_atom
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.cutoff.is_finite() || self.cutoff <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "cutoff",
                reason: format!("must be a positive finite distance, got {}", self.cutoff),
            });
        }
        if self.k_single_atom == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "k_single_atom",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.k_multi_atom == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "k_multi_atom",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct NeighborConfigBuilder {
    cutoff: Option<f64>,
    k_single_atom: Option<usize>,
    k_multi_atom: Option<usize>,
}

impl NeighborConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = Some(cutoff);
        self
    }
    pub fn k_single_atom(mut self, k: usize) -> Self {
        self.k_single_atom = Some(k);
        self
    }
    pub fn k_multi_atom(mut self, k: usize) -> Self {
        self.k_multi_atom = Some(k);
        self
    }

    pub fn build(self) -> Result<NeighborConfig, ConfigError> {
        let config = NeighborConfig {
            cutoff: self.cutoff.unwrap_or(DEFAULT_CUTOFF_ANGSTROMS),
            k_single_atom: self.k_single_atom.unwrap_or(DEFAULT_K_SINGLE_ATOM),
            k_multi_atom: self.k_multi_atom.unwrap_or(DEFAULT_K_MULTI_ATOM),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Parameters of corpus-wide generation and of the persisted artifact.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BatchConfig {
    pub num_workers: usize,
    pub chunk_size: usize,
    /// Only the first `file_limit` candidate entries are dispatched.
    pub file_limit: Option<usize>,
    /// Entries whose source reports a larger size hint are skipped.
    pub max_entry_size: Option<u64>,
    pub artifact_format: ArtifactFormat,
    /// Capacity of each worker's memo caches; defaults to `num_workers`.
    pub memo_capacity: Option<usize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            num_workers: DEFAULT_NUM_WORKERS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            file_limit: None,
            max_entry_size: None,
            artifact_format: ArtifactFormat::default(),
            memo_capacity: None,
        }
    }
}

impl BatchConfig {
    pub fn effective_memo_capacity(&self) -> usize {
        self.memo_capacity.unwrap_or(self.num_workers).max(1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "num_workers",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "chunk_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Secrets for a remote channel. Never printed.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub key_path: Option<PathBuf>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |present: bool| if present { "<redacted>" } else { "<none>" };
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &redact(self.password.is_some()))
            .field("key_path", &redact(self.key_path.is_some()))
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ChannelConfig {
    pub enabled: bool,
    pub base_path: PathBuf,
    /// Optional rotating namespace under the base path.
    pub prefix: Option<String>,
    pub credentials: Credentials,
}

impl ChannelConfig {
    pub fn at(base_path: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SyncConfig {
    /// Fast, overwrite-in-place channel.
    pub rotation: ChannelConfig,
    /// Durable channel keeping every backup as a new version.
    pub versioned: ChannelConfig,
    /// Entry count below which a fetched store is rejected.
    pub min_entries: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rotation: ChannelConfig::default(),
            versioned: ChannelConfig::default(),
            min_entries: DEFAULT_MIN_ENTRIES,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, channel) in [
            ("rotation.base_path", &self.rotation),
            ("versioned.base_path", &self.versioned),
        ] {
            if channel.enabled && channel.base_path.as_os_str().is_empty() {
                return Err(ConfigError::MissingParameter(name));
            }
        }
        Ok(())
    }
}

/// All settings of a neighbor cache deployment, as read from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Settings {
    pub neighbors: NeighborConfig,
    pub batch: BatchConfig,
    pub sync: SyncConfig,
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.neighbors.validate()?;
        self.batch.validate()?;
        self.sync.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_documented_constants() {
        let config = NeighborConfig::default();
        assert_eq!(config.cutoff, 5.0);
        assert_eq!(config.k_for(1), 6);
        assert_eq!(config.k_for(2), 3);
        assert_eq!(config.k_for(40), 3);

        let batch = BatchConfig::default();
        assert_eq!(batch.num_workers, 2);
        assert_eq!(batch.chunk_size, 10);
        assert_eq!(batch.effective_memo_capacity(), 2);
        assert_eq!(batch.artifact_format, ArtifactFormat::Binary);
        assert_eq!(SyncConfig::default().min_entries, 10);
    }

    #[test]
    fn builder_overrides_and_validates() {
        let config = NeighborConfigBuilder::new()
            .cutoff(4.0)
            .k_single_atom(8)
            .build()
            .unwrap();
        assert_eq!(config.cutoff, 4.0);
        assert_eq!(config.k_single_atom, 8);
        assert_eq!(config.k_multi_atom, 3);

        let err = NeighborConfigBuilder::new().cutoff(-1.0).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { name: "cutoff", .. }));
        let err = NeighborConfigBuilder::new().cutoff(f64::NAN).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { name: "cutoff", .. }));
        let err = NeighborConfigBuilder::new().k_multi_atom(0).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { name: "k_multi_atom", .. }));
    }

    #[test]
    fn settings_load_from_kebab_case_toml() {
        let toml = r#"
            [neighbors]
            cutoff = 4.5

            [batch]
            num-workers = 4
            chunk-size = 25
            artifact-format = "json"
            max-entry-size = 100000

            [sync]
            min-entries = 3

            [sync.rotation]
            enabled = true
            base-path = "/srv/rotation"
            prefix = "a"

            [sync.rotation.credentials]
            username = "curator"
            password = "hunter2"
        "#;
        let settings = Settings::from_toml_str(toml).unwrap();
        assert_eq!(settings.neighbors.cutoff, 4.5);
        assert_eq!(settings.neighbors.k_single_atom, 6);
        assert_eq!(settings.batch.num_workers, 4);
        assert_eq!(settings.batch.chunk_size, 25);
        assert_eq!(settings.batch.artifact_format, ArtifactFormat::Json);
        assert_eq!(settings.batch.max_entry_size, Some(100000));
        assert_eq!(settings.sync.min_entries, 3);
        assert!(settings.sync.rotation.enabled);
        assert_eq!(settings.sync.rotation.prefix.as_deref(), Some("a"));
        assert!(!settings.sync.versioned.enabled);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = Settings::from_toml_str("[batch]\nworkers = 3\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn enabled_channel_requires_base_path() {
        let result = Settings::from_toml_str("[sync.versioned]\nenabled = true\n");
        assert!(matches!(
            result,
            Err(ConfigError::MissingParameter("versioned.base_path"))
        ));
    }

    #[test]
    fn settings_file_errors_carry_the_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        match Settings::from_file(&path) {
            Err(ConfigError::Io { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected Io error, got {:?}", other),
        }

        let path = dir.path().join("settings.toml");
        fs::write(&path, "[neighbors]\nk-multi-atom = 4\n").unwrap();
        assert_eq!(Settings::from_file(&path).unwrap().neighbors.k_multi_atom, 4);
    }

    #[test]
    fn credentials_debug_redacts_secrets() {
        let credentials = Credentials {
            username: Some("curator".into()),
            password: Some("hunter2".into()),
            key_path: None,
        };
        let printed = format!("{:?}", credentials);
        assert!(printed.contains("curator"));
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("hunter2"));
    }
}
