use super::store::{ARTIFACT_STEM, BatchCacheStore, STORE_DIR_NAME};
use crate::core::io::artifact::{ArtifactFormat, StoreSnapshot, read_snapshot_file};
use crate::engine::config::{ChannelConfig, SyncConfig};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

/// File name of a bundle on a rotation remote.
pub const BUNDLE_FILE_NAME: &str = "neighbor-data.tar.zst";
/// Pointer file naming the newest version on a versioned remote.
pub const LATEST_FILE_NAME: &str = "LATEST";

const VERSIONS_DIR_NAME: &str = "versions";
const VERSION_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";
const BUNDLE_COMPRESSION_LEVEL: i32 = 3;

/// One of the two independent remote channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Fast channel overwritten in place on every backup.
    Rotation,
    /// Durable channel keeping every backup as a new version.
    Versioned,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Rotation, Channel::Versioned];
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Rotation => write!(f, "rotation"),
            Channel::Versioned => write!(f, "versioned"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("The {0} channel is disabled")]
    ChannelDisabled(Channel),
    #[error("Transport failure at '{location}': {message}")]
    Transport { location: PathBuf, message: String },
    #[error("Failed to pack or unpack the store bundle: {0}")]
    Bundle(#[source] io::Error),
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Fetched store is invalid: {0}")]
    Invalid(String),
}

fn io_error(path: &Path) -> impl Fn(io::Error) -> SyncError + '_ {
    move |source| SyncError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Storage backend for store bundles.
///
/// A location is addressed by the channel's base path, its optional rotating
/// prefix and its credentials. Implementations for network transports live
/// with their callers.
pub trait RemoteStore: Send + Sync {
    fn store_bundle(&self, channel: &ChannelConfig, bundle: &[u8]) -> Result<(), SyncError>;

    fn fetch_bundle(&self, channel: &ChannelConfig) -> Result<Vec<u8>, SyncError>;
}

fn location(channel: &ChannelConfig) -> PathBuf {
    match channel.prefix.as_deref() {
        Some(prefix) if !prefix.is_empty() => channel.base_path.join(prefix),
        _ => channel.base_path.clone(),
    }
}

/// Writes `bytes` next to `path` and renames it into place.
fn write_replacing(path: &Path, bytes: &[u8]) -> Result<(), SyncError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".partial");
    let tmp_path = PathBuf::from(tmp_name);
    fs::write(&tmp_path, bytes).map_err(io_error(&tmp_path))?;
    fs::rename(&tmp_path, path).map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        SyncError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Filesystem remote holding a single bundle that each backup overwrites.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryRemote;

impl DirectoryRemote {
    pub fn bundle_path(channel: &ChannelConfig) -> PathBuf {
        location(channel).join(BUNDLE_FILE_NAME)
    }
}

impl RemoteStore for DirectoryRemote {
    fn store_bundle(&self, channel: &ChannelConfig, bundle: &[u8]) -> Result<(), SyncError> {
        let dir = location(channel);
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;
        write_replacing(&Self::bundle_path(channel), bundle)
    }

    fn fetch_bundle(&self, channel: &ChannelConfig) -> Result<Vec<u8>, SyncError> {
        let path = Self::bundle_path(channel);
        if !path.is_file() {
            return Err(SyncError::Transport {
                location: location(channel),
                message: "no bundle stored".to_string(),
            });
        }
        fs::read(&path).map_err(io_error(&path))
    }
}

/// Filesystem remote keeping every backup under `versions/` and naming the
/// newest one in a `LATEST` pointer file.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionedDirectoryRemote;

impl VersionedDirectoryRemote {
    /// Version names on the remote, oldest first.
    pub fn versions(channel: &ChannelConfig) -> Result<Vec<String>, SyncError> {
        let dir = location(channel).join(VERSIONS_DIR_NAME);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for item in fs::read_dir(&dir).map_err(io_error(&dir))? {
            let item = item.map_err(io_error(&dir))?;
            if let Some(name) = item.file_name().to_str().and_then(|n| n.strip_suffix(".tar.zst")) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn new_version_name(versions_dir: &Path) -> String {
        let stamp = chrono::Utc::now().format(VERSION_FORMAT).to_string();
        let mut name = stamp.clone();
        let mut n = 1;
        while versions_dir.join(format!("{}.tar.zst", name)).exists() {
            name = format!("{}-{}", stamp, n);
            n += 1;
        }
        name
    }
}

impl RemoteStore for VersionedDirectoryRemote {
    fn store_bundle(&self, channel: &ChannelConfig, bundle: &[u8]) -> Result<(), SyncError> {
        let root = location(channel);
        let versions_dir = root.join(VERSIONS_DIR_NAME);
        fs::create_dir_all(&versions_dir).map_err(io_error(&versions_dir))?;

        let version = Self::new_version_name(&versions_dir);
        write_replacing(&versions_dir.join(format!("{}.tar.zst", version)), bundle)?;
        write_replacing(&root.join(LATEST_FILE_NAME), version.as_bytes())?;
        debug!(version = %version, "Recorded new bundle version.");
        Ok(())
    }

    fn fetch_bundle(&self, channel: &ChannelConfig) -> Result<Vec<u8>, SyncError> {
        let root = location(channel);
        let pointer = root.join(LATEST_FILE_NAME);
        if !pointer.is_file() {
            return Err(SyncError::Transport {
                location: root,
                message: "no version recorded".to_string(),
            });
        }
        let version = fs::read_to_string(&pointer).map_err(io_error(&pointer))?;
        let version = version.trim();
        if version.is_empty() || version.contains(['/', '\\']) {
            return Err(SyncError::Transport {
                location: root,
                message: format!("malformed version pointer '{}'", version),
            });
        }
        let path = root
            .join(VERSIONS_DIR_NAME)
            .join(format!("{}.tar.zst", version));
        fs::read(&path).map_err(io_error(&path))
    }
}

/// Packs `store_dir` as a zstd-compressed tar archive rooted at
/// [`STORE_DIR_NAME`].
pub fn pack_bundle(store_dir: &Path) -> Result<Vec<u8>, SyncError> {
    let encoder = zstd::stream::write::Encoder::new(Vec::new(), BUNDLE_COMPRESSION_LEVEL)
        .map_err(SyncError::Bundle)?;
    let mut builder = tar::Builder::new(encoder);
    builder
        .append_dir_all(STORE_DIR_NAME, store_dir)
        .map_err(SyncError::Bundle)?;
    let encoder = builder.into_inner().map_err(SyncError::Bundle)?;
    encoder.finish().map_err(SyncError::Bundle)
}

/// Unpacks a bundle produced by [`pack_bundle`] into `destination`.
pub fn unpack_bundle(bundle: &[u8], destination: &Path) -> Result<(), SyncError> {
    let decoder = zstd::stream::read::Decoder::new(bundle).map_err(SyncError::Bundle)?;
    let mut archive = tar::Archive::new(decoder);
    archive.unpack(destination).map_err(SyncError::Bundle)
}

/// Backs up and restores a [`BatchCacheStore`] over the rotation and
/// versioned channels.
///
/// Public operations report success as a boolean and never return errors;
/// per-channel failures are logged.
pub struct ArtifactSyncManager {
    config: SyncConfig,
    rotation: Arc<dyn RemoteStore>,
    versioned: Arc<dyn RemoteStore>,
}

impl fmt::Debug for ArtifactSyncManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactSyncManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ArtifactSyncManager {
    /// A manager using the filesystem transports for both channels.
    pub fn new(config: SyncConfig) -> Self {
        Self::with_remotes(
            config,
            Arc::new(DirectoryRemote),
            Arc::new(VersionedDirectoryRemote),
        )
    }

    pub fn with_remotes(
        config: SyncConfig,
        rotation: Arc<dyn RemoteStore>,
        versioned: Arc<dyn RemoteStore>,
    ) -> Self {
        Self {
            config,
            rotation,
            versioned,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn channel(&self, channel: Channel) -> (&ChannelConfig, &dyn RemoteStore) {
        match channel {
            Channel::Rotation => (&self.config.rotation, self.rotation.as_ref()),
            Channel::Versioned => (&self.config.versioned, self.versioned.as_ref()),
        }
    }

    /// Uploads the store's on-disk artifact directory to each of `channels`.
    ///
    /// Channels are attempted independently. Returns `true` only if every
    /// requested channel succeeded.
    #[instrument(skip_all, name = "sync_backup")]
    pub fn backup(&self, store: &BatchCacheStore, channels: &[Channel]) -> bool {
        if channels.is_empty() {
            warn!("No channel selected for backup.");
            return false;
        }
        let bundle = match self.bundle_store(store) {
            Ok(bundle) => bundle,
            Err(e) => {
                error!(error = %e, "Could not bundle the neighbor store for backup.");
                return false;
            }
        };

        let mut all_ok = true;
        for &channel in channels {
            match self.backup_to(channel, &bundle) {
                Ok(()) => info!(channel = %channel, bytes = bundle.len(), "Backed up neighbor store."),
                Err(e) => {
                    warn!(channel = %channel, error = %e, "Backup failed on channel.");
                    all_ok = false;
                }
            }
        }
        all_ok
    }

    fn bundle_store(&self, store: &BatchCacheStore) -> Result<Vec<u8>, SyncError> {
        let artifact = store.artifact_path();
        if !artifact.is_file() {
            return Err(SyncError::Invalid(format!(
                "no persisted artifact at '{}'",
                artifact.display()
            )));
        }
        pack_bundle(&store.store_dir())
    }

    fn backup_to(&self, channel: Channel, bundle: &[u8]) -> Result<(), SyncError> {
        let (config, remote) = self.channel(channel);
        if !config.enabled {
            return Err(SyncError::ChannelDisabled(channel));
        }
        remote.store_bundle(config, bundle)
    }

    /// Replaces the store with the newest remote copy.
    ///
    /// The rotation channel is tried first, then the versioned channel. A
    /// fetched store is installed only if it holds at least
    /// `min_entries` entries; otherwise the local store is left as it was.
    #[instrument(skip_all, name = "sync_restore")]
    pub fn restore(&self, store: &mut BatchCacheStore) -> bool {
        for channel in Channel::ALL {
            match self.restore_from(channel, store) {
                Ok(entries) => {
                    info!(channel = %channel, entries, "Restored neighbor store.");
                    return true;
                }
                Err(SyncError::ChannelDisabled(_)) => {
                    debug!(channel = %channel, "Channel disabled; skipping.");
                }
                Err(e) => {
                    warn!(channel = %channel, error = %e, "Restore failed on channel.");
                }
            }
        }
        error!("Neighbor store could not be restored from any channel.");
        false
    }

    fn restore_from(&self, channel: Channel, store: &mut BatchCacheStore) -> Result<usize, SyncError> {
        let (config, remote) = self.channel(channel);
        if !config.enabled {
            return Err(SyncError::ChannelDisabled(channel));
        }
        let bundle = remote.fetch_bundle(config)?;

        let staging = store
            .cache_dir()
            .join(format!(".{}.staging", STORE_DIR_NAME));
        let outcome = self.stage_and_install(&bundle, &staging, store);
        if staging.exists() {
            let _ = fs::remove_dir_all(&staging);
        }
        outcome
    }

    fn stage_and_install(
        &self,
        bundle: &[u8],
        staging: &Path,
        store: &mut BatchCacheStore,
    ) -> Result<usize, SyncError> {
        if staging.exists() {
            fs::remove_dir_all(staging).map_err(io_error(staging))?;
        }
        fs::create_dir_all(staging).map_err(io_error(staging))?;
        unpack_bundle(bundle, staging)?;

        let staged_dir = staging.join(STORE_DIR_NAME);
        let snapshot = self.validate_staged(&staged_dir, store.config().artifact_format)?;
        install_dir(&staged_dir, &store.store_dir())?;

        let entries = snapshot.entries.len();
        store.replace_snapshot(snapshot);
        Ok(entries)
    }

    fn validate_staged(
        &self,
        staged_dir: &Path,
        format: ArtifactFormat,
    ) -> Result<StoreSnapshot, SyncError> {
        let artifact = staged_dir.join(format!("{}.{}", ARTIFACT_STEM, format.extension()));
        if !artifact.is_file() {
            return Err(SyncError::Invalid(format!(
                "bundle has no {} artifact",
                format.extension()
            )));
        }
        let snapshot = read_snapshot_file(&artifact, format)
            .map_err(|e| SyncError::Invalid(e.to_string()))?;
        if snapshot.entries.len() < self.config.min_entries {
            return Err(SyncError::Invalid(format!(
                "{} entries, expected at least {}",
                snapshot.entries.len(),
                self.config.min_entries
            )));
        }
        Ok(snapshot)
    }
}

/// Swaps `staged` in as `target`, putting the previous directory back if the
/// swap fails.
fn install_dir(staged: &Path, target: &Path) -> Result<(), SyncError> {
    let mut previous_name = target.as_os_str().to_owned();
    previous_name.push(".previous");
    let previous = PathBuf::from(previous_name);
    if previous.exists() {
        fs::remove_dir_all(&previous).map_err(io_error(&previous))?;
    }

    let had_target = target.exists();
    if had_target {
        fs::rename(target, &previous).map_err(io_error(target))?;
    }
    if let Err(source) = fs::rename(staged, target) {
        if had_target {
            let _ = fs::rename(&previous, target);
        }
        return Err(SyncError::Io {
            path: target.to_path_buf(),
            source,
        });
    }
    if had_target {
        let _ = fs::remove_dir_all(&previous);
    }
    Ok(())
}
