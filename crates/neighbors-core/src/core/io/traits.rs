use crate::core::models::entry::EntryData;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Entry '{0}' not found in source")]
    NotFound(String),
    #[error("I/O error while reading entry '{entry_id}': {source}")]
    Io {
        entry_id: String,
        source: std::io::Error,
    },
    #[error("Invalid data for entry '{entry_id}': {message}")]
    Invalid { entry_id: String, message: String },
}

/// A corpus of structure entries that can be loaded one at a time.
///
/// Implementations wrap whatever repository layout and record parser the
/// caller uses. Loading may block on I/O; it is called from worker threads,
/// hence the `Sync` bound.
pub trait EntrySource: Sync {
    /// Identifiers of every entry currently available.
    fn entry_ids(&self) -> Result<Vec<String>, SourceError>;

    /// Loads the parsed data of one entry.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NotFound`] for unknown ids and other variants for
    /// unreadable or malformed data.
    fn load_entry(&self, entry_id: &str) -> Result<EntryData, SourceError>;

    /// Optional size of the entry's source data (bytes or atom rows), used to
    /// skip oversized entries before dispatch.
    fn size_hint(&self, _entry_id: &str) -> Option<u64> {
        None
    }
}

/// An entry source over already-parsed entries held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    order: Vec<String>,
    entries: HashMap<String, EntryData>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: EntryData) {
        let key = entry.entry_id.to_ascii_uppercase();
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<EntryData> for InMemorySource {
    fn from_iter<I: IntoIterator<Item = EntryData>>(iter: I) -> Self {
        let mut source = Self::new();
        for entry in iter {
            source.insert(entry);
        }
        source
    }
}

impl EntrySource for InMemorySource {
    fn entry_ids(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.order.clone())
    }

    fn load_entry(&self, entry_id: &str) -> Result<EntryData, SourceError> {
        self.entries
            .get(&entry_id.to_ascii_uppercase())
            .cloned()
            .ok_or_else(|| SourceError::NotFound(entry_id.to_string()))
    }

    fn size_hint(&self, entry_id: &str) -> Option<u64> {
        self.entries
            .get(&entry_id.to_ascii_uppercase())
            .map(|entry| entry.atom_sites.len() as u64)
    }
}
