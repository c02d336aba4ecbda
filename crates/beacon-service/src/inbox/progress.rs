//! Process-scoped media download progress, kept beside the persisted inbox.

use std::collections::{BTreeMap, BTreeSet};

use dashmap::DashMap;

/// Transaction ID -> media keys with a download running.
///
/// Only running downloads have an entry; finishing one removes its key and
/// the last key removes the transaction's entry. Nothing here is persisted,
/// so every process starts with an empty table.
#[derive(Debug, Default)]
pub struct DownloadProgress {
    active: DashMap<String, BTreeSet<String>>,
}

impl DownloadProgress {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` of `trid` as downloading. Returns `false` if it already was.
    pub fn start(&self, trid: &str, key: &str) -> bool {
        self.active
            .entry(trid.to_string())
            .or_default()
            .insert(key.to_string())
    }

    /// Drop the flag for `key` of `trid`. Returns `false` if it was not set.
    pub fn finish(&self, trid: &str, key: &str) -> bool {
        let (removed, empty) = match self.active.get_mut(trid) {
            Some(mut keys) => {
                let removed = keys.remove(key);
                (removed, keys.is_empty())
            }
            None => return false,
        };
        if empty {
            self.active.remove_if(trid, |_, keys| keys.is_empty());
        }
        removed
    }

    /// Whether `key` of `trid` is downloading.
    pub fn is_active(&self, trid: &str, key: &str) -> bool {
        self.active
            .get(trid)
            .is_some_and(|keys| keys.contains(key))
    }

    /// The progress map of `trid` as exposed on inbox messages.
    pub fn snapshot(&self, trid: &str) -> BTreeMap<String, bool> {
        self.active
            .get(trid)
            .map(|keys| keys.iter().map(|key| (key.clone(), true)).collect())
            .unwrap_or_default()
    }

    /// Number of transactions with at least one running download.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether no download is running.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
