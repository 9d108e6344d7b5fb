//! Source snapshot: fetch once, share read-only.
//!
//! [`fetch()`] reads every configured hash from the authoritative store
//! into an in-memory [`Snapshot`] before fan-out begins. The snapshot is
//! then wrapped in an `Arc` and shared by every concurrent task; it is
//! never mutated after it is built, so reads need no locking.
//!
//! A hash missing at the source is the only fatal-on-error path in the
//! core: it means the operator configured a name that does not exist, and
//! fanning out an incomplete data set would silently under-replicate.
//! Fetching is sequential per hash and per key; it happens once, before
//! any concurrency, and only completeness matters.

use crate::error::{ReplicationError, Result};
use crate::metrics;
use crate::store::StoreHandle;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};

/// One key-value pair of a hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashEntry {
    pub key: String,
    pub value: String,
}

/// In-memory copy of every configured hash.
///
/// Immutable once built; share it as `Arc<Snapshot>`.
#[derive(Debug, Default)]
pub struct Snapshot {
    collections: HashMap<String, Vec<HashEntry>>,
}

impl Snapshot {
    /// Iterate over `(hash name, entries)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<HashEntry>)> {
        self.collections.iter()
    }

    /// Entries of one hash, if present.
    pub fn get(&self, collection: &str) -> Option<&[HashEntry]> {
        self.collections.get(collection).map(Vec::as_slice)
    }

    /// Number of hashes in the snapshot.
    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    /// Total number of entries across all hashes.
    pub fn entry_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    /// Whether the snapshot holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    #[cfg(test)]
    pub(crate) fn from_pairs(pairs: Vec<(&str, Vec<(&str, &str)>)>) -> Self {
        let mut collections = HashMap::new();
        for (name, entries) in pairs {
            collections.insert(
                name.to_string(),
                entries
                    .into_iter()
                    .map(|(k, v)| HashEntry {
                        key: k.to_string(),
                        value: v.to_string(),
                    })
                    .collect(),
            );
        }
        Self { collections }
    }
}

/// Read every configured hash from the source store.
///
/// Verifies each hash exists, then enumerates its keys and fetches each
/// value in order. Any store error, and any missing hash, is fatal.
pub async fn fetch(store: &mut dyn StoreHandle, hashes: &[String]) -> Result<Snapshot> {
    let started = Instant::now();
    let mut collections = HashMap::with_capacity(hashes.len());
    info!("fetching reference data from source store");
    for hash in hashes {
        debug!(hash = %hash, "fetching hash");
        if !store.collection_exists(hash).await? {
            return Err(ReplicationError::MissingCollection(hash.clone()));
        }
        let keys = store.collection_keys(hash).await?;
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let value = store.get(hash, &key).await?;
            entries.push(HashEntry { key, value });
        }
        debug!(hash = %hash, keys = entries.len(), "hash fetched");
        collections.insert(hash.clone(), entries);
    }
    let snapshot = Snapshot { collections };
    metrics::record_snapshot_fetch(
        snapshot.collection_count(),
        snapshot.entry_count(),
        started.elapsed(),
    );
    info!(
        collections = snapshot.collection_count(),
        entries = snapshot.entry_count(),
        "all source hashes fetched"
    );
    Ok(snapshot)
}
