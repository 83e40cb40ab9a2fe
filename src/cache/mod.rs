// src/cache/mod.rs
use crate::types::AddressSnapshot;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Cache key for one page of one address. Different pages of the same
/// address hold different transaction slices, so they are distinct entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub address: String,
    pub limit: u32,
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct CachedSnapshot {
    pub snapshot: AddressSnapshot,
    pub fetched_at: DateTime<Utc>,
}

/// TTL cache for upstream snapshots. Entries are never mutated in place;
/// `insert` overwrites unconditionally and an expired `get` evicts.
#[derive(Debug)]
pub struct SnapshotCache {
    entries: HashMap<SnapshotKey, CachedSnapshot>,
    ttl_ms: i64,
}

impl SnapshotCache {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            entries: HashMap::new(),
            ttl_ms: ttl_ms as i64,
        }
    }

    /// Returns the entry if it is still fresh. An expired entry is removed
    /// on the way out so subsequent inspection does not see it.
    pub fn get(&mut self, key: &SnapshotKey) -> Option<CachedSnapshot> {
        let fresh = match self.entries.get(key) {
            Some(cached) => {
                let age = Utc::now().signed_duration_since(cached.fetched_at);
                age.num_milliseconds() <= self.ttl_ms
            }
            None => return None,
        };

        if fresh {
            self.entries.get(key).cloned()
        } else {
            self.entries.remove(key);
            None
        }
    }

    /// Store a freshly fetched snapshot, replacing any previous entry for
    /// the key. Returns the timestamp recorded for the entry.
    pub fn insert(&mut self, key: SnapshotKey, snapshot: AddressSnapshot) -> DateTime<Utc> {
        let fetched_at = Utc::now();
        self.entries.insert(
            key,
            CachedSnapshot {
                snapshot,
                fetched_at,
            },
        );
        fetched_at
    }

    /// Drop every expired entry. Run periodically to bound memory; request
    /// handling stays correct without it.
    pub fn clear_expired(&mut self) {
        let now = Utc::now();
        self.entries.retain(|_, cached| {
            now.signed_duration_since(cached.fetched_at).num_milliseconds() <= self.ttl_ms
        });
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
