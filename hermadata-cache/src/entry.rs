//! Cache entries: the unit of storage and notification.

use crate::error::DataError;
use crate::key::CacheKey;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Created but never fetched.
    Idle,
    /// A fetch is in flight. Prior `data`, if any, is still served.
    Loading,
    Success,
    /// Last fetch failed. Prior `data`, if any, is left untouched so the
    /// consumer may show stale content alongside the error.
    Error,
}

/// One cached dataset, owned exclusively by the store.
///
/// Consumers receive clones; all writes flow through the store so that
/// subscribers are notified of every change.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    /// Validated JSON payload. Written only by a successful fetch whose
    /// sequence number is still the newest started for this key, or by an
    /// explicit cache patch naming this key.
    pub data: Option<Value>,
    pub status: EntryStatus,
    pub error: Option<DataError>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Staleness deadline; `None` means never stale.
    pub stale_after: Option<DateTime<Utc>>,
    /// Sequence number of the newest fetch started for this key. A
    /// completing fetch applies its result only if it still holds this
    /// number (start order wins, completion order is irrelevant).
    pub fetch_seq: u64,
}

impl CacheEntry {
    pub fn new(key: CacheKey) -> Self {
        Self {
            key,
            data: None,
            status: EntryStatus::Idle,
            error: None,
            last_fetched_at: None,
            stale_after: None,
            fetch_seq: 0,
        }
    }

    /// Whether the entry can be served without a refetch.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        if self.status != EntryStatus::Success || self.data.is_none() {
            return false;
        }
        match self.stale_after {
            Some(deadline) => now < deadline,
            None => true,
        }
    }

    /// Mark stale as of `now`. Data is kept (stale-while-revalidate).
    pub fn mark_stale(&mut self, now: DateTime<Utc>) {
        self.stale_after = Some(now);
    }
}
