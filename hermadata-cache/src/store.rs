//! Key-addressed entry storage with subscriber notification and
//! reference-counted eviction.

use crate::coordinator::Dataset;
use crate::entry::{CacheEntry, EntryStatus};
use crate::error::DataError;
use crate::key::CacheKey;
use crate::policy::CachePolicy;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from a fresh entry without a network call.
    pub hits: u64,
    /// Reads that had to start a fetch.
    pub misses: u64,
    /// Entries currently in the store.
    pub entry_count: u64,
    /// Entries removed by the eviction sweep.
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate in `[0.0, 1.0]`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

type SubscriberFn = Arc<dyn Fn(&CacheEntry) + Send + Sync>;

struct Subscriber {
    id: u64,
    callback: SubscriberFn,
}

/// Per-key subscriber bookkeeping. The subscriber count is the entry's
/// reference count; `released_at` is stamped when it reaches zero.
#[derive(Default)]
struct KeyInterest {
    subscribers: Vec<Subscriber>,
    released_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct StoreInner {
    entries: HashMap<CacheKey, CacheEntry>,
    interest: HashMap<CacheKey, KeyInterest>,
    next_subscriber_id: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Key-addressed storage of cache entries.
///
/// Constructible and cloneable (clones share state via `Arc`) - no global
/// singleton, so tests can run isolated instances side by side. All writes
/// go through [`CacheStore::set`] or the fetch/patch methods, which notify
/// subscribers synchronously after each update, in subscription order.
///
/// Lock scopes are short and never cross a suspension point; subscriber
/// callbacks run after the lock is released so they may re-enter the store.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<RwLock<StoreInner>>,
    policy: Arc<CachePolicy>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::with_policy(CachePolicy::default())
    }

    pub fn with_policy(policy: CachePolicy) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Pure read: the current entry for `key`, if any. No side effects.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let inner = self.inner.read().expect("cache store lock poisoned");
        inner.entries.get(key).cloned()
    }

    /// Typed read: deserialize the stored payload into `T`.
    ///
    /// Returns `None` when the entry is absent, has no data, or no longer
    /// parses as `T` (a patch may have reshaped it; the next fetch repairs
    /// the entry).
    pub fn get_as<T: Dataset>(&self, key: &CacheKey) -> Option<T> {
        let data = self.get(key)?.data?;
        match serde_json::from_value::<T>(data) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key = %key, error = %err, "cached payload no longer parses as requested type");
                None
            }
        }
    }

    /// Atomic read-modify-write. The updater receives the previous entry
    /// (if any) and returns the replacement; subscribers of `key` are
    /// notified synchronously after the update.
    pub fn set(&self, key: &CacheKey, updater: impl FnOnce(Option<CacheEntry>) -> CacheEntry) {
        let (entry, callbacks) = {
            let mut inner = self.inner.write().expect("cache store lock poisoned");
            let prev = inner.entries.remove(key);
            let entry = updater(prev);
            inner.entries.insert(key.clone(), entry.clone());
            // an entry written without any subscriber must stay evictable
            let interest = inner.interest.entry(key.clone()).or_default();
            if interest.subscribers.is_empty() && interest.released_at.is_none() {
                interest.released_at = Some(Utc::now());
            }
            let callbacks = Self::callbacks_for(&inner, key);
            (entry, callbacks)
        };
        Self::notify(&entry, &callbacks);
    }

    /// Register interest in `key`. The callback fires on every state change
    /// of the entry until the returned guard is dropped.
    ///
    /// Subscribing creates the entry if the key was never seen, so the
    /// reference count and the entry lifecycle stay aligned.
    pub fn subscribe(
        &self,
        key: &CacheKey,
        callback: impl Fn(&CacheEntry) + Send + Sync + 'static,
    ) -> SubscriptionGuard {
        let mut inner = self.inner.write().expect("cache store lock poisoned");
        inner.next_subscriber_id += 1;
        let id = inner.next_subscriber_id;
        inner
            .entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(key.clone()));
        let interest = inner.interest.entry(key.clone()).or_default();
        interest.subscribers.push(Subscriber {
            id,
            callback: Arc::new(callback),
        });
        interest.released_at = None;
        drop(inner);
        SubscriptionGuard {
            store: self.clone(),
            key: key.clone(),
            id,
        }
    }

    /// Mark `key` stale as of now. Data is kept (stale-while-revalidate);
    /// the next `ensure_fresh` triggers a refetch.
    pub fn invalidate(&self, key: &CacheKey) {
        let now = Utc::now();
        let (entry, callbacks) = {
            let mut inner = self.inner.write().expect("cache store lock poisoned");
            match inner.entries.get_mut(key) {
                Some(entry) => {
                    entry.mark_stale(now);
                    let entry = entry.clone();
                    (entry, Self::callbacks_for(&inner, key))
                }
                None => return,
            }
        };
        Self::notify(&entry, &callbacks);
    }

    /// Mark every entry whose key name matches `prefix` stale as of now.
    pub fn invalidate_prefix(&self, prefix: &str) {
        let now = Utc::now();
        let notifications = {
            let mut inner = self.inner.write().expect("cache store lock poisoned");
            let keys: Vec<CacheKey> = inner
                .entries
                .keys()
                .filter(|k| k.name() == prefix)
                .cloned()
                .collect();
            let mut notifications = Vec::with_capacity(keys.len());
            for key in keys {
                if let Some(entry) = inner.entries.get_mut(&key) {
                    entry.mark_stale(now);
                    let entry = entry.clone();
                    let callbacks = Self::callbacks_for(&inner, &key);
                    notifications.push((entry, callbacks));
                }
            }
            notifications
        };
        for (entry, callbacks) in &notifications {
            Self::notify(entry, callbacks);
        }
    }

    /// Remove entries with zero subscribers whose retention window has
    /// elapsed. Runs per key on unsubscribe; call it periodically to
    /// reclaim entries released while their window was still open.
    pub fn sweep(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.write().expect("cache store lock poisoned");
        let policy = Arc::clone(&self.policy);
        let expired: Vec<CacheKey> = inner
            .interest
            .iter()
            .filter(|(key, interest)| {
                interest.subscribers.is_empty()
                    && match interest.released_at {
                        Some(released) => {
                            let retention = policy.retention_for(key.name());
                            let deadline = released
                                + chrono::Duration::from_std(retention)
                                    .unwrap_or(chrono::Duration::MAX);
                            now >= deadline
                        }
                        None => false,
                    }
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            debug!(key = %key, "evicting unreferenced entry");
            inner.interest.remove(&key);
            if inner.entries.remove(&key).is_some() {
                inner.evictions += 1;
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.read().expect("cache store lock poisoned");
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entry_count: inner.entries.len() as u64,
            evictions: inner.evictions,
        }
    }

    // ------------------------------------------------------------------
    // Fetch lifecycle (used by the coordinator)
    // ------------------------------------------------------------------

    /// Mark a fetch started for `key` and take the next sequence number.
    pub(crate) fn begin_fetch(&self, key: &CacheKey) -> u64 {
        let mut seq = 0;
        self.set(key, |prev| {
            let mut entry = prev.unwrap_or_else(|| CacheEntry::new(key.clone()));
            entry.fetch_seq += 1;
            entry.status = EntryStatus::Loading;
            seq = entry.fetch_seq;
            entry
        });
        seq
    }

    /// Apply a successful fetch result, unless a newer fetch for `key` has
    /// started since (start order wins). Returns whether it was applied.
    pub(crate) fn complete_fetch(
        &self,
        key: &CacheKey,
        seq: u64,
        value: Value,
        stale_after: Option<DateTime<Utc>>,
    ) -> bool {
        let now = Utc::now();
        let (applied, entry, callbacks) = {
            let mut inner = self.inner.write().expect("cache store lock poisoned");
            match inner.entries.get_mut(key) {
                Some(entry) if entry.fetch_seq == seq => {
                    entry.data = Some(value);
                    entry.status = EntryStatus::Success;
                    entry.error = None;
                    entry.last_fetched_at = Some(now);
                    entry.stale_after = stale_after;
                    let entry = entry.clone();
                    let callbacks = Self::callbacks_for(&inner, key);
                    (true, Some(entry), callbacks)
                }
                Some(_) => {
                    debug!(key = %key, seq, "discarding out-of-order fetch result");
                    (false, None, Vec::new())
                }
                // entry evicted while the fetch was in flight: nobody cares
                None => (false, None, Vec::new()),
            }
        };
        if let Some(entry) = entry {
            Self::notify(&entry, &callbacks);
        }
        applied
    }

    /// Record a failed fetch, unless a newer fetch for `key` has started
    /// since. Prior data is left untouched.
    pub(crate) fn fail_fetch(&self, key: &CacheKey, seq: u64, error: DataError) -> bool {
        let (applied, entry, callbacks) = {
            let mut inner = self.inner.write().expect("cache store lock poisoned");
            match inner.entries.get_mut(key) {
                Some(entry) if entry.fetch_seq == seq => {
                    entry.status = EntryStatus::Error;
                    entry.error = Some(error);
                    let entry = entry.clone();
                    let callbacks = Self::callbacks_for(&inner, key);
                    (true, Some(entry), callbacks)
                }
                Some(_) => {
                    debug!(key = %key, seq, "discarding out-of-order fetch failure");
                    (false, None, Vec::new())
                }
                None => (false, None, Vec::new()),
            }
        };
        if let Some(entry) = entry {
            Self::notify(&entry, &callbacks);
        }
        applied
    }

    pub(crate) fn note_hit(&self) {
        self.inner.write().expect("cache store lock poisoned").hits += 1;
    }

    pub(crate) fn note_miss(&self) {
        self.inner
            .write()
            .expect("cache store lock poisoned")
            .misses += 1;
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn callbacks_for(inner: &StoreInner, key: &CacheKey) -> Vec<SubscriberFn> {
        inner
            .interest
            .get(key)
            .map(|i| i.subscribers.iter().map(|s| Arc::clone(&s.callback)).collect())
            .unwrap_or_default()
    }

    /// Invoked outside the lock so callbacks may re-enter the store.
    fn notify(entry: &CacheEntry, callbacks: &[SubscriberFn]) {
        for callback in callbacks {
            callback(entry);
        }
    }

    fn unsubscribe(&self, key: &CacheKey, id: u64) {
        let now = Utc::now();
        let mut inner = self.inner.write().expect("cache store lock poisoned");
        let released = match inner.interest.get_mut(key) {
            Some(interest) => {
                interest.subscribers.retain(|s| s.id != id);
                if interest.subscribers.is_empty() {
                    interest.released_at = Some(now);
                    true
                } else {
                    false
                }
            }
            None => false,
        };
        if released && self.policy.retention_for(key.name()).is_zero() {
            inner.interest.remove(key);
            if inner.entries.remove(key).is_some() {
                debug!(key = %key, "evicting entry on last unsubscribe");
                inner.evictions += 1;
            }
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Active registration of interest in a cache key.
///
/// Dropping the guard unsubscribes, decrements the key's reference count
/// and, once the count reaches zero and the retention window has elapsed,
/// allows the entry to be evicted. Dropping never cancels an in-flight
/// fetch that other subscribers may still await.
pub struct SubscriptionGuard {
    store: CacheStore,
    key: CacheKey,
    id: u64,
}

impl SubscriptionGuard {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.store.unsubscribe(&self.key, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::CachePolicy;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn success_entry(key: &CacheKey, data: Value) -> CacheEntry {
        let mut entry = CacheEntry::new(key.clone());
        entry.status = EntryStatus::Success;
        entry.data = Some(data);
        entry.last_fetched_at = Some(Utc::now());
        entry
    }

    #[test]
    fn test_get_is_keyed_exactly() {
        let store = CacheStore::new();
        let key = CacheKey::of("animal").with("A001");
        store.set(&key, |prev| {
            assert!(prev.is_none());
            success_entry(&key, json!({"code": "A001"}))
        });

        assert!(store.get(&key).is_some());
        assert!(store.get(&CacheKey::of("animal").with("a001")).is_none());
    }

    #[test]
    fn test_set_notifies_subscribers_in_subscription_order() {
        let store = CacheStore::new();
        let key = CacheKey::of("races");
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = Arc::clone(&order);
        let _g1 = store.subscribe(&key, move |_| o1.lock().unwrap().push(1));
        let o2 = Arc::clone(&order);
        let _g2 = store.subscribe(&key, move |_| o2.lock().unwrap().push(2));

        store.set(&key, |prev| {
            let mut entry = prev.expect("subscribe created the entry");
            entry.data = Some(json!([]));
            entry.status = EntryStatus::Success;
            entry
        });

        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_invalidate_keeps_data_and_notifies() {
        let store = CacheStore::new();
        let key = CacheKey::of("stats");
        let notified = Arc::new(AtomicUsize::new(0));

        let n = Arc::clone(&notified);
        let _guard = store.subscribe(&key, move |_| {
            n.fetch_add(1, Ordering::SeqCst);
        });
        store.set(&key, |_| success_entry(&key, json!({"present": 12})));
        let before = notified.load(Ordering::SeqCst);

        store.invalidate(&key);
        let entry = store.get(&key).unwrap();
        assert_eq!(entry.data, Some(json!({"present": 12})));
        assert!(!entry.is_fresh(Utc::now()));
        assert!(notified.load(Ordering::SeqCst) > before);
    }

    #[test]
    fn test_invalidate_prefix_spares_other_prefixes() {
        let store = CacheStore::new();
        let search = CacheKey::of("adopter-search").with(0i64).with(25i64);
        let races = CacheKey::of("races");
        store.set(&search, |_| success_entry(&search, json!([])));
        store.set(&races, |_| success_entry(&races, json!([])));

        store.invalidate_prefix("adopter-search");

        assert!(!store.get(&search).unwrap().is_fresh(Utc::now()));
        assert!(store.get(&races).unwrap().is_fresh(Utc::now()));
    }

    #[test]
    fn test_zero_retention_evicts_on_last_unsubscribe() {
        let store = CacheStore::new();
        let key = CacheKey::of("animal").with(7i64);

        let g1 = store.subscribe(&key, |_| {});
        let g2 = store.subscribe(&key, |_| {});
        store.set(&key, |prev| {
            let mut entry = prev.unwrap();
            entry.data = Some(json!({"animal_id": 7}));
            entry.status = EntryStatus::Success;
            entry
        });

        drop(g1);
        assert!(store.get(&key).is_some(), "still referenced by g2");
        drop(g2);
        assert!(store.get(&key).is_none(), "last reference gone");
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_retention_window_defers_eviction_until_sweep() {
        let policy = CachePolicy::new().with_retention("animal", Duration::from_secs(300));
        let store = CacheStore::with_policy(policy);
        let key = CacheKey::of("animal").with(7i64);

        let guard = store.subscribe(&key, |_| {});
        store.set(&key, |prev| {
            let mut entry = prev.unwrap();
            entry.data = Some(json!({"animal_id": 7}));
            entry.status = EntryStatus::Success;
            entry
        });
        drop(guard);

        // inside the window: a read still returns the entry
        let now = Utc::now();
        store.sweep(now + chrono::Duration::seconds(10));
        assert!(store.get(&key).is_some());

        // past the window: evicted, next read misses
        store.sweep(now + chrono::Duration::seconds(301));
        assert!(store.get(&key).is_none());
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_sweep_spares_referenced_entries() {
        let store = CacheStore::new();
        let key = CacheKey::of("races");
        let _guard = store.subscribe(&key, |_| {});
        store.sweep(Utc::now() + chrono::Duration::days(1));
        assert!(store.get(&key).is_some());
    }

    #[test]
    fn test_complete_fetch_discards_out_of_order_seq() {
        let store = CacheStore::new();
        let key = CacheKey::of("animal").with(7i64);

        let seq1 = store.begin_fetch(&key);
        let seq2 = store.begin_fetch(&key);
        assert!(seq2 > seq1);

        // newer fetch resolves first and wins
        assert!(store.complete_fetch(&key, seq2, json!({"v": 2}), None));
        // older fetch resolves later and is discarded
        assert!(!store.complete_fetch(&key, seq1, json!({"v": 1}), None));

        assert_eq!(store.get(&key).unwrap().data, Some(json!({"v": 2})));
    }

    #[test]
    fn test_fail_fetch_keeps_prior_data() {
        let store = CacheStore::new();
        let key = CacheKey::of("races");
        store.set(&key, |_| success_entry(&key, json!(["C"])));

        let seq = store.begin_fetch(&key);
        store.fail_fetch(
            &key,
            seq,
            DataError::Network("connection reset".to_string()),
        );

        let entry = store.get(&key).unwrap();
        assert_eq!(entry.status, EntryStatus::Error);
        assert_eq!(entry.data, Some(json!(["C"])));
        assert!(entry.error.is_some());
    }

    #[test]
    fn test_callbacks_may_reenter_the_store() {
        let store = CacheStore::new();
        let key = CacheKey::of("races");
        let inner_store = store.clone();
        let inner_key = key.clone();
        let _guard = store.subscribe(&key, move |_| {
            // a consumer reading back its own key must not deadlock
            let _ = inner_store.get(&inner_key);
        });
        store.set(&key, |prev| {
            let mut entry = prev.unwrap();
            entry.status = EntryStatus::Success;
            entry.data = Some(json!([]));
            entry
        });
    }
}
