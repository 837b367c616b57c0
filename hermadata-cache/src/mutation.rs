//! Mutations: run a write exactly once per invocation and patch the cache
//! before the caller observes the result.

use crate::entry::{CacheEntry, EntryStatus};
use crate::error::DataError;
use crate::key::CacheKey;
use crate::store::CacheStore;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

/// Declarative instruction to update cache state after a successful write,
/// without a full refetch.
#[derive(Debug, Clone, PartialEq)]
pub enum CachePatch {
    /// Install `value` as a fresh entry for the key.
    Replace(CacheKey, Value),
    /// Push `value` onto the cached JSON array under the key.
    AppendTo(CacheKey, Value),
    /// Shallow-merge a JSON object into the cached object under the key.
    MergeInto(CacheKey, Value),
    /// Mark the key stale; data is kept and refetched on next read.
    Invalidate(CacheKey),
    /// Mark every key with this name stale.
    InvalidatePrefix(&'static str),
}

/// A write operation and its cache consequences.
///
/// Each `execute` call runs the write once - concurrent calls are
/// independent intents, never deduplicated, and idempotence is not assumed.
/// The host UI is responsible for disabling duplicate submits.
#[async_trait]
pub trait Mutation: Send + Sync {
    type Input: Send + Sync;
    type Output: Send + Sync;

    /// Perform the remote write.
    async fn run(&self, input: &Self::Input) -> Result<Self::Output, DataError>;

    /// Patches to apply, in order, once the write succeeds.
    fn on_success(&self, output: &Self::Output, input: &Self::Input) -> Vec<CachePatch>;

    /// Side effects on failure (e.g. surfacing a notification). The error
    /// is also returned to the caller; it is never stored in the cache.
    fn on_error(&self, _error: &DataError) {}
}

/// Runs mutations against a [`CacheStore`].
#[derive(Clone)]
pub struct MutationExecutor {
    store: CacheStore,
}

impl MutationExecutor {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Run the write; on success apply every declared patch, in order,
    /// before returning - by the time the caller sees the output,
    /// dependent cache state is updated and subscribers are notified.
    /// On failure the cache is untouched.
    pub async fn execute<M: Mutation>(
        &self,
        mutation: &M,
        input: M::Input,
    ) -> Result<M::Output, DataError> {
        match mutation.run(&input).await {
            Ok(output) => {
                for patch in mutation.on_success(&output, &input) {
                    self.apply(patch);
                }
                Ok(output)
            }
            Err(err) => {
                mutation.on_error(&err);
                Err(err)
            }
        }
    }

    /// Apply one patch. Shape mismatches degrade to invalidation: the
    /// patch's intent ("this key's data changed") is preserved without
    /// fabricating structure.
    pub fn apply(&self, patch: CachePatch) {
        match patch {
            CachePatch::Replace(key, value) => {
                let stale_after = self
                    .store
                    .policy()
                    .ttl_for(key.name())
                    .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
                    .map(|ttl| Utc::now() + ttl);
                self.store.set(&key, |prev| {
                    let mut entry = prev.unwrap_or_else(|| CacheEntry::new(key.clone()));
                    entry.data = Some(value);
                    entry.status = EntryStatus::Success;
                    entry.error = None;
                    entry.last_fetched_at = Some(Utc::now());
                    entry.stale_after = stale_after;
                    entry
                });
            }
            CachePatch::AppendTo(key, item) => {
                if self.store.get(&key).is_some() {
                    self.store.set(&key, |prev| {
                        let mut entry = prev.expect("entry checked present");
                        match entry.data.as_mut() {
                            Some(Value::Array(items)) => items.push(item),
                            _ => {
                                debug!(key = %key, "append target is not an array, invalidating");
                                entry.mark_stale(Utc::now());
                            }
                        }
                        entry
                    });
                }
                // no entry: nothing to append into and nothing to invalidate
            }
            CachePatch::MergeInto(key, partial) => {
                if self.store.get(&key).is_some() {
                    self.store.set(&key, |prev| {
                        let mut entry = prev.expect("entry checked present");
                        match (entry.data.as_mut(), partial) {
                            (Some(Value::Object(data)), Value::Object(partial)) => {
                                // a merge amends local state; it is not a
                                // fetch, so freshness metadata is untouched
                                for (field, value) in partial {
                                    data.insert(field, value);
                                }
                            }
                            _ => {
                                debug!(key = %key, "merge target is not an object, invalidating");
                                entry.mark_stale(Utc::now());
                            }
                        }
                        entry
                    });
                }
            }
            CachePatch::Invalidate(key) => self.store.invalidate(&key),
            CachePatch::InvalidatePrefix(prefix) => self.store.invalidate_prefix(prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct CreateAdopter {
        runs: AtomicUsize,
        fail_with: Option<DataError>,
    }

    impl CreateAdopter {
        fn succeeding() -> Self {
            Self {
                runs: AtomicUsize::new(0),
                fail_with: None,
            }
        }

        fn failing(err: DataError) -> Self {
            Self {
                runs: AtomicUsize::new(0),
                fail_with: Some(err),
            }
        }
    }

    #[async_trait]
    impl Mutation for CreateAdopter {
        type Input = Value;
        type Output = Value;

        async fn run(&self, input: &Value) -> Result<Value, DataError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => {
                    let mut created = input.clone();
                    created["adopter_id"] = json!(42);
                    Ok(created)
                }
            }
        }

        fn on_success(&self, output: &Value, _input: &Value) -> Vec<CachePatch> {
            vec![
                CachePatch::AppendTo(CacheKey::of("adopter-list"), output.clone()),
                CachePatch::Invalidate(CacheKey::of("shelter-stats")),
            ]
        }
    }

    fn seeded_store() -> CacheStore {
        let store = CacheStore::new();
        let list_key = CacheKey::of("adopter-list");
        store.set(&list_key, |prev| {
            let mut entry = prev.unwrap_or_else(|| CacheEntry::new(list_key.clone()));
            entry.data = Some(json!([{"adopter_id": 1}]));
            entry.status = EntryStatus::Success;
            entry.stale_after = Some(Utc::now() + chrono::Duration::seconds(60));
            entry
        });
        let stats_key = CacheKey::of("shelter-stats");
        store.set(&stats_key, |prev| {
            let mut entry = prev.unwrap_or_else(|| CacheEntry::new(stats_key.clone()));
            entry.data = Some(json!({"present": 12}));
            entry.status = EntryStatus::Success;
            entry.stale_after = Some(Utc::now() + chrono::Duration::seconds(60));
            entry
        });
        store
    }

    #[tokio::test]
    async fn test_patches_apply_in_order_before_execute_returns() {
        let store = seeded_store();
        let events = Arc::new(Mutex::new(Vec::new()));

        let list_key = CacheKey::of("adopter-list");
        let stats_key = CacheKey::of("shelter-stats");
        let e1 = Arc::clone(&events);
        let _g1 = store.subscribe(&list_key, move |entry| {
            e1.lock().unwrap().push(format!("list:{}", entry.data.is_some()));
        });
        let e2 = Arc::clone(&events);
        let _g2 = store.subscribe(&stats_key, move |_| {
            e2.lock().unwrap().push("stats".to_string());
        });

        let executor = MutationExecutor::new(store.clone());
        let mutation = CreateAdopter::succeeding();
        let output = executor
            .execute(&mutation, json!({"name": "Mario"}))
            .await
            .unwrap();
        assert_eq!(output["adopter_id"], json!(42));

        // both patches observable now that execute has returned
        let list = store.get(&list_key).unwrap();
        let items = list.data.as_ref().unwrap().as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["adopter_id"], json!(42));

        let stats = store.get(&stats_key).unwrap();
        assert!(!stats.is_fresh(Utc::now()), "stats marked stale");
        assert_eq!(stats.data, Some(json!({"present": 12})), "data kept");

        // declared order: append first, invalidation second
        let events = events.lock().unwrap();
        assert_eq!(*events, vec!["list:true".to_string(), "stats".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_cache_untouched() {
        let store = seeded_store();
        let executor = MutationExecutor::new(store.clone());
        let mutation = CreateAdopter::failing(DataError::Conflict {
            code: "EDF".to_string(),
            content: None,
        });

        let res = executor.execute(&mutation, json!({"name": "Mario"})).await;
        assert!(matches!(res, Err(DataError::Conflict { .. })));

        let list = store.get(&CacheKey::of("adopter-list")).unwrap();
        assert_eq!(list.data.as_ref().unwrap().as_array().unwrap().len(), 1);
        let stats = store.get(&CacheKey::of("shelter-stats")).unwrap();
        assert!(stats.is_fresh(Utc::now()), "no invalidation on failure");
        assert!(stats.error.is_none(), "mutation errors are not cached");
    }

    #[tokio::test]
    async fn test_each_execute_runs_the_write_again() {
        let store = seeded_store();
        let executor = MutationExecutor::new(store);
        let mutation = CreateAdopter::succeeding();

        executor
            .execute(&mutation, json!({"name": "Mario"}))
            .await
            .unwrap();
        executor
            .execute(&mutation, json!({"name": "Mario"}))
            .await
            .unwrap();
        // same input, two distinct intents, two writes
        assert_eq!(mutation.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_append_to_non_array_degrades_to_invalidate() {
        let store = CacheStore::new();
        let key = CacheKey::of("shelter-stats");
        store.set(&key, |prev| {
            let mut entry = prev.unwrap_or_else(|| CacheEntry::new(key.clone()));
            entry.data = Some(json!({"present": 12}));
            entry.status = EntryStatus::Success;
            entry.stale_after = Some(Utc::now() + chrono::Duration::seconds(60));
            entry
        });

        let executor = MutationExecutor::new(store.clone());
        executor.apply(CachePatch::AppendTo(key.clone(), json!({"x": 1})));

        let entry = store.get(&key).unwrap();
        assert_eq!(entry.data, Some(json!({"present": 12})));
        assert!(!entry.is_fresh(Utc::now()));
    }

    #[tokio::test]
    async fn test_merge_into_amends_without_refreshing() {
        let store = CacheStore::new();
        let key = CacheKey::of("animal").with(7i64);
        let fetched_at = Utc::now() - chrono::Duration::seconds(30);
        store.set(&key, |prev| {
            let mut entry = prev.unwrap_or_else(|| CacheEntry::new(key.clone()));
            entry.data = Some(json!({"animal_id": 7, "name": null}));
            entry.status = EntryStatus::Success;
            entry.last_fetched_at = Some(fetched_at);
            entry.stale_after = Some(fetched_at + chrono::Duration::seconds(60));
            entry
        });

        let executor = MutationExecutor::new(store.clone());
        executor.apply(CachePatch::MergeInto(
            key.clone(),
            json!({"name": "Rex", "sterilized": true}),
        ));

        let entry = store.get(&key).unwrap();
        assert_eq!(
            entry.data,
            Some(json!({"animal_id": 7, "name": "Rex", "sterilized": true}))
        );
        assert_eq!(entry.last_fetched_at, Some(fetched_at), "not a fetch");
    }

    #[tokio::test]
    async fn test_replace_installs_a_fresh_entry() {
        let store = CacheStore::new();
        let key = CacheKey::of("animal").with(9i64);
        let executor = MutationExecutor::new(store.clone());

        executor.apply(CachePatch::Replace(key.clone(), json!({"animal_id": 9})));

        let entry = store.get(&key).unwrap();
        assert_eq!(entry.status, EntryStatus::Success);
        assert!(entry.is_fresh(Utc::now()));
        assert_eq!(entry.data, Some(json!({"animal_id": 9})));
    }

    #[tokio::test]
    async fn test_invalidate_prefix_patch_hits_every_window() {
        let store = CacheStore::new();
        let w1 = CacheKey::of("adopter-search").with(0i64).with(25i64);
        let w2 = CacheKey::of("adopter-search").with(25i64).with(50i64);
        for key in [&w1, &w2] {
            store.set(key, |prev| {
                let mut entry = prev.unwrap_or_else(|| CacheEntry::new(key.clone()));
                entry.data = Some(json!([]));
                entry.status = EntryStatus::Success;
                entry.stale_after = Some(Utc::now() + chrono::Duration::seconds(60));
                entry
            });
        }

        let executor = MutationExecutor::new(store.clone());
        executor.apply(CachePatch::InvalidatePrefix("adopter-search"));

        assert!(!store.get(&w1).unwrap().is_fresh(Utc::now()));
        assert!(!store.get(&w2).unwrap().is_fresh(Utc::now()));
    }
}
