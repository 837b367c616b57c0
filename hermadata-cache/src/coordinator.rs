//! Fetch scheduling: at most one in-flight fetch per key, shared by all
//! concurrent callers, with stale-while-revalidate and start-order result
//! application.

use crate::entry::EntryStatus;
use crate::error::DataError;
use crate::key::CacheKey;
use crate::store::CacheStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

/// Marker for types that can live in the cache: serde-round-trippable and
/// shareable across tasks.
pub trait Dataset: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Dataset for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Retrieves the raw payload for a cache key from the backend.
///
/// The coordinator validates the payload against the requested type before
/// storing it, so implementations return plain JSON.
#[async_trait]
pub trait DatasetFetcher: Send + Sync {
    async fn fetch(&self, key: &CacheKey) -> Result<Value, DataError>;
}

/// Adapter turning an async closure into a [`DatasetFetcher`].
#[derive(Clone)]
pub struct FnFetcher {
    f: Arc<dyn Fn(CacheKey) -> BoxFuture<'static, Result<Value, DataError>> + Send + Sync>,
}

impl FnFetcher {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(CacheKey) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, DataError>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |key| Box::pin(f(key))),
        }
    }
}

#[async_trait]
impl DatasetFetcher for FnFetcher {
    async fn fetch(&self, key: &CacheKey) -> Result<Value, DataError> {
        (self.f)(key.clone()).await
    }
}

/// Result of a coordinated read, carrying freshness metadata.
#[derive(Debug, Clone)]
pub struct DatasetRead<T> {
    value: T,
    fetched_at: DateTime<Utc>,
    was_cache_hit: bool,
    revalidating: bool,
}

impl<T> DatasetRead<T> {
    fn from_cache(value: T, fetched_at: DateTime<Utc>, revalidating: bool) -> Self {
        Self {
            value,
            fetched_at,
            was_cache_hit: true,
            revalidating,
        }
    }

    fn from_fetch(value: T, fetched_at: DateTime<Utc>) -> Self {
        Self {
            value,
            fetched_at,
            was_cache_hit: false,
            revalidating: false,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    /// True when stale data was served and a background refetch is running.
    pub fn revalidating(&self) -> bool {
        self.revalidating
    }

    /// Age of the served data.
    pub fn staleness(&self) -> Duration {
        let now = Utc::now();
        if now > self.fetched_at {
            (now - self.fetched_at).to_std().unwrap_or(Duration::ZERO)
        } else {
            Duration::ZERO
        }
    }
}

/// The raw outcome of one fetch, fanned out to every deduplicated waiter.
type FetchOutcome = Result<(Value, DateTime<Utc>), DataError>;

type Validator = Arc<dyn Fn(&Value) -> Result<(), DataError> + Send + Sync>;

struct InFlight {
    seq: u64,
    tx: broadcast::Sender<FetchOutcome>,
}

/// Schedules fetches against a [`CacheStore`].
///
/// Cloneable; clones share the in-flight table and the store. Lock order is
/// in-flight table first, store second, and neither lock is ever held
/// across an await.
#[derive(Clone)]
pub struct QueryCoordinator {
    store: CacheStore,
    inflight: Arc<Mutex<HashMap<CacheKey, InFlight>>>,
}

impl QueryCoordinator {
    pub fn new(store: CacheStore) -> Self {
        Self {
            store,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Serve `key`, fetching only when necessary.
    ///
    /// - A fetch already in flight for `key`: await it (request
    ///   de-duplication; the underlying fetcher runs exactly once).
    /// - Entry fresh: return cached data, no network call.
    /// - Entry stale but populated: return the stale data immediately and
    ///   refetch in the background (stale-while-revalidate).
    /// - Otherwise: start a fetch, await it.
    ///
    /// Failures surface to the caller; retrying is the caller's decision.
    pub async fn ensure_fresh<T: Dataset>(
        &self,
        key: CacheKey,
        fetcher: Arc<dyn DatasetFetcher>,
    ) -> Result<DatasetRead<T>, DataError> {
        let now = Utc::now();

        let joined = {
            let inflight = self.inflight.lock().expect("inflight lock poisoned");
            inflight.get(&key).map(|inf| inf.tx.subscribe())
        };
        if let Some(mut rx) = joined {
            return self.await_outcome::<T>(&mut rx).await;
        }

        if let Some(entry) = self.store.get(&key) {
            if entry.is_fresh(now) {
                self.store.note_hit();
                let data = entry.data.clone().ok_or_else(|| {
                    DataError::Validation("fresh entry without data".to_string())
                })?;
                let value = parse::<T>(data)?;
                return Ok(DatasetRead::from_cache(
                    value,
                    entry.last_fetched_at.unwrap_or(now),
                    false,
                ));
            }
            if entry.status != EntryStatus::Loading {
                if let Some(data) = entry.data.clone() {
                    self.store.note_miss();
                    // serve stale data now; fresh data arrives via the
                    // background fetch and notifies subscribers
                    drop(self.start_fetch(&key, fetcher, validator::<T>()));
                    let value = parse::<T>(data)?;
                    return Ok(DatasetRead::from_cache(
                        value,
                        entry.last_fetched_at.unwrap_or(now),
                        true,
                    ));
                }
            }
        }

        self.store.note_miss();
        let mut rx = self.start_fetch(&key, fetcher, validator::<T>());
        self.await_outcome::<T>(&mut rx).await
    }

    /// Force a new fetch for `key`, bumping the sequence number past any
    /// fetch already in flight (whose result will then be discarded when it
    /// completes). Used by manual refresh actions.
    pub async fn refetch<T: Dataset>(
        &self,
        key: CacheKey,
        fetcher: Arc<dyn DatasetFetcher>,
    ) -> Result<DatasetRead<T>, DataError> {
        self.store.note_miss();
        let mut rx = self.force_fetch(&key, fetcher, validator::<T>());
        self.await_outcome::<T>(&mut rx).await
    }

    /// Start a fetch unless one is already in flight, in which case join it.
    fn start_fetch(
        &self,
        key: &CacheKey,
        fetcher: Arc<dyn DatasetFetcher>,
        validator: Validator,
    ) -> broadcast::Receiver<FetchOutcome> {
        let mut inflight = self.inflight.lock().expect("inflight lock poisoned");
        if let Some(existing) = inflight.get(key) {
            return existing.tx.subscribe();
        }
        let seq = self.store.begin_fetch(key);
        let (tx, rx) = broadcast::channel(4);
        inflight.insert(
            key.clone(),
            InFlight {
                seq,
                tx: tx.clone(),
            },
        );
        drop(inflight);
        self.spawn_driver(key.clone(), seq, fetcher, validator, tx);
        rx
    }

    /// Start a fetch unconditionally, replacing any in-flight marker.
    fn force_fetch(
        &self,
        key: &CacheKey,
        fetcher: Arc<dyn DatasetFetcher>,
        validator: Validator,
    ) -> broadcast::Receiver<FetchOutcome> {
        let mut inflight = self.inflight.lock().expect("inflight lock poisoned");
        let seq = self.store.begin_fetch(key);
        let (tx, rx) = broadcast::channel(4);
        inflight.insert(
            key.clone(),
            InFlight {
                seq,
                tx: tx.clone(),
            },
        );
        drop(inflight);
        self.spawn_driver(key.clone(), seq, fetcher, validator, tx);
        rx
    }

    fn spawn_driver(
        &self,
        key: CacheKey,
        seq: u64,
        fetcher: Arc<dyn DatasetFetcher>,
        validator: Validator,
        tx: broadcast::Sender<FetchOutcome>,
    ) {
        let this = self.clone();
        tokio::spawn(async move {
            let outcome = match fetcher.fetch(&key).await {
                Ok(raw) => match validator(&raw) {
                    Ok(()) => Ok((raw, Utc::now())),
                    Err(err) => Err(err),
                },
                Err(err) => Err(err),
            };

            // apply to the store before dropping the in-flight marker, so a
            // late caller either joins this fetch or reads its applied result
            {
                let mut inflight = this.inflight.lock().expect("inflight lock poisoned");
                match &outcome {
                    Ok((value, _)) => {
                        let stale_after = this.stale_after(&key);
                        if !this
                            .store
                            .complete_fetch(&key, seq, value.clone(), stale_after)
                        {
                            debug!(key = %key, seq, "fetch result superseded before applying");
                        }
                    }
                    Err(err) => {
                        this.store.fail_fetch(&key, seq, err.clone());
                    }
                }
                if inflight.get(&key).map(|inf| inf.seq) == Some(seq) {
                    inflight.remove(&key);
                }
            }

            // waiters always receive this fetch's own outcome, even when the
            // cache discarded it in favor of a newer one
            let _ = tx.send(outcome);
        });
    }

    async fn await_outcome<T: Dataset>(
        &self,
        rx: &mut broadcast::Receiver<FetchOutcome>,
    ) -> Result<DatasetRead<T>, DataError> {
        match rx.recv().await {
            Ok(Ok((value, fetched_at))) => {
                let value = parse::<T>(value)?;
                Ok(DatasetRead::from_fetch(value, fetched_at))
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(DataError::Network(
                "fetch ended without reporting an outcome".to_string(),
            )),
        }
    }

    fn stale_after(&self, key: &CacheKey) -> Option<DateTime<Utc>> {
        self.store
            .policy()
            .ttl_for(key.name())
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| Utc::now() + ttl)
    }
}

fn parse<T: Dataset>(value: Value) -> Result<T, DataError> {
    serde_json::from_value::<T>(value).map_err(|err| DataError::Validation(err.to_string()))
}

fn validator<T: Dataset>() -> Validator {
    Arc::new(|raw: &Value| {
        serde_json::from_value::<T>(raw.clone())
            .map(|_| ())
            .map_err(|err| DataError::Validation(err.to_string()))
    })
}
