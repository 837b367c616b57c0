//! Entity query/cache coordinator.
//!
//! Keeps every view of shelter data consistent after reads and writes: a
//! keyed cache of server-fetched datasets, served to subscribers immediately,
//! refetched when stale, and patched in place after successful mutations so
//! dependent views update without a full refetch.
//!
//! # Design Philosophy
//!
//! Staleness is explicit, not hidden. Every entry carries its fetch time and
//! staleness deadline; stale data is still served (stale-while-revalidate)
//! while a background refetch runs. Correctness under concurrency relies on
//! sequencing rules rather than locks held across suspension points:
//!
//! - at most one in-flight fetch per key, shared by all concurrent callers;
//! - fetch results apply in start order, not completion order (a per-key
//!   sequence number discards out-of-order completions);
//! - mutation cache patches apply fully before the mutation returns.
//!
//! # Example
//!
//! ```ignore
//! let store = CacheStore::with_policy(policy);
//! let coordinator = QueryCoordinator::new(store.clone());
//!
//! let key = CacheKey::of("animal").with(animal_id);
//! let read = coordinator.ensure_fresh::<Animal>(key, fetcher).await?;
//! if read.revalidating() {
//!     // stale data served now, fresh data arriving in the background
//! }
//! ```

pub mod coordinator;
pub mod entry;
pub mod error;
pub mod key;
pub mod mutation;
pub mod policy;
pub mod store;

pub use coordinator::{Dataset, DatasetFetcher, DatasetRead, FnFetcher, QueryCoordinator};
pub use entry::{CacheEntry, EntryStatus};
pub use error::DataError;
pub use key::{CacheKey, KeyParam};
pub use mutation::{CachePatch, Mutation, MutationExecutor};
pub use policy::CachePolicy;
pub use store::{CacheStats, CacheStore, SubscriptionGuard};
