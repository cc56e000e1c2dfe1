//! PostPilot query cache.
//!
//! Two tiers: a bounded in-process LRU and an optional shared remote tier.
//! The remote tier is an optimization only; when it is unreachable the
//! store keeps serving from memory and callers never see the failure.
//!
//! - [`CacheStore`] owns entries, the tag index and counters.
//! - [`QueryCacheFacade`] wraps compute-or-fetch around any [`QueryCache`].
//! - [`Invalidator`] maps write events to tag and pattern purges.
//! - [`CacheWarmer`] pre-populates warm-up kinds from the strategy table.
//! - [`QueryMonitor`] and [`with_retry`] wrap the data-layer calls.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! key_prefix = "postpilot:cache:"
//! default_ttl_secs = 300
//! max_memory_entries = 10000
//!
//! [cache.remote]
//! host = "127.0.0.1"
//! port = 6379
//! ```

mod backend;
mod config;
mod error;
mod facade;
mod index;
mod invalidation;
mod keys;
mod lock;
mod monitor;
mod remote;
mod retry;
mod store;
pub mod strategy;
mod warming;

pub use backend::{CachedQuery, PassthroughCache, QueryCache, QueryCacheHandle, build_query_cache};
pub use config::{CacheConfig, RemoteConfig};
pub use error::{CacheInitError, RemoteError};
pub use facade::{CachedProducer, QueryCacheFacade};
pub use index::{KeyIndex, TagIndex, glob_matches};
pub use invalidation::{InvalidationEvent, InvalidationRule, Invalidator, UnknownEvent, expand_patterns};
pub use keys::{KeyBuilder, canonical_json};
pub use monitor::{QueryMonitor, QueryStats, QueryTimer};
pub use remote::{RedisTier, RemoteTier};
pub use retry::{RetryClassify, RetryPolicy, with_retry};
pub use store::{CacheEntry, CacheHealth, CacheStats, CacheStore, StoreState, now_millis};
pub use strategy::{CacheStrategy, Priority, WarmScope};
pub use warming::{CacheWarmer, WarmError, WarmupPlan, WarmupReport, WarmupSource};
