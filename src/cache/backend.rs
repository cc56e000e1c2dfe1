//! The cache as seen by query code.
//!
//! [`QueryCache`] is the narrow surface the façade depends on. The full
//! two-tier [`CacheStore`] implements it, and so does [`PassthroughCache`],
//! which stores nothing and is chosen at construction time when caching is
//! disabled or the store could not be initialized.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};

use super::config::CacheConfig;
use super::remote::RemoteTier;
use super::store::CacheStore;

/// Identity of one cached query result plus its storage options.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedQuery {
    pub identity: String,
    /// Tenant the result belongs to, usually a user id.
    pub scope: Option<String>,
    pub params: Value,
    /// Explicit tags; empty means "use the strategy's tags".
    pub tags: Vec<String>,
    /// Explicit TTL; `None` means "use the strategy's TTL".
    pub ttl: Option<Duration>,
}

impl CachedQuery {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            scope: None,
            params: Value::Null,
            tags: Vec::new(),
            ttl: None,
        }
    }

    pub fn scope(mut self, scope: impl ToString) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    pub fn params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

#[async_trait]
pub trait QueryCache: Send + Sync {
    async fn get(&self, query: &CachedQuery) -> Option<Value>;
    async fn set(&self, query: &CachedQuery, data: Value, ttl: Duration);
    /// Purge everything tagged with any of `tags` or matching any of
    /// `patterns`. Returns the number of entries removed.
    async fn invalidate(&self, tags: &[String], patterns: &[String]) -> u64;
    async fn clear(&self);
}

impl CacheStore {
    fn query_key(&self, query: &CachedQuery) -> String {
        self.key_for(
            &query.identity,
            query.scope.as_deref(),
            &query.params,
            &query.tags,
        )
    }
}

#[async_trait]
impl QueryCache for CacheStore {
    async fn get(&self, query: &CachedQuery) -> Option<Value> {
        let key = self.query_key(query);
        self.get_by_key(&key).await
    }

    async fn set(&self, query: &CachedQuery, data: Value, ttl: Duration) {
        let key = self.query_key(query);
        self.set_by_key(&key, data, &query.tags, Some(ttl)).await;
    }

    async fn invalidate(&self, tags: &[String], patterns: &[String]) -> u64 {
        let mut removed = 0;
        if !tags.is_empty() {
            removed += self.invalidate_by_tags(tags).await;
        }
        for pattern in patterns {
            removed += self.delete(pattern, &[]).await;
        }
        removed
    }

    async fn clear(&self) {
        CacheStore::clear(self).await;
    }
}

/// Cache that never stores anything; every lookup is a miss.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughCache;

#[async_trait]
impl QueryCache for PassthroughCache {
    async fn get(&self, _query: &CachedQuery) -> Option<Value> {
        None
    }

    async fn set(&self, _query: &CachedQuery, _data: Value, _ttl: Duration) {}

    async fn invalidate(&self, _tags: &[String], _patterns: &[String]) -> u64 {
        0
    }

    async fn clear(&self) {}
}

/// The cache implementation selected for this process.
pub struct QueryCacheHandle {
    pub cache: Arc<dyn QueryCache>,
    /// Present only when the full store is in use.
    pub store: Option<Arc<CacheStore>>,
}

/// Choose and initialize the cache implementation.
///
/// Disabled caching, or a store whose `init` fails, yields the passthrough
/// cache so callers keep working uncached.
pub async fn build_query_cache(
    config: CacheConfig,
    remote: Option<Arc<dyn RemoteTier>>,
) -> QueryCacheHandle {
    if !config.enabled {
        info!("Query cache disabled, using passthrough");
        return passthrough();
    }

    let store = Arc::new(CacheStore::new(config, remote));
    match store.init().await {
        Ok(()) => {
            store.start_sweeper();
            QueryCacheHandle {
                cache: store.clone(),
                store: Some(store),
            }
        }
        Err(err) => {
            error!(error = %err, "Cache store failed to initialize, using passthrough");
            passthrough()
        }
    }
}

fn passthrough() -> QueryCacheHandle {
    QueryCacheHandle {
        cache: Arc::new(PassthroughCache),
        store: None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::store::StoreState;

    #[tokio::test]
    async fn passthrough_never_hits() {
        let cache = PassthroughCache;
        let query = CachedQuery::new("q").params(json!({"id": 1}));
        cache.set(&query, json!(1), Duration::from_secs(60)).await;
        assert_eq!(cache.get(&query).await, None);
        assert_eq!(cache.invalidate(&["t".to_string()], &[]).await, 0);
    }

    #[tokio::test]
    async fn disabled_config_selects_passthrough() {
        let handle = build_query_cache(
            CacheConfig {
                enabled: false,
                ..Default::default()
            },
            None,
        )
        .await;
        assert!(handle.store.is_none());
    }

    #[tokio::test]
    async fn failed_init_selects_passthrough() {
        let handle = build_query_cache(
            CacheConfig {
                remote_required: true,
                ..Default::default()
            },
            None,
        )
        .await;
        assert!(handle.store.is_none());
    }

    #[tokio::test]
    async fn store_invalidates_tags_and_patterns() {
        let handle = build_query_cache(CacheConfig::default(), None).await;
        let store = handle.store.expect("full store");
        assert_eq!(store.state(), StoreState::Ready);

        let profile = CachedQuery::new("user.profile").scope("u1").tags(["user"]);
        let plans = CachedQuery::new("billing.plans").tags(["billing"]);
        let posts = CachedQuery::new("blog.posts");
        for query in [&profile, &plans, &posts] {
            handle.cache.set(query, json!(true), Duration::from_secs(60)).await;
        }

        let removed = handle
            .cache
            .invalidate(&["user".to_string()], &["blog.*".to_string()])
            .await;
        assert_eq!(removed, 2);
        assert_eq!(handle.cache.get(&profile).await, None);
        assert_eq!(handle.cache.get(&plans).await, Some(json!(true)));
        store.shutdown().await;
    }
}
