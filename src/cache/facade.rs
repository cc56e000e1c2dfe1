//! Compute-or-fetch over the query cache.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::backend::{CachedQuery, QueryCache};
use super::monitor::QueryMonitor;
use super::strategy;

/// Returns cached results or runs the producer and stores what it returns.
///
/// Concurrent misses for the same query each run the producer; nothing
/// coalesces in-flight calls.
#[derive(Clone)]
pub struct QueryCacheFacade {
    cache: Arc<dyn QueryCache>,
    monitor: Option<Arc<QueryMonitor>>,
    default_ttl: Duration,
}

impl QueryCacheFacade {
    pub fn new(cache: Arc<dyn QueryCache>, default_ttl: Duration) -> Self {
        Self {
            cache,
            monitor: None,
            default_ttl,
        }
    }

    /// Time every producer run under the query's identity.
    pub fn with_monitor(mut self, monitor: Arc<QueryMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn cache(&self) -> &Arc<dyn QueryCache> {
        &self.cache
    }

    pub fn monitor(&self) -> Option<&Arc<QueryMonitor>> {
        self.monitor.as_ref()
    }

    /// Explicit TTL, else the strategy's, else the configured default.
    pub fn resolve_ttl(&self, query: &CachedQuery) -> Duration {
        query
            .ttl
            .or_else(|| strategy::lookup(&query.identity).map(|strategy| strategy.ttl))
            .unwrap_or(self.default_ttl)
    }

    /// `query` with its tags filled from the strategy table when none were
    /// given, so the stored entry can be found by tag invalidation.
    pub fn resolve(&self, query: &CachedQuery) -> CachedQuery {
        let mut resolved = query.clone();
        if resolved.tags.is_empty() {
            resolved.tags = strategy::strategy_for(&query.identity).tag_strings();
        }
        resolved.ttl = Some(self.resolve_ttl(query));
        resolved
    }

    /// Return the cached value for `query` or compute it with `producer`.
    ///
    /// Producer errors propagate unchanged and are never cached. Successful
    /// results, `None` included, are stored.
    pub async fn cache_query<T, E, F, Fut>(&self, query: &CachedQuery, producer: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let resolved = self.resolve(query);

        if let Some(cached) = self.cache.get(&resolved).await {
            // A mismatched entry is treated as a miss; the fresh result
            // below overwrites it.
            match serde_json::from_value::<T>(cached) {
                Ok(value) => return Ok(value),
                Err(err) => warn!(
                    identity = %resolved.identity,
                    error = %err,
                    "Cached value has an unexpected shape, recomputing"
                ),
            }
        }

        let timer = self
            .monitor
            .as_ref()
            .map(|monitor| monitor.start_timer(&resolved.identity));
        let result = producer().await;
        if let Some(timer) = timer {
            timer.stop();
        }
        let value = result?;

        match serde_json::to_value(&value) {
            Ok(data) => {
                let ttl = self.resolve_ttl(&resolved);
                self.cache.set(&resolved, data, ttl).await;
            }
            Err(err) => {
                warn!(identity = %resolved.identity, error = %err, "Query result not cacheable");
            }
        }
        Ok(value)
    }

    /// Compose `describe` and `producer` into a cached producer.
    pub fn cached<A, T, E, K, P, Fut>(&self, describe: K, producer: P) -> CachedProducer<A, K, P>
    where
        K: Fn(&A) -> CachedQuery,
        P: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize + DeserializeOwned,
    {
        CachedProducer {
            facade: self.clone(),
            describe,
            producer,
            _args: PhantomData,
        }
    }
}

/// A producer whose results go through the cache.
///
/// `describe` maps the call arguments to the cached query; `producer`
/// computes the value on a miss.
pub struct CachedProducer<A, K, P> {
    facade: QueryCacheFacade,
    describe: K,
    producer: P,
    _args: PhantomData<fn(A)>,
}

impl<A, K, P> CachedProducer<A, K, P>
where
    K: Fn(&A) -> CachedQuery,
{
    pub async fn call<T, E, Fut>(&self, args: A) -> Result<T, E>
    where
        P: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize + DeserializeOwned,
    {
        let query = (self.describe)(&args);
        self.facade
            .cache_query(&query, || (self.producer)(args))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::cache::backend::PassthroughCache;
    use crate::cache::config::CacheConfig;
    use crate::cache::store::CacheStore;
    use crate::cache::strategy::kinds;

    async fn facade() -> (QueryCacheFacade, Arc<CacheStore>) {
        let store = Arc::new(CacheStore::new(CacheConfig::default(), None));
        store.init().await.expect("init");
        let facade = QueryCacheFacade::new(store.clone(), Duration::from_secs(300));
        (facade, store)
    }

    #[test]
    fn ttl_resolution_order() {
        let facade = QueryCacheFacade::new(Arc::new(PassthroughCache), Duration::from_secs(42));

        let explicit = CachedQuery::new(kinds::SETTINGS_USER).ttl(Duration::from_secs(5));
        assert_eq!(facade.resolve_ttl(&explicit), Duration::from_secs(5));

        let from_strategy = CachedQuery::new(kinds::SETTINGS_USER);
        assert_eq!(facade.resolve_ttl(&from_strategy), Duration::from_secs(1800));

        let unknown = CachedQuery::new("adhoc.query");
        assert_eq!(facade.resolve_ttl(&unknown), Duration::from_secs(42));
    }

    #[test]
    fn strategy_tags_fill_empty_tag_sets() {
        let facade = QueryCacheFacade::new(Arc::new(PassthroughCache), Duration::from_secs(42));
        let resolved = facade.resolve(&CachedQuery::new(kinds::BILLING_SUBSCRIPTION));
        assert_eq!(resolved.tags, vec!["billing", "subscription"]);

        let explicit = facade.resolve(&CachedQuery::new(kinds::BILLING_SUBSCRIPTION).tags(["x"]));
        assert_eq!(explicit.tags, vec!["x"]);
    }

    #[tokio::test]
    async fn hit_skips_producer() {
        let (facade, _store) = facade().await;
        let calls = AtomicUsize::new(0);
        let query = CachedQuery::new("q").params(serde_json::json!({"id": 1}));

        for _ in 0..2 {
            let value: Result<u32, ()> = facade
                .cache_query(&query, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await;
            assert_eq!(value, Ok(7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn producer_errors_are_not_cached() {
        let (facade, store) = facade().await;
        let query = CachedQuery::new("q");

        let failed: Result<u32, &str> = facade.cache_query(&query, || async { Err("boom") }).await;
        assert_eq!(failed, Err("boom"));
        assert_eq!(store.stats().sets, 0);

        let recovered: Result<u32, &str> = facade.cache_query(&query, || async { Ok(1) }).await;
        assert_eq!(recovered, Ok(1));
    }

    #[tokio::test]
    async fn none_results_are_cached() {
        let (facade, _store) = facade().await;
        let calls = AtomicUsize::new(0);
        let query = CachedQuery::new("lookup.missing");

        for _ in 0..2 {
            let value: Result<Option<String>, ()> = facade
                .cache_query(&query, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                })
                .await;
            assert_eq!(value, Ok(None));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mismatched_shape_recomputes() {
        let (facade, _store) = facade().await;
        let query = CachedQuery::new("q");

        let _: Result<String, ()> = facade.cache_query(&query, || async { Ok("text".to_string()) }).await;
        let number: Result<u32, ()> = facade.cache_query(&query, || async { Ok(5) }).await;
        assert_eq!(number, Ok(5));

        let cached: Result<u32, ()> = facade.cache_query(&query, || async { Ok(6) }).await;
        assert_eq!(cached, Ok(5));
    }

    #[tokio::test]
    async fn cached_producer_keys_by_arguments() {
        let (facade, _store) = facade().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let square = facade.cached(
            |n: &u32| CachedQuery::new("math.square").params(serde_json::json!({ "n": n })),
            move |n: u32| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<u32, ()>(n * n)
                }
            },
        );

        assert_eq!(square.call(3).await, Ok(9));
        assert_eq!(square.call(3).await, Ok(9));
        assert_eq!(square.call(4).await, Ok(16));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn monitor_times_producer_runs_only() {
        let (facade, _store) = facade().await;
        let monitor = Arc::new(QueryMonitor::default());
        let facade = facade.with_monitor(monitor.clone());
        let query = CachedQuery::new(kinds::BLOG_POSTS);

        for _ in 0..3 {
            let _: Result<u8, ()> = facade.cache_query(&query, || async { Ok(1) }).await;
        }
        assert_eq!(monitor.stats(kinds::BLOG_POSTS).map(|s| s.count), Some(1));
    }
}
