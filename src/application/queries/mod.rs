//! Cached read accessors, one module per domain.
//!
//! Every accessor builds a stable parameter object, scopes per-user results
//! to the user id and lets the strategy table pick tags and TTL. Repository
//! calls run under the retry policy; only successful results are cached.

mod billing;
mod blog;
mod generation;
mod hashtag;
mod security;
mod settings;
mod user;

pub use billing::BillingQueries;
pub use blog::BlogQueries;
pub use generation::GenerationQueries;
pub use hashtag::HashtagQueries;
pub use security::SecurityQueries;
pub use settings::SettingsQueries;
pub use user::UserQueries;

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::application::repos::RepoError;
use crate::cache::{CachedQuery, QueryCacheFacade, RetryPolicy, with_retry};

pub const DEFAULT_HISTORY_LIMIT: u32 = 20;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_TRENDING_LIMIT: u32 = 30;
pub const DEFAULT_SECURITY_EVENT_LIMIT: u32 = 50;
pub const DEFAULT_MODERATION_LIMIT: u32 = 100;

/// Shared by every query module: the cache façade plus the retry policy
/// applied to repository calls.
#[derive(Clone)]
pub struct QueryContext {
    facade: QueryCacheFacade,
    retry: RetryPolicy,
}

impl QueryContext {
    pub fn new(facade: QueryCacheFacade, retry: RetryPolicy) -> Self {
        Self { facade, retry }
    }

    pub fn facade(&self) -> &QueryCacheFacade {
        &self.facade
    }

    /// Serve `query` from cache or run `op` with retries and cache the result.
    pub async fn fetch<T, F, Fut>(&self, query: CachedQuery, op: F) -> Result<T, RepoError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RepoError>>,
    {
        let retry = self.retry;
        self.facade
            .cache_query(&query, || with_retry(retry, op))
            .await
    }
}
