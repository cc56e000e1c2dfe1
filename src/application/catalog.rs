//! All cached query modules behind one handle.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::queries::{
    BillingQueries, BlogQueries, DEFAULT_HISTORY_LIMIT, DEFAULT_PAGE_SIZE, DEFAULT_TRENDING_LIMIT,
    GenerationQueries, HashtagQueries, QueryContext, SecurityQueries, SettingsQueries, UserQueries,
};
use crate::application::repos::{
    BillingRepo, BlogRepo, GenerationsRepo, HashtagsRepo, RepoError, SecurityRepo, SettingsRepo,
    UsersRepo,
};
use crate::cache::strategy::kinds;
use crate::cache::{WarmError, WarmupSource};

#[derive(Clone)]
pub struct QueryCatalog {
    pub users: UserQueries,
    pub generations: GenerationQueries,
    pub billing: BillingQueries,
    pub blog: BlogQueries,
    pub settings: SettingsQueries,
    pub security: SecurityQueries,
    pub hashtags: HashtagQueries,
}

impl QueryCatalog {
    /// Build every module over one repository implementation.
    pub fn new<R>(repos: Arc<R>, ctx: QueryContext) -> Self
    where
        R: UsersRepo
            + GenerationsRepo
            + BillingRepo
            + BlogRepo
            + SettingsRepo
            + SecurityRepo
            + HashtagsRepo
            + 'static,
    {
        Self {
            users: UserQueries::new(repos.clone(), ctx.clone()),
            generations: GenerationQueries::new(repos.clone(), ctx.clone()),
            billing: BillingQueries::new(repos.clone(), ctx.clone()),
            blog: BlogQueries::new(repos.clone(), ctx.clone()),
            settings: SettingsQueries::new(repos.clone(), ctx.clone()),
            security: SecurityQueries::new(repos.clone(), ctx.clone()),
            hashtags: HashtagQueries::new(repos, ctx),
        }
    }
}

fn warm_failure(kind: &str) -> impl FnOnce(RepoError) -> WarmError + '_ {
    move |err| WarmError::Query {
        kind: kind.to_string(),
        detail: err.to_string(),
    }
}

/// Warm-up runs the same accessors, with the same default arguments, that
/// dashboard traffic uses, so the warmed keys are the ones later read.
#[async_trait]
impl WarmupSource for QueryCatalog {
    async fn warm_common_kind(&self, kind: &str) -> Result<(), WarmError> {
        let warmed = match kind {
            kinds::ANALYTICS_PLATFORM => self.generations.platform().await.map(drop),
            kinds::BILLING_PLANS => self.billing.plans().await.map(drop),
            kinds::BLOG_POSTS => self.blog.posts(1, DEFAULT_PAGE_SIZE).await.map(drop),
            kinds::SETTINGS_APP => self.settings.app().await.map(drop),
            kinds::HASHTAG_TRENDING => self
                .hashtags
                .trending(None, DEFAULT_TRENDING_LIMIT)
                .await
                .map(drop),
            other => return Err(WarmError::UnsupportedKind(other.to_string())),
        };
        warmed.map_err(warm_failure(kind))
    }

    async fn warm_user_kind(&self, kind: &str, user_id: Uuid) -> Result<(), WarmError> {
        let warmed = match kind {
            kinds::USER_PROFILE => self.users.profile(user_id).await.map(drop),
            kinds::USER_DASHBOARD => self.users.dashboard(user_id).await.map(drop),
            kinds::GENERATION_HISTORY => self
                .generations
                .history(user_id, DEFAULT_HISTORY_LIMIT)
                .await
                .map(drop),
            kinds::GENERATION_STATS => self.generations.stats(user_id).await.map(drop),
            kinds::BILLING_SUBSCRIPTION => self.billing.subscription(user_id).await.map(drop),
            kinds::SETTINGS_USER => self.settings.user(user_id).await.map(drop),
            other => return Err(WarmError::UnsupportedKind(other.to_string())),
        };
        warmed.map_err(warm_failure(kind))
    }
}
