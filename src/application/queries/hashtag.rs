use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use super::QueryContext;
use crate::application::repos::{HashtagsRepo, RepoError};
use crate::cache::CachedQuery;
use crate::cache::strategy::kinds;
use crate::domain::entities::{HashtagSetRecord, HashtagTrendRecord};
use crate::domain::types::SocialPlatform;

#[derive(Clone)]
pub struct HashtagQueries {
    repo: Arc<dyn HashtagsRepo>,
    ctx: QueryContext,
}

impl HashtagQueries {
    pub fn new(repo: Arc<dyn HashtagsRepo>, ctx: QueryContext) -> Self {
        Self { repo, ctx }
    }

    /// Most used hashtags, across platforms when `platform` is `None`.
    pub async fn trending(
        &self,
        platform: Option<SocialPlatform>,
        limit: u32,
    ) -> Result<Vec<HashtagTrendRecord>, RepoError> {
        let query = CachedQuery::new(kinds::HASHTAG_TRENDING)
            .params(json!({ "platform": platform, "limit": limit }));
        let repo = &self.repo;
        self.ctx
            .fetch(query, move || repo.trending(platform, limit))
            .await
    }

    pub async fn sets(&self, user_id: Uuid) -> Result<Vec<HashtagSetRecord>, RepoError> {
        let query = CachedQuery::new(kinds::HASHTAG_SETS)
            .scope(user_id)
            .params(json!({ "user_id": user_id }));
        let repo = &self.repo;
        self.ctx.fetch(query, move || repo.list_sets(user_id)).await
    }
}
