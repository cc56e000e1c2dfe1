use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use super::QueryContext;
use crate::application::repos::{GenerationsRepo, RepoError};
use crate::cache::CachedQuery;
use crate::cache::strategy::kinds;
use crate::domain::entities::{
    GenerationRecord, GenerationStatsRecord, PlatformAnalyticsRecord, RealtimeAnalyticsRecord,
};

/// Generation history plus the analytics derived from it.
#[derive(Clone)]
pub struct GenerationQueries {
    repo: Arc<dyn GenerationsRepo>,
    ctx: QueryContext,
}

impl GenerationQueries {
    pub fn new(repo: Arc<dyn GenerationsRepo>, ctx: QueryContext) -> Self {
        Self { repo, ctx }
    }

    pub async fn history(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> Result<Vec<GenerationRecord>, RepoError> {
        let query = CachedQuery::new(kinds::GENERATION_HISTORY)
            .scope(user_id)
            .params(json!({ "user_id": user_id, "limit": limit }));
        let repo = &self.repo;
        self.ctx
            .fetch(query, move || repo.list_recent(user_id, limit))
            .await
    }

    pub async fn stats(&self, user_id: Uuid) -> Result<GenerationStatsRecord, RepoError> {
        let query = CachedQuery::new(kinds::GENERATION_STATS)
            .scope(user_id)
            .params(json!({ "user_id": user_id }));
        let repo = &self.repo;
        self.ctx.fetch(query, move || repo.stats(user_id)).await
    }

    pub async fn realtime(&self, user_id: Uuid) -> Result<RealtimeAnalyticsRecord, RepoError> {
        let query = CachedQuery::new(kinds::ANALYTICS_REALTIME)
            .scope(user_id)
            .params(json!({ "user_id": user_id }));
        let repo = &self.repo;
        self.ctx.fetch(query, move || repo.realtime(user_id)).await
    }

    pub async fn platform(&self) -> Result<PlatformAnalyticsRecord, RepoError> {
        let query = CachedQuery::new(kinds::ANALYTICS_PLATFORM);
        let repo = &self.repo;
        self.ctx.fetch(query, move || repo.platform_analytics()).await
    }
}
