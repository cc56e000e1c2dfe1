use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use super::QueryContext;
use crate::application::repos::{RepoError, SecurityRepo};
use crate::cache::CachedQuery;
use crate::cache::strategy::kinds;
use crate::domain::entities::{SecurityEventRecord, SessionRecord};

#[derive(Clone)]
pub struct SecurityQueries {
    repo: Arc<dyn SecurityRepo>,
    ctx: QueryContext,
}

impl SecurityQueries {
    pub fn new(repo: Arc<dyn SecurityRepo>, ctx: QueryContext) -> Self {
        Self { repo, ctx }
    }

    pub async fn events(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> Result<Vec<SecurityEventRecord>, RepoError> {
        let query = CachedQuery::new(kinds::SECURITY_EVENTS)
            .scope(user_id)
            .params(json!({ "user_id": user_id, "limit": limit }));
        let repo = &self.repo;
        self.ctx
            .fetch(query, move || repo.recent_events(user_id, limit))
            .await
    }

    pub async fn sessions(&self, user_id: Uuid) -> Result<Vec<SessionRecord>, RepoError> {
        let query = CachedQuery::new(kinds::SECURITY_SESSIONS)
            .scope(user_id)
            .params(json!({ "user_id": user_id }));
        let repo = &self.repo;
        self.ctx
            .fetch(query, move || repo.active_sessions(user_id))
            .await
    }
}
