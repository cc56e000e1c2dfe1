use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use super::QueryContext;
use crate::application::repos::{RepoError, UsersRepo};
use crate::cache::CachedQuery;
use crate::cache::strategy::kinds;
use crate::domain::entities::{UserDashboardRecord, UserProfileRecord};

#[derive(Clone)]
pub struct UserQueries {
    repo: Arc<dyn UsersRepo>,
    ctx: QueryContext,
}

impl UserQueries {
    pub fn new(repo: Arc<dyn UsersRepo>, ctx: QueryContext) -> Self {
        Self { repo, ctx }
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<Option<UserProfileRecord>, RepoError> {
        let query = CachedQuery::new(kinds::USER_PROFILE)
            .scope(user_id)
            .params(json!({ "user_id": user_id }));
        let repo = &self.repo;
        self.ctx
            .fetch(query, move || repo.find_profile(user_id))
            .await
    }

    pub async fn dashboard(&self, user_id: Uuid) -> Result<UserDashboardRecord, RepoError> {
        let query = CachedQuery::new(kinds::USER_DASHBOARD)
            .scope(user_id)
            .params(json!({ "user_id": user_id }));
        let repo = &self.repo;
        self.ctx.fetch(query, move || repo.dashboard(user_id)).await
    }
}
