use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use super::QueryContext;
use crate::application::repos::{RepoError, SettingsRepo};
use crate::cache::CachedQuery;
use crate::cache::strategy::kinds;
use crate::domain::entities::{AppSettingsRecord, UserSettingsRecord};

#[derive(Clone)]
pub struct SettingsQueries {
    repo: Arc<dyn SettingsRepo>,
    ctx: QueryContext,
}

impl SettingsQueries {
    pub fn new(repo: Arc<dyn SettingsRepo>, ctx: QueryContext) -> Self {
        Self { repo, ctx }
    }

    pub async fn user(&self, user_id: Uuid) -> Result<Option<UserSettingsRecord>, RepoError> {
        let query = CachedQuery::new(kinds::SETTINGS_USER)
            .scope(user_id)
            .params(json!({ "user_id": user_id }));
        let repo = &self.repo;
        self.ctx.fetch(query, move || repo.user_settings(user_id)).await
    }

    pub async fn app(&self) -> Result<AppSettingsRecord, RepoError> {
        let repo = &self.repo;
        self.ctx
            .fetch(CachedQuery::new(kinds::SETTINGS_APP), move || repo.app_settings())
            .await
    }
}
