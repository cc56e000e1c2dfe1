use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use super::QueryContext;
use crate::application::repos::{BillingRepo, RepoError};
use crate::cache::CachedQuery;
use crate::cache::strategy::kinds;
use crate::domain::entities::{LicenseRecord, PlanRecord, SubscriptionRecord};

#[derive(Clone)]
pub struct BillingQueries {
    repo: Arc<dyn BillingRepo>,
    ctx: QueryContext,
}

impl BillingQueries {
    pub fn new(repo: Arc<dyn BillingRepo>, ctx: QueryContext) -> Self {
        Self { repo, ctx }
    }

    /// `None` for users on the free tier; cached like any other result.
    pub async fn subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<SubscriptionRecord>, RepoError> {
        let query = CachedQuery::new(kinds::BILLING_SUBSCRIPTION)
            .scope(user_id)
            .params(json!({ "user_id": user_id }));
        let repo = &self.repo;
        self.ctx
            .fetch(query, move || repo.active_subscription(user_id))
            .await
    }

    pub async fn license(&self, user_id: Uuid) -> Result<Option<LicenseRecord>, RepoError> {
        let query = CachedQuery::new(kinds::BILLING_LICENSE)
            .scope(user_id)
            .params(json!({ "user_id": user_id }));
        let repo = &self.repo;
        self.ctx.fetch(query, move || repo.license(user_id)).await
    }

    pub async fn plans(&self) -> Result<Vec<PlanRecord>, RepoError> {
        let repo = &self.repo;
        self.ctx
            .fetch(CachedQuery::new(kinds::BILLING_PLANS), move || repo.list_plans())
            .await
    }
}
