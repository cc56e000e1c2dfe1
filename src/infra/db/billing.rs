use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::repos::{BillingRepo, RepoError},
    domain::entities::{LicenseRecord, PlanRecord, SubscriptionRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl BillingRepo for PostgresRepositories {
    async fn active_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<SubscriptionRecord>, RepoError> {
        sqlx::query_as::<_, SubscriptionRecord>(
            r#"
            SELECT s.id, s.user_id, s.plan_id, p.name AS plan_name, s.status,
                   s.current_period_end, s.cancel_at_period_end
            FROM subscriptions s
            INNER JOIN plans p ON p.id = s.plan_id
            WHERE s.user_id = $1
              AND s.status IN ('active', 'trialing', 'past_due')
            ORDER BY s.current_period_end DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn license(&self, user_id: Uuid) -> Result<Option<LicenseRecord>, RepoError> {
        sqlx::query_as::<_, LicenseRecord>(
            r#"
            SELECT id, user_id, license_key, status, seats, expires_at
            FROM licenses
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn list_plans(&self) -> Result<Vec<PlanRecord>, RepoError> {
        sqlx::query_as::<_, PlanRecord>(
            r#"
            SELECT id, name, price_cents, monthly_credits, features
            FROM plans
            WHERE is_public
            ORDER BY price_cents ASC, name ASC
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
