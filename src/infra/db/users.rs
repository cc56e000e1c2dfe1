use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::repos::{RepoError, UsersRepo},
    domain::entities::{UserDashboardRecord, UserProfileRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<UserProfileRecord>, RepoError> {
        sqlx::query_as::<_, UserProfileRecord>(
            r#"
            SELECT id, email, display_name, avatar_url, created_at, last_login_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn dashboard(&self, user_id: Uuid) -> Result<UserDashboardRecord, RepoError> {
        sqlx::query_as::<_, UserDashboardRecord>(
            r#"
            SELECT u.id AS user_id,
                   (SELECT COUNT(*) FROM generations g WHERE g.user_id = u.id) AS total_generations,
                   (SELECT COUNT(*) FROM generations g
                     WHERE g.user_id = u.id
                       AND g.created_at >= date_trunc('month', now())) AS generations_this_month,
                   u.credits_remaining::BIGINT AS credits_remaining,
                   (SELECT p.name
                      FROM subscriptions s
                      INNER JOIN plans p ON p.id = s.plan_id
                     WHERE s.user_id = u.id AND s.status IN ('active', 'trialing')
                     ORDER BY s.current_period_end DESC
                     LIMIT 1) AS plan_name
            FROM users u
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
