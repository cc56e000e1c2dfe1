use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::repos::{RepoError, SettingsRepo},
    domain::entities::{AppSettingsRecord, UserSettingsRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl SettingsRepo for PostgresRepositories {
    async fn user_settings(
        &self,
        user_id: Uuid,
    ) -> Result<Option<UserSettingsRecord>, RepoError> {
        sqlx::query_as::<_, UserSettingsRecord>(
            r#"
            SELECT user_id, timezone, locale, email_notifications, default_platform, updated_at
            FROM user_settings
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn app_settings(&self) -> Result<AppSettingsRecord, RepoError> {
        sqlx::query_as::<_, AppSettingsRecord>(
            r#"
            SELECT maintenance_mode, signups_enabled, free_monthly_credits::BIGINT AS free_monthly_credits, updated_at
            FROM app_settings
            WHERE id = 1
            "#,
        )
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
