use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::repos::{GenerationsRepo, RepoError},
    domain::entities::{
        GenerationRecord, GenerationStatsRecord, PlatformAnalyticsRecord, RealtimeAnalyticsRecord,
    },
};

use super::{PostgresRepositories, map_sqlx_error, util::bind_limit};

#[async_trait]
impl GenerationsRepo for PostgresRepositories {
    async fn list_recent(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> Result<Vec<GenerationRecord>, RepoError> {
        sqlx::query_as::<_, GenerationRecord>(
            r#"
            SELECT id, user_id, kind, platform, input, output, created_at
            FROM generations
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(bind_limit(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn stats(&self, user_id: Uuid) -> Result<GenerationStatsRecord, RepoError> {
        sqlx::query_as::<_, GenerationStatsRecord>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE created_at >= now() - INTERVAL '30 days') AS last_30_days,
                   MAX(created_at) AS last_generated_at
            FROM generations
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn realtime(&self, user_id: Uuid) -> Result<RealtimeAnalyticsRecord, RepoError> {
        sqlx::query_as::<_, RealtimeAnalyticsRecord>(
            r#"
            SELECT COUNT(*) FILTER (WHERE created_at >= now() - INTERVAL '1 hour') AS generations_last_hour,
                   COUNT(*) FILTER (WHERE created_at >= date_trunc('day', now())) AS generations_today
            FROM generations
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn platform_analytics(&self) -> Result<PlatformAnalyticsRecord, RepoError> {
        sqlx::query_as::<_, PlatformAnalyticsRecord>(
            r#"
            SELECT (SELECT COUNT(*) FROM users) AS total_users,
                   (SELECT COUNT(DISTINCT user_id) FROM generations
                     WHERE created_at >= now() - INTERVAL '30 days') AS active_users_30d,
                   (SELECT COUNT(*) FROM generations) AS total_generations,
                   (SELECT COUNT(*) FROM generations
                     WHERE created_at >= date_trunc('day', now())) AS generations_today
            "#,
        )
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
