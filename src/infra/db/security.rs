use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::repos::{RepoError, SecurityRepo},
    domain::entities::{SecurityEventRecord, SessionRecord},
};

use super::{PostgresRepositories, map_sqlx_error, util::bind_limit};

#[async_trait]
impl SecurityRepo for PostgresRepositories {
    async fn recent_events(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> Result<Vec<SecurityEventRecord>, RepoError> {
        sqlx::query_as::<_, SecurityEventRecord>(
            r#"
            SELECT id, user_id, event_type, host(ip_address) AS ip_address, created_at
            FROM security_events
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

    async fn active_sessions(&self, user_id: Uuid) -> Result<Vec<SessionRecord>, RepoError> {
        sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT id, user_id, user_agent, host(ip_address) AS ip_address, last_seen_at, expires_at
            FROM sessions
            WHERE user_id = $1
              AND revoked_at IS NULL
              AND expires_at > now()
            ORDER BY last_seen_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
