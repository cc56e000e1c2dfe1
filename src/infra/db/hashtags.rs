use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::repos::{HashtagsRepo, RepoError},
    domain::{
        entities::{HashtagSetRecord, HashtagTrendRecord},
        types::SocialPlatform,
    },
};

use super::{PostgresRepositories, map_sqlx_error, util::bind_limit};

#[async_trait]
impl HashtagsRepo for PostgresRepositories {
    async fn trending(
        &self,
        platform: Option<SocialPlatform>,
        limit: u32,
    ) -> Result<Vec<HashtagTrendRecord>, RepoError> {
        sqlx::query_as::<_, HashtagTrendRecord>(
            r#"
            SELECT hashtag, platform, SUM(uses)::BIGINT AS uses
            FROM hashtag_usage
            WHERE observed_on >= current_date - 7
              AND ($1::social_platform IS NULL OR platform = $1)
            GROUP BY hashtag, platform
            ORDER BY uses DESC, hashtag ASC
            LIMIT $2
            "#,
        )
        .bind(platform)
        .bind(bind_limit(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn list_sets(&self, user_id: Uuid) -> Result<Vec<HashtagSetRecord>, RepoError> {
        sqlx::query_as::<_, HashtagSetRecord>(
            r#"
            SELECT id, user_id, name, platform, hashtags, created_at
            FROM hashtag_sets
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
