use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::repos::{BlogRepo, RepoError},
    domain::{
        entities::{BlogCommentRecord, BlogPostRecord},
        types::CommentStatus,
    },
};

use super::{PostgresRepositories, map_sqlx_error, util::bind_limit};

const POST_COLUMNS: &str = "id, slug, title, excerpt, body_markdown, published_at, updated_at";
const COMMENT_COLUMNS: &str = "id, post_id, author_name, body, status, created_at";

#[async_trait]
impl BlogRepo for PostgresRepositories {
    async fn list_published(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<BlogPostRecord>, RepoError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM blog_posts \
             WHERE published_at IS NOT NULL AND published_at <= now() \
             ORDER BY published_at DESC, id DESC \
             LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, BlogPostRecord>(&sql)
            .bind(bind_limit(limit))
            .bind(bind_limit(offset))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<BlogPostRecord>, RepoError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM blog_posts \
             WHERE slug = $1 AND published_at IS NOT NULL"
        );
        sqlx::query_as::<_, BlogPostRecord>(&sql)
            .bind(slug)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<BlogCommentRecord>, RepoError> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM blog_comments \
             WHERE post_id = $1 AND status = $2 \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, BlogCommentRecord>(&sql)
            .bind(post_id)
            .bind(CommentStatus::Approved)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn moderation_queue(&self, limit: u32) -> Result<Vec<BlogCommentRecord>, RepoError> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM blog_comments \
             WHERE status = $1 \
             ORDER BY created_at ASC, id ASC \
             LIMIT $2"
        );
        sqlx::query_as::<_, BlogCommentRecord>(&sql)
            .bind(CommentStatus::Pending)
            .bind(bind_limit(limit))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}
