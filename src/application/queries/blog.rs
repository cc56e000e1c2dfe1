use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use super::QueryContext;
use crate::application::repos::{BlogRepo, RepoError};
use crate::cache::CachedQuery;
use crate::cache::strategy::kinds;
use crate::domain::entities::{BlogCommentRecord, BlogPostRecord};

#[derive(Clone)]
pub struct BlogQueries {
    repo: Arc<dyn BlogRepo>,
    ctx: QueryContext,
}

impl BlogQueries {
    pub fn new(repo: Arc<dyn BlogRepo>, ctx: QueryContext) -> Self {
        Self { repo, ctx }
    }

    /// Published posts, newest first. `page` is 1-based.
    pub async fn posts(&self, page: u32, per_page: u32) -> Result<Vec<BlogPostRecord>, RepoError> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let offset = (page - 1).saturating_mul(per_page);
        let query = CachedQuery::new(kinds::BLOG_POSTS)
            .params(json!({ "page": page, "per_page": per_page }));
        let repo = &self.repo;
        self.ctx
            .fetch(query, move || repo.list_published(per_page, offset))
            .await
    }

    pub async fn post(&self, slug: &str) -> Result<Option<BlogPostRecord>, RepoError> {
        let query = CachedQuery::new(kinds::BLOG_POST).params(json!({ "slug": slug }));
        let repo = &self.repo;
        self.ctx.fetch(query, move || repo.find_by_slug(slug)).await
    }

    pub async fn comments(&self, post_id: Uuid) -> Result<Vec<BlogCommentRecord>, RepoError> {
        let query = CachedQuery::new(kinds::BLOG_COMMENTS).params(json!({ "post_id": post_id }));
        let repo = &self.repo;
        self.ctx.fetch(query, move || repo.list_comments(post_id)).await
    }

    pub async fn moderation_queue(&self, limit: u32) -> Result<Vec<BlogCommentRecord>, RepoError> {
        let query =
            CachedQuery::new(kinds::BLOG_MODERATION_QUEUE).params(json!({ "limit": limit }));
        let repo = &self.repo;
        self.ctx
            .fetch(query, move || repo.moderation_queue(limit))
            .await
    }
}
