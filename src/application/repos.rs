//! Repository traits describing the read-side persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::cache::RetryClassify;
use crate::domain::entities::{
    AppSettingsRecord, BlogCommentRecord, BlogPostRecord, GenerationRecord, GenerationStatsRecord,
    HashtagSetRecord, HashtagTrendRecord, LicenseRecord, PlanRecord, PlatformAnalyticsRecord,
    RealtimeAnalyticsRecord, SecurityEventRecord, SessionRecord, SubscriptionRecord,
    UserDashboardRecord, UserProfileRecord, UserSettingsRecord,
};
use crate::domain::types::SocialPlatform;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("record violates foreign key constraint `{constraint}`")]
    ForeignKey { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl RetryClassify for RepoError {
    /// Constraint violations and bad input fail the same way every time.
    fn is_retryable(&self) -> bool {
        matches!(self, RepoError::Persistence(_) | RepoError::Timeout)
    }
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<UserProfileRecord>, RepoError>;

    async fn dashboard(&self, user_id: Uuid) -> Result<UserDashboardRecord, RepoError>;
}

#[async_trait]
pub trait GenerationsRepo: Send + Sync {
    async fn list_recent(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> Result<Vec<GenerationRecord>, RepoError>;

    async fn stats(&self, user_id: Uuid) -> Result<GenerationStatsRecord, RepoError>;

    async fn realtime(&self, user_id: Uuid) -> Result<RealtimeAnalyticsRecord, RepoError>;

    async fn platform_analytics(&self) -> Result<PlatformAnalyticsRecord, RepoError>;
}

#[async_trait]
pub trait BillingRepo: Send + Sync {
    async fn active_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<SubscriptionRecord>, RepoError>;

    async fn license(&self, user_id: Uuid) -> Result<Option<LicenseRecord>, RepoError>;

    async fn list_plans(&self) -> Result<Vec<PlanRecord>, RepoError>;
}

#[async_trait]
pub trait BlogRepo: Send + Sync {
    async fn list_published(&self, limit: u32, offset: u32)
    -> Result<Vec<BlogPostRecord>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<BlogPostRecord>, RepoError>;

    /// Approved comments of a post, oldest first.
    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<BlogCommentRecord>, RepoError>;

    /// Comments awaiting moderation, oldest first.
    async fn moderation_queue(&self, limit: u32) -> Result<Vec<BlogCommentRecord>, RepoError>;
}

#[async_trait]
pub trait SettingsRepo: Send + Sync {
    async fn user_settings(&self, user_id: Uuid)
    -> Result<Option<UserSettingsRecord>, RepoError>;

    async fn app_settings(&self) -> Result<AppSettingsRecord, RepoError>;
}

#[async_trait]
pub trait SecurityRepo: Send + Sync {
    async fn recent_events(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> Result<Vec<SecurityEventRecord>, RepoError>;

    async fn active_sessions(&self, user_id: Uuid) -> Result<Vec<SessionRecord>, RepoError>;
}

#[async_trait]
pub trait HashtagsRepo: Send + Sync {
    async fn trending(
        &self,
        platform: Option<SocialPlatform>,
        limit: u32,
    ) -> Result<Vec<HashtagTrendRecord>, RepoError>;

    async fn list_sets(&self, user_id: Uuid) -> Result<Vec<HashtagSetRecord>, RepoError>;
}
