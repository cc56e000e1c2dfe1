//! Read models returned by the query layer.
//!
//! Everything here is cached as JSON, so each record round-trips through
//! serde.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{
    CommentStatus, GenerationKind, LicenseStatus, SecurityEventType, SocialPlatform,
    SubscriptionStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfileRecord {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub created_at: OffsetDateTime,
    pub last_login_at: Option<OffsetDateTime>,
}

/// Per-user dashboard summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserDashboardRecord {
    pub user_id: Uuid,
    pub total_generations: i64,
    pub generations_this_month: i64,
    pub credits_remaining: i64,
    pub plan_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GenerationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: GenerationKind,
    pub platform: Option<SocialPlatform>,
    pub input: String,
    pub output: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GenerationStatsRecord {
    pub total: i64,
    pub last_30_days: i64,
    pub last_generated_at: Option<OffsetDateTime>,
}

/// Live usage for one user over short windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RealtimeAnalyticsRecord {
    pub generations_last_hour: i64,
    pub generations_today: i64,
}

/// Platform-wide usage for the admin console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlatformAnalyticsRecord {
    pub total_users: i64,
    pub active_users_30d: i64,
    pub total_generations: i64,
    pub generations_today: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubscriptionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub plan_name: String,
    pub status: SubscriptionStatus,
    pub current_period_end: OffsetDateTime,
    pub cancel_at_period_end: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LicenseRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub license_key: String,
    pub status: LicenseStatus,
    pub seats: i32,
    pub expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlanRecord {
    pub id: Uuid,
    pub name: String,
    pub price_cents: i64,
    pub monthly_credits: i64,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlogPostRecord {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub body_markdown: String,
    pub published_at: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlogCommentRecord {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_name: String,
    pub body: String,
    pub status: CommentStatus,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSettingsRecord {
    pub user_id: Uuid,
    pub timezone: String,
    pub locale: String,
    pub email_notifications: bool,
    pub default_platform: Option<SocialPlatform>,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AppSettingsRecord {
    pub maintenance_mode: bool,
    pub signups_enabled: bool,
    pub free_monthly_credits: i64,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SecurityEventRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_type: SecurityEventType,
    pub ip_address: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub last_seen_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct HashtagTrendRecord {
    pub hashtag: String,
    pub platform: SocialPlatform,
    pub uses: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct HashtagSetRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub platform: SocialPlatform,
    pub hashtags: Vec<String>,
    pub created_at: OffsetDateTime,
}
