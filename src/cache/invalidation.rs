//! Write-event driven cache invalidation.
//!
//! Every write path that changes data a cached read depends on must call
//! the [`Invalidator`]. Each [`InvalidationEvent`] maps to the tags it
//! purges plus key patterns that, given a scope, narrow the purge to one
//! tenant's entries. `{scope}` in a pattern is replaced by the scope id;
//! scoped patterns are skipped when no scope is given.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::backend::QueryCache;
use super::strategy;

const SCOPE_PLACEHOLDER: &str = "{scope}";

/// Domain write events that invalidate cached reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidationEvent {
    // Users
    UserCreated,
    UserUpdated,
    UserDeleted,

    // Generations
    GenerationCreated,
    GenerationDeleted,

    // Billing
    SubscriptionChanged,
    LicenseChanged,
    PlansUpdated,

    // Blog
    BlogPostPublished,
    BlogPostUpdated,
    BlogPostDeleted,
    CommentCreated,
    CommentModerated,

    // Settings
    UserSettingsUpdated,
    AppSettingsUpdated,

    // Security
    SecurityEventRecorded,
    SessionRevoked,

    // Hashtags
    HashtagSetSaved,
    TrendingHashtagsRefreshed,
}

/// Tags and key patterns purged by one event.
#[derive(Debug, Clone, Copy)]
pub struct InvalidationRule {
    pub tags: &'static [&'static str],
    pub patterns: &'static [&'static str],
}

impl InvalidationEvent {
    pub const ALL: [InvalidationEvent; 19] = [
        Self::UserCreated,
        Self::UserUpdated,
        Self::UserDeleted,
        Self::GenerationCreated,
        Self::GenerationDeleted,
        Self::SubscriptionChanged,
        Self::LicenseChanged,
        Self::PlansUpdated,
        Self::BlogPostPublished,
        Self::BlogPostUpdated,
        Self::BlogPostDeleted,
        Self::CommentCreated,
        Self::CommentModerated,
        Self::UserSettingsUpdated,
        Self::AppSettingsUpdated,
        Self::SecurityEventRecorded,
        Self::SessionRevoked,
        Self::HashtagSetSaved,
        Self::TrendingHashtagsRefreshed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::UserCreated => "user.created",
            Self::UserUpdated => "user.updated",
            Self::UserDeleted => "user.deleted",
            Self::GenerationCreated => "generation.created",
            Self::GenerationDeleted => "generation.deleted",
            Self::SubscriptionChanged => "billing.subscription_changed",
            Self::LicenseChanged => "billing.license_changed",
            Self::PlansUpdated => "billing.plans_updated",
            Self::BlogPostPublished => "blog.post_published",
            Self::BlogPostUpdated => "blog.post_updated",
            Self::BlogPostDeleted => "blog.post_deleted",
            Self::CommentCreated => "blog.comment_created",
            Self::CommentModerated => "blog.comment_moderated",
            Self::UserSettingsUpdated => "settings.user_updated",
            Self::AppSettingsUpdated => "settings.app_updated",
            Self::SecurityEventRecorded => "security.event_recorded",
            Self::SessionRevoked => "security.session_revoked",
            Self::HashtagSetSaved => "hashtag.set_saved",
            Self::TrendingHashtagsRefreshed => "hashtag.trending_refreshed",
        }
    }

    pub fn rule(self) -> InvalidationRule {
        let (tags, patterns): (&'static [&'static str], &'static [&'static str]) = match self {
            Self::UserCreated => (&["user", "platform"], &[]),
            Self::UserUpdated => (&["user"], &["user.*:{scope}:*"]),
            Self::UserDeleted => (
                &["user", "platform"],
                &["user.*:{scope}:*", "generation.*:{scope}:*", "settings.*:{scope}:*"],
            ),
            Self::GenerationCreated | Self::GenerationDeleted => (
                &["generation", "analytics", "platform"],
                &["generation.*:{scope}:*", "user.dashboard:{scope}:*"],
            ),
            Self::SubscriptionChanged => (
                &["billing", "subscription"],
                &["billing.*:{scope}:*", "user.dashboard:{scope}:*"],
            ),
            Self::LicenseChanged => (&["license"], &["billing.license:{scope}:*"]),
            Self::PlansUpdated => (&["plans"], &["billing.plans:*"]),
            Self::BlogPostPublished | Self::BlogPostUpdated | Self::BlogPostDeleted => {
                (&["blog"], &["blog.*"])
            }
            Self::CommentCreated => (&["comments"], &["blog.comments:*"]),
            Self::CommentModerated => (&["comments", "moderation"], &[]),
            Self::UserSettingsUpdated => (&["settings"], &["settings.user:{scope}:*"]),
            Self::AppSettingsUpdated => (&["app"], &["settings.app:*"]),
            Self::SecurityEventRecorded => (&["security"], &["security.*:{scope}:*"]),
            Self::SessionRevoked => (&["sessions"], &["security.sessions:{scope}:*"]),
            Self::HashtagSetSaved => (&["hashtag_sets"], &["hashtag.sets:{scope}:*"]),
            Self::TrendingHashtagsRefreshed => (&["trending"], &["hashtag.trending:*"]),
        };
        InvalidationRule { tags, patterns }
    }
}

impl fmt::Display for InvalidationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown invalidation event `{0}`")]
pub struct UnknownEvent(pub String);

impl FromStr for InvalidationEvent {
    type Err = UnknownEvent;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.name() == value)
            .ok_or_else(|| UnknownEvent(value.to_string()))
    }
}

/// Expand `patterns` for `scope`. Scoped patterns are dropped without one.
pub fn expand_patterns(patterns: &[&str], scope: Option<&str>) -> Vec<String> {
    patterns
        .iter()
        .filter_map(|pattern| match (pattern.contains(SCOPE_PLACEHOLDER), scope) {
            (false, _) => Some(pattern.to_string()),
            (true, Some(scope)) => Some(pattern.replace(SCOPE_PLACEHOLDER, scope)),
            (true, None) => None,
        })
        .collect()
}

fn owned_tags(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|tag| tag.to_string()).collect()
}

/// Purges cache entries in response to writes.
#[derive(Clone)]
pub struct Invalidator {
    cache: Arc<dyn QueryCache>,
}

impl Invalidator {
    pub fn new(cache: Arc<dyn QueryCache>) -> Self {
        Self { cache }
    }

    /// Purge everything `event` invalidates. Returns the number of entries
    /// removed.
    pub async fn invalidate_by_event(&self, event: InvalidationEvent, scope: Option<&str>) -> u64 {
        let rule = event.rule();
        let tags = owned_tags(rule.tags);
        let patterns = expand_patterns(rule.patterns, scope);

        let removed = self.cache.invalidate(&tags, &patterns).await;
        debug!(
            event = %event,
            scope = scope.unwrap_or("-"),
            tags = ?tags,
            patterns = ?patterns,
            removed,
            "Cache invalidated"
        );
        removed
    }

    /// Purge a query kind's strategy tags and invalidation patterns.
    pub async fn invalidate_query_kind(&self, kind: &str, scope: Option<&str>) -> u64 {
        let strategy = strategy::strategy_for(kind);
        let tags = strategy.tag_strings();
        let patterns = expand_patterns(strategy.invalidation_patterns, scope);
        let removed = self.cache.invalidate(&tags, &patterns).await;
        debug!(query_kind = %kind, removed, "Query kind invalidated");
        removed
    }

    pub async fn invalidate_user(&self, user_id: Uuid) -> u64 {
        self.scoped(InvalidationEvent::UserUpdated, user_id).await
    }

    pub async fn invalidate_generations(&self, user_id: Uuid) -> u64 {
        self.scoped(InvalidationEvent::GenerationCreated, user_id).await
    }

    pub async fn invalidate_billing(&self, user_id: Uuid) -> u64 {
        self.scoped(InvalidationEvent::SubscriptionChanged, user_id).await
    }

    pub async fn invalidate_blog(&self) -> u64 {
        self.invalidate_by_event(InvalidationEvent::BlogPostUpdated, None)
            .await
    }

    /// User settings when `user_id` is given, application settings otherwise.
    pub async fn invalidate_settings(&self, user_id: Option<Uuid>) -> u64 {
        match user_id {
            Some(user_id) => {
                self.scoped(InvalidationEvent::UserSettingsUpdated, user_id)
                    .await
            }
            None => {
                self.invalidate_by_event(InvalidationEvent::AppSettingsUpdated, None)
                    .await
            }
        }
    }

    pub async fn invalidate_security(&self, user_id: Uuid) -> u64 {
        self.scoped(InvalidationEvent::SecurityEventRecorded, user_id)
            .await
    }

    pub async fn invalidate_hashtags(&self, user_id: Uuid) -> u64 {
        self.scoped(InvalidationEvent::HashtagSetSaved, user_id).await
    }

    /// Flush the whole cache namespace.
    pub async fn invalidate_all(&self) {
        self.cache.clear().await;
        info!("All cached queries invalidated");
    }

    async fn scoped(&self, event: InvalidationEvent, user_id: Uuid) -> u64 {
        let scope = user_id.to_string();
        self.invalidate_by_event(event, Some(&scope)).await
    }
}
