//! Shared fakes for the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use postpilot::application::repos::{
    BillingRepo, BlogRepo, GenerationsRepo, HashtagsRepo, RepoError, SecurityRepo, SettingsRepo,
    UsersRepo,
};
use postpilot::cache::{RemoteError, RemoteTier, glob_matches};
use postpilot::domain::entities::{
    AppSettingsRecord, BlogCommentRecord, BlogPostRecord, GenerationRecord, GenerationStatsRecord,
    HashtagSetRecord, HashtagTrendRecord, LicenseRecord, PlanRecord, PlatformAnalyticsRecord,
    RealtimeAnalyticsRecord, SecurityEventRecord, SessionRecord, SubscriptionRecord,
    UserDashboardRecord, UserProfileRecord, UserSettingsRecord,
};
use postpilot::domain::types::{GenerationKind, SocialPlatform};
use time::OffsetDateTime;
use uuid::Uuid;

/// In-memory remote tier that can be switched off to simulate an outage.
#[derive(Default)]
pub struct MemoryRemote {
    values: Mutex<HashMap<String, String>>,
    down: AtomicBool,
}

impl MemoryRemote {
    pub fn unreachable() -> Self {
        let remote = Self::default();
        remote.set_down(true);
        remote
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.values.lock().expect("remote map").len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.lock().expect("remote map").contains_key(key)
    }

    fn check(&self) -> Result<(), RemoteError> {
        if self.down.load(Ordering::SeqCst) {
            Err(RemoteError::connection("connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteTier for MemoryRemote {
    async fn get(&self, key: &str) -> Result<Option<String>, RemoteError> {
        self.check()?;
        Ok(self.values.lock().expect("remote map").get(key).cloned())
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        _ttl_secs: u64,
        value: &str,
    ) -> Result<(), RemoteError> {
        self.check()?;
        self.values
            .lock()
            .expect("remote map")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, RemoteError> {
        self.check()?;
        let mut values = self.values.lock().expect("remote map");
        Ok(keys.iter().filter(|key| values.remove(*key).is_some()).count() as u64)
    }

    async fn keys_by_pattern(&self, pattern: &str) -> Result<Vec<String>, RemoteError> {
        self.check()?;
        Ok(self
            .values
            .lock()
            .expect("remote map")
            .keys()
            .filter(|key| glob_matches(pattern, key))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), RemoteError> {
        self.check()
    }

    async fn close(&self) {}
}

/// Repository fake serving canned records and counting calls per method.
#[derive(Default)]
pub struct FakeRepos {
    calls: Mutex<HashMap<&'static str, usize>>,
    failing_users: HashSet<Uuid>,
}

impl FakeRepos {
    /// Every per-user call for `users` fails with a non-retryable error.
    pub fn failing_for(users: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            failing_users: users.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls
            .lock()
            .expect("call map")
            .get(method)
            .copied()
            .unwrap_or(0)
    }

    fn record(&self, method: &'static str) {
        *self.calls.lock().expect("call map").entry(method).or_default() += 1;
    }

    fn check_user(&self, method: &'static str, user_id: Uuid) -> Result<(), RepoError> {
        self.record(method);
        if self.failing_users.contains(&user_id) {
            return Err(RepoError::Integrity {
                message: format!("user {user_id} is corrupt"),
            });
        }
        Ok(())
    }
}

fn epoch() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH
}

#[async_trait]
impl UsersRepo for FakeRepos {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<UserProfileRecord>, RepoError> {
        self.check_user("find_profile", user_id)?;
        Ok(Some(UserProfileRecord {
            id: user_id,
            email: format!("{user_id}@example.com"),
            display_name: "Test User".to_string(),
            avatar_url: None,
            created_at: epoch(),
            last_login_at: None,
        }))
    }

    async fn dashboard(&self, user_id: Uuid) -> Result<UserDashboardRecord, RepoError> {
        self.check_user("dashboard", user_id)?;
        Ok(UserDashboardRecord {
            user_id,
            total_generations: 12,
            generations_this_month: 3,
            credits_remaining: 40,
            plan_name: Some("Pro".to_string()),
        })
    }
}

#[async_trait]
impl GenerationsRepo for FakeRepos {
    async fn list_recent(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> Result<Vec<GenerationRecord>, RepoError> {
        self.check_user("list_recent", user_id)?;
        Ok((0..limit.min(2))
            .map(|n| GenerationRecord {
                id: Uuid::from_u128(u128::from(n) + 1),
                user_id,
                kind: GenerationKind::HashtagGenerator,
                platform: Some(SocialPlatform::Instagram),
                input: format!("prompt {n}"),
                output: format!("caption {n}"),
                created_at: epoch(),
            })
            .collect())
    }

    async fn stats(&self, user_id: Uuid) -> Result<GenerationStatsRecord, RepoError> {
        self.check_user("stats", user_id)?;
        Ok(GenerationStatsRecord {
            total: 12,
            last_30_days: 3,
            last_generated_at: Some(epoch()),
        })
    }

    async fn realtime(&self, user_id: Uuid) -> Result<RealtimeAnalyticsRecord, RepoError> {
        self.check_user("realtime", user_id)?;
        Ok(RealtimeAnalyticsRecord {
            generations_last_hour: 1,
            generations_today: 2,
        })
    }

    async fn platform_analytics(&self) -> Result<PlatformAnalyticsRecord, RepoError> {
        self.record("platform_analytics");
        Ok(PlatformAnalyticsRecord {
            total_users: 100,
            active_users_30d: 40,
            total_generations: 5_000,
            generations_today: 70,
        })
    }
}

#[async_trait]
impl BillingRepo for FakeRepos {
    async fn active_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<SubscriptionRecord>, RepoError> {
        self.check_user("active_subscription", user_id)?;
        Ok(None)
    }

    async fn license(&self, user_id: Uuid) -> Result<Option<LicenseRecord>, RepoError> {
        self.check_user("license", user_id)?;
        Ok(None)
    }

    async fn list_plans(&self) -> Result<Vec<PlanRecord>, RepoError> {
        self.record("list_plans");
        Ok(vec![PlanRecord {
            id: Uuid::from_u128(7),
            name: "Pro".to_string(),
            price_cents: 1_900,
            monthly_credits: 500,
            features: vec!["scheduling".to_string()],
        }])
    }
}

#[async_trait]
impl BlogRepo for FakeRepos {
    async fn list_published(
        &self,
        _limit: u32,
        _offset: u32,
    ) -> Result<Vec<BlogPostRecord>, RepoError> {
        self.record("list_published");
        Ok(Vec::new())
    }

    async fn find_by_slug(&self, _slug: &str) -> Result<Option<BlogPostRecord>, RepoError> {
        self.record("find_by_slug");
        Ok(None)
    }

    async fn list_comments(&self, _post_id: Uuid) -> Result<Vec<BlogCommentRecord>, RepoError> {
        self.record("list_comments");
        Ok(Vec::new())
    }

    async fn moderation_queue(&self, _limit: u32) -> Result<Vec<BlogCommentRecord>, RepoError> {
        self.record("moderation_queue");
        Ok(Vec::new())
    }
}

#[async_trait]
impl SettingsRepo for FakeRepos {
    async fn user_settings(
        &self,
        user_id: Uuid,
    ) -> Result<Option<UserSettingsRecord>, RepoError> {
        self.check_user("user_settings", user_id)?;
        Ok(Some(UserSettingsRecord {
            user_id,
            timezone: "UTC".to_string(),
            locale: "en".to_string(),
            email_notifications: true,
            default_platform: None,
            updated_at: epoch(),
        }))
    }

    async fn app_settings(&self) -> Result<AppSettingsRecord, RepoError> {
        self.record("app_settings");
        Ok(AppSettingsRecord {
            maintenance_mode: false,
            signups_enabled: true,
            free_monthly_credits: 20,
            updated_at: epoch(),
        })
    }
}

#[async_trait]
impl SecurityRepo for FakeRepos {
    async fn recent_events(
        &self,
        user_id: Uuid,
        _limit: u32,
    ) -> Result<Vec<SecurityEventRecord>, RepoError> {
        self.check_user("recent_events", user_id)?;
        Ok(Vec::new())
    }

    async fn active_sessions(&self, user_id: Uuid) -> Result<Vec<SessionRecord>, RepoError> {
        self.check_user("active_sessions", user_id)?;
        Ok(Vec::new())
    }
}

#[async_trait]
impl HashtagsRepo for FakeRepos {
    async fn trending(
        &self,
        platform: Option<SocialPlatform>,
        _limit: u32,
    ) -> Result<Vec<HashtagTrendRecord>, RepoError> {
        self.record("trending");
        Ok(vec![HashtagTrendRecord {
            hashtag: "#launch".to_string(),
            platform: platform.unwrap_or(SocialPlatform::Twitter),
            uses: 42,
        }])
    }

    async fn list_sets(&self, user_id: Uuid) -> Result<Vec<HashtagSetRecord>, RepoError> {
        self.check_user("list_sets", user_id)?;
        Ok(Vec::new())
    }
}
