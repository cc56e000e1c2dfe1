//! Per-query-kind caching strategy table.
//!
//! Static, read-only after first access. Unknown kinds fall back to a
//! low-priority default so callers never have to handle a missing entry.

use std::collections::HashMap;
use std::time::Duration;

use once_cell::sync::Lazy;

/// Logical query kinds known to the strategy table.
pub mod kinds {
    pub const USER_PROFILE: &str = "user.profile";
    pub const USER_DASHBOARD: &str = "user.dashboard";
    pub const GENERATION_HISTORY: &str = "generation.history";
    pub const GENERATION_STATS: &str = "generation.stats";
    pub const ANALYTICS_REALTIME: &str = "analytics.realtime";
    pub const ANALYTICS_PLATFORM: &str = "analytics.platform";
    pub const BILLING_SUBSCRIPTION: &str = "billing.subscription";
    pub const BILLING_LICENSE: &str = "billing.license";
    pub const BILLING_PLANS: &str = "billing.plans";
    pub const BLOG_POSTS: &str = "blog.posts";
    pub const BLOG_POST: &str = "blog.post";
    pub const BLOG_COMMENTS: &str = "blog.comments";
    pub const BLOG_MODERATION_QUEUE: &str = "blog.moderation_queue";
    pub const SETTINGS_USER: &str = "settings.user";
    pub const SETTINGS_APP: &str = "settings.app";
    pub const SECURITY_EVENTS: &str = "security.events";
    pub const SECURITY_SESSIONS: &str = "security.sessions";
    pub const HASHTAG_TRENDING: &str = "hashtag.trending";
    pub const HASHTAG_SETS: &str = "hashtag.sets";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Whether a warm-up entry is shared or must be computed per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmScope {
    Global,
    PerUser,
}

#[derive(Debug, Clone)]
pub struct CacheStrategy {
    pub ttl: Duration,
    pub tags: &'static [&'static str],
    /// Key globs purged with the kind; `{scope}` is replaced by a tenant id.
    pub invalidation_patterns: &'static [&'static str],
    pub warmup: bool,
    pub priority: Priority,
    pub scope: WarmScope,
}

impl CacheStrategy {
    pub fn tag_strings(&self) -> Vec<String> {
        self.tags.iter().map(|tag| tag.to_string()).collect()
    }
}

const fn secs(value: u64) -> Duration {
    Duration::from_secs(value)
}

static DEFAULT_STRATEGY: CacheStrategy = CacheStrategy {
    ttl: secs(300),
    tags: &[],
    invalidation_patterns: &[],
    warmup: false,
    priority: Priority::Low,
    scope: WarmScope::Global,
};

static STRATEGIES: Lazy<HashMap<&'static str, CacheStrategy>> = Lazy::new(|| {
    use kinds::*;

    let table = [
        (
            USER_PROFILE,
            CacheStrategy {
                ttl: secs(600),
                tags: &["user"],
                invalidation_patterns: &["user.*:{scope}:*"],
                warmup: true,
                priority: Priority::High,
                scope: WarmScope::PerUser,
            },
        ),
        (
            USER_DASHBOARD,
            CacheStrategy {
                ttl: secs(120),
                tags: &["user", "generation", "analytics"],
                invalidation_patterns: &["user.dashboard:{scope}:*"],
                warmup: true,
                priority: Priority::High,
                scope: WarmScope::PerUser,
            },
        ),
        (
            GENERATION_HISTORY,
            CacheStrategy {
                ttl: secs(300),
                tags: &["generation"],
                invalidation_patterns: &["generation.*:{scope}:*"],
                warmup: true,
                priority: Priority::Medium,
                scope: WarmScope::PerUser,
            },
        ),
        (
            GENERATION_STATS,
            CacheStrategy {
                ttl: secs(300),
                tags: &["generation", "analytics"],
                invalidation_patterns: &["generation.stats:{scope}:*"],
                warmup: true,
                priority: Priority::Medium,
                scope: WarmScope::PerUser,
            },
        ),
        (
            ANALYTICS_REALTIME,
            CacheStrategy {
                ttl: secs(30),
                tags: &["analytics", "generation"],
                invalidation_patterns: &["analytics.*:{scope}:*"],
                warmup: false,
                priority: Priority::High,
                scope: WarmScope::PerUser,
            },
        ),
        (
            ANALYTICS_PLATFORM,
            CacheStrategy {
                ttl: secs(600),
                tags: &["analytics", "platform"],
                invalidation_patterns: &["analytics.platform:*"],
                warmup: true,
                priority: Priority::Medium,
                scope: WarmScope::Global,
            },
        ),
        (
            BILLING_SUBSCRIPTION,
            CacheStrategy {
                ttl: secs(900),
                tags: &["billing", "subscription"],
                invalidation_patterns: &["billing.*:{scope}:*"],
                warmup: true,
                priority: Priority::High,
                scope: WarmScope::PerUser,
            },
        ),
        (
            BILLING_LICENSE,
            CacheStrategy {
                ttl: secs(900),
                tags: &["billing", "license"],
                invalidation_patterns: &["billing.license:{scope}:*"],
                warmup: false,
                priority: Priority::Medium,
                scope: WarmScope::PerUser,
            },
        ),
        (
            BILLING_PLANS,
            CacheStrategy {
                ttl: secs(3600),
                tags: &["billing", "plans"],
                invalidation_patterns: &["billing.plans:*"],
                warmup: true,
                priority: Priority::Medium,
                scope: WarmScope::Global,
            },
        ),
        (
            BLOG_POSTS,
            CacheStrategy {
                ttl: secs(900),
                tags: &["blog"],
                invalidation_patterns: &["blog.*"],
                warmup: true,
                priority: Priority::Medium,
                scope: WarmScope::Global,
            },
        ),
        (
            BLOG_POST,
            CacheStrategy {
                ttl: secs(900),
                tags: &["blog"],
                invalidation_patterns: &["blog.post:*"],
                warmup: false,
                priority: Priority::Low,
                scope: WarmScope::Global,
            },
        ),
        (
            BLOG_COMMENTS,
            CacheStrategy {
                ttl: secs(120),
                tags: &["blog", "comments"],
                invalidation_patterns: &["blog.comments:*"],
                warmup: false,
                priority: Priority::Low,
                scope: WarmScope::Global,
            },
        ),
        (
            BLOG_MODERATION_QUEUE,
            CacheStrategy {
                ttl: secs(60),
                tags: &["comments", "moderation"],
                invalidation_patterns: &["blog.moderation_queue:*"],
                warmup: false,
                priority: Priority::Low,
                scope: WarmScope::Global,
            },
        ),
        (
            SETTINGS_USER,
            CacheStrategy {
                ttl: secs(1800),
                tags: &["settings"],
                invalidation_patterns: &["settings.user:{scope}:*"],
                warmup: true,
                priority: Priority::High,
                scope: WarmScope::PerUser,
            },
        ),
        (
            SETTINGS_APP,
            CacheStrategy {
                ttl: secs(1800),
                tags: &["settings", "app"],
                invalidation_patterns: &["settings.app:*"],
                warmup: true,
                priority: Priority::High,
                scope: WarmScope::Global,
            },
        ),
        (
            SECURITY_EVENTS,
            CacheStrategy {
                ttl: secs(60),
                tags: &["security"],
                invalidation_patterns: &["security.*:{scope}:*"],
                warmup: false,
                priority: Priority::Medium,
                scope: WarmScope::PerUser,
            },
        ),
        (
            SECURITY_SESSIONS,
            CacheStrategy {
                ttl: secs(60),
                tags: &["security", "sessions"],
                invalidation_patterns: &["security.sessions:{scope}:*"],
                warmup: false,
                priority: Priority::Medium,
                scope: WarmScope::PerUser,
            },
        ),
        (
            HASHTAG_TRENDING,
            CacheStrategy {
                ttl: secs(1800),
                tags: &["hashtag", "trending", "platform"],
                invalidation_patterns: &["hashtag.trending:*"],
                warmup: true,
                priority: Priority::Medium,
                scope: WarmScope::Global,
            },
        ),
        (
            HASHTAG_SETS,
            CacheStrategy {
                ttl: secs(600),
                tags: &["hashtag", "hashtag_sets"],
                invalidation_patterns: &["hashtag.sets:{scope}:*"],
                warmup: false,
                priority: Priority::Low,
                scope: WarmScope::PerUser,
            },
        ),
    ];

    table.into_iter().collect()
});

/// Strategy registered for `kind`, if any.
pub fn lookup(kind: &str) -> Option<&'static CacheStrategy> {
    STRATEGIES.get(kind)
}

/// Strategy for `kind`, falling back to the low-priority default.
pub fn strategy_for(kind: &str) -> &'static CacheStrategy {
    lookup(kind).unwrap_or(&DEFAULT_STRATEGY)
}

/// Kinds flagged for warm-up in `scope`, highest priority first.
pub fn warmup_kinds(scope: WarmScope) -> Vec<&'static str> {
    let mut selected: Vec<(&'static str, &CacheStrategy)> = STRATEGIES
        .iter()
        .filter(|(_, strategy)| strategy.warmup && strategy.scope == scope)
        .map(|(kind, strategy)| (*kind, strategy))
        .collect();
    selected.sort_by(|a, b| b.1.priority.cmp(&a.1.priority).then(a.0.cmp(b.0)));
    selected.into_iter().map(|(kind, _)| kind).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kind_falls_back_to_default() {
        assert!(lookup("nope.unknown").is_none());
        let strategy = strategy_for("nope.unknown");
        assert_eq!(strategy.priority, Priority::Low);
        assert!(!strategy.warmup);
        assert_eq!(strategy.ttl, Duration::from_secs(300));
    }

    #[test]
    fn ttls_follow_data_volatility() {
        assert_eq!(strategy_for(kinds::ANALYTICS_REALTIME).ttl, Duration::from_secs(30));
        assert_eq!(strategy_for(kinds::SETTINGS_USER).ttl, Duration::from_secs(1800));
        assert_eq!(strategy_for(kinds::BILLING_SUBSCRIPTION).ttl, Duration::from_secs(900));
    }

    #[test]
    fn warmup_kinds_are_sorted_by_priority() {
        let global = warmup_kinds(WarmScope::Global);
        assert!(global.contains(&kinds::SETTINGS_APP));
        assert!(!global.contains(&kinds::USER_PROFILE));
        assert_eq!(global.first(), Some(&kinds::SETTINGS_APP));

        let per_user = warmup_kinds(WarmScope::PerUser);
        assert!(per_user.contains(&kinds::USER_PROFILE));
        assert!(!per_user.contains(&kinds::ANALYTICS_REALTIME));
        let priorities: Vec<Priority> = per_user
            .iter()
            .map(|kind| strategy_for(kind).priority)
            .collect();
        assert!(priorities.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn scoped_patterns_carry_placeholder() {
        for kind in warmup_kinds(WarmScope::PerUser) {
            let strategy = strategy_for(kind);
            assert!(
                strategy
                    .invalidation_patterns
                    .iter()
                    .all(|pattern| pattern.contains("{scope}")),
                "{kind} patterns must be tenant scoped"
            );
        }
    }
}
