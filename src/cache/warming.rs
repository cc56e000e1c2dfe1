//! Cache warm-up.
//!
//! Pre-executes the queries flagged for warm-up in the strategy table so
//! their results are resident before traffic arrives. Per-user warm-up runs
//! in batches with bounded fan-out; one user's failure never stops the
//! others.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use metrics::histogram;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::strategy::{self, WarmScope};

const METRIC_WARM_MS: &str = "postpilot_cache_warm_ms";

#[derive(Debug, Error)]
pub enum WarmError {
    #[error("no warm-up registered for query kind `{0}`")]
    UnsupportedKind(String),
    #[error("warming `{kind}` failed: {detail}")]
    Query { kind: String, detail: String },
}

/// Runs the cached accessor behind a query kind so its result is stored.
#[async_trait]
pub trait WarmupSource: Send + Sync {
    async fn warm_common_kind(&self, kind: &str) -> Result<(), WarmError>;
    async fn warm_user_kind(&self, kind: &str, user_id: Uuid) -> Result<(), WarmError>;
}

/// Aggregate outcome of a warm-up run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmupReport {
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl WarmupReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn merge(&mut self, other: WarmupReport) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.elapsed += other.elapsed;
    }
}

/// What a warm-up run covers.
#[derive(Debug, Clone)]
pub struct WarmupPlan {
    pub common: bool,
    pub users: Vec<Uuid>,
    pub batch_size: usize,
    pub concurrency: usize,
}

impl Default for WarmupPlan {
    fn default() -> Self {
        Self {
            common: true,
            users: Vec::new(),
            batch_size: 10,
            concurrency: 5,
        }
    }
}

pub struct CacheWarmer {
    source: Arc<dyn WarmupSource>,
}

impl CacheWarmer {
    pub fn new(source: Arc<dyn WarmupSource>) -> Self {
        Self { source }
    }

    /// Run `plan`: common entries first, then users in batches.
    pub async fn run(&self, plan: &WarmupPlan) -> WarmupReport {
        let mut report = WarmupReport::default();
        if plan.common {
            report.merge(self.warm_common().await);
        }
        if !plan.users.is_empty() {
            report.merge(
                self.warm_users(&plan.users, plan.batch_size, plan.concurrency)
                    .await,
            );
        }
        report
    }

    /// Warm every global kind flagged for warm-up, highest priority first.
    /// Each kind counts as one success or failure.
    pub async fn warm_common(&self) -> WarmupReport {
        let started = Instant::now();
        let mut report = WarmupReport::default();

        for kind in strategy::warmup_kinds(WarmScope::Global) {
            match self.source.warm_common_kind(kind).await {
                Ok(()) => {
                    debug!(query_kind = kind, "Warmed common query");
                    report.succeeded += 1;
                }
                Err(err) => {
                    warn!(query_kind = kind, error = %err, "Common warm-up failed");
                    report.failed += 1;
                }
            }
        }

        report.elapsed = started.elapsed();
        record_elapsed(report.elapsed);
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Common cache warm-up complete"
        );
        report
    }

    /// Warm every per-user kind for `user_id`, stopping at the first failure.
    pub async fn warm_user(&self, user_id: Uuid) -> Result<(), WarmError> {
        for kind in strategy::warmup_kinds(WarmScope::PerUser) {
            self.source.warm_user_kind(kind, user_id).await?;
        }
        Ok(())
    }

    /// Warm `user_ids` in batches of `batch_size`, at most `concurrency`
    /// users in flight. Each user counts as one success or failure.
    pub async fn warm_users(
        &self,
        user_ids: &[Uuid],
        batch_size: usize,
        concurrency: usize,
    ) -> WarmupReport {
        let started = Instant::now();
        let mut report = WarmupReport::default();
        let batch_size = batch_size.max(1);
        let concurrency = concurrency.max(1);
        let batches = user_ids.len().div_ceil(batch_size);

        for (index, batch) in user_ids.chunks(batch_size).enumerate() {
            let results: Vec<(Uuid, Result<(), WarmError>)> = stream::iter(batch.iter().copied())
                .map(|user_id| async move { (user_id, self.warm_user(user_id).await) })
                .buffer_unordered(concurrency)
                .collect()
                .await;

            for (user_id, result) in results {
                match result {
                    Ok(()) => report.succeeded += 1,
                    Err(err) => {
                        warn!(user_id = %user_id, error = %err, "User warm-up failed");
                        report.failed += 1;
                    }
                }
            }

            info!(
                batch = index + 1,
                batches,
                succeeded = report.succeeded,
                failed = report.failed,
                "Warm-up batch complete"
            );
        }

        report.elapsed = started.elapsed();
        record_elapsed(report.elapsed);
        report
    }
}

fn record_elapsed(elapsed: Duration) {
    histogram!(METRIC_WARM_MS).record(elapsed.as_secs_f64() * 1000.0);
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingSource {
        failing_users: HashSet<Uuid>,
        failing_kinds: HashSet<&'static str>,
        warmed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WarmupSource for RecordingSource {
        async fn warm_common_kind(&self, kind: &str) -> Result<(), WarmError> {
            if self.failing_kinds.contains(kind) {
                return Err(WarmError::Query {
                    kind: kind.to_string(),
                    detail: "boom".to_string(),
                });
            }
            self.warmed.lock().expect("warmed").push(kind.to_string());
            Ok(())
        }

        async fn warm_user_kind(&self, kind: &str, user_id: Uuid) -> Result<(), WarmError> {
            if self.failing_users.contains(&user_id) {
                return Err(WarmError::Query {
                    kind: kind.to_string(),
                    detail: "database unavailable".to_string(),
                });
            }
            self.warmed
                .lock()
                .expect("warmed")
                .push(format!("{kind}:{user_id}"));
            Ok(())
        }
    }

    #[tokio::test]
    async fn common_warmup_counts_each_kind() {
        let failing = strategy::warmup_kinds(WarmScope::Global)[0];
        let source = Arc::new(RecordingSource {
            failing_kinds: HashSet::from([failing]),
            ..Default::default()
        });
        let warmer = CacheWarmer::new(source.clone());

        let report = warmer.warm_common().await;
        let expected = strategy::warmup_kinds(WarmScope::Global).len();
        assert_eq!(report.total(), expected);
        assert_eq!(report.failed, 1);
        assert_eq!(source.warmed.lock().expect("warmed").len(), expected - 1);
    }

    #[tokio::test]
    async fn user_batches_continue_past_failures() {
        let users: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let source = Arc::new(RecordingSource {
            failing_users: HashSet::from([users[1], users[3]]),
            ..Default::default()
        });
        let warmer = CacheWarmer::new(source);

        let report = warmer.warm_users(&users, 2, 2).await;
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed, 2);
    }

    #[tokio::test]
    async fn plan_without_common_only_warms_users() {
        let source = Arc::new(RecordingSource::default());
        let warmer = CacheWarmer::new(source.clone());
        let user = Uuid::new_v4();

        let report = warmer
            .run(&WarmupPlan {
                common: false,
                users: vec![user],
                ..Default::default()
            })
            .await;
        assert_eq!(report.succeeded, 1);
        let warmed = source.warmed.lock().expect("warmed");
        assert!(warmed.iter().all(|entry| entry.ends_with(&user.to_string())));
        assert_eq!(warmed.len(), strategy::warmup_kinds(WarmScope::PerUser).len());
    }
}
