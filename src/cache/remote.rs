//! Remote key/value tier.
//!
//! The store only needs a handful of operations, expressed by
//! [`RemoteTier`]. [`RedisTier`] implements them over a pooled Redis
//! connection; every call is bounded by the configured timeout and a
//! timeout is reported like any other remote failure.
//!
//! Key patterns use `*` as the only wildcard, matching the in-process
//! index. Characters Redis would also treat as glob syntax are escaped
//! before a pattern is sent.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config as PoolSettings, Pool, PoolConfig, Runtime};
use redis::AsyncCommands;
use tracing::{debug, info};

use super::config::RemoteConfig;
use super::error::RemoteError;

/// Operations the cache store consumes from a remote tier. Values are JSON
/// text.
#[async_trait]
pub trait RemoteTier: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, RemoteError>;
    async fn set_with_expiry(&self, key: &str, ttl_secs: u64, value: &str)
    -> Result<(), RemoteError>;
    /// Delete `keys`, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64, RemoteError>;
    async fn keys_by_pattern(&self, pattern: &str) -> Result<Vec<String>, RemoteError>;
    async fn ping(&self) -> Result<(), RemoteError>;
    async fn close(&self);
    /// Remove every key under the namespace prefix.
    async fn flush_prefix(&self, prefix: &str) -> Result<u64, RemoteError> {
        let keys = self.keys_by_pattern(&format!("{prefix}*")).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        self.delete(&keys).await
    }
}

/// Redis-backed remote tier.
pub struct RedisTier {
    pool: Pool,
    timeout: Duration,
    retry_delay: Duration,
    max_retries: u32,
}

impl RedisTier {
    /// Build the connection pool. No connection is opened until first use.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let url = config.url().map_err(RemoteError::connection)?;

        let mut pool_config = PoolConfig::new(config.pool_size.max(1));
        pool_config.timeouts.wait = Some(config.timeout);
        pool_config.timeouts.create = Some(config.timeout);
        pool_config.timeouts.recycle = Some(config.timeout);

        let mut settings = PoolSettings::from_url(url.as_str());
        settings.pool = Some(pool_config);

        let pool = settings
            .create_pool(Some(Runtime::Tokio1))
            .map_err(RemoteError::connection)?;

        info!(host = %config.host, port = config.port, db = config.db, "Remote cache tier configured");

        Ok(Self {
            pool,
            timeout: config.timeout,
            retry_delay: config.retry_delay,
            max_retries: config.max_retries,
        })
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, RemoteError> {
        let mut delay = self.retry_delay;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.pool.get().await {
                Ok(conn) => return Ok(conn),
                Err(err) if attempt > self.max_retries => {
                    return Err(RemoteError::connection(err));
                }
                Err(err) => {
                    debug!(attempt, error = %err, delay_ms = delay.as_millis() as u64, "Remote cache connection failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, RemoteError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout {
                op,
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl RemoteTier for RedisTier {
    async fn get(&self, key: &str) -> Result<Option<String>, RemoteError> {
        self.bounded("get", async {
            let mut conn = self.connection().await?;
            let value: Option<String> = conn.get(key).await?;
            Ok(value)
        })
        .await
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        ttl_secs: u64,
        value: &str,
    ) -> Result<(), RemoteError> {
        self.bounded("set", async {
            let mut conn = self.connection().await?;
            conn.set_ex::<_, _, ()>(key, value, ttl_secs.max(1)).await?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, RemoteError> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.bounded("delete", async {
            let mut conn = self.connection().await?;
            let removed: u64 = conn.del(keys).await?;
            Ok(removed)
        })
        .await
    }

    async fn keys_by_pattern(&self, pattern: &str) -> Result<Vec<String>, RemoteError> {
        let pattern = redis_glob(pattern);
        self.bounded("scan", async {
            let mut conn = self.connection().await?;
            let mut iter = conn.scan_match::<_, String>(pattern.as_str()).await?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            Ok(keys)
        })
        .await
    }

    async fn ping(&self) -> Result<(), RemoteError> {
        self.bounded("ping", async {
            let mut conn = self.connection().await?;
            let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
            if pong.eq_ignore_ascii_case("PONG") {
                Ok(())
            } else {
                Err(RemoteError::protocol(format!("unexpected PING reply `{pong}`")))
            }
        })
        .await
    }

    async fn close(&self) {
        self.pool.close();
        info!("Remote cache pool closed");
    }
}

/// Escape Redis glob syntax other than `*`.
fn redis_glob(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for ch in pattern.chars() {
        if matches!(ch, '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
