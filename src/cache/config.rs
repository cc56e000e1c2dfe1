//! Cache configuration.
//!
//! Built from the `[cache]` section of the resolved settings.

use std::num::NonZeroUsize;
use std::time::Duration;

use url::Url;

const DEFAULT_KEY_PREFIX: &str = "postpilot:cache:";
const DEFAULT_TTL_SECS: u64 = 300;
const DEFAULT_MAX_MEMORY_ENTRIES: usize = 10_000;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_REMOTE_PORT: u16 = 6379;
const DEFAULT_REMOTE_RETRY_DELAY_MS: u64 = 100;
const DEFAULT_REMOTE_MAX_RETRIES: u32 = 3;
const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_REMOTE_POOL_SIZE: usize = 8;

/// Connection parameters for the remote key/value tier.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
    /// Initial delay between connection attempts; doubles per attempt.
    pub retry_delay: Duration,
    /// Connection attempts before the tier is reported down.
    pub max_retries: u32,
    /// Skip the connectivity probe during `init`.
    pub lazy_connect: bool,
    /// Upper bound for any single remote call.
    pub timeout: Duration,
    pub pool_size: usize,
}

impl RemoteConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_REMOTE_PORT,
            password: None,
            db: 0,
            retry_delay: Duration::from_millis(DEFAULT_REMOTE_RETRY_DELAY_MS),
            max_retries: DEFAULT_REMOTE_MAX_RETRIES,
            lazy_connect: false,
            timeout: Duration::from_millis(DEFAULT_REMOTE_TIMEOUT_MS),
            pool_size: DEFAULT_REMOTE_POOL_SIZE,
        }
    }

    /// Connection URL in `redis://[:password@]host:port/db` form.
    pub fn url(&self) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("redis://{}:{}/{}", self.host, self.port, self.db))?;
        if let Some(password) = self.password.as_deref() {
            // Only fails for cannot-be-a-base URLs, which `redis://host` is not.
            let _ = url.set_password(Some(password));
        }
        Ok(url)
    }
}

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Disabled caches are replaced by a passthrough implementation.
    pub enabled: bool,
    /// Namespace prepended to every key, local and remote.
    pub key_prefix: String,
    /// TTL used when neither the caller nor the strategy table supplies one.
    pub default_ttl: Duration,
    /// Ceiling for the in-process tier; LRU eviction beyond it.
    pub max_memory_entries: usize,
    /// Interval of the background expiry sweep.
    pub sweep_interval: Duration,
    /// Fail `init` instead of degrading when the remote tier is unusable.
    pub remote_required: bool,
    pub remote: Option<RemoteConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            max_memory_entries: DEFAULT_MAX_MEMORY_ENTRIES,
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            remote_required: false,
            remote: None,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        let remote = settings.remote.as_ref().map(|remote| RemoteConfig {
            host: remote.host.clone(),
            port: remote.port,
            password: remote.password.clone(),
            db: remote.db,
            retry_delay: remote.retry_delay,
            max_retries: remote.max_retries,
            lazy_connect: remote.lazy_connect,
            timeout: remote.timeout,
            pool_size: remote.pool_size.get(),
        });

        Self {
            enabled: settings.enabled,
            key_prefix: settings.key_prefix.clone(),
            default_ttl: settings.default_ttl,
            max_memory_entries: settings.max_memory_entries.get(),
            sweep_interval: settings.sweep_interval,
            remote_required: settings.remote_required,
            remote,
        }
    }
}

impl CacheConfig {
    /// Returns the memory ceiling as NonZeroUsize, clamping to 1 if zero.
    pub fn max_memory_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_memory_entries).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }
}
