//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::{CliArgs, Command, GlobalOverrides, WarmupArgs};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "postpilot";
const ENV_PREFIX: &str = "POSTPILOT";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CACHE_KEY_PREFIX: &str = "postpilot:cache:";
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_CACHE_MAX_MEMORY_ENTRIES: u64 = 10_000;
const DEFAULT_CACHE_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_REMOTE_PORT: u16 = 6379;
const DEFAULT_REMOTE_RETRY_DELAY_MS: u64 = 100;
const DEFAULT_REMOTE_MAX_RETRIES: u32 = 3;
const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_REMOTE_POOL_SIZE: u64 = 8;
const DEFAULT_SLOW_QUERY_MS: u64 = 1_000;
const DEFAULT_SAMPLE_CAPACITY: u64 = 100;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 100;
const DEFAULT_WARMUP_BATCH_SIZE: u64 = 10;
const DEFAULT_WARMUP_CONCURRENCY: u64 = 5;

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub monitor: MonitorSettings,
    pub retry: RetrySettings,
    pub warmup: WarmupSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub key_prefix: String,
    pub default_ttl: Duration,
    pub max_memory_entries: NonZeroUsize,
    pub sweep_interval: Duration,
    pub remote_required: bool,
    /// Present only when `cache.remote.host` is set.
    pub remote: Option<RemoteSettings>,
}

#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
    pub retry_delay: Duration,
    pub max_retries: u32,
    pub lazy_connect: bool,
    pub timeout: Duration,
    pub pool_size: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub slow_query: Duration,
    pub sample_capacity: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_attempts: NonZeroU32,
    pub base_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct WarmupSettings {
    pub batch_size: NonZeroUsize,
    pub concurrency: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_global_overrides(&cli.overrides);
    if let Command::Warmup(args) = &cli.command {
        raw.apply_warmup_overrides(args);
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    monitor: RawMonitorSettings,
    retry: RawRetrySettings,
    warmup: RawWarmupSettings,
}

impl RawSettings {
    fn apply_global_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(host) = overrides.cache_remote_host.as_ref() {
            self.cache.remote.host = Some(host.clone());
        }
        if let Some(required) = overrides.cache_remote_required {
            self.cache.remote_required = Some(required);
        }
    }

    fn apply_warmup_overrides(&mut self, args: &WarmupArgs) {
        if let Some(batch_size) = args.batch_size {
            self.warmup.batch_size = Some(batch_size as u64);
        }
        if args.verbose {
            self.logging.level = Some("debug".to_string());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            cache,
            monitor,
            retry,
            warmup,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let cache = build_cache_settings(cache)?;
        let monitor = build_monitor_settings(monitor)?;
        let retry = build_retry_settings(retry)?;
        let warmup = build_warmup_settings(warmup)?;

        Ok(Self {
            logging,
            database,
            cache,
            monitor,
            retry,
            warmup,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let key_prefix = cache
        .key_prefix
        .unwrap_or_else(|| DEFAULT_CACHE_KEY_PREFIX.to_string());
    if key_prefix.trim().is_empty() {
        return Err(LoadError::invalid(
            "cache.key_prefix",
            "prefix must not be empty",
        ));
    }

    let default_ttl = positive_secs(
        cache.default_ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS),
        "cache.default_ttl_seconds",
    )?;
    let max_memory_entries = non_zero_usize(
        cache
            .max_memory_entries
            .unwrap_or(DEFAULT_CACHE_MAX_MEMORY_ENTRIES),
        "cache.max_memory_entries",
    )?;
    let sweep_interval = positive_secs(
        cache
            .sweep_interval_seconds
            .unwrap_or(DEFAULT_CACHE_SWEEP_INTERVAL_SECS),
        "cache.sweep_interval_seconds",
    )?;
    let remote = build_remote_settings(cache.remote)?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        key_prefix,
        default_ttl,
        max_memory_entries,
        sweep_interval,
        remote_required: cache.remote_required.unwrap_or(false),
        remote,
    })
}

fn build_remote_settings(remote: RawRemoteSettings) -> Result<Option<RemoteSettings>, LoadError> {
    let Some(host) = non_blank(remote.host) else {
        return Ok(None);
    };

    let port = remote.port.unwrap_or(DEFAULT_REMOTE_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "cache.remote.port",
            "must be greater than zero",
        ));
    }
    let db = remote.db.unwrap_or(0);
    if db < 0 {
        return Err(LoadError::invalid("cache.remote.db", "must not be negative"));
    }

    let timeout = positive_millis(
        remote.timeout_ms.unwrap_or(DEFAULT_REMOTE_TIMEOUT_MS),
        "cache.remote.timeout_ms",
    )?;
    let pool_size = non_zero_usize(
        remote.pool_size.unwrap_or(DEFAULT_REMOTE_POOL_SIZE),
        "cache.remote.pool_size",
    )?;

    Ok(Some(RemoteSettings {
        host,
        port,
        password: non_blank(remote.password),
        db,
        retry_delay: Duration::from_millis(
            remote
                .retry_delay_ms
                .unwrap_or(DEFAULT_REMOTE_RETRY_DELAY_MS),
        ),
        max_retries: remote.max_retries.unwrap_or(DEFAULT_REMOTE_MAX_RETRIES),
        lazy_connect: remote.lazy_connect.unwrap_or(false),
        timeout,
        pool_size,
    }))
}

fn build_monitor_settings(monitor: RawMonitorSettings) -> Result<MonitorSettings, LoadError> {
    let slow_query = positive_millis(
        monitor.slow_query_ms.unwrap_or(DEFAULT_SLOW_QUERY_MS),
        "monitor.slow_query_ms",
    )?;
    let sample_capacity = non_zero_usize(
        monitor.sample_capacity.unwrap_or(DEFAULT_SAMPLE_CAPACITY),
        "monitor.sample_capacity",
    )?;

    Ok(MonitorSettings {
        slow_query,
        sample_capacity,
    })
}

fn build_retry_settings(retry: RawRetrySettings) -> Result<RetrySettings, LoadError> {
    let max_attempts = non_zero_u32(
        retry
            .max_attempts
            .unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS)
            .into(),
        "retry.max_attempts",
    )?;

    Ok(RetrySettings {
        max_attempts,
        base_delay: Duration::from_millis(
            retry.base_delay_ms.unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS),
        ),
    })
}

fn build_warmup_settings(warmup: RawWarmupSettings) -> Result<WarmupSettings, LoadError> {
    Ok(WarmupSettings {
        batch_size: non_zero_usize(
            warmup.batch_size.unwrap_or(DEFAULT_WARMUP_BATCH_SIZE),
            "warmup.batch_size",
        )?,
        concurrency: non_zero_usize(
            warmup.concurrency.unwrap_or(DEFAULT_WARMUP_CONCURRENCY),
            "warmup.concurrency",
        )?,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    key_prefix: Option<String>,
    default_ttl_seconds: Option<u64>,
    max_memory_entries: Option<u64>,
    sweep_interval_seconds: Option<u64>,
    remote_required: Option<bool>,
    remote: RawRemoteSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRemoteSettings {
    host: Option<String>,
    port: Option<u16>,
    password: Option<String>,
    db: Option<i64>,
    retry_delay_ms: Option<u64>,
    max_retries: Option<u32>,
    lazy_connect: Option<bool>,
    timeout_ms: Option<u64>,
    pool_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMonitorSettings {
    slow_query_ms: Option<u64>,
    sample_capacity: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRetrySettings {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWarmupSettings {
    batch_size: Option<u64>,
    concurrency: Option<u64>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn positive_secs(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn positive_millis(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_millis(value))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
