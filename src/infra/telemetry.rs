use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "postpilot_cache_hit_total",
            Unit::Count,
            "Total number of cache hits, labelled by the tier that served them."
        );
        describe_counter!(
            "postpilot_cache_miss_total",
            Unit::Count,
            "Total number of cache misses."
        );
        describe_counter!(
            "postpilot_cache_set_total",
            Unit::Count,
            "Total number of cache writes."
        );
        describe_counter!(
            "postpilot_cache_delete_total",
            Unit::Count,
            "Total number of entries removed by delete or invalidation."
        );
        describe_counter!(
            "postpilot_cache_evict_total",
            Unit::Count,
            "Total number of in-memory evictions, labelled by reason."
        );
        describe_counter!(
            "postpilot_cache_remote_error_total",
            Unit::Count,
            "Total number of failed remote-tier operations, labelled by operation."
        );
        describe_histogram!(
            "postpilot_query_duration_ms",
            Unit::Milliseconds,
            "Producer latency of cached queries in milliseconds."
        );
        describe_counter!(
            "postpilot_query_slow_total",
            Unit::Count,
            "Total number of queries slower than the configured threshold."
        );
        describe_histogram!(
            "postpilot_cache_warm_ms",
            Unit::Milliseconds,
            "Cache warm-up phase latency in milliseconds."
        );
    });
}
