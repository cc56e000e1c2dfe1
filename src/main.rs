use std::{process, sync::Arc};

use postpilot::{
    application::{catalog::QueryCatalog, error::AppError, queries::QueryContext},
    cache::{
        CacheConfig, CacheHealth, CacheStats, CacheStore, CacheWarmer, QueryCache,
        QueryCacheFacade, QueryMonitor, QueryStats, RedisTier, RemoteTier, RetryPolicy,
        WarmupPlan, WarmupReport,
    },
    config,
    infra::{db::PostgresRepositories, error::InfraError, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?error.chain(), "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?error.chain(), "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Warmup(args) => run_warmup(settings, args).await,
        config::Command::Health => run_health(settings).await,
    }
}

async fn run_warmup(settings: config::Settings, args: config::WarmupArgs) -> Result<(), AppError> {
    if !settings.cache.enabled {
        return Err(AppError::validation(
            "warmup requires cache.enabled = true",
        ));
    }

    let store = init_store(&settings).await?;
    let repositories = init_repositories(&settings).await?;

    let monitor = Arc::new(QueryMonitor::new(
        settings.monitor.sample_capacity.get(),
        settings.monitor.slow_query,
    ));
    let cache: Arc<dyn QueryCache> = store.clone();
    let facade = QueryCacheFacade::new(cache, store.config().default_ttl)
        .with_monitor(monitor.clone());
    let retry = RetryPolicy::new(settings.retry.max_attempts.get(), settings.retry.base_delay);
    let catalog = QueryCatalog::new(repositories, QueryContext::new(facade, retry));

    let plan = WarmupPlan {
        common: !args.no_common,
        users: args.users,
        batch_size: settings.warmup.batch_size.get(),
        concurrency: settings.warmup.concurrency.get(),
    };

    info!(
        target = "postpilot::warmup",
        common = plan.common,
        users = plan.users.len(),
        batch_size = plan.batch_size,
        concurrency = plan.concurrency,
        "Starting cache warm-up"
    );

    let report = CacheWarmer::new(Arc::new(catalog)).run(&plan).await;
    let stats = store.stats();
    let health = store.health().await;

    print!(
        "{}",
        render_summary(&report, &stats, &health, &monitor.all_stats())
    );

    store.shutdown().await;
    info!(target = "postpilot::warmup", "Cache warm-up completed");
    Ok(())
}

async fn run_health(settings: config::Settings) -> Result<(), AppError> {
    let store = init_store(&settings).await?;
    let health = store.health().await;
    store.shutdown().await;

    let rendered = serde_json::to_string_pretty(&health)
        .map_err(|err| AppError::unexpected(format!("failed to encode health report: {err}")))?;
    println!("{rendered}");
    Ok(())
}

/// Build and initialize the store; a required but unusable remote tier is fatal.
async fn init_store(settings: &config::Settings) -> Result<Arc<CacheStore>, AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let remote = match cache_config.remote.as_ref() {
        Some(remote) => {
            let tier = RedisTier::new(remote).map_err(InfraError::from)?;
            Some(Arc::new(tier) as Arc<dyn RemoteTier>)
        }
        None => None,
    };

    let store = Arc::new(CacheStore::new(cache_config, remote));
    store.init().await?;
    Ok(store)
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::from)?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn render_summary(
    report: &WarmupReport,
    stats: &CacheStats,
    health: &CacheHealth,
    query_stats: &[(String, QueryStats)],
) -> String {
    let mut out = String::new();
    out.push_str("Cache warm-up summary\n");
    out.push_str(&format!(
        "  warmed:         {} ok, {} failed ({} total) in {:.2}s\n",
        report.succeeded,
        report.failed,
        report.total(),
        report.elapsed.as_secs_f64()
    ));
    out.push_str(&format!(
        "  hit rate:       {:.1}% ({} hits, {} misses)\n",
        stats.hit_rate() * 100.0,
        stats.hits,
        stats.misses
    ));
    out.push_str(&format!("  memory entries: {}\n", stats.memory_usage));
    out.push_str(&format!(
        "  health:         {} (remote {}, memory {})\n",
        if health.healthy { "healthy" } else { "unhealthy" },
        match (health.remote_configured, health.remote_up) {
            (false, _) => "not configured",
            (true, true) => "up",
            (true, false) => "down",
        },
        if health.memory_ok { "ok" } else { "at capacity" },
    ));

    if !query_stats.is_empty() {
        out.push_str("  query timings (ms):\n");
        for (kind, stat) in query_stats {
            out.push_str(&format!(
                "    {kind:<28} avg {:>8.2}  min {:>8.2}  max {:>8.2}  n={}\n",
                stat.avg, stat.min, stat.max, stat.count
            ));
        }
    }
    out
}
