use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use uuid::Uuid;

/// Command-line arguments for the PostPilot binary.
#[derive(Debug, Parser)]
#[command(name = "postpilot", version, about = "PostPilot query cache operations")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "POSTPILOT_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Pre-populate the query cache before traffic arrives.
    Warmup(WarmupArgs),
    /// Print the cache health report as JSON.
    Health,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL", global = true)]
    pub database_url: Option<String>,

    /// Override the remote cache host.
    #[arg(long = "cache-remote-host", value_name = "HOST", global = true)]
    pub cache_remote_host: Option<String>,

    /// Fail instead of degrading when the remote cache tier is unusable.
    #[arg(
        long = "cache-remote-required",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_remote_required: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct WarmupArgs {
    /// Skip the shared (non per-user) entries.
    #[arg(long = "no-common", action = clap::ArgAction::SetTrue)]
    pub no_common: bool,

    /// Comma-separated user ids to warm.
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub users: Vec<Uuid>,

    /// Users per batch; defaults to `warmup.batch_size`.
    #[arg(long = "batch-size", value_name = "N")]
    pub batch_size: Option<usize>,

    /// Log at debug level.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}
