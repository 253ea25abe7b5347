//! Guardrail Daemon
//!
//! Serves the guardrail over HTTP.

use prompt_guardrail::{server, Config, Guardrail};

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Guardrail Daemon
#[derive(Parser, Debug)]
#[command(name = "guardrail")]
#[command(about = "Pre-execution guardrail for natural-language data-access requests")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "GUARDRAIL_CONFIG")]
    config: Option<PathBuf>,

    /// Policy table file to load instead of the reference table
    #[arg(short = 'f', long, env = "GUARDRAIL_POLICY_FILE")]
    policy_file: Option<PathBuf>,

    /// Extraction lexicon file to load instead of the reference lexicon
    #[arg(long, env = "GUARDRAIL_LEXICON_FILE")]
    lexicon_file: Option<PathBuf>,

    /// HTTP server port
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Log level or filter directive
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON log format
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Disable the decision cache
    #[arg(long)]
    no_cache: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting Guardrail Daemon v{}", prompt_guardrail::VERSION);

    // Load configuration
    let mut config = match args.config {
        Some(ref path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => Config::from_env().context("Failed to load configuration")?,
    };

    // Apply command line overrides
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(path) = args.policy_file {
        config.policy.policy_file = Some(path);
    }
    if let Some(path) = args.lexicon_file {
        config.policy.lexicon_file = Some(path);
    }
    if args.no_cache {
        config.cache.enabled = false;
    }

    if let Some(ref path) = config.policy.policy_file {
        info!("Loading policy table: {:?}", path);
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.host))?;

    let guardrail = Guardrail::builder()
        .with_config(config)
        .build()
        .context("Failed to initialize guardrail")?;

    info!("Loaded {} policies", guardrail.table().len());

    server::serve(Arc::new(guardrail), addr).await?;

    info!("Shutting down Guardrail Daemon");
    Ok(())
}

/// Initialize the logging system.
fn init_logging(level: &str, json_format: bool) -> anyhow::Result<()> {
    // RUST_LOG wins over --log-level
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).context("Invalid log filter")?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let result = if json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))
}
