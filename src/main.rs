//! Steady GW - stability-gated state sync
//!
//! Polls an upstream key/value source and serves debounced state to overlay
//! clients over WebSocket.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use steady_gw::api::{self, ApiState};
use steady_gw::config::{AppConfig, ConfigOverrides};
use steady_gw::poller::Poller;
use steady_gw::source::{self, HttpSource};
use steady_gw::state::StateActorHandle;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Steady GW - debounce a polled key/value source into a live state stream
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Optional YAML configuration file
    #[arg(short, long, env = "STEADY_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    log_format: LogFormat,

    /// Also write JSON logs to a daily rolling file in this directory
    #[arg(long, env = "LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logging(&args.log_level, args.log_format, args.log_dir.as_deref())?;

    info!("Starting Steady GW v{}...", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::resolve(args.config.as_deref(), &args.overrides).await?;
    info!(
        source = %config.source_url,
        format = %config.format,
        poll_interval_ms = config.poll_interval_ms,
        stable_reads = config.stable_reads,
        "Configuration loaded"
    );

    run_app(config).await?;

    info!("Steady GW shutdown complete");
    Ok(())
}

async fn run_app(config: AppConfig) -> Result<()> {
    let state = StateActorHandle::spawn(config.stable_reads, config.broadcast_capacity);

    let http = HttpSource::new(config.source_url.clone(), config.fetch_timeout())?;
    let poller = Poller::new(
        Arc::new(http),
        source::decoder_for(config.format),
        state.clone(),
        config.poll_interval(),
    );

    let api_state = Arc::new(ApiState {
        state: state.clone(),
        poll_status: poller.status(),
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let poll_task = tokio::spawn(poller.run(shutdown_rx.clone()));

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let mut server_shutdown = shutdown_rx;
    let served = api::serve(api_state, config.port, async move {
        while !*server_shutdown.borrow_and_update() {
            if server_shutdown.changed().await.is_err() {
                break;
            }
        }
    })
    .await;

    // The server may have failed to bind; stop polling either way
    poll_task.abort();
    let _ = poll_task.await;
    state.shutdown();

    served
}

fn init_logging(level: &str, format: LogFormat, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (text_layer, json_layer) = match format {
        LogFormat::Text => (Some(fmt::layer().with_target(false)), None),
        LogFormat::Json => (None, Some(fmt::layer().json().with_target(false))),
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "steady-gw.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
