//! Exposure API server binary.

use std::{env, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Result};
use clap::Parser;
use exposure_api::{
    app,
    cleanup::{CleanupConfig, CleanupTask},
    AppState,
};
use grid_scheduler::SchedulerConfig;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "exposure-api")]
#[command(about = "Tiled-grid environmental exposure simulation server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:5202")]
    listen: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of tokio worker threads (default: number of CPU cores)
    #[arg(long)]
    worker_threads: Option<usize>,

    /// GeoJSON file of building footprints with an `AGL` height property
    #[arg(long, env = "BUILDINGS_PATH")]
    buildings: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = SchedulerConfig::from_env();
    config
        .validate()
        .map_err(|e| anyhow!("invalid scheduler configuration: {}", e))?;

    // Blocking threads back the worker pool, so idle workers are released
    // after the configured timeout.
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder
        .enable_all()
        .thread_keep_alive(config.idle_timeout());

    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    } else if let Ok(threads_str) = env::var("TOKIO_WORKER_THREADS") {
        if let Ok(threads) = threads_str.parse::<usize>() {
            runtime_builder.worker_threads(threads);
        }
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(args, config))?;
    Ok(())
}

async fn async_main(args: Args, config: SchedulerConfig) -> Result<()> {
    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Initialize Prometheus metrics exporter
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    info!(
        max_workers = config.max_workers,
        cache_dir = %config.cache_dir.display(),
        workspace_dir = %config.workspace_dir.display(),
        "Starting exposure API server"
    );

    let state = Arc::new(AppState::with_reference_kernels(
        config,
        args.buildings.as_deref(),
    )?);

    tokio::spawn(CleanupTask::new(state.clone(), CleanupConfig::from_env()).run_forever());

    let app = app(state, prometheus_handle);

    // Parse listen address
    let addr: SocketAddr = args.listen.parse()?;
    info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
