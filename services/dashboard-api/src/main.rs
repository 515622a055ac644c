//! Dashboard API Server
//!
//! Serves land use, vegetation, temperature, road and built-up layers for
//! the configured area of interest.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use dashboard_api::state::AppState;

/// Dashboard API Server
#[derive(Parser, Debug)]
#[command(name = "dashboard-api")]
#[command(about = "Urban layers dashboard server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8084", env = "DASHBOARD_LISTEN_ADDR")]
    listen: String,

    /// Configuration file
    #[arg(short, long, default_value = "config/dashboard.yaml", env = "DASHBOARD_CONFIG")]
    config: String,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Number of worker threads
    #[arg(long, env = "DASHBOARD_WORKER_THREADS")]
    worker_threads: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(run_server(args))
}

async fn run_server(args: Args) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    info!("Starting dashboard API server");

    let prometheus = match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Prometheus recorder unavailable, /metrics will be empty: {}", e);
            None
        }
    };

    // Backend authentication failure is fatal: report once and stop
    let state = match AppState::new(&args.config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize dashboard: {:#}", e);
            std::process::exit(1);
        }
    };
    let state = match prometheus {
        Some(handle) => state.with_prometheus(handle),
        None => state,
    };

    let app = dashboard_api::router(Arc::new(state));

    let addr: SocketAddr = args.listen.parse()?;
    info!("Dashboard API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
