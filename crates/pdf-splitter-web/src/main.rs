//! PDF Splitter Web - HTTP service for uploading PDFs and splitting them by page range.

mod helpers;
mod routes;
mod state;

use anyhow::{Context, Result};
use clap::Parser;
use pdf_splitter_core::AppConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use state::AppState;

/// Resolve the static files directory.
///
/// Priority:
/// 1. Explicit path from the command line or config file
/// 2. ./static if it exists
/// 3. None: API only
fn resolve_static_dir(explicit_path: Option<PathBuf>) -> Option<PathBuf> {
    if explicit_path.is_some() {
        return explicit_path;
    }

    let local_static = PathBuf::from("static");
    local_static.is_dir().then_some(local_static)
}

#[derive(Parser, Debug)]
#[command(name = "pdf-splitter-web")]
#[command(author, version, about = "PDF Splitter Web Server", long_about = None)]
struct Args {
    /// Host to bind to
    #[arg(long, env = "PDF_SPLITTER_HOST")]
    host: Option<String>,

    /// Port to bind to
    #[arg(short, long, env = "PDF_SPLITTER_PORT")]
    port: Option<u16>,

    /// Directory holding uploaded and composed documents
    #[arg(long, env = "PDF_SPLITTER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Config file path
    #[arg(short, long, env = "PDF_SPLITTER_CONFIG")]
    config: Option<PathBuf>,

    /// Static front-end directory (defaults to ./static when present)
    #[arg(long, env = "STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Allowed CORS origins, comma separated
    #[arg(long, env = "PDF_SPLITTER_CORS_ORIGINS", value_delimiter = ',')]
    cors_origin: Option<Vec<String>>,

    /// Maximum upload size in bytes
    #[arg(long, env = "PDF_SPLITTER_MAX_UPLOAD_BYTES")]
    max_upload_bytes: Option<u64>,

    /// Delete stored files older than this many seconds
    #[arg(long, env = "PDF_SPLITTER_MAX_AGE_SECS")]
    max_age_secs: Option<u64>,

    /// Seconds between retention sweeps
    #[arg(long, env = "PDF_SPLITTER_SWEEP_INTERVAL_SECS")]
    sweep_interval_secs: Option<u64>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Apply command line and environment overrides on top of file values.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.static_dir {
            config.server.static_dir = Some(dir.clone());
        }
        if let Some(origins) = &self.cors_origin {
            config.server.cors_origins.clone_from(origins);
        }
        if let Some(limit) = self.max_upload_bytes {
            config.ingest.max_upload_bytes = limit;
        }
        if let Some(age) = self.max_age_secs {
            config.retention.max_age_secs = age;
        }
        if let Some(interval) = self.sweep_interval_secs {
            config.retention.sweep_interval_secs = interval;
        }
    }
}

/// Sweep once now, then every `sweep_interval`.
fn spawn_retention_task(state: Arc<AppState>) {
    let period = state.splitter.config().retention.sweep_interval();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            // The first tick completes immediately.
            ticker.tick().await;
            match state.splitter.sweep().await {
                Ok(report) => debug!("Sweep finished: {:?}", report),
                Err(e) => warn!("Retention sweep failed: {}", e),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{default_level},tower_http=info")));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };
    args.apply(&mut config);

    let static_dir = resolve_static_dir(config.server.static_dir.clone());
    let cors_origins = config.server.cors_origins.clone();
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid bind address")?;

    let state = Arc::new(
        AppState::new(config)
            .await
            .context("Failed to initialize application state")?,
    );
    info!(
        "Storing documents under {}",
        state.splitter.store().root().display()
    );

    spawn_retention_task(Arc::clone(&state));

    let app = routes::router(state, static_dir.as_deref(), &cors_origins);

    info!("Starting server at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
