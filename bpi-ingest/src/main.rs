//! bpi-ingest - Microscopy dataset ingest service
//!
//! Imports BigPicture datasets from a mounted dataset root into the catalog
//! platform. Manual imports are triggered over HTTP; an optional background
//! scanner imports new files periodically.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bpi_common::config::IngestConfig;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bpi_ingest::services::AutoImportScanner;
use bpi_ingest::{AppState, IngestContext};

/// Command-line arguments for bpi-ingest
#[derive(Parser, Debug)]
#[command(name = "bpi-ingest")]
#[command(about = "Dataset ingest service for the BigPicture catalog")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "BPI_CONFIG")]
    config: Option<PathBuf>,

    /// Dataset root (overrides config and environment)
    #[arg(short, long)]
    dataset_path: Option<PathBuf>,

    /// HTTP listen address (overrides config and environment)
    #[arg(short, long)]
    listen_addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, source) =
        IngestConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dataset_path) = args.dataset_path {
        config.dataset_path = dataset_path;
    }
    if let Some(listen_addr) = args.listen_addr {
        config.listen_addr = listen_addr;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "bpi_ingest={level},bpi_common={level},tower_http=info",
                    level = config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    source.log();
    info!("Starting bpi-ingest v{}", env!("CARGO_PKG_VERSION"));
    info!("Dataset path: {}", config.dataset_path.display());
    info!("Upload root: {}", config.root.display());
    info!("Catalog host: {}", config.catalog.host);
    if config.catalog.public_key.is_none() || config.catalog.private_key.is_none() {
        warn!("Service account keys are not configured; imports will be rejected");
    }

    let config = Arc::new(config);
    let ctx = Arc::new(
        IngestContext::from_config(config.clone())
            .await
            .context("Failed to initialize ingest context")?,
    );

    let scanner = if config.enable_auto_import_scan {
        let handle = AutoImportScanner::new(ctx.clone()).spawn(CancellationToken::new());
        info!("Auto-import scanner enabled");
        Some(handle)
    } else {
        info!("Auto-import scanner disabled");
        None
    };

    let app = bpi_ingest::build_router(AppState::new(ctx));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;
    info!("Listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(scanner) = scanner {
        scanner.shutdown(config.shutdown_timeout()).await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
