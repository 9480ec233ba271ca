//! Prometheus exporter for XRay.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use xray_exporter_prometheus::{ExporterConfig, HttpServer, XrayCollector};

/// Prometheus exporter for XRay.
#[derive(Parser, Debug)]
#[command(name = "xray-exporter-prometheus")]
#[command(about = "Export XRay /debug/vars as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (YAML, or JSON5 with a .json5 extension).
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,

    /// HTTP listen address, e.g. 127.0.0.1:9099 (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error). Overrides config.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration; a broken or missing file means defaults
    let (mut config, config_error) = ExporterConfig::load_or_default(&args.config);

    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    xray_common::init_tracing(&config.logging)?;

    if let Some(e) = config_error {
        error!(
            path = %args.config.display(),
            error = %e,
            "Error loading config, using defaults"
        );
    }

    info!("Starting XRay Prometheus Exporter");

    let listen_addr: SocketAddr = match args.listen {
        Some(listen) => listen
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address {}: {}", listen, e))?,
        None => config.server.listen_addr()?,
    };

    info!(endpoint = %config.metrics.endpoint, "Registering metrics collector");
    let collector = Arc::new(XrayCollector::from_endpoint(config.metrics.endpoint.clone())?);

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_server = HttpServer::new(collector, listen_addr, config.server.path.clone());
    let mut http_task = tokio::spawn(async move { http_server.run(shutdown_rx).await });

    // Wait for shutdown signal, or for the server to die on its own
    tokio::select! {
        result = &mut http_task => {
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!("HTTP server error: {}", e);
                    Err(e)
                }
                Err(e) => Err(anyhow::anyhow!("HTTP server task failed: {}", e)),
            };
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    // Wait for the server to drain
    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    info!("Exporter stopped");
    Ok(())
}

/// Resolves on SIGTERM; never on platforms without it.
async fn terminate() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
    }
}
