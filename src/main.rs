//! tado-presence - Geofencing daemon for tado homes
//!
//! Polls the tado API for mobile device locations and keeps the home in
//! HOME mode while any tracked device is at home, AWAY otherwise.

mod cli;
mod config;
mod error;
mod journal;
mod models;
mod notify;
mod presence;
mod retry;
mod tado;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::notify::HealthcheckPinger;
use crate::presence::PresenceSyncer;
use crate::tado::{TadoApi, TadoClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tado_presence=info".into()),
        )
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting tado-presence...");

    // Load configuration
    let config = config::Config::load(cli.config.as_deref())?;
    tracing::info!("Configuration loaded");

    let api: Arc<dyn TadoApi> = Arc::new(TadoClient::new(&config.api)?);

    let healthcheck = match cli.healthcheck.clone() {
        Some(url) => {
            tracing::info!("Healthcheck pings enabled: {}", url);
            Some(HealthcheckPinger::new(url)?)
        }
        None => None,
    };

    // Initial login; gives up after the configured number of attempts
    let syncer = PresenceSyncer::connect(api, cli.credentials(), &config, healthcheck).await?;
    tracing::info!("Logged in as {}", cli.username);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received, finishing current cycle");
                let _ = shutdown_tx.send(());
            }
            Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    // A dropped sender means no signal handler, so keep running
    syncer
        .start(async move {
            if shutdown_rx.await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
