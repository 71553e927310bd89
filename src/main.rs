//! Rebalancer: core-value rebalancing agent
//!
//! Entry point. Loads credentials, initialises structured logging, opens
//! the broker session, then runs one price reporter and one trading loop
//! per asset until Ctrl+C.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

use rebalancer::broker::rest::RestBroker;
use rebalancer::broker::Brokerage;
use rebalancer::config::{AppConfig, Credentials};
use rebalancer::engine;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let cfg = AppConfig::default();
    info!(
        assets = cfg.assets.len(),
        profit_target = %cfg.strategy.profit_target,
        dip_target = %cfg.strategy.dip_target,
        trade_interval_secs = cfg.trade_interval.as_secs(),
        "Rebalancer starting up"
    );
    for asset in &cfg.assets {
        info!(asset = %asset, "Tracking");
    }

    // -- Broker session (fatal on failure) -------------------------------

    let credentials = Credentials::from_env()?;
    let broker = RestBroker::new(credentials)?;
    broker.login().await?;
    let broker: Arc<dyn Brokerage> = Arc::new(broker);
    info!(broker = broker.name(), "Session established");

    // -- Loops -----------------------------------------------------------

    let (shutdown_tx, shutdown_rx) = engine::shutdown_channel();
    let handles = engine::spawn_all(&cfg, broker, shutdown_rx);
    info!(tasks = handles.len(), "All loops running. Press Ctrl+C to stop.");

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received."),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
        }
        let _ = shutdown_tx.send(true);
    });

    let panicked = engine::wait_all(handles).await;
    if panicked > 0 {
        error!(panicked, "Rebalancer stopped with failed loops");
    } else {
        info!("Rebalancer shut down cleanly.");
    }

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rebalancer=info"));

    if std::env::var("REBALANCER_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
