//! Core engine: per-asset price reporters and trading loops.
//!
//! Every loop is an independent tokio task. They share the broker handle
//! and a shutdown signal, nothing else.

pub mod reporter;
pub mod trader;

use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::broker::Brokerage;
use crate::config::AppConfig;
use reporter::PriceReporter;
use trader::TradingLoop;

/// Create the shutdown signal. Send `true` to stop every loop.
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Sleep for `delay` unless shutdown arrives first.
///
/// Returns `true` when the loop should stop. A dropped sender counts as
/// shutdown.
pub async fn pause(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        changed = shutdown.changed() => match changed {
            Ok(()) => *shutdown.borrow(),
            Err(_) => true,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    PriceReporter,
    Trading,
}

impl fmt::Display for LoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopKind::PriceReporter => write!(f, "price-reporter"),
            LoopKind::Trading => write!(f, "trading"),
        }
    }
}

/// A spawned loop task.
pub struct LoopHandle {
    pub symbol: String,
    pub kind: LoopKind,
    pub handle: JoinHandle<()>,
}

/// Spawn a price reporter and a trading loop for every configured asset.
pub fn spawn_all(
    config: &AppConfig,
    broker: Arc<dyn Brokerage>,
    shutdown: watch::Receiver<bool>,
) -> Vec<LoopHandle> {
    let mut handles = Vec::with_capacity(config.assets.len() * 2);

    for asset in &config.assets {
        info!(asset = %asset, "Spawning loops");

        let reporter = PriceReporter::new(
            &asset.symbol,
            asset.kind,
            Arc::clone(&broker),
            config.report_interval,
        );
        let rx = shutdown.clone();
        handles.push(LoopHandle {
            symbol: asset.symbol.clone(),
            kind: LoopKind::PriceReporter,
            handle: tokio::spawn(async move {
                reporter.run(rx).await;
            }),
        });

        let trader = TradingLoop::new(
            asset.clone(),
            Arc::clone(&broker),
            config.strategy.clone(),
            config.trade_interval,
        );
        let rx = shutdown.clone();
        handles.push(LoopHandle {
            symbol: asset.symbol.clone(),
            kind: LoopKind::Trading,
            handle: tokio::spawn(async move {
                trader.run(rx).await;
            }),
        });
    }

    handles
}

/// Wait for every loop to end and log how each one ended.
///
/// Returns the number of loops that panicked.
pub async fn wait_all(handles: Vec<LoopHandle>) -> usize {
    let (labels, tasks): (Vec<_>, Vec<_>) = handles
        .into_iter()
        .map(|h| ((h.symbol, h.kind), h.handle))
        .unzip();

    let mut panicked = 0;
    for ((symbol, kind), result) in labels.into_iter().zip(join_all(tasks).await) {
        match result {
            Ok(()) => info!(symbol = %symbol, kind = %kind, "Loop finished"),
            Err(e) if e.is_cancelled() => info!(symbol = %symbol, kind = %kind, "Loop cancelled"),
            Err(e) => {
                error!(symbol = %symbol, kind = %kind, error = %e, "Loop panicked");
                panicked += 1;
            }
        }
    }
    panicked
}
