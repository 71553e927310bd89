//! Price reporter.
//!
//! Logs the live price of one asset at a fixed interval. Quote failures
//! are logged and the loop carries on.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use super::pause;
use crate::broker::Brokerage;
use crate::types::AssetKind;

pub struct PriceReporter {
    symbol: String,
    kind: AssetKind,
    broker: Arc<dyn Brokerage>,
    interval: Duration,
}

impl PriceReporter {
    pub fn new(symbol: &str, kind: AssetKind, broker: Arc<dyn Brokerage>, interval: Duration) -> Self {
        Self {
            symbol: symbol.to_string(),
            kind,
            broker,
            interval,
        }
    }

    /// Fetch and log the current price once.
    pub async fn report_once(&self) -> Option<Decimal> {
        match self.broker.get_quote(&self.symbol, self.kind).await {
            Ok(price) => {
                info!(symbol = %self.symbol, kind = %self.kind, price = %price, "Current price");
                Some(price)
            }
            Err(e) => {
                error!(
                    symbol = %self.symbol,
                    operation = "quote",
                    error = format!("{e:#}"),
                    "Price fetch failed"
                );
                None
            }
        }
    }

    /// Report until shutdown. Returns the number of prices reported.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut reported = 0;
        loop {
            if self.report_once().await.is_some() {
                reported += 1;
            }
            if pause(self.interval, &mut shutdown).await {
                break;
            }
        }
        info!(symbol = %self.symbol, reported, "Price reporter stopped");
        reported
    }
}
