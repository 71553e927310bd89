//! Trading loop.
//!
//! One per asset. Each iteration takes profit above the core value, then
//! buys back on a dip, then sleeps. The running profit is owned by the
//! loop and carried from one iteration to the next; a failed broker call
//! skips that check for the iteration and leaves the profit untouched.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::pause;
use crate::broker::Brokerage;
use crate::config::StrategyConfig;
use crate::strategy::{dip_investment, profit_take_amount, RunningProfit};
use crate::types::{AssetConfig, HoldingSnapshot, OrderConfirmation};

/// What one iteration did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationReport {
    /// Dollar amount sold, if the profit target was hit.
    pub sold: Option<Decimal>,
    /// Dollar amount bought, if the dip target was hit.
    pub bought: Option<Decimal>,
    /// Number of checks skipped because of a broker error.
    pub failed_checks: usize,
}

pub struct TradingLoop {
    asset: AssetConfig,
    broker: Arc<dyn Brokerage>,
    strategy: StrategyConfig,
    interval: Duration,
    profit: RunningProfit,
}

impl TradingLoop {
    pub fn new(
        asset: AssetConfig,
        broker: Arc<dyn Brokerage>,
        strategy: StrategyConfig,
        interval: Duration,
    ) -> Self {
        Self {
            asset,
            broker,
            strategy,
            interval,
            profit: RunningProfit::new(),
        }
    }

    /// Start from a non-zero running profit.
    pub fn with_profit(mut self, profit: RunningProfit) -> Self {
        self.profit = profit;
        self
    }

    pub fn asset(&self) -> &AssetConfig {
        &self.asset
    }

    pub fn profit(&self) -> RunningProfit {
        self.profit
    }

    /// Fresh quantity and price from the broker.
    async fn snapshot(&self) -> Result<HoldingSnapshot> {
        let symbol = &self.asset.symbol;
        let quantity = self
            .broker
            .get_holding(symbol, self.asset.kind)
            .await
            .with_context(|| format!("holding lookup for {symbol}"))?;
        let price = self
            .broker
            .get_quote(symbol, self.asset.kind)
            .await
            .with_context(|| format!("quote for {symbol}"))?;
        Ok(HoldingSnapshot { quantity, price })
    }

    /// Sell the excess over core if the holding is up by the profit target.
    pub async fn check_profit_take(&mut self) -> Result<Option<OrderConfirmation>> {
        let snapshot = self.snapshot().await?;
        let current_value = snapshot.value();

        let Some(amount) =
            profit_take_amount(current_value, self.asset.core_value, &self.strategy)
        else {
            return Ok(None);
        };

        let confirmation = self
            .broker
            .place_sell(&self.asset.symbol, self.asset.kind, amount)
            .await
            .with_context(|| format!("sell ${amount:.2} of {}", self.asset.symbol))?;

        // Booked on the amount computed here; the broker may have rounded
        // what it filled.
        self.profit.record_sell(amount, self.asset.core_value);

        info!(
            symbol = %self.asset.symbol,
            value = format!("${current_value:.2}"),
            sold = %amount,
            filled = %confirmation.amount,
            order_id = %confirmation.order_id,
            running_profit = %self.profit,
            "Took profit"
        );

        Ok(Some(confirmation))
    }

    /// Buy back toward core if the holding is down by the dip target.
    pub async fn check_dip(&mut self) -> Result<Option<OrderConfirmation>> {
        let snapshot = self.snapshot().await?;
        let current_value = snapshot.value();

        let Some(amount) = dip_investment(
            current_value,
            self.asset.core_value,
            self.profit.value(),
            &self.strategy,
        ) else {
            return Ok(None);
        };

        let confirmation = self
            .broker
            .place_buy(&self.asset.symbol, self.asset.kind, amount)
            .await
            .with_context(|| format!("buy ${amount:.2} of {}", self.asset.symbol))?;

        self.profit.record_buy(amount);

        info!(
            symbol = %self.asset.symbol,
            value = format!("${current_value:.2}"),
            bought = %amount,
            filled = %confirmation.amount,
            order_id = %confirmation.order_id,
            running_profit = %self.profit,
            "Bought the dip"
        );

        Ok(Some(confirmation))
    }

    /// Run both checks once. Never fails: broker errors are logged and
    /// counted.
    pub async fn run_iteration(&mut self) -> IterationReport {
        let mut report = IterationReport::default();

        match self.check_profit_take().await {
            Ok(confirmation) => report.sold = confirmation.map(|c| c.amount),
            Err(e) => {
                error!(
                    symbol = %self.asset.symbol,
                    check = "profit-take",
                    error = format!("{e:#}"),
                    "Check failed, skipping"
                );
                report.failed_checks += 1;
            }
        }

        match self.check_dip().await {
            Ok(confirmation) => report.bought = confirmation.map(|c| c.amount),
            Err(e) => {
                error!(
                    symbol = %self.asset.symbol,
                    check = "dip",
                    error = format!("{e:#}"),
                    "Check failed, skipping"
                );
                report.failed_checks += 1;
            }
        }

        debug!(
            symbol = %self.asset.symbol,
            running_profit = %self.profit,
            failed = report.failed_checks,
            "Trading iteration complete"
        );

        report
    }

    /// Iterate until shutdown. Returns the final running profit.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> RunningProfit {
        info!(
            asset = %self.asset,
            interval_secs = self.interval.as_secs_f64(),
            "Trading loop started"
        );

        loop {
            self.run_iteration().await;
            if pause(self.interval, &mut shutdown).await {
                break;
            }
        }

        info!(symbol = %self.asset.symbol, running_profit = %self.profit, "Trading loop stopped");
        self.profit
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
