//! Brokerage integration.
//!
//! Defines the `Brokerage` trait the loops trade through, and provides a
//! REST implementation:
//! - `rest`: session-authenticated brokerage REST API (crypto + equities)

pub mod rest;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{AssetKind, OrderConfirmation};

/// Abstraction over the brokerage account the rebalancer trades in.
///
/// Amounts passed to the order calls are in quote currency (USD), not
/// asset units. Every call may fail; callers decide whether that is fatal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Brokerage: Send + Sync {
    /// Current unit price of `symbol`.
    async fn get_quote(&self, symbol: &str, kind: AssetKind) -> Result<Decimal>;

    /// Quantity of `symbol` currently held (zero if none).
    async fn get_holding(&self, symbol: &str, kind: AssetKind) -> Result<Decimal>;

    /// Sell `amount` dollars worth of `symbol`.
    async fn place_sell(
        &self,
        symbol: &str,
        kind: AssetKind,
        amount: Decimal,
    ) -> Result<OrderConfirmation>;

    /// Buy `amount` dollars worth of `symbol`.
    async fn place_buy(
        &self,
        symbol: &str,
        kind: AssetKind,
        amount: Decimal,
    ) -> Result<OrderConfirmation>;

    /// Broker name for logging.
    fn name(&self) -> &str;
}
