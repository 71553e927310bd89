//! Rebalancing strategy.
//!
//! - `rebalance`: sell/buy threshold rules around an asset's core value
//! - [`RunningProfit`]: per-loop signed cash-flow accumulator

pub mod rebalance;

use rust_decimal::Decimal;
use std::fmt;

pub use rebalance::{dip_investment, profit_take_amount};

/// Net cash flow from the trades one trading loop has made.
///
/// Lives only in memory for the lifetime of its loop; starts at zero on
/// every process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningProfit(Decimal);

impl RunningProfit {
    pub fn new() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Book a completed sell.
    ///
    /// NOTE: credits `amount_sold - core_value`, not `amount_sold`. A sale
    /// of the $0.80 excess over a $30 core books -29.20. Kept as-is pending
    /// product-owner review; see DESIGN.md.
    pub fn record_sell(&mut self, amount_sold: Decimal, core_value: Decimal) {
        self.0 += amount_sold - core_value;
    }

    /// Book a completed buy.
    pub fn record_buy(&mut self, amount_invested: Decimal) {
        self.0 -= amount_invested;
    }
}

impl From<Decimal> for RunningProfit {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl fmt::Display for RunningProfit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_sign_negative() {
            write!(f, "-${:.2}", self.0.abs())
        } else {
            write!(f, "${:.2}", self.0)
        }
    }
}
