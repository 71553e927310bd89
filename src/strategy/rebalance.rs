//! Threshold rules for core-value rebalancing.
//!
//! Both rules are pure functions of the current holding value, the
//! asset's core value and the strategy constants, so they can be checked
//! at the boundaries without a broker.

use rust_decimal::Decimal;
use tracing::trace;

use crate::config::StrategyConfig;

/// Dollar amount to sell when the holding has risen far enough above core.
///
/// Triggers iff `current_value >= core_value + profit_target`; the amount
/// sold is the full excess over core.
pub fn profit_take_amount(
    current_value: Decimal,
    core_value: Decimal,
    config: &StrategyConfig,
) -> Option<Decimal> {
    if current_value >= core_value + config.profit_target {
        Some(current_value - core_value)
    } else {
        trace!(%current_value, %core_value, "Profit target not reached");
        None
    }
}

/// Dollar amount to buy back when the holding has dipped far enough below core.
///
/// Triggers iff `current_value <= core_value - dip_target`. With positive
/// running profit, reinvests at most that profit and never more than the
/// shortfall; otherwise buys the fixed fallback amount. Returns `None` when
/// there is nothing to buy.
pub fn dip_investment(
    current_value: Decimal,
    core_value: Decimal,
    running_profit: Decimal,
    config: &StrategyConfig,
) -> Option<Decimal> {
    if current_value > core_value - config.dip_target {
        trace!(%current_value, %core_value, "Dip target not reached");
        return None;
    }

    let amount = if running_profit > Decimal::ZERO {
        running_profit.min(core_value - current_value)
    } else {
        config.fallback_investment
    };

    (amount > Decimal::ZERO).then_some(amount)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
