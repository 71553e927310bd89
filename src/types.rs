//! Shared types for the rebalancer.
//!
//! These types form the data model used across all modules so that the
//! broker adapter, strategy maths and engine loops can depend on them
//! without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// Which brokerage product line an asset trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Crypto,
    Equity,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Crypto => write!(f, "crypto"),
            AssetKind::Equity => write!(f, "equity"),
        }
    }
}

impl std::str::FromStr for AssetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crypto" | "coin" => Ok(AssetKind::Crypto),
            "equity" | "stock" => Ok(AssetKind::Equity),
            _ => Err(format!("Unknown asset kind: {s}")),
        }
    }
}

/// One tracked asset and the dollar value the strategy holds it at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetConfig {
    pub symbol: String,
    pub kind: AssetKind,
    /// Target value of the holding in quote currency (USD).
    pub core_value: Decimal,
}

impl AssetConfig {
    pub fn new(symbol: &str, kind: AssetKind, core_value: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            kind,
            core_value,
        }
    }
}

impl fmt::Display for AssetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, core ${:.2})", self.symbol, self.kind, self.core_value)
    }
}

// ---------------------------------------------------------------------------
// Holdings
// ---------------------------------------------------------------------------

/// Quantity held and unit price, fetched together for a single check.
///
/// Never cached: every check builds a fresh snapshot from the broker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldingSnapshot {
    pub quantity: Decimal,
    pub price: Decimal,
}

impl HoldingSnapshot {
    /// Current value of the holding in quote currency.
    pub fn value(&self) -> Decimal {
        self.quantity * self.price
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Broker acknowledgement of a placed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    /// Amount requested, in quote currency.
    pub amount: Decimal,
    /// Order state as reported by the broker ("queued", "filled", ...).
    pub state: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for OrderConfirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ${:.2} [{}] ({})",
            self.side, self.symbol, self.amount, self.state, self.order_id
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types raised by the rebalancer itself.
///
/// Broker calls surface these wrapped in `anyhow::Error`; the loops only
/// ever log them.
#[derive(Debug, thiserror::Error)]
pub enum RebalancerError {
    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("Broker error ({operation} {symbol}): {message}")]
    Broker {
        operation: String,
        symbol: String,
        message: String,
    },

    #[error("Login rejected: {0}")]
    LoginRejected(String),

    #[error("Order for {symbol} is below one cent (requested ${amount})")]
    OrderTooSmall { symbol: String, amount: Decimal },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
