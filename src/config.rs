//! Runtime configuration.
//!
//! The tracked assets, strategy thresholds and polling delays are fixed
//! constants; they are gathered into an [`AppConfig`] at startup and
//! handed explicitly to every loop. The only values read from the
//! environment are the broker credentials.

use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::{ExposeSecret, Secret, SecretString};
use std::time::Duration;

use crate::types::{AssetConfig, AssetKind, RebalancerError};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Holding value above core that triggers a partial sell.
pub const PROFIT_TARGET: Decimal = dec!(0.60);

/// Holding value below core that triggers a partial buy.
pub const DIP_TARGET: Decimal = dec!(1.50);

/// Amount bought on a dip when there is no running profit to reinvest.
pub const FALLBACK_INVESTMENT: Decimal = dec!(0.35);

/// Delay between trading-loop iterations. Keeps us under the broker's
/// request rate limit.
pub const TRADE_INTERVAL: Duration = Duration::from_secs(10);

/// Delay between price reports.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(10);

pub const USERNAME_ENV: &str = "BROKER_USERNAME";
pub const PASSWORD_ENV: &str = "BROKER_PASSWORD";

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Thresholds shared by every trading loop.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub profit_target: Decimal,
    pub dip_target: Decimal,
    pub fallback_investment: Decimal,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            profit_target: PROFIT_TARGET,
            dip_target: DIP_TARGET,
            fallback_investment: FALLBACK_INVESTMENT,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub assets: Vec<AssetConfig>,
    pub strategy: StrategyConfig,
    pub trade_interval: Duration,
    pub report_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            assets: default_assets(),
            strategy: StrategyConfig::default(),
            trade_interval: TRADE_INTERVAL,
            report_interval: REPORT_INTERVAL,
        }
    }
}

/// Two coins and one stock, each held at $30.
pub fn default_assets() -> Vec<AssetConfig> {
    vec![
        AssetConfig::new("BTC", AssetKind::Crypto, dec!(30.00)),
        AssetConfig::new("ETH", AssetKind::Crypto, dec!(30.00)),
        AssetConfig::new("AAPL", AssetKind::Equity, dec!(30.00)),
    ]
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Broker login credentials. Used once to open the session, and again
/// only if the session expires.
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Secret::new(password.into()),
        }
    }

    /// Read `BROKER_USERNAME` / `BROKER_PASSWORD` from the environment.
    pub fn from_env() -> Result<Self> {
        let username = resolve_env(USERNAME_ENV)?;
        let password = resolve_env(PASSWORD_ENV)?;
        Ok(Self::new(username, password))
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Resolve an environment variable name to a non-empty value.
fn resolve_env(env_name: &str) -> Result<String> {
    match std::env::var(env_name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(RebalancerError::MissingCredential(env_name.to_string()).into()),
    }
}
