//! Brokerage REST integration.
//!
//! Session-authenticated JSON API covering both product lines the
//! rebalancer trades: fractional equities and crypto.
//!
//! Auth: `POST /oauth2/token/` with username/password (password grant),
//! then `Authorization: Bearer {token}` on every call. A 401 triggers one
//! re-login and a single retry of the request.
//!
//! Decimal fields (prices, quantities) are returned as JSON strings.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, StatusCode};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::Brokerage;
use crate::config::Credentials;
use crate::types::{AssetKind, OrderConfirmation, OrderSide, RebalancerError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const BASE_URL: &str = "https://api.robinhood.com";
const BROKER_NAME: &str = "robinhood";

/// Public OAuth client id of the broker's web app.
const CLIENT_ID: &str = "c82SH0WZOsabOXGP2sxqcj34FxkvfnWRZBKlBjFS";

/// Quote currency appended to crypto symbols when quoting.
const QUOTE_CURRENCY: &str = "USD";

/// Upper bound on pages followed when listing positions.
const MAX_PAGES: usize = 20;

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EquityQuote {
    #[serde(with = "rust_decimal::serde::str")]
    last_trade_price: Decimal,
}

#[derive(Debug, Deserialize)]
struct CryptoQuote {
    #[serde(with = "rust_decimal::serde::str")]
    mark_price: Decimal,
}

/// Cursor-paginated list envelope.
#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EquityPosition {
    symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    quantity: Decimal,
}

#[derive(Debug, Deserialize)]
struct CryptoHolding {
    currency: CryptoCurrency,
    #[serde(with = "rust_decimal::serde::str")]
    quantity: Decimal,
}

#[derive(Debug, Deserialize)]
struct CryptoCurrency {
    code: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Brokerage REST client.
pub struct RestBroker {
    http: Client,
    base_url: String,
    credentials: Credentials,
    access_token: RwLock<Option<String>>,
}

impl RestBroker {
    /// Create a client against the production API. Does not log in.
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_base_url(credentials, BASE_URL)
    }

    /// Create a client against an alternative API root (sandbox, tests).
    pub fn with_base_url(credentials: Credentials, base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("rebalancer/0.1.0")
            .build()
            .context("Failed to build HTTP client for broker")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            access_token: RwLock::new(None),
        })
    }

    // -- Authentication ----------------------------------------------------

    /// Open a session with the stored credentials.
    pub async fn login(&self) -> Result<()> {
        let token = self.request_token().await?;
        *self.access_token.write().await = Some(token);
        Ok(())
    }

    /// Exchange the credentials for a fresh session token.
    async fn request_token(&self) -> Result<String> {
        info!(username = %self.credentials.username, "Logging in to broker...");

        let resp = self
            .http
            .post(format!("{}/oauth2/token/", self.base_url))
            .form(&[
                ("grant_type", "password"),
                ("scope", "internal"),
                ("client_id", CLIENT_ID),
                ("expires_in", "86400"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password()),
            ])
            .send()
            .await
            .context("Broker login request failed")?;

        let status = resp.status();
        let login: LoginResponse = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse broker login response ({status})"))?;

        match (status.is_success(), login.access_token) {
            (true, Some(token)) => {
                info!("Broker login successful");
                Ok(token)
            }
            (_, _) => {
                let reason = login.detail.unwrap_or_else(|| status.to_string());
                Err(RebalancerError::LoginRejected(reason).into())
            }
        }
    }

    /// Get the current session token, logging in if there is none.
    async fn ensure_session(&self) -> Result<String> {
        if let Some(token) = self.access_token.read().await.as_ref() {
            return Ok(token.clone());
        }
        self.refresh_session(None).await
    }

    /// Replace the session token, unless another caller already replaced
    /// the one that `failed`. Concurrent callers with the same stale token
    /// share a single login.
    async fn refresh_session(&self, failed: Option<&str>) -> Result<String> {
        let mut current = self.access_token.write().await;
        if let Some(token) = current.as_deref() {
            if Some(token) != failed {
                return Ok(token.to_string());
            }
        }
        let token = self.request_token().await?;
        *current = Some(token.clone());
        Ok(token)
    }

    // -- API helpers -------------------------------------------------------

    fn url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{path}", self.base_url)
        }
    }

    /// Authenticated request returning decoded JSON. Re-authenticates once
    /// on 401.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        operation: &str,
        symbol: &str,
    ) -> Result<T> {
        let url = self.url(path);
        let send = |token: String| {
            let mut req = self.http.request(method.clone(), &url).bearer_auth(token);
            if let Some(body) = body {
                req = req.json(body);
            }
            req.send()
        };

        debug!(url = %url, operation, symbol, "Broker request");

        let token = self.ensure_session().await?;
        let mut resp = send(token.clone())
            .await
            .with_context(|| format!("Broker {operation} request failed for {symbol}"))?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!(operation, symbol, "Broker session expired, re-authenticating...");
            let token = self.refresh_session(Some(token.as_str())).await?;
            resp = send(token)
                .await
                .with_context(|| format!("Broker {operation} retry failed for {symbol}"))?;
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(RebalancerError::Broker {
                operation: operation.to_string(),
                symbol: symbol.to_string(),
                message: format!("{status}: {text}"),
            }
            .into());
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse broker {operation} response for {symbol}"))
    }

    /// Fetch every page of a paginated listing.
    async fn fetch_all<T: DeserializeOwned>(
        &self,
        path: &str,
        operation: &str,
        symbol: &str,
    ) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        let mut next = Some(path.to_string());
        let mut pages = 0;

        while let Some(page_path) = next.take() {
            let page: Page<T> = self
                .request(Method::GET, &page_path, None, operation, symbol)
                .await?;
            rows.extend(page.results);
            pages += 1;
            if pages >= MAX_PAGES {
                warn!(operation, pages, "Stopped following broker pagination");
                break;
            }
            next = page.next;
        }

        Ok(rows)
    }

    async fn place_order(
        &self,
        symbol: &str,
        kind: AssetKind,
        side: OrderSide,
        amount: Decimal,
    ) -> Result<OrderConfirmation> {
        let requested = amount;
        let amount = to_cents(amount);
        if amount <= Decimal::ZERO {
            return Err(RebalancerError::OrderTooSmall {
                symbol: symbol.to_string(),
                amount: requested,
            }
            .into());
        }
        let body = order_body(symbol, side, amount);
        let operation = format!("{side} order");

        let resp: OrderResponse = self
            .request(Method::POST, order_path(kind), Some(&body), &operation, symbol)
            .await?;

        let order_id = resp
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let state = resp.state.unwrap_or_else(|| "unconfirmed".to_string());

        info!(
            order_id = %order_id,
            symbol,
            side = %side,
            amount = %amount,
            state = %state,
            "Broker order placed"
        );

        Ok(OrderConfirmation {
            order_id,
            symbol: symbol.to_string(),
            side,
            amount,
            state,
            timestamp: Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// Request / response helpers
// ---------------------------------------------------------------------------

fn quote_path(symbol: &str, kind: AssetKind) -> String {
    let symbol = urlencoding::encode(symbol).to_uppercase();
    match kind {
        AssetKind::Equity => format!("/quotes/{symbol}/"),
        AssetKind::Crypto => format!("/marketdata/forex/quotes/{symbol}{QUOTE_CURRENCY}/"),
    }
}

fn order_path(kind: AssetKind) -> &'static str {
    match kind {
        AssetKind::Equity => "/orders/",
        AssetKind::Crypto => "/crypto/orders/",
    }
}

/// Dollar amounts are truncated to whole cents before they go on the wire.
fn to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

fn order_body(symbol: &str, side: OrderSide, amount: Decimal) -> serde_json::Value {
    serde_json::json!({
        "symbol": symbol.to_uppercase(),
        "side": side,
        "type": "market",
        "time_in_force": "gtc",
        "price_in_quote": amount.to_string(),
        "ref_id": uuid::Uuid::new_v4().to_string(),
    })
}

fn equity_quantity(rows: &[EquityPosition], symbol: &str) -> Decimal {
    rows.iter()
        .filter(|p| p.symbol.eq_ignore_ascii_case(symbol))
        .map(|p| p.quantity)
        .sum()
}

fn crypto_quantity(rows: &[CryptoHolding], symbol: &str) -> Decimal {
    rows.iter()
        .filter(|h| h.currency.code.eq_ignore_ascii_case(symbol))
        .map(|h| h.quantity)
        .sum()
}

// ---------------------------------------------------------------------------
// Brokerage trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl Brokerage for RestBroker {
    async fn get_quote(&self, symbol: &str, kind: AssetKind) -> Result<Decimal> {
        let path = quote_path(symbol, kind);
        let price = match kind {
            AssetKind::Equity => {
                let q: EquityQuote = self.request(Method::GET, &path, None, "quote", symbol).await?;
                q.last_trade_price
            }
            AssetKind::Crypto => {
                let q: CryptoQuote = self.request(Method::GET, &path, None, "quote", symbol).await?;
                q.mark_price
            }
        };
        Ok(price)
    }

    async fn get_holding(&self, symbol: &str, kind: AssetKind) -> Result<Decimal> {
        let quantity = match kind {
            AssetKind::Equity => {
                let rows: Vec<EquityPosition> = self
                    .fetch_all("/positions/?nonzero=true", "holding", symbol)
                    .await?;
                equity_quantity(&rows, symbol)
            }
            AssetKind::Crypto => {
                let rows: Vec<CryptoHolding> = self
                    .fetch_all("/crypto/holdings/", "holding", symbol)
                    .await?;
                crypto_quantity(&rows, symbol)
            }
        };
        Ok(quantity)
    }

    async fn place_sell(
        &self,
        symbol: &str,
        kind: AssetKind,
        amount: Decimal,
    ) -> Result<OrderConfirmation> {
        self.place_order(symbol, kind, OrderSide::Sell, amount).await
    }

    async fn place_buy(
        &self,
        symbol: &str,
        kind: AssetKind,
        amount: Decimal,
    ) -> Result<OrderConfirmation> {
        self.place_order(symbol, kind, OrderSide::Buy, amount).await
    }

    fn name(&self) -> &str {
        BROKER_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
