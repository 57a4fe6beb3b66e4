//! ETH/USD conversion rate with a short-lived cache.
//!
//! Offer amounts come back in wei; the classifier compares them against USD
//! floor prices, so every offer conversion needs a rate. The rate is fetched
//! from CoinGecko at most once per refresh window, and a hardcoded fallback
//! keeps the pipeline producing (flagged) numbers when the API is down.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::EnrichError;

/// Last-resort rate used when no fetch has ever succeeded.
pub const FALLBACK_USD_PER_ETH: Decimal = dec!(3550);

/// A point-in-time conversion rate.
#[derive(Debug, Clone, Copy)]
pub struct RateQuote {
    /// USD per 1 ETH.
    pub usd_per_eth: Decimal,
    /// When this rate was obtained.
    pub fetched_at: OffsetDateTime,
    /// True when the rate is the hardcoded fallback, not a live fetch.
    pub from_fallback: bool,
}

impl RateQuote {
    /// Whether downstream consumers should flag numbers derived from this
    /// quote. Fallback quotes are always stale.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        if self.from_fallback {
            return true;
        }
        let age = OffsetDateTime::now_utc() - self.fetched_at;
        age > time::Duration::try_from(max_age).unwrap_or(time::Duration::MAX)
    }
}

/// Source of ETH/USD quotes.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Current conversion rate. Never fails: a degraded oracle serves its
    /// last known (or fallback) quote instead.
    async fn quote(&self) -> RateQuote;

    /// Age threshold past which this oracle's quotes count as stale.
    fn stale_after(&self) -> Duration;
}

#[derive(Debug, Deserialize)]
struct EthPriceResponse {
    ethereum: UsdField,
}

#[derive(Debug, Deserialize)]
struct UsdField {
    usd: Decimal,
}

/// CoinGecko-backed oracle with a refresh window.
pub struct EthPriceOracle {
    client: reqwest::Client,
    url: String,
    refresh_after: Duration,
    stale_after: Duration,
    cached: RwLock<RateQuote>,
}

impl EthPriceOracle {
    /// Create an oracle seeded with the fallback rate.
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            url: config.eth_price_url.clone(),
            refresh_after: Duration::from_secs(config.eth_price_refresh_secs),
            stale_after: Duration::from_secs(config.eth_price_stale_secs),
            cached: RwLock::new(RateQuote {
                usd_per_eth: FALLBACK_USD_PER_ETH,
                fetched_at: OffsetDateTime::now_utc(),
                from_fallback: true,
            }),
        }
    }

    /// Fetch a fresh rate, bypassing the cache.
    pub async fn refresh(&self) -> Result<RateQuote, EnrichError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EnrichError::UnexpectedStatus {
                status: status.as_u16(),
                endpoint: self.url.clone(),
            });
        }
        let body: EthPriceResponse = response
            .json()
            .await
            .map_err(|e| EnrichError::Parse(e.to_string()))?;
        if body.ethereum.usd <= Decimal::ZERO {
            return Err(EnrichError::Parse(format!(
                "non-positive ETH price: {}",
                body.ethereum.usd
            )));
        }

        let quote = RateQuote {
            usd_per_eth: body.ethereum.usd,
            fetched_at: OffsetDateTime::now_utc(),
            from_fallback: false,
        };
        *self.cached.write().await = quote;
        debug!(usd_per_eth = %quote.usd_per_eth, "ETH price refreshed");
        Ok(quote)
    }

    /// Keep the rate fresh on a timer, independent of the scan loop, until
    /// shutdown. `quote()` still refreshes inline if the task falls behind.
    pub fn spawn_refresh(
        self: &Arc<Self>,
        shutdown: crate::utils::ShutdownHandle,
    ) -> tokio::task::JoinHandle<()> {
        let oracle = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(oracle.refresh_after);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // first tick is immediate
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = oracle.refresh().await {
                            warn!(error = %e, "Background ETH price refresh failed");
                        }
                    }
                    _ = shutdown.wait() => break,
                }
            }
        })
    }

    fn needs_refresh(&self, quote: &RateQuote) -> bool {
        if quote.from_fallback {
            return true;
        }
        let age = OffsetDateTime::now_utc() - quote.fetched_at;
        age > time::Duration::try_from(self.refresh_after).unwrap_or(time::Duration::MAX)
    }
}

#[async_trait]
impl PriceOracle for EthPriceOracle {
    async fn quote(&self) -> RateQuote {
        let cached = *self.cached.read().await;
        if !self.needs_refresh(&cached) {
            return cached;
        }
        match self.refresh().await {
            Ok(fresh) => fresh,
            Err(e) => {
                // Serve the old quote. Staleness is judged by the caller.
                warn!(error = %e, "ETH price refresh failed, serving cached rate");
                cached
            }
        }
    }

    fn stale_after(&self) -> Duration {
        self.stale_after
    }
}

/// Fixed-rate oracle for tests.
pub struct FixedOracle {
    rate: Decimal,
    from_fallback: bool,
}

impl FixedOracle {
    /// A live-looking quote at the given rate.
    pub fn new(rate: Decimal) -> Self {
        Self {
            rate,
            from_fallback: false,
        }
    }

    /// A quote that is always flagged stale.
    pub fn stale(rate: Decimal) -> Self {
        Self {
            rate,
            from_fallback: true,
        }
    }
}

#[async_trait]
impl PriceOracle for FixedOracle {
    async fn quote(&self) -> RateQuote {
        RateQuote {
            usd_per_eth: self.rate,
            fetched_at: OffsetDateTime::now_utc(),
            from_fallback: self.from_fallback,
        }
    }

    fn stale_after(&self) -> Duration {
        Duration::from_secs(600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_quote_is_always_stale() {
        let quote = RateQuote {
            usd_per_eth: FALLBACK_USD_PER_ETH,
            fetched_at: OffsetDateTime::now_utc(),
            from_fallback: true,
        };
        assert!(quote.is_stale(Duration::from_secs(600)));
    }

    #[test]
    fn fresh_quote_is_not_stale() {
        let quote = RateQuote {
            usd_per_eth: dec!(4200),
            fetched_at: OffsetDateTime::now_utc(),
            from_fallback: false,
        };
        assert!(!quote.is_stale(Duration::from_secs(600)));
    }

    #[test]
    fn old_quote_is_stale() {
        let quote = RateQuote {
            usd_per_eth: dec!(4200),
            fetched_at: OffsetDateTime::now_utc() - time::Duration::minutes(20),
            from_fallback: false,
        };
        assert!(quote.is_stale(Duration::from_secs(600)));
    }

    #[test]
    fn price_response_parses() {
        let body = r#"{"ethereum":{"usd":3875.42}}"#;
        let parsed: EthPriceResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.ethereum.usd, dec!(3875.42));
    }

    #[tokio::test]
    async fn fixed_oracle_serves_configured_rate() {
        let oracle = FixedOracle::new(dec!(3000));
        let quote = oracle.quote().await;
        assert_eq!(quote.usd_per_eth, dec!(3000));
        assert!(!quote.from_fallback);

        let stale = FixedOracle::stale(dec!(3550)).quote().await;
        assert!(stale.is_stale(Duration::from_secs(600)));
    }
}
