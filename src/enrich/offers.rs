//! Best collection offer lookup and per-unit normalization.
//!
//! OpenSea reports the best offer as a total across however many units the
//! bidder wants. A 3 WETH offer for 3 editions is worth 1 WETH per item, so
//! the wei amount is divided by the ERC-1155 quantity before any comparison
//! against a single item's floor price.

use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::enrich::oracle::PriceOracle;
use crate::error::EnrichError;
use crate::metrics;
use crate::retry::RetryPolicy;

/// Seaport consideration item type for ERC-1155 tokens.
const ITEM_TYPE_ERC1155: u8 = 4;

const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

/// A normalized best offer for one token.
///
/// Wei amounts serialize as strings; they do not fit JSON numbers.
#[derive(Debug, Clone, Serialize)]
pub struct OfferData {
    /// Per-unit offer in wei.
    #[serde(serialize_with = "wei_as_string")]
    pub offer_amount_wei: u128,
    /// Per-unit offer in ETH.
    pub offer_amount_eth: Decimal,
    /// Per-unit offer in USD at the rate below.
    pub offer_amount_usd: Decimal,
    /// Raw offer total across all units.
    #[serde(serialize_with = "wei_as_string")]
    pub total_offer_wei: u128,
    /// Units the offer spans.
    pub quantity: u128,
    /// Seaport order hash, when present.
    pub order_hash: Option<String>,
    /// When the offer was fetched.
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
    /// True when the USD figure was computed from a stale or fallback rate.
    pub rate_stale: bool,
}

#[derive(Debug, Deserialize)]
struct BestOfferResponse {
    order_hash: Option<String>,
    price: Option<PriceField>,
    protocol_data: Option<ProtocolData>,
}

#[derive(Debug, Deserialize)]
struct PriceField {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ProtocolData {
    parameters: Option<OrderParameters>,
}

#[derive(Debug, Deserialize)]
struct OrderParameters {
    #[serde(default)]
    offer: Vec<OfferItem>,
    #[serde(default)]
    consideration: Vec<ConsiderationItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfferItem {
    start_amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsiderationItem {
    item_type: u8,
    start_amount: String,
}

impl BestOfferResponse {
    /// Total offered amount in wei. The Seaport order's offer item is
    /// authoritative; the summary `price.value` covers responses that omit
    /// protocol data.
    fn total_wei(&self) -> Result<Option<u128>, EnrichError> {
        if let Some(item) = self
            .protocol_data
            .as_ref()
            .and_then(|p| p.parameters.as_ref())
            .and_then(|params| params.offer.first())
        {
            let wei = item.start_amount.parse().map_err(|_| {
                EnrichError::Parse(format!("bad offer startAmount: {}", item.start_amount))
            })?;
            return Ok(Some(wei));
        }
        match &self.price {
            Some(price) => price
                .value
                .parse()
                .map(Some)
                .map_err(|_| EnrichError::Parse(format!("bad wei value: {}", price.value))),
            None => Ok(None),
        }
    }

    /// Units the offer covers. An ERC-1155 consideration entry carries the
    /// quantity; absent one, the offer is for a single unit.
    fn quantity(&self) -> u128 {
        self.protocol_data
            .as_ref()
            .and_then(|p| p.parameters.as_ref())
            .map(|params| {
                params
                    .consideration
                    .iter()
                    .filter(|item| item.item_type == ITEM_TYPE_ERC1155)
                    .filter_map(|item| item.start_amount.parse::<u128>().ok())
                    .find(|&q| q > 0)
                    .unwrap_or(1)
            })
            .unwrap_or(1)
    }
}

/// Fetches the best collection offer for individual tokens.
pub struct OfferEnricher {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl OfferEnricher {
    /// Create an offer enricher.
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            api_url: config.opensea_api_url.trim_end_matches('/').to_string(),
            api_key: config.opensea_api_key.clone(),
            retry: RetryPolicy::enrichment(config),
        }
    }

    /// Best offer for `token_id` in the collection `slug`, normalized to a
    /// per-unit amount and converted to USD via `oracle`.
    ///
    /// `Ok(None)` means there is no standing offer.
    #[instrument(skip(self, oracle), fields(slug = %slug, token_id = %token_id))]
    pub async fn best_offer(
        &self,
        slug: &str,
        token_id: &str,
        oracle: &dyn PriceOracle,
    ) -> Result<Option<OfferData>, EnrichError> {
        let start = Instant::now();
        let endpoint = format!(
            "{}/offers/collection/{}/nfts/{}/best",
            self.api_url, slug, token_id
        );
        let result = self
            .retry
            .run_hinted(
                "best_offer",
                EnrichError::is_retryable,
                EnrichError::suggested_delay,
                || self.fetch(&endpoint),
            )
            .await;
        metrics::record_enrich_latency(start, "offers");

        let body = match result {
            Ok(body) => body,
            Err(EnrichError::NotFound(_)) => return Ok(None),
            Err(e) => {
                warn!(error = %e, "Best offer lookup failed");
                return Err(e);
            }
        };

        let Some(total_offer_wei) = body.total_wei()? else {
            return Ok(None);
        };
        if total_offer_wei == 0 {
            return Ok(None);
        }

        let quantity = body.quantity();
        let offer_amount_wei = total_offer_wei / quantity;
        let offer_amount_eth = wei_to_eth(offer_amount_wei)?;

        let quote = oracle.quote().await;
        let offer_amount_usd = offer_amount_eth * quote.usd_per_eth;
        let rate_stale = quote.is_stale(oracle.stale_after());

        debug!(
            %offer_amount_eth,
            %offer_amount_usd,
            quantity,
            rate_stale,
            "Best offer normalized"
        );
        Ok(Some(OfferData {
            offer_amount_wei,
            offer_amount_eth,
            offer_amount_usd,
            total_offer_wei,
            quantity,
            order_hash: body.order_hash,
            fetched_at: OffsetDateTime::now_utc(),
            rate_stale,
        }))
    }

    async fn fetch(&self, endpoint: &str) -> Result<BestOfferResponse, EnrichError> {
        let response = self
            .client
            .get(endpoint)
            .header("x-api-key", &self.api_key)
            .header("accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        match status.as_u16() {
            200 => {}
            404 => return Err(EnrichError::NotFound(endpoint.to_string())),
            429 => {
                let retry_after_seconds = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5);
                return Err(EnrichError::RateLimited {
                    retry_after_seconds,
                });
            }
            code => {
                return Err(EnrichError::UnexpectedStatus {
                    status: code,
                    endpoint: endpoint.to_string(),
                })
            }
        }

        response
            .json()
            .await
            .map_err(|e| EnrichError::Parse(e.to_string()))
    }
}

fn wei_as_string<S: serde::Serializer>(wei: &u128, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(wei)
}

fn wei_to_eth(wei: u128) -> Result<Decimal, EnrichError> {
    let as_i128 = i128::try_from(wei)
        .map_err(|_| EnrichError::Parse(format!("wei amount out of range: {wei}")))?;
    Ok(Decimal::from_i128_with_scale(as_i128, 18).normalize())
}
