//! Contract address to OpenSea collection resolution.
//!
//! Offers are keyed by collection slug, not contract address, so every item
//! needs one lookup here before its offer can be fetched. Collections repeat
//! heavily across a scan and never change mid-run, so lookups are cached per
//! contract, negative results included.

use std::time::Instant;

use dashmap::DashMap;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::error::EnrichError;
use crate::metrics;
use crate::retry::RetryPolicy;
use crate::scrape::types::CollectionInfo;

#[derive(Debug, Deserialize)]
struct ContractResponse {
    /// Collection slug.
    collection: Option<String>,
    /// Human-readable contract name.
    name: Option<String>,
}

/// Resolves and caches collection metadata from the OpenSea contract API.
pub struct CollectionEnricher {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    retry: RetryPolicy,
    // Lowercased contract -> metadata; None records a definitive miss.
    cache: DashMap<String, Option<CollectionInfo>>,
}

impl CollectionEnricher {
    /// Create an enricher with an empty cache.
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            api_url: config.opensea_api_url.trim_end_matches('/').to_string(),
            api_key: config.opensea_api_key.clone(),
            retry: RetryPolicy::enrichment(config),
            cache: DashMap::new(),
        }
    }

    /// Collection metadata for a contract, from cache or the API.
    ///
    /// `Ok(None)` means OpenSea does not know the contract; that result is
    /// cached so the same unknown contract is not re-fetched all scan long.
    #[instrument(skip(self), fields(contract = %contract))]
    pub async fn collection_for(
        &self,
        contract: &str,
    ) -> Result<Option<CollectionInfo>, EnrichError> {
        let key = contract.to_ascii_lowercase();
        if let Some(hit) = self.cache.get(&key) {
            metrics::inc_cache_hits();
            return Ok(hit.clone());
        }

        let start = Instant::now();
        let endpoint = format!("{}/chain/ethereum/contract/{}", self.api_url, key);
        let result = self
            .retry
            .run_hinted(
                "collection_lookup",
                EnrichError::is_retryable,
                EnrichError::suggested_delay,
                || self.fetch(&endpoint),
            )
            .await;
        metrics::record_enrich_latency(start, "collection");

        let info = match result {
            Ok(info) => info,
            Err(EnrichError::NotFound(_)) => {
                debug!("Contract unknown to OpenSea, caching miss");
                None
            }
            Err(e) => {
                warn!(error = %e, "Collection lookup failed");
                return Err(e);
            }
        };

        self.cache.insert(key, info.clone());
        Ok(info)
    }

    async fn fetch(&self, endpoint: &str) -> Result<Option<CollectionInfo>, EnrichError> {
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

        let body: ContractResponse = response
            .json()
            .await
            .map_err(|e| EnrichError::Parse(e.to_string()))?;

        let Some(slug) = body.collection.filter(|s| !s.is_empty()) else {
            // Known contract but no collection attached. Also a miss.
            return Ok(None);
        };
        Ok(Some(CollectionInfo {
            name: body.name.unwrap_or_else(|| slug.clone()),
            slug,
        }))
    }

    /// Number of cached contracts, misses included.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_response_parses_full_body() {
        let body = r#"{
            "address": "0x2250d7c238392f4b575bb26c672afe45f0adcb75",
            "chain": "ethereum",
            "collection": "wassies-by-wassies",
            "name": "Wassies",
            "supply": 9999
        }"#;
        let parsed: ContractResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.collection.as_deref(), Some("wassies-by-wassies"));
        assert_eq!(parsed.name.as_deref(), Some("Wassies"));
    }

    #[test]
    fn contract_response_tolerates_missing_fields() {
        let parsed: ContractResponse = serde_json::from_str(r#"{"chain":"ethereum"}"#).unwrap();
        assert!(parsed.collection.is_none());
        assert!(parsed.name.is_none());
    }
}
