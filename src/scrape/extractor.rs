//! Phase 2: per-item floor price extraction.
//!
//! Each collection URL gets its own page load. The first table row on the
//! collection page carries the cheapest listing; its List Price column is the
//! floor. Navigation failures retry with backoff, everything downstream is a
//! single read.

use std::time::Instant;

use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use crate::browser::ListingPage;
use crate::config::Config;
use crate::error::BrowserError;
use crate::metrics;
use crate::retry::RetryPolicy;
use crate::scrape::parse::{self, RowRead};
use crate::scrape::types::{ExtractOutcome, RawItem};

/// Extraction tuning.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Base URL the canonical item links are rooted at.
    pub marketplace_base_url: String,
    /// Navigation retry policy.
    pub nav_retry: RetryPolicy,
}

impl From<&Config> for ExtractorConfig {
    fn from(config: &Config) -> Self {
        Self {
            marketplace_base_url: config.marketplace_base_url.clone(),
            nav_retry: RetryPolicy::navigation(config),
        }
    }
}

/// Extracts a [`RawItem`] from a single collection page.
pub struct ItemExtractor {
    config: ExtractorConfig,
}

impl ItemExtractor {
    /// Create an extractor with the given tuning.
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Load `url` and read the floor listing off its first table row.
    ///
    /// Per-item failures never abort the scan: only a lost session comes back
    /// as `Err`. Everything else is folded into an [`ExtractOutcome`].
    #[instrument(skip(self, page), fields(url = %url))]
    pub async fn extract<P: ListingPage>(
        &self,
        page: &P,
        url: &str,
    ) -> Result<ExtractOutcome, BrowserError> {
        let start = Instant::now();

        let Some(parts) = parse::parse_marketplace_url(url) else {
            return Ok(ExtractOutcome::Failed {
                reason: format!("unrecognized marketplace URL: {url}"),
            });
        };

        let nav = self
            .config
            .nav_retry
            .run("page_navigation", BrowserError::is_retryable, || {
                page.open(url)
            })
            .await;
        if let Err(e) = nav {
            if e.is_fatal() {
                return Err(e);
            }
            warn!(error = %e, "Navigation failed after retries");
            return Ok(ExtractOutcome::Failed {
                reason: format!("navigation failed: {e}"),
            });
        }

        let row = match page.first_listing_row().await {
            Ok(row) => row,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                return Ok(ExtractOutcome::Failed {
                    reason: format!("row read failed: {e}"),
                })
            }
        };
        let Some(row) = row else {
            return Ok(ExtractOutcome::NoListing {
                reason: "no listing rows on page".to_string(),
            });
        };

        let outcome = match parse::read_listing_row(&row) {
            RowRead::Priced {
                token_id,
                price,
                price_text,
            } => {
                let actual_url = format!(
                    "{}/marketplace/item/{}/{}/",
                    self.config.marketplace_base_url.trim_end_matches('/'),
                    parts.contract,
                    token_id
                );
                debug!(%price, token_id, "Floor listing extracted");
                ExtractOutcome::Item(RawItem {
                    marketplace_url: url.to_string(),
                    actual_marketplace_url: Some(actual_url),
                    floor_price: price,
                    floor_price_text: price_text,
                    contract: parts.contract,
                    actual_token_id: token_id,
                    scraped_at: OffsetDateTime::now_utc(),
                })
            }
            RowRead::NoListing { reason } => ExtractOutcome::NoListing {
                reason: reason.to_string(),
            },
            RowRead::Unusable { reason } => ExtractOutcome::Failed {
                reason: reason.to_string(),
            },
        };

        metrics::record_extract_latency(start);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{ListingRow, MockListingPage, MockPageConfig};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    const CONTRACT: &str = "0x2250d7c238392f4b575bb26c672afe45f0adcb75";

    fn collection_url() -> String {
        format!("https://www.niftygateway.com/marketplace/collection/{CONTRACT}/")
    }

    fn extractor() -> ItemExtractor {
        ItemExtractor::new(ExtractorConfig {
            marketplace_base_url: "https://www.niftygateway.com".to_string(),
            nav_retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                jitter: false,
            },
        })
    }

    fn priced_row() -> ListingRow {
        ListingRow {
            item_href: Some(format!("/marketplace/item/{CONTRACT}/8666/")),
            header_cells: vec![
                "Item".into(),
                "Last Sale".into(),
                "List Price".into(),
            ],
            cells: vec!["Cool Cat #8666".into(), "$90.00".into(), "$1,736.13".into()],
            row_text: "Cool Cat #8666 $90.00 $1,736.13".into(),
        }
    }

    #[tokio::test]
    async fn extracts_floor_item_from_first_row() {
        let page = MockListingPage::new();
        page.set_row(&collection_url(), Some(priced_row()));

        let outcome = extractor()
            .extract(&page, &collection_url())
            .await
            .unwrap();

        let ExtractOutcome::Item(item) = outcome else {
            panic!("expected an item, got {outcome:?}");
        };
        assert_eq!(item.floor_price, dec!(1736.13));
        assert_eq!(item.contract, CONTRACT);
        assert_eq!(item.actual_token_id, "8666");
        assert_eq!(
            item.actual_marketplace_url.as_deref(),
            Some(
                format!("https://www.niftygateway.com/marketplace/item/{CONTRACT}/8666/")
                    .as_str()
            )
        );
    }

    #[tokio::test]
    async fn empty_page_is_no_listing() {
        let page = MockListingPage::new();

        let outcome = extractor()
            .extract(&page, &collection_url())
            .await
            .unwrap();

        assert!(matches!(outcome, ExtractOutcome::NoListing { .. }));
    }

    #[tokio::test]
    async fn navigation_retries_transient_failures() {
        let page = MockListingPage::new();
        page.set_row(&collection_url(), Some(priced_row()));
        page.fail_open(&collection_url(), 2);

        let outcome = extractor()
            .extract(&page, &collection_url())
            .await
            .unwrap();

        assert!(matches!(outcome, ExtractOutcome::Item(_)));
        assert_eq!(page.opens(), 3);
    }

    #[tokio::test]
    async fn navigation_exhaustion_is_failed_not_err() {
        let page = MockListingPage::new();
        page.fail_open(&collection_url(), 10);

        let outcome = extractor()
            .extract(&page, &collection_url())
            .await
            .unwrap();

        assert!(matches!(outcome, ExtractOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn lost_session_propagates() {
        let page = MockListingPage::with_config(MockPageConfig {
            session_lost: true,
            ..Default::default()
        });

        let err = extractor()
            .extract(&page, &collection_url())
            .await
            .unwrap_err();

        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn bad_url_is_failed() {
        let page = MockListingPage::new();

        let outcome = extractor()
            .extract(&page, "https://www.niftygateway.com/about")
            .await
            .unwrap();

        assert!(matches!(outcome, ExtractOutcome::Failed { .. }));
    }
}
