//! Full scan cycle orchestration: enumerate, extract, enrich, classify.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::arbitrage::{classify, ArbitrageFlag};
use crate::browser::ListingPage;
use crate::config::Config;
use crate::enrich::{CollectionEnricher, OfferEnricher, PriceOracle};
use crate::error::{Result, ScannerError};
use crate::metrics;
use crate::notify::Notifier;
use crate::output::{OutputRecord, OutputWriter};
use crate::scrape::{
    EnumeratorConfig, ExtractOutcome, ExtractorConfig, ItemExtractor, ListingEnumerator,
};
use crate::scrape::types::EnrichedItem;
use crate::utils::ShutdownHandle;

/// Counters for one scan cycle.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ScanStats {
    /// URLs the pipeline attempted.
    pub processed: usize,
    /// Items with a confirmed floor price.
    pub scraped: usize,
    /// Pages with no active listing.
    pub no_listing: usize,
    /// Pages that failed extraction or classification.
    pub failed: usize,
    /// RED-tier records.
    pub red: usize,
    /// YELLOW-tier records.
    pub yellow: usize,
    /// GREEN-tier records.
    pub green: usize,
    /// WHITE-tier records.
    pub white: usize,
    /// Records without a standing offer.
    pub no_offer: usize,
}

impl ScanStats {
    /// Folds another cycle's counters into a running session total.
    pub fn absorb(&mut self, other: &ScanStats) {
        self.processed += other.processed;
        self.scraped += other.scraped;
        self.no_listing += other.no_listing;
        self.failed += other.failed;
        self.red += other.red;
        self.yellow += other.yellow;
        self.green += other.green;
        self.white += other.white;
        self.no_offer += other.no_offer;
    }

    fn count_flag(&mut self, flag: ArbitrageFlag) {
        match flag {
            ArbitrageFlag::Red => self.red += 1,
            ArbitrageFlag::Yellow => self.yellow += 1,
            ArbitrageFlag::Green => self.green += 1,
            ArbitrageFlag::White => self.white += 1,
            ArbitrageFlag::NoOffer => self.no_offer += 1,
        }
    }
}

/// Result of one scan cycle. Partial on abort.
#[derive(Debug)]
pub struct ScanReport {
    /// Records produced, post offer-only filtering.
    pub records: Vec<OutputRecord>,
    /// Cycle counters.
    pub stats: ScanStats,
    /// Set when the cycle stopped before exhausting its URLs.
    pub aborted: Option<String>,
    /// Where the batch was written, if persistence succeeded.
    pub output_path: Option<PathBuf>,
}

/// Drives one full listing-to-records pipeline pass.
pub struct Scanner {
    config: Config,
    enumerator: ListingEnumerator,
    extractor: ItemExtractor,
    collections: CollectionEnricher,
    offers: OfferEnricher,
    oracle: Arc<dyn PriceOracle>,
    notifier: Arc<dyn Notifier>,
    writer: OutputWriter,
}

impl Scanner {
    /// Assemble a scanner from configuration and injected collaborators.
    pub fn new(
        config: Config,
        client: reqwest::Client,
        oracle: Arc<dyn PriceOracle>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            enumerator: ListingEnumerator::new(EnumeratorConfig::from(&config)),
            extractor: ItemExtractor::new(ExtractorConfig::from(&config)),
            collections: CollectionEnricher::new(client.clone(), &config),
            offers: OfferEnricher::new(client, &config),
            oracle,
            notifier,
            writer: OutputWriter::new(config.output_dir.clone()),
            config,
        }
    }

    /// Run one cycle against an already-connected page session.
    ///
    /// A failure to load the listing page itself fails the cycle. Per-item
    /// failures are counted and skipped. A lost browser session aborts the
    /// cycle but keeps everything collected so far.
    #[instrument(skip_all)]
    pub async fn run_cycle<P: ListingPage>(
        &self,
        page: &P,
        shutdown: &ShutdownHandle,
    ) -> Result<ScanReport> {
        let start = Instant::now();
        metrics::inc_scan_cycles();
        self.notifier.notify_startup(&self.config.listing_url).await;

        info!(url = %self.config.listing_url, "Opening listing page");
        page.open(&self.config.listing_url)
            .await
            .map_err(ScannerError::Browser)?;

        let urls = self
            .enumerator
            .enumerate(page, shutdown)
            .await
            .map_err(ScannerError::Browser)?;
        info!(count = urls.len(), "Processing enumerated listings");

        let mut stats = ScanStats::default();
        let mut records = Vec::new();
        let mut aborted = None;

        for url in &urls {
            if shutdown.is_triggered() {
                info!("Shutdown requested, stopping cycle early");
                aborted = Some("shutdown requested".to_string());
                break;
            }

            stats.processed += 1;
            metrics::inc_items_processed();

            match self.process_url(page, url, &mut stats).await {
                Ok(Some(record)) => {
                    let flag = record.arbitrage.arbitrage_flag;
                    metrics::inc_opportunities(&flag.to_string());
                    if flag.is_opportunity() {
                        self.notifier.notify_opportunity(&record).await;
                    }
                    if flag == ArbitrageFlag::NoOffer && self.config.offer_only {
                        continue;
                    }
                    records.push(record);
                }
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, "Browser session lost, aborting cycle");
                    metrics::inc_scan_aborts();
                    aborted = Some(e.to_string());
                    break;
                }
            }
        }

        let output_path = match self.writer.write_batch(&records) {
            Ok(path) => Some(path),
            Err(e) => {
                error!(error = %e, "Failed to persist scan results");
                None
            }
        };

        self.notifier.notify_summary(&stats).await;
        metrics::record_scan_duration(start);
        info!(
            processed = stats.processed,
            scraped = stats.scraped,
            red = stats.red,
            yellow = stats.yellow,
            green = stats.green,
            aborted = aborted.is_some(),
            "Scan cycle finished"
        );

        Ok(ScanReport {
            records,
            stats,
            aborted,
            output_path,
        })
    }

    /// One URL through extract, enrich, classify.
    ///
    /// `Err` only for fatal browser failures; everything else lands in
    /// `stats` and `Ok(None)`.
    async fn process_url<P: ListingPage>(
        &self,
        page: &P,
        url: &str,
        stats: &mut ScanStats,
    ) -> std::result::Result<Option<OutputRecord>, crate::error::BrowserError> {
        let raw = match self.extractor.extract(page, url).await? {
            ExtractOutcome::Item(raw) => raw,
            ExtractOutcome::NoListing { reason } => {
                stats.no_listing += 1;
                metrics::inc_items_no_listing();
                info!(url, reason, "No active listing");
                return Ok(None);
            }
            ExtractOutcome::Failed { reason } => {
                stats.failed += 1;
                metrics::inc_items_failed();
                warn!(url, reason, "Extraction failed");
                return Ok(None);
            }
        };
        stats.scraped += 1;
        metrics::inc_items_scraped();

        let item = self.enrich(raw).await;
        let offer = match &item.collection {
            Some(info) => {
                match self
                    .offers
                    .best_offer(&info.slug, &item.raw.actual_token_id, self.oracle.as_ref())
                    .await
                {
                    Ok(offer) => offer,
                    Err(e) => {
                        warn!(slug = %info.slug, error = %e, "Offer lookup failed, treating as no offer");
                        None
                    }
                }
            }
            None => None,
        };

        let arbitrage = match classify(item.raw.floor_price, offer.as_ref()) {
            Ok(result) => result,
            Err(e) => {
                stats.failed += 1;
                metrics::inc_items_failed();
                warn!(url, error = %e, "Classification rejected item");
                return Ok(None);
            }
        };
        stats.count_flag(arbitrage.arbitrage_flag);

        Ok(Some(OutputRecord {
            item,
            offer,
            arbitrage,
        }))
    }

    /// Attach collection metadata and OpenSea links. Best effort.
    async fn enrich(&self, raw: crate::scrape::types::RawItem) -> EnrichedItem {
        let mut item = EnrichedItem::from_raw(raw);
        match self.collections.collection_for(&item.raw.contract).await {
            Ok(Some(info)) => {
                item.opensea_collection_url =
                    Some(format!("https://opensea.io/collection/{}", info.slug));
                item.opensea_item_url = Some(format!(
                    "https://opensea.io/assets/ethereum/{}/{}",
                    item.raw.contract, item.raw.actual_token_id
                ));
                item.opensea_enriched_at = Some(time::OffsetDateTime::now_utc());
                item.collection = Some(info);
            }
            Ok(None) => {
                info!(contract = %item.raw.contract, "Contract has no OpenSea collection");
            }
            Err(e) => {
                warn!(contract = %item.raw.contract, error = %e, "Collection enrichment failed");
            }
        }
        item
    }
}
