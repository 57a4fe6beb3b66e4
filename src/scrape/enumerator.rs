//! Phase 1: exhaustive enumeration of collection URLs from the listing page.
//!
//! The page lazy-loads content on scroll, so the enumerator keeps scrolling
//! with rotated strategies and randomized pacing until the link set stops
//! growing, a scroll cap is hit, or enough items were found. Deterministic
//! access patterns get flagged by the site, so the jitter is load-bearing.

use std::collections::HashSet;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::browser::ListingPage;
use crate::config::Config;
use crate::error::BrowserError;
use crate::metrics;
use crate::scrape::parse::normalize_collection_url;
use crate::utils::ShutdownHandle;

/// Enumeration tuning. Stall/pause values are operational defaults, not
/// semantic invariants.
#[derive(Debug, Clone)]
pub struct EnumeratorConfig {
    /// Stop once this many distinct URLs were found (0 = unlimited).
    pub max_items: usize,
    /// Hard cap on scroll rounds.
    pub max_scrolls: u32,
    /// Consecutive no-progress rounds before declaring a stall.
    pub stall_limit: u32,
    /// Base pause after each scroll action.
    pub pause: Duration,
    /// Random jitter added on top of each pause.
    pub jitter: Duration,
}

impl From<&Config> for EnumeratorConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_items: config.max_items,
            max_scrolls: config.max_scrolls,
            stall_limit: config.stall_limit,
            pause: Duration::from_millis(config.scroll_pause_ms),
            jitter: Duration::from_millis(config.scroll_jitter_ms),
        }
    }
}

/// Collects a deduplicated, first-seen-ordered sequence of listing URLs.
pub struct ListingEnumerator {
    config: EnumeratorConfig,
}

impl ListingEnumerator {
    /// Create an enumerator with the given tuning.
    pub fn new(config: EnumeratorConfig) -> Self {
        Self { config }
    }

    /// Walk the already-open listing page until exhaustion.
    ///
    /// Single scroll/read failures are logged no-ops that count toward the
    /// stall; only a lost session aborts. Returns first-seen order with no
    /// duplicates.
    pub async fn enumerate<P: ListingPage>(
        &self,
        page: &P,
        shutdown: &ShutdownHandle,
    ) -> Result<Vec<String>, BrowserError> {
        let mut ordered: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        // Initial sweep before any scrolling.
        self.scan_and_merge(page, &mut ordered, &mut seen).await?;
        info!(initial = ordered.len(), "Initial listing sweep complete");

        let mut scrolls = 0u32;
        let mut stalled = 0u32;

        while scrolls < self.config.max_scrolls
            && stalled < self.config.stall_limit
            && !self.target_reached(ordered.len())
        {
            if shutdown.is_triggered() {
                info!("Shutdown requested, stopping enumeration early");
                break;
            }

            let before = ordered.len();

            if let Err(e) = self.scroll_round(page, scrolls).await {
                if e.is_fatal() {
                    return Err(e);
                }
                // A failed scroll is a no-op round; it still counts toward
                // the stall so a wedged page terminates.
                warn!(error = %e, "Scroll round failed, treating as no-op");
            }

            self.scan_and_merge(page, &mut ordered, &mut seen).await?;

            let found = ordered.len() - before;
            if found > 0 {
                debug!(round = scrolls + 1, found, total = ordered.len(), "New URLs this round");
                stalled = 0;
            } else {
                stalled += 1;
                debug!(
                    round = scrolls + 1,
                    stalled,
                    stall_limit = self.config.stall_limit,
                    "No new URLs this round"
                );
            }

            scrolls += 1;
            tokio::time::sleep(self.jittered_pause() / 2).await;
        }

        // Final sweep catches anything the last scroll rendered late.
        self.scan_and_merge(page, &mut ordered, &mut seen).await?;

        if self.config.max_items > 0 && ordered.len() > self.config.max_items {
            ordered.truncate(self.config.max_items);
        }

        metrics::add_urls_discovered(ordered.len() as u64);
        info!(
            total = ordered.len(),
            scrolls,
            stalled,
            "URL enumeration complete"
        );
        Ok(ordered)
    }

    fn target_reached(&self, count: usize) -> bool {
        self.config.max_items > 0 && count >= self.config.max_items
    }

    /// One scroll round. Strategies rotate so the access pattern never
    /// settles into a fixed rhythm.
    async fn scroll_round<P: ListingPage>(
        &self,
        page: &P,
        round: u32,
    ) -> Result<(), BrowserError> {
        match round % 3 {
            // Jump to the bottom of the document.
            0 => {
                let height = page.page_height().await?;
                page.scroll_to(height).await?;
                tokio::time::sleep(self.jittered_pause()).await;
            }
            // Several small forward steps of varied amplitude.
            1 => {
                let mut position = page.scroll_offset().await?;
                for step in 0..5u64 {
                    let amplitude = 800 + step * 400 + rand::thread_rng().gen_range(0..=300);
                    position += amplitude;
                    page.scroll_to(position).await?;
                    tokio::time::sleep(self.jittered_pause() / 3).await;
                }
            }
            // Over-scroll past the reported bottom to poke the lazy loader.
            _ => {
                let height = page.page_height().await?;
                let overshoot = 1_000 + rand::thread_rng().gen_range(0..=500);
                page.scroll_to(height + overshoot).await?;
                tokio::time::sleep(self.jittered_pause()).await;
            }
        }
        Ok(())
    }

    async fn scan_and_merge<P: ListingPage>(
        &self,
        page: &P,
        ordered: &mut Vec<String>,
        seen: &mut HashSet<String>,
    ) -> Result<(), BrowserError> {
        let hrefs = match page.collect_listing_links().await {
            Ok(hrefs) => hrefs,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(error = %e, "Link scan failed, treating as empty");
                Vec::new()
            }
        };

        for href in hrefs {
            if let Some(url) = normalize_collection_url(&href) {
                if seen.insert(url.clone()) {
                    ordered.push(url);
                }
            }
        }
        Ok(())
    }

    fn jittered_pause(&self) -> Duration {
        let jitter_ms = self.config.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.config.pause;
        }
        self.config.pause + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}
