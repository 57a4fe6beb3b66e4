//! Scripted in-memory page for unit testing the enumerator and extractor
//! without a browser.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ListingPage, ListingRow};
use crate::error::BrowserError;

/// Configuration for mock page behavior.
#[derive(Debug, Clone, Default)]
pub struct MockPageConfig {
    /// Fail every link scan.
    pub fail_links: bool,
    /// Treat the session as lost on the next operation.
    pub session_lost: bool,
}

/// Scripted page: each scroll reveals the next batch of links.
pub struct MockListingPage {
    config: MockPageConfig,
    /// Batches of links revealed by successive scrolls.
    pending_batches: Mutex<VecDeque<Vec<String>>>,
    /// Links currently in the "DOM".
    visible_links: Mutex<Vec<String>>,
    /// Per-URL listing rows served by `first_listing_row`.
    rows: Mutex<HashMap<String, Option<ListingRow>>>,
    /// Remaining open failures per URL.
    open_failures_left: Mutex<HashMap<String, u32>>,
    current_url: Mutex<String>,
    scroll_count: AtomicU64,
    open_count: AtomicU64,
}

impl MockListingPage {
    /// Create an empty mock page.
    pub fn new() -> Self {
        Self::with_config(MockPageConfig::default())
    }

    /// Create a mock page with custom failure behavior.
    pub fn with_config(config: MockPageConfig) -> Self {
        Self {
            config,
            pending_batches: Mutex::new(VecDeque::new()),
            visible_links: Mutex::new(Vec::new()),
            rows: Mutex::new(HashMap::new()),
            open_failures_left: Mutex::new(HashMap::new()),
            current_url: Mutex::new(String::new()),
            scroll_count: AtomicU64::new(0),
            open_count: AtomicU64::new(0),
        }
    }

    /// Set the links present before any scroll.
    pub fn set_initial_links(&self, links: Vec<String>) {
        *self.visible_links.lock().unwrap() = links;
    }

    /// Queue a batch of links to appear after the next scroll.
    pub fn push_scroll_batch(&self, links: Vec<String>) {
        self.pending_batches.lock().unwrap().push_back(links);
    }

    /// Serve a listing row for a collection URL.
    pub fn set_row(&self, url: impl Into<String>, row: Option<ListingRow>) {
        self.rows.lock().unwrap().insert(url.into(), row);
    }

    /// Make `url` fail to open `times` times before succeeding.
    pub fn fail_open(&self, url: impl Into<String>, times: u32) {
        self.open_failures_left.lock().unwrap().insert(url.into(), times);
    }

    /// Number of scroll actions issued so far.
    pub fn scrolls(&self) -> u64 {
        self.scroll_count.load(Ordering::SeqCst)
    }

    /// Number of navigations issued so far.
    pub fn opens(&self) -> u64 {
        self.open_count.load(Ordering::SeqCst)
    }

    /// The URL the page is currently on.
    pub fn current_url(&self) -> String {
        self.current_url.lock().unwrap().clone()
    }

    fn check_session(&self) -> Result<(), BrowserError> {
        if self.config.session_lost {
            Err(BrowserError::SessionLost("mock session lost".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for MockListingPage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ListingPage for MockListingPage {
    async fn open(&self, url: &str) -> Result<(), BrowserError> {
        self.check_session()?;
        self.open_count.fetch_add(1, Ordering::SeqCst);

        let mut failures = self.open_failures_left.lock().unwrap();
        if let Some(left) = failures.get_mut(url) {
            if *left > 0 {
                *left -= 1;
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    reason: "mock navigation failure".to_string(),
                });
            }
        }
        drop(failures);

        *self.current_url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn collect_listing_links(&self) -> Result<Vec<String>, BrowserError> {
        self.check_session()?;
        if self.config.fail_links {
            return Err(BrowserError::ScriptFailed("mock link scan failure".to_string()));
        }
        Ok(self.visible_links.lock().unwrap().clone())
    }

    async fn scroll_to(&self, _y: u64) -> Result<(), BrowserError> {
        self.check_session()?;
        self.scroll_count.fetch_add(1, Ordering::SeqCst);
        if let Some(batch) = self.pending_batches.lock().unwrap().pop_front() {
            self.visible_links.lock().unwrap().extend(batch);
        }
        Ok(())
    }

    async fn scroll_offset(&self) -> Result<u64, BrowserError> {
        self.check_session()?;
        Ok(self.scroll_count.load(Ordering::SeqCst) * 800)
    }

    async fn page_height(&self) -> Result<u64, BrowserError> {
        self.check_session()?;
        let visible = self.visible_links.lock().unwrap().len() as u64;
        Ok(2_000 + visible * 400)
    }

    async fn first_listing_row(&self) -> Result<Option<ListingRow>, BrowserError> {
        self.check_session()?;
        let url = self.current_url.lock().unwrap().clone();
        Ok(self.rows.lock().unwrap().get(&url).cloned().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scrolling_reveals_batches_in_order() {
        let page = MockListingPage::new();
        page.set_initial_links(vec!["a".to_string()]);
        page.push_scroll_batch(vec!["b".to_string()]);
        page.push_scroll_batch(vec!["c".to_string()]);

        assert_eq!(page.collect_listing_links().await.unwrap(), vec!["a"]);
        page.scroll_to(800).await.unwrap();
        assert_eq!(page.collect_listing_links().await.unwrap(), vec!["a", "b"]);
        page.scroll_to(1600).await.unwrap();
        assert_eq!(
            page.collect_listing_links().await.unwrap(),
            vec!["a", "b", "c"]
        );
        // Further scrolls reveal nothing new.
        page.scroll_to(2400).await.unwrap();
        assert_eq!(page.collect_listing_links().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn open_failures_run_out() {
        let page = MockListingPage::new();
        page.fail_open("https://x/collection/0xabc", 2);

        assert!(page.open("https://x/collection/0xabc").await.is_err());
        assert!(page.open("https://x/collection/0xabc").await.is_err());
        assert!(page.open("https://x/collection/0xabc").await.is_ok());
        assert_eq!(page.opens(), 3);
    }

    #[tokio::test]
    async fn lost_session_fails_everything() {
        let page = MockListingPage::with_config(MockPageConfig {
            session_lost: true,
            ..Default::default()
        });
        let err = page.open("https://x").await.unwrap_err();
        assert!(err.is_fatal());
    }
}
