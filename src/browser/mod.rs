//! Narrow capability interface over the browser session.
//!
//! The scraping pipeline only ever needs a handful of page operations, so the
//! rendered-DOM dependency is isolated behind [`ListingPage`] and the
//! underlying automation technology stays swappable. [`webdriver`] is the
//! production implementation; [`mock`] is a scripted page for tests.

pub mod mock;
pub mod webdriver;

use async_trait::async_trait;

use crate::error::BrowserError;

pub use mock::{MockListingPage, MockPageConfig};
pub use webdriver::WebDriverPage;

/// The cheapest row of a collection's marketplace table, as raw text.
/// Interpretation (price column detection, token id patterns) is pure and
/// lives in `scrape::parse`.
#[derive(Debug, Clone, Default)]
pub struct ListingRow {
    /// href of the row's item link, if any.
    pub item_href: Option<String>,
    /// Table header cell texts, lowercased by the caller when matching.
    pub header_cells: Vec<String>,
    /// Row cell texts, in column order.
    pub cells: Vec<String>,
    /// Full visible text of the row.
    pub row_text: String,
}

/// Page operations the enumerator and extractor are allowed to perform.
#[async_trait]
pub trait ListingPage: Send + Sync {
    /// Navigate to a URL and wait for the initial render.
    async fn open(&self, url: &str) -> Result<(), BrowserError>;

    /// Collect all collection-link hrefs currently present in the DOM.
    /// Duplicates and query strings are the caller's problem.
    async fn collect_listing_links(&self) -> Result<Vec<String>, BrowserError>;

    /// Absolute scroll to a vertical offset.
    async fn scroll_to(&self, y: u64) -> Result<(), BrowserError>;

    /// Current vertical scroll offset.
    async fn scroll_offset(&self) -> Result<u64, BrowserError>;

    /// Current full document height.
    async fn page_height(&self) -> Result<u64, BrowserError>;

    /// First (cheapest) row of the marketplace table on the current page,
    /// or None when the page has no table at all.
    async fn first_listing_row(&self) -> Result<Option<ListingRow>, BrowserError>;
}
