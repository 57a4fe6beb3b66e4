//! WebDriver-backed implementation of the [`ListingPage`] capability.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thirtyfour::error::WebDriverError;
use thirtyfour::prelude::*;
use tracing::{debug, instrument};

use super::{ListingPage, ListingRow};
use crate::config::Config;
use crate::error::BrowserError;

/// CSS selector for collection links on the explore page.
const COLLECTION_LINK_CSS: &str = "a[href*='/marketplace/collection/']";
/// CSS selector for item links inside a collection's marketplace table.
const ITEM_LINK_CSS: &str = "a[href*='/marketplace/item/']";
/// CSS selector for marketplace table rows, cheapest first.
const TABLE_ROW_CSS: &str = "table tbody tr";
/// CSS selector for marketplace table header cells.
const TABLE_HEADER_CSS: &str = "table th";

/// Browser session owned exclusively by one scan cycle.
pub struct WebDriverPage {
    driver: WebDriver,
}

impl WebDriverPage {
    /// Connect to the WebDriver endpoint and configure the session.
    pub async fn connect(config: &Config) -> Result<Self, BrowserError> {
        let mut caps = DesiredCapabilities::chrome();
        if config.headless {
            caps.set_headless()?;
        }
        caps.add_arg("--no-sandbox")?;
        caps.add_arg("--disable-dev-shm-usage")?;
        caps.add_arg("--disable-gpu")?;
        caps.add_arg("--window-size=1920,1080")?;
        caps.add_arg(
            "--user-agent=Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
        )?;

        let driver = WebDriver::new(&config.webdriver_url, caps)
            .await
            .map_err(|e| BrowserError::SessionLost(e.to_string()))?;

        driver
            .set_page_load_timeout(Duration::from_millis(config.nav_timeout_ms))
            .await?;

        debug!(endpoint = %config.webdriver_url, "WebDriver session established");
        Ok(Self { driver })
    }

    /// Close the browser session.
    pub async fn quit(self) -> Result<(), BrowserError> {
        self.driver.quit().await?;
        Ok(())
    }

    fn classify(url: &str, e: WebDriverError) -> BrowserError {
        let msg = e.to_string();
        let lower = msg.to_lowercase();
        if lower.contains("invalid session")
            || lower.contains("session not created")
            || lower.contains("session deleted")
            || lower.contains("disconnected")
        {
            BrowserError::SessionLost(msg)
        } else if lower.contains("stale element") {
            BrowserError::StaleElement(msg)
        } else if lower.contains("timeout") || lower.contains("timed out") {
            BrowserError::Timeout {
                url: url.to_string(),
            }
        } else {
            BrowserError::Navigation {
                url: url.to_string(),
                reason: msg,
            }
        }
    }

    async fn execute_number(&self, script: &str) -> Result<u64, BrowserError> {
        let ret = self
            .driver
            .execute(script, Vec::new())
            .await
            .map_err(|e| BrowserError::ScriptFailed(e.to_string()))?;
        let value: f64 = ret
            .convert()
            .map_err(|e| BrowserError::ScriptFailed(e.to_string()))?;
        Ok(value.max(0.0) as u64)
    }
}

#[async_trait]
impl ListingPage for WebDriverPage {
    #[instrument(skip(self), fields(url = %url))]
    async fn open(&self, url: &str) -> Result<(), BrowserError> {
        self.driver
            .goto(url)
            .await
            .map_err(|e| Self::classify(url, e))
    }

    async fn collect_listing_links(&self) -> Result<Vec<String>, BrowserError> {
        let elements = self
            .driver
            .find_all(By::Css(COLLECTION_LINK_CSS))
            .await
            .map_err(|e| Self::classify("<listing page>", e))?;

        let mut hrefs = Vec::with_capacity(elements.len());
        for element in elements {
            // A handle can go stale mid-scan while the page re-renders;
            // skip it, the next pass will pick the link up again.
            match element.attr("href").await {
                Ok(Some(href)) => hrefs.push(href),
                Ok(None) => {}
                Err(e) => debug!(error = %e, "skipping unreadable link element"),
            }
        }
        Ok(hrefs)
    }

    async fn scroll_to(&self, y: u64) -> Result<(), BrowserError> {
        self.driver
            .execute("window.scrollTo(0, arguments[0]);", vec![json!(y)])
            .await
            .map_err(|e| BrowserError::ScriptFailed(e.to_string()))?;
        Ok(())
    }

    async fn scroll_offset(&self) -> Result<u64, BrowserError> {
        self.execute_number("return window.pageYOffset;").await
    }

    async fn page_height(&self) -> Result<u64, BrowserError> {
        self.execute_number("return document.body.scrollHeight;")
            .await
    }

    async fn first_listing_row(&self) -> Result<Option<ListingRow>, BrowserError> {
        let rows = self
            .driver
            .find_all(By::Css(TABLE_ROW_CSS))
            .await
            .map_err(|e| Self::classify("<collection page>", e))?;

        let Some(row) = rows.into_iter().next() else {
            // No table rendered at all; some pages expose bare item links.
            let links = self
                .driver
                .find_all(By::Css(ITEM_LINK_CSS))
                .await
                .map_err(|e| Self::classify("<collection page>", e))?;
            if let Some(link) = links.first() {
                let href = link
                    .attr("href")
                    .await
                    .map_err(|e| Self::classify("<collection page>", e))?;
                return Ok(Some(ListingRow {
                    item_href: href,
                    ..Default::default()
                }));
            }
            return Ok(None);
        };

        let mut listing = ListingRow::default();

        listing.row_text = row
            .text()
            .await
            .map_err(|e| Self::classify("<collection page>", e))?;

        if let Ok(links) = row.find_all(By::Css(ITEM_LINK_CSS)).await {
            if let Some(link) = links.first() {
                if let Ok(href) = link.attr("href").await {
                    listing.item_href = href;
                }
            }
        }

        if let Ok(cells) = row.find_all(By::Css("td")).await {
            for cell in cells {
                listing.cells.push(cell.text().await.unwrap_or_default());
            }
        }

        if let Ok(headers) = self.driver.find_all(By::Css(TABLE_HEADER_CSS)).await {
            for header in headers {
                listing
                    .header_cells
                    .push(header.text().await.unwrap_or_default());
            }
        }

        Ok(Some(listing))
    }
}
