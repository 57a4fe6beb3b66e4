//! NFT marketplace arbitrage scanner.
//!
//! Scrapes Nifty Gateway marketplace listings with a real browser session,
//! enriches each floor listing with its best OpenSea collection offer, and
//! flags the spread between them:
//!
//! ```text
//! Floor price:  $1,500.00  (cheapest active listing)
//! Best offer:   $1,650.00  (highest standing collection offer)
//! ──────────────────────
//! Spread:       +$150.00 → RED: buy the listing, accept the offer
//! ```
//!
//! # Pipeline
//!
//! 1. Enumerate collection URLs from the marketplace listing page
//!    (scroll-driven, lazy-loaded DOM).
//! 2. Extract each collection's floor listing from its first table row.
//! 3. Enrich with OpenSea collection metadata and the best standing offer,
//!    converted to USD via a cached ETH price.
//! 4. Classify the offer/floor spread into RED/YELLOW/GREEN/WHITE tiers and
//!    notify on opportunities.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`browser`]: WebDriver session and listing-page access
//! - [`scrape`]: URL enumeration and floor-price extraction
//! - [`enrich`]: OpenSea metadata, offers, and the ETH price oracle
//! - [`arbitrage`]: Spread classification
//! - [`scanner`]: Full-cycle orchestration
//! - [`notify`]: Discord webhook delivery
//! - [`output`]: JSON batch persistence

pub mod arbitrage;
pub mod browser;
pub mod config;
pub mod enrich;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod output;
pub mod retry;
pub mod scanner;
pub mod scrape;
pub mod utils;

pub use config::Config;
pub use error::{Result, ScannerError};
