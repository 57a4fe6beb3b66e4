//! Enrichment of scraped items with off-site data.
//!
//! Three independent sources feed the classifier: collection metadata
//! (contract address to OpenSea slug), the best collection offer for a
//! token, and the ETH/USD conversion rate. All of them are best-effort at
//! the item level; an enrichment failure downgrades the record, it never
//! kills the scan.

pub mod collection;
pub mod offers;
pub mod oracle;

pub use collection::CollectionEnricher;
pub use offers::{OfferData, OfferEnricher};
pub use oracle::{EthPriceOracle, FixedOracle, PriceOracle, RateQuote};
