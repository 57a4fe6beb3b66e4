//! Two-phase scraping pipeline: enumerate listing URLs, then extract
//! per-collection floor data.

pub mod enumerator;
pub mod extractor;
pub mod parse;
pub mod types;

pub use enumerator::{EnumeratorConfig, ListingEnumerator};
pub use extractor::{ExtractorConfig, ItemExtractor};
pub use types::{EnrichedItem, ExtractOutcome, RawItem};
