//! Flat result records and JSON batch persistence.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::info;

use crate::arbitrage::ArbitrageResult;
use crate::enrich::OfferData;
use crate::error::Result;
use crate::scrape::types::EnrichedItem;

/// One fully-processed item, flattened for downstream consumers.
///
/// Offer fields are absent entirely (not null) when no offer exists, so the
/// JSON stays greppable with plain tools.
#[derive(Debug, Clone, Serialize)]
pub struct OutputRecord {
    /// Scraped and enriched item fields.
    #[serde(flatten)]
    pub item: EnrichedItem,
    /// Best offer fields, when an offer exists.
    #[serde(flatten)]
    pub offer: Option<OfferData>,
    /// Classification fields.
    #[serde(flatten)]
    pub arbitrage: ArbitrageResult,
}

const FILE_STAMP: &[FormatItem<'_>] =
    format_description!("[year][month][day]_[hour][minute][second]");

/// Writes scan batches as timestamped JSON files.
pub struct OutputWriter {
    dir: PathBuf,
}

impl OutputWriter {
    /// Writer rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Persist one batch. Returns the path written.
    ///
    /// Partial batches from aborted cycles are written the same way; an empty
    /// batch still produces a file so every cycle leaves a trace.
    pub fn write_batch(&self, records: &[OutputRecord]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let stamp = OffsetDateTime::now_utc()
            .format(FILE_STAMP)
            .unwrap_or_else(|_| "unknown".to_string());
        let path = self.dir.join(format!("arbitrage_scan_{stamp}.json"));

        let json = serde_json::to_vec_pretty(records)?;
        fs::write(&path, json)?;

        info!(path = %path.display(), records = records.len(), "Scan results written");
        Ok(path)
    }

    /// The directory batches land in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::classify;
    use crate::scrape::types::{CollectionInfo, RawItem};
    use rust_decimal_macros::dec;

    fn sample_record() -> OutputRecord {
        let raw = RawItem {
            marketplace_url: "https://www.niftygateway.com/marketplace/collection/0xabc/"
                .to_string(),
            actual_marketplace_url: Some(
                "https://www.niftygateway.com/marketplace/item/0xabc/42/".to_string(),
            ),
            floor_price: dec!(1736.13),
            floor_price_text: "$1,736.13 (Table List Price)".to_string(),
            contract: "0xabc".to_string(),
            actual_token_id: "42".to_string(),
            scraped_at: OffsetDateTime::now_utc(),
        };
        let mut item = EnrichedItem::from_raw(raw);
        item.collection = Some(CollectionInfo {
            name: "Test".to_string(),
            slug: "test".to_string(),
        });
        OutputRecord {
            item,
            offer: None,
            arbitrage: classify(dec!(1736.13), None).unwrap(),
        }
    }

    #[test]
    fn record_serializes_flat() {
        let json = serde_json::to_value(sample_record()).unwrap();
        // Fields from all three sources sit at the top level.
        assert_eq!(json["contract"], "0xabc");
        assert_eq!(json["arbitrage_flag"], "NO_OFFER");
        assert!(json.get("marketplace_url").is_some());
        // No offer: offer fields are absent, not null.
        assert!(json.get("offer_amount_usd").is_none());
    }

    #[test]
    fn write_batch_creates_dir_and_file() {
        let dir = std::env::temp_dir().join(format!(
            "nifty-arb-output-test-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);

        let writer = OutputWriter::new(&dir);
        let path = writer.write_batch(&[sample_record()]).unwrap();

        let body = fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 1);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn empty_batch_still_writes_a_file() {
        let dir = std::env::temp_dir().join(format!(
            "nifty-arb-output-empty-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);

        let writer = OutputWriter::new(&dir);
        let path = writer.write_batch(&[]).unwrap();
        assert!(path.exists());

        fs::remove_dir_all(&dir).unwrap();
    }
}
