//! Pipeline record types.

use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;

/// One scraped floor item. Only constructed when a real listing price was
/// found; priceless items never enter the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct RawItem {
    /// The enumerated collection URL this item came from.
    pub marketplace_url: String,
    /// Canonical URL of the actual cheapest item, once resolved.
    pub actual_marketplace_url: Option<String>,
    /// Floor price in USD.
    pub floor_price: Decimal,
    /// Display form of the price as scraped.
    pub floor_price_text: String,
    /// Contract address from the collection URL.
    pub contract: String,
    /// Token id of the cheapest listed item. String: ids can exceed u64.
    pub actual_token_id: String,
    /// When the item was scraped.
    #[serde(with = "time::serde::rfc3339")]
    pub scraped_at: OffsetDateTime,
}

/// Collection metadata from the OpenSea API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    /// Human-readable collection name.
    #[serde(rename = "collection_name")]
    pub name: String,
    /// OpenSea collection slug.
    #[serde(rename = "collection_slug")]
    pub slug: String,
}

/// A [`RawItem`] plus optional collection metadata. Enrichment is additive
/// only; a missing lookup never invalidates the underlying item.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedItem {
    /// The scraped item.
    #[serde(flatten)]
    pub raw: RawItem,
    /// Collection metadata, when the lookup succeeded. Serialized flat so
    /// output records stay plain key/value.
    #[serde(flatten)]
    pub collection: Option<CollectionInfo>,
    /// OpenSea collection page URL.
    pub opensea_collection_url: Option<String>,
    /// OpenSea item page URL.
    pub opensea_item_url: Option<String>,
    /// When the enrichment attempt happened.
    #[serde(with = "time::serde::rfc3339::option")]
    pub opensea_enriched_at: Option<OffsetDateTime>,
}

impl EnrichedItem {
    /// Wrap a raw item with no enrichment yet.
    pub fn from_raw(raw: RawItem) -> Self {
        Self {
            raw,
            collection: None,
            opensea_collection_url: None,
            opensea_item_url: None,
            opensea_enriched_at: None,
        }
    }
}

/// Terminal outcome of extracting one enumerated URL.
#[derive(Debug)]
pub enum ExtractOutcome {
    /// A priced item was extracted.
    Item(RawItem),
    /// The page rendered but carries no active listing. Skipped, not an error.
    NoListing {
        /// Why the page was classified as unlisted.
        reason: String,
    },
    /// Extraction failed after retries.
    Failed {
        /// The failure description.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub(crate) fn sample_raw_item() -> RawItem {
        RawItem {
            marketplace_url: "https://www.niftygateway.com/marketplace/collection/0xabc/".into(),
            actual_marketplace_url: Some(
                "https://www.niftygateway.com/marketplace/item/0xabc/42/".into(),
            ),
            floor_price: dec!(150.00),
            floor_price_text: "$150.00 (Table List Price)".into(),
            contract: "0xabc".into(),
            actual_token_id: "42".into(),
            scraped_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn enriched_item_flattens_raw_fields() {
        let enriched = EnrichedItem::from_raw(sample_raw_item());
        let json = serde_json::to_value(&enriched).unwrap();
        assert_eq!(json["contract"], "0xabc");
        assert_eq!(json["actual_token_id"], "42");
        assert!(json.get("collection_name").is_none());
    }

    #[test]
    fn collection_metadata_serializes_flat() {
        let mut enriched = EnrichedItem::from_raw(sample_raw_item());
        enriched.collection = Some(CollectionInfo {
            name: "Wassies".into(),
            slug: "wassies-by-wassies".into(),
        });
        let json = serde_json::to_value(&enriched).unwrap();
        assert_eq!(json["collection_name"], "Wassies");
        assert_eq!(json["collection_slug"], "wassies-by-wassies");
    }
}
