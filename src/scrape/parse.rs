//! Pure parsing of marketplace URLs, price text, and listing-table rows.
//!
//! All interpretation of scraped text lives here, separate from the DOM
//! access in `browser`, so it can be tested without a session.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use crate::browser::ListingRow;

static CONTRACT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/marketplace/(?:collectible|collection)/([a-fA-F0-9x]+)(?:/(\d+))?").unwrap()
});

static ITEM_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/marketplace/item/[^/]+/(\d+)/").unwrap());

static PRICE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$([0-9,]+\.?[0-9]*)").unwrap());

static ROW_TOKEN_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"#(\d+)\s*/\s*\d+").unwrap(),
        Regex::new(r"#(\d+)/\d+").unwrap(),
        Regex::new(r"#(\d+)").unwrap(),
    ]
});

/// Contract address and optional token id parsed from a marketplace URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    /// Contract address.
    pub contract: String,
    /// Token id present only on collectible-style URLs.
    pub token_id: Option<String>,
}

/// Extract contract address (and token id, if present) from a marketplace URL.
pub fn parse_marketplace_url(url: &str) -> Option<UrlParts> {
    let caps = CONTRACT_RE.captures(url)?;
    Some(UrlParts {
        contract: caps.get(1)?.as_str().to_string(),
        token_id: caps.get(2).map(|m| m.as_str().to_string()),
    })
}

/// Normalize a collection href for deduplication: must be a collection URL,
/// with query string and fragment stripped.
pub fn normalize_collection_url(href: &str) -> Option<String> {
    if !href.contains("/marketplace/collection/") {
        return None;
    }
    let base = href.split(['?', '#']).next().unwrap_or(href);
    Some(base.to_string())
}

/// Extract a dollar price from display text. Commas are thousands separators.
pub fn parse_price_text(text: &str) -> Option<Decimal> {
    let caps = PRICE_RE.captures(text)?;
    caps.get(1)?.as_str().replace(',', "").parse().ok()
}

/// Whether a table cell marks the absence of a listing.
pub fn is_no_listing_marker(text: &str) -> bool {
    matches!(text.trim(), "--" | "-" | "" | "N/A" | "n/a")
}

/// Token id from an item URL like `/marketplace/item/0x123.../8666/`.
pub fn token_id_from_item_url(url: &str) -> Option<String> {
    ITEM_TOKEN_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Token id from row text patterns like `#8666 / 15045`.
pub fn token_id_from_row_text(text: &str) -> Option<String> {
    ROW_TOKEN_RES
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|c| c.get(1).map(|m| m.as_str().to_string()))
}

/// Interpretation of the cheapest listing-table row.
#[derive(Debug, PartialEq, Eq)]
pub enum RowRead {
    /// A confirmed List Price and token id.
    Priced {
        /// Token id of the row's item.
        token_id: String,
        /// The list price.
        price: Decimal,
        /// Display form for the record.
        price_text: String,
    },
    /// The row exists but the item is not listed for sale.
    NoListing {
        /// Why the row was classified unlisted.
        reason: &'static str,
    },
    /// The row could not be interpreted at all.
    Unusable {
        /// What was missing.
        reason: &'static str,
    },
}

/// Interpret the cheapest row of a collection's marketplace table.
///
/// Only the List Price column counts; a price sitting next to an empty List
/// Price cell is a Last Sale and means the item is not actually listed.
pub fn read_listing_row(row: &ListingRow) -> RowRead {
    let token_id = row
        .item_href
        .as_deref()
        .and_then(token_id_from_item_url)
        .or_else(|| token_id_from_row_text(&row.row_text));

    let Some(token_id) = token_id else {
        return RowRead::Unusable {
            reason: "no token id in row link or text",
        };
    };

    match find_list_price(row) {
        ListPriceRead::Found(price, price_text) => RowRead::Priced {
            token_id,
            price,
            price_text,
        },
        ListPriceRead::Empty => RowRead::NoListing {
            reason: "list price column is empty",
        },
        ListPriceRead::Unconfirmed => RowRead::NoListing {
            reason: "no confirmed list price column",
        },
    }
}

enum ListPriceRead {
    Found(Decimal, String),
    Empty,
    Unconfirmed,
}

fn find_list_price(row: &ListingRow) -> ListPriceRead {
    // Preferred: locate the List Price column through the table header.
    if let Some(idx) = row
        .header_cells
        .iter()
        .position(|h| h.to_lowercase().contains("list price"))
    {
        if let Some(cell) = row.cells.get(idx) {
            if is_no_listing_marker(cell) {
                return ListPriceRead::Empty;
            }
            if let Some(price) = parse_price_text(cell) {
                return ListPriceRead::Found(price, format!("${} (Table List Price)", price));
            }
        }
    }

    // Fallback: the List Price is the rightmost priced column. Walk the last
    // two columns right-to-left so a Last Sale price never shadows it.
    let n = row.cells.len();
    for (i, cell) in row.cells.iter().enumerate().skip(n.saturating_sub(2)).rev() {
        if is_no_listing_marker(cell) {
            continue;
        }
        if let Some(price) = parse_price_text(cell) {
            // A marker to the right means this cell is the Last Sale column
            // and the item has no active listing.
            if row.cells.get(i + 1).is_some_and(|next| is_no_listing_marker(next)) {
                return ListPriceRead::Empty;
            }
            return ListPriceRead::Found(price, format!("${} (Table List Price)", price));
        }
    }

    ListPriceRead::Unconfirmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_collection_url() {
        let parts =
            parse_marketplace_url("https://www.niftygateway.com/marketplace/collection/0xAbC123/")
                .unwrap();
        assert_eq!(parts.contract, "0xAbC123");
        assert_eq!(parts.token_id, None);
    }

    #[test]
    fn parses_collectible_url_with_token_id() {
        let parts =
            parse_marketplace_url("https://x.com/marketplace/collectible/0xdef456/77").unwrap();
        assert_eq!(parts.contract, "0xdef456");
        assert_eq!(parts.token_id, Some("77".to_string()));
    }

    #[test]
    fn rejects_non_marketplace_url() {
        assert_eq!(parse_marketplace_url("https://x.com/profile/foo"), None);
    }

    #[test]
    fn normalizes_collection_urls() {
        assert_eq!(
            normalize_collection_url("https://x.com/marketplace/collection/0xabc/?sort=price#top"),
            Some("https://x.com/marketplace/collection/0xabc/".to_string())
        );
        assert_eq!(
            normalize_collection_url("https://x.com/marketplace/item/0xabc/1/"),
            None
        );
    }

    #[test]
    fn parses_prices_with_commas() {
        assert_eq!(parse_price_text("$1,736.13"), Some(dec!(1736.13)));
        assert_eq!(parse_price_text("$42"), Some(dec!(42)));
        assert_eq!(parse_price_text("$0.99 Floor Price"), Some(dec!(0.99)));
        assert_eq!(parse_price_text("no price here"), None);
    }

    #[test]
    fn recognizes_no_listing_markers() {
        for marker in ["--", "-", "", "N/A", "n/a", "  --  "] {
            assert!(is_no_listing_marker(marker), "{marker:?}");
        }
        assert!(!is_no_listing_marker("$5.00"));
    }

    #[test]
    fn token_id_from_urls_and_text() {
        assert_eq!(
            token_id_from_item_url("https://x.com/marketplace/item/0x123abc/8666/"),
            Some("8666".to_string())
        );
        assert_eq!(token_id_from_row_text("#8666 / 15045"), Some("8666".to_string()));
        assert_eq!(token_id_from_row_text("#8666/15045"), Some("8666".to_string()));
        assert_eq!(token_id_from_row_text("#42"), Some("42".to_string()));
        assert_eq!(token_id_from_row_text("nothing"), None);
    }

    fn row(
        href: Option<&str>,
        headers: &[&str],
        cells: &[&str],
        text: &str,
    ) -> crate::browser::ListingRow {
        crate::browser::ListingRow {
            item_href: href.map(str::to_string),
            header_cells: headers.iter().map(|s| s.to_string()).collect(),
            cells: cells.iter().map(|s| s.to_string()).collect(),
            row_text: text.to_string(),
        }
    }

    #[test]
    fn reads_priced_row_via_header() {
        let r = row(
            Some("https://x.com/marketplace/item/0xabc/8666/"),
            &["Item", "Last Sale", "List Price"],
            &["#8666 / 15045", "$90.00", "$1,736.13"],
            "#8666 / 15045 $90.00 $1,736.13",
        );
        assert_eq!(
            read_listing_row(&r),
            RowRead::Priced {
                token_id: "8666".to_string(),
                price: dec!(1736.13),
                price_text: "$1736.13 (Table List Price)".to_string(),
            }
        );
    }

    #[test]
    fn empty_list_price_column_means_no_listing() {
        let r = row(
            Some("https://x.com/marketplace/item/0xabc/7/"),
            &["Item", "Last Sale", "List Price"],
            &["#7 / 100", "$90.00", "--"],
            "#7 / 100 $90.00 --",
        );
        assert!(matches!(read_listing_row(&r), RowRead::NoListing { .. }));
    }

    #[test]
    fn last_sale_without_list_price_means_no_listing() {
        // No usable header; price in second-to-last column followed by a
        // marker would be a Last Sale, not a List Price.
        let r = row(
            Some("https://x.com/marketplace/item/0xabc/7/"),
            &[],
            &["#7 / 100", "$90.00", "--"],
            "#7 / 100 $90.00 --",
        );
        assert!(matches!(read_listing_row(&r), RowRead::NoListing { .. }));
    }

    #[test]
    fn positional_fallback_accepts_rightmost_price() {
        let r = row(
            Some("https://x.com/marketplace/item/0xabc/9/"),
            &[],
            &["#9 / 50", "$90.00", "$120.00"],
            "#9 / 50 $90.00 $120.00",
        );
        assert!(matches!(
            read_listing_row(&r),
            RowRead::Priced { ref token_id, price, .. } if token_id == "9" && price == dec!(120)
        ));
    }

    #[test]
    fn row_without_token_id_is_unusable() {
        let r = row(None, &["List Price"], &["$5.00"], "$5.00");
        assert!(matches!(read_listing_row(&r), RowRead::Unusable { .. }));
    }

    #[test]
    fn token_id_falls_back_to_row_text() {
        let r = row(
            None,
            &["Item", "List Price"],
            &["#33 / 99", "$10.00"],
            "#33 / 99 $10.00",
        );
        assert!(matches!(
            read_listing_row(&r),
            RowRead::Priced { ref token_id, .. } if token_id == "33"
        ));
    }
}
