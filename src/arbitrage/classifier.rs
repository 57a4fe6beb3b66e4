//! Tiered classification of the offer/floor spread.
//!
//! Pure arithmetic over two USD amounts. An offer at or above the floor is
//! immediately profitable (buy the listing, accept the offer); offers within
//! 10% and 20% of the floor are watch tiers that often flip profitable as
//! floors move.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use strum::Display;
use time::OffsetDateTime;

use crate::enrich::OfferData;
use crate::error::ClassifyError;

/// Offer at or above this fraction of floor is YELLOW.
const YELLOW_THRESHOLD: Decimal = dec!(0.90);
/// Offer at or above this fraction of floor is GREEN.
const GREEN_THRESHOLD: Decimal = dec!(0.80);

/// Opportunity tier, hottest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum ArbitrageFlag {
    /// Offer meets or beats the floor price. Immediate profit.
    #[strum(serialize = "RED")]
    #[serde(rename = "RED")]
    Red,
    /// Offer within 10% below the floor.
    #[strum(serialize = "YELLOW")]
    #[serde(rename = "YELLOW")]
    Yellow,
    /// Offer within 20% below the floor.
    #[strum(serialize = "GREEN")]
    #[serde(rename = "GREEN")]
    Green,
    /// Offer more than 20% below the floor. No opportunity.
    #[strum(serialize = "WHITE")]
    #[serde(rename = "WHITE")]
    White,
    /// No standing offer to compare against.
    #[strum(serialize = "NO_OFFER")]
    #[serde(rename = "NO_OFFER")]
    NoOffer,
}

impl ArbitrageFlag {
    /// Whether this tier is worth surfacing to a human.
    pub fn is_opportunity(&self) -> bool {
        matches!(
            self,
            ArbitrageFlag::Red | ArbitrageFlag::Yellow | ArbitrageFlag::Green
        )
    }
}

/// Outcome of classifying one item.
#[derive(Debug, Clone, Serialize)]
pub struct ArbitrageResult {
    /// Assigned tier.
    pub arbitrage_flag: ArbitrageFlag,
    /// Human-readable summary of the spread.
    pub arbitrage_description: String,
    /// Offer relative to floor, in percent. Negative below floor. None when
    /// there is no offer.
    pub profit_percentage: Option<Decimal>,
    /// USD delta of accepting the offer after buying at floor. None when
    /// there is no offer.
    pub potential_profit_usd: Option<Decimal>,
    /// When the classification ran.
    #[serde(rename = "arbitrage_analyzed_at", with = "time::serde::rfc3339")]
    pub analyzed_at: OffsetDateTime,
}

/// Classify one item's floor price against its best offer.
///
/// `floor_price_usd` must be strictly positive; offers may be any
/// non-negative amount.
pub fn classify(
    floor_price_usd: Decimal,
    offer: Option<&OfferData>,
) -> Result<ArbitrageResult, ClassifyError> {
    if floor_price_usd <= Decimal::ZERO {
        return Err(ClassifyError::InvalidFloorPrice(floor_price_usd));
    }

    let analyzed_at = OffsetDateTime::now_utc();
    let Some(offer) = offer else {
        return Ok(ArbitrageResult {
            arbitrage_flag: ArbitrageFlag::NoOffer,
            arbitrage_description: "No standing offer for this item".to_string(),
            profit_percentage: None,
            potential_profit_usd: None,
            analyzed_at,
        });
    };

    let offer_usd = offer.offer_amount_usd;
    let profit = offer_usd - floor_price_usd;
    let pct = (profit / floor_price_usd * dec!(100)).round_dp(2);

    let (flag, description) = if offer_usd >= floor_price_usd {
        (
            ArbitrageFlag::Red,
            format!("Offer ${offer_usd:.2} meets or exceeds floor ${floor_price_usd:.2}"),
        )
    } else if offer_usd >= floor_price_usd * YELLOW_THRESHOLD {
        (
            ArbitrageFlag::Yellow,
            format!("Offer ${offer_usd:.2} within 10% of floor ${floor_price_usd:.2}"),
        )
    } else if offer_usd >= floor_price_usd * GREEN_THRESHOLD {
        (
            ArbitrageFlag::Green,
            format!("Offer ${offer_usd:.2} within 20% of floor ${floor_price_usd:.2}"),
        )
    } else {
        (
            ArbitrageFlag::White,
            format!("Offer ${offer_usd:.2} well below floor ${floor_price_usd:.2}"),
        )
    };

    Ok(ArbitrageResult {
        arbitrage_flag: flag,
        arbitrage_description: description,
        profit_percentage: Some(pct),
        potential_profit_usd: Some(profit),
        analyzed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer_at(usd: Decimal) -> OfferData {
        OfferData {
            offer_amount_wei: 0,
            offer_amount_eth: Decimal::ZERO,
            offer_amount_usd: usd,
            total_offer_wei: 0,
            quantity: 1,
            order_hash: Some("0xabc".to_string()),
            fetched_at: OffsetDateTime::now_utc(),
            rate_stale: false,
        }
    }

    fn flag_for(floor: Decimal, offer_usd: Decimal) -> ArbitrageFlag {
        classify(floor, Some(&offer_at(offer_usd)))
            .unwrap()
            .arbitrage_flag
    }

    #[test]
    fn offer_above_floor_is_red() {
        let result = classify(dec!(15000), Some(&offer_at(dec!(16500)))).unwrap();
        assert_eq!(result.arbitrage_flag, ArbitrageFlag::Red);
        assert_eq!(result.profit_percentage, Some(dec!(10.00)));
        assert_eq!(result.potential_profit_usd, Some(dec!(1500)));
    }

    #[test]
    fn offer_equal_to_floor_is_red() {
        assert_eq!(flag_for(dec!(100), dec!(100)), ArbitrageFlag::Red);
    }

    #[test]
    fn tier_boundaries_are_inclusive() {
        assert_eq!(flag_for(dec!(1000), dec!(900)), ArbitrageFlag::Yellow);
        assert_eq!(
            flag_for(dec!(1000), dec!(899.999999)),
            ArbitrageFlag::Green
        );
        assert_eq!(flag_for(dec!(1000), dec!(800)), ArbitrageFlag::Green);
        assert_eq!(
            flag_for(dec!(1000), dec!(799.999999)),
            ArbitrageFlag::White
        );
    }

    #[test]
    fn below_floor_offer_reports_negative_profit() {
        let result = classify(dec!(1736.13), Some(&offer_at(dec!(1420)))).unwrap();
        assert_eq!(result.arbitrage_flag, ArbitrageFlag::Green);
        assert_eq!(result.potential_profit_usd, Some(dec!(-316.13)));
        assert!(result.profit_percentage.unwrap() < Decimal::ZERO);
    }

    #[test]
    fn no_offer_is_its_own_tier() {
        let result = classify(dec!(500), None).unwrap();
        assert_eq!(result.arbitrage_flag, ArbitrageFlag::NoOffer);
        assert!(result.profit_percentage.is_none());
        assert!(result.potential_profit_usd.is_none());
        assert!(!result.arbitrage_flag.is_opportunity());
    }

    #[test]
    fn non_positive_floor_is_rejected() {
        assert!(classify(Decimal::ZERO, None).is_err());
        assert!(classify(dec!(-5), Some(&offer_at(dec!(10)))).is_err());
    }

    #[test]
    fn flags_render_in_wire_format() {
        assert_eq!(ArbitrageFlag::Red.to_string(), "RED");
        assert_eq!(ArbitrageFlag::NoOffer.to_string(), "NO_OFFER");
        assert_eq!(
            serde_json::to_string(&ArbitrageFlag::NoOffer).unwrap(),
            "\"NO_OFFER\""
        );
    }

    #[test]
    fn opportunity_tiers() {
        assert!(ArbitrageFlag::Red.is_opportunity());
        assert!(ArbitrageFlag::Yellow.is_opportunity());
        assert!(ArbitrageFlag::Green.is_opportunity());
        assert!(!ArbitrageFlag::White.is_opportunity());
    }
}
