//! Discord webhook notifications.
//!
//! Notifications are best-effort: a failed delivery is logged and the scan
//! moves on. Only RED/YELLOW/GREEN tiers are worth a ping; WHITE and
//! NO_OFFER records stay in the JSON output.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::arbitrage::ArbitrageFlag;
use crate::metrics;
use crate::output::OutputRecord;
use crate::scanner::ScanStats;

/// Delivery channel for scan events.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Announce an opportunity. Returns whether delivery succeeded.
    async fn notify_opportunity(&self, record: &OutputRecord) -> bool;

    /// Announce the start of a scan.
    async fn notify_startup(&self, listing_url: &str) -> bool;

    /// Announce a finished cycle.
    async fn notify_summary(&self, stats: &ScanStats) -> bool;
}

/// Notifier that drops everything. Used when no webhook is configured.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify_opportunity(&self, _record: &OutputRecord) -> bool {
        false
    }

    async fn notify_startup(&self, _listing_url: &str) -> bool {
        false
    }

    async fn notify_summary(&self, _stats: &ScanStats) -> bool {
        false
    }
}

/// Discord webhook notifier with per-tier embed colors.
pub struct DiscordNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

fn embed_color(flag: ArbitrageFlag) -> u32 {
    match flag {
        ArbitrageFlag::Red => 0xFF0000,
        ArbitrageFlag::Yellow => 0xFFFF00,
        ArbitrageFlag::Green => 0x00FF00,
        ArbitrageFlag::White | ArbitrageFlag::NoOffer => 0x808080,
    }
}

impl DiscordNotifier {
    /// Create a notifier posting to `webhook_url`.
    pub fn new(client: reqwest::Client, webhook_url: impl Into<String>) -> Self {
        Self {
            client,
            webhook_url: webhook_url.into(),
        }
    }

    async fn post(&self, payload: serde_json::Value) -> bool {
        let result = self.client.post(&self.webhook_url).json(&payload).send().await;
        match result {
            Ok(response) if response.status().is_success() => {
                metrics::inc_notifications_sent();
                true
            }
            Ok(response) => {
                warn!(status = %response.status(), "Discord webhook rejected payload");
                false
            }
            Err(e) => {
                warn!(error = %e, "Discord webhook delivery failed");
                false
            }
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify_opportunity(&self, record: &OutputRecord) -> bool {
        let flag = record.arbitrage.arbitrage_flag;
        if !flag.is_opportunity() {
            return false;
        }

        let collection_name = record
            .item
            .collection
            .as_ref()
            .map(|c| c.name.as_str())
            .unwrap_or("Unknown collection");
        let item_url = record
            .item
            .raw
            .actual_marketplace_url
            .as_deref()
            .unwrap_or(&record.item.raw.marketplace_url);

        let mut fields = vec![
            json!({
                "name": "Floor price",
                "value": format!("${:.2}", record.item.raw.floor_price),
                "inline": true
            }),
            json!({
                "name": "Token",
                "value": format!("#{}", record.item.raw.actual_token_id),
                "inline": true
            }),
        ];
        if let Some(offer) = &record.offer {
            let stale_mark = if offer.rate_stale { " (stale rate)" } else { "" };
            fields.push(json!({
                "name": "Best offer",
                "value": format!(
                    "${:.2} ({} ETH){}",
                    offer.offer_amount_usd, offer.offer_amount_eth, stale_mark
                ),
                "inline": true
            }));
        }
        if let Some(profit) = record.arbitrage.potential_profit_usd {
            fields.push(json!({
                "name": "Potential profit",
                "value": format!("${profit:.2}"),
                "inline": true
            }));
        }

        let payload = json!({
            "embeds": [{
                "title": format!("{flag} — {collection_name}"),
                "description": record.arbitrage.arbitrage_description,
                "url": item_url,
                "color": embed_color(flag),
                "fields": fields
            }]
        });

        debug!(%flag, collection = collection_name, "Sending opportunity notification");
        self.post(payload).await
    }

    async fn notify_startup(&self, listing_url: &str) -> bool {
        let payload = json!({
            "embeds": [{
                "title": "Arbitrage scan started",
                "description": format!("Scanning {listing_url}"),
                "color": 0x3498DB
            }]
        });
        self.post(payload).await
    }

    async fn notify_summary(&self, stats: &ScanStats) -> bool {
        let payload = json!({
            "embeds": [{
                "title": "Scan cycle complete",
                "color": 0x3498DB,
                "fields": [
                    {"name": "Processed", "value": stats.processed.to_string(), "inline": true},
                    {"name": "Scraped", "value": stats.scraped.to_string(), "inline": true},
                    {"name": "Failed", "value": stats.failed.to_string(), "inline": true},
                    {"name": "RED", "value": stats.red.to_string(), "inline": true},
                    {"name": "YELLOW", "value": stats.yellow.to_string(), "inline": true},
                    {"name": "GREEN", "value": stats.green.to_string(), "inline": true}
                ]
            }]
        });
        self.post(payload).await
    }
}
