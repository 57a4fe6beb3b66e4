//! Prometheus metrics for scan monitoring.

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

// === Metric Name Constants ===

/// Listing URLs discovered counter metric name.
pub const METRIC_URLS_DISCOVERED: &str = "listing_urls_discovered_total";
/// Items processed counter metric name.
pub const METRIC_ITEMS_PROCESSED: &str = "items_processed_total";
/// Items scraped (valid floor price) counter metric name.
pub const METRIC_ITEMS_SCRAPED: &str = "items_scraped_total";
/// Items skipped (no listing) counter metric name.
pub const METRIC_ITEMS_NO_LISTING: &str = "items_no_listing_total";
/// Items failed counter metric name.
pub const METRIC_ITEMS_FAILED: &str = "items_failed_total";
/// Collection cache hits counter metric name.
pub const METRIC_CACHE_HITS: &str = "collection_cache_hits_total";
/// Retry counter metric name.
pub const METRIC_RETRIES: &str = "retries_total";
/// Opportunities counter metric name (labeled by flag).
pub const METRIC_OPPORTUNITIES: &str = "opportunities_total";
/// Scan cycles completed counter metric name.
pub const METRIC_SCAN_CYCLES: &str = "scan_cycles_total";
/// Scan cycles aborted counter metric name.
pub const METRIC_SCAN_ABORTS: &str = "scan_cycles_aborted_total";
/// Notifications delivered counter metric name.
pub const METRIC_NOTIFICATIONS_SENT: &str = "notifications_sent_total";
/// Per-item extraction latency metric name.
pub const METRIC_EXTRACT_LATENCY: &str = "item_extract_latency_ms";
/// Enrichment call latency metric name.
pub const METRIC_ENRICH_LATENCY: &str = "enrich_latency_ms";
/// Full scan cycle duration metric name.
pub const METRIC_SCAN_DURATION: &str = "scan_cycle_duration_ms";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_counter!(
        METRIC_URLS_DISCOVERED,
        "Total unique listing URLs discovered during enumeration"
    );
    describe_counter!(METRIC_ITEMS_PROCESSED, "Total items processed");
    describe_counter!(
        METRIC_ITEMS_SCRAPED,
        "Total items with a valid floor price extracted"
    );
    describe_counter!(
        METRIC_ITEMS_NO_LISTING,
        "Total items skipped because no listing price was present"
    );
    describe_counter!(METRIC_ITEMS_FAILED, "Total items that failed extraction");
    describe_counter!(
        METRIC_CACHE_HITS,
        "Collection metadata lookups served from the in-process cache"
    );
    describe_counter!(METRIC_RETRIES, "Total retry attempts, labeled by operation");
    describe_counter!(
        METRIC_OPPORTUNITIES,
        "Total classified opportunities, labeled by flag"
    );
    describe_counter!(METRIC_SCAN_CYCLES, "Total completed scan cycles");
    describe_counter!(METRIC_SCAN_ABORTS, "Total scan cycles aborted by session failure");
    describe_counter!(
        METRIC_NOTIFICATIONS_SENT,
        "Total notifications delivered successfully"
    );

    describe_histogram!(
        METRIC_EXTRACT_LATENCY,
        "Per-item extraction latency in milliseconds"
    );
    describe_histogram!(
        METRIC_ENRICH_LATENCY,
        "External enrichment call latency in milliseconds"
    );
    describe_histogram!(
        METRIC_SCAN_DURATION,
        "Full scan cycle duration in milliseconds"
    );

    debug!("Metrics initialized");
}

/// Record discovered listing URLs.
pub fn add_urls_discovered(count: u64) {
    counter!(METRIC_URLS_DISCOVERED).increment(count);
}

/// Increment items processed counter.
pub fn inc_items_processed() {
    counter!(METRIC_ITEMS_PROCESSED).increment(1);
}

/// Increment items scraped counter.
pub fn inc_items_scraped() {
    counter!(METRIC_ITEMS_SCRAPED).increment(1);
}

/// Increment no-listing counter.
pub fn inc_items_no_listing() {
    counter!(METRIC_ITEMS_NO_LISTING).increment(1);
}

/// Increment items failed counter.
pub fn inc_items_failed() {
    counter!(METRIC_ITEMS_FAILED).increment(1);
}

/// Increment collection cache hit counter.
pub fn inc_cache_hits() {
    counter!(METRIC_CACHE_HITS).increment(1);
}

/// Increment retry counter for an operation.
pub fn inc_retries(op: &str) {
    counter!(METRIC_RETRIES, "op" => op.to_string()).increment(1);
}

/// Increment opportunity counter for a flag.
pub fn inc_opportunities(flag: &str) {
    counter!(METRIC_OPPORTUNITIES, "flag" => flag.to_string()).increment(1);
}

/// Increment completed scan cycle counter.
pub fn inc_scan_cycles() {
    counter!(METRIC_SCAN_CYCLES).increment(1);
}

/// Increment aborted scan cycle counter.
pub fn inc_scan_aborts() {
    counter!(METRIC_SCAN_ABORTS).increment(1);
}

/// Increment notifications sent counter.
pub fn inc_notifications_sent() {
    counter!(METRIC_NOTIFICATIONS_SENT).increment(1);
}

/// Record per-item extraction latency.
pub fn record_extract_latency(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_EXTRACT_LATENCY).record(latency_ms);
}

/// Record enrichment call latency.
pub fn record_enrich_latency(start: Instant, endpoint: &str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_ENRICH_LATENCY, "endpoint" => endpoint.to_string()).record(latency_ms);
}

/// Record full scan cycle duration.
pub fn record_scan_duration(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_SCAN_DURATION).record(latency_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_are_distinct() {
        let names = [
            METRIC_URLS_DISCOVERED,
            METRIC_ITEMS_PROCESSED,
            METRIC_ITEMS_SCRAPED,
            METRIC_ITEMS_NO_LISTING,
            METRIC_ITEMS_FAILED,
            METRIC_CACHE_HITS,
            METRIC_RETRIES,
            METRIC_OPPORTUNITIES,
            METRIC_SCAN_CYCLES,
            METRIC_SCAN_ABORTS,
            METRIC_NOTIFICATIONS_SENT,
            METRIC_EXTRACT_LATENCY,
            METRIC_ENRICH_LATENCY,
            METRIC_SCAN_DURATION,
        ];
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }
}
