//! Application configuration loaded from environment variables.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Marketplace ===
    /// Listing page to scan.
    #[serde(default = "default_listing_url")]
    pub listing_url: String,

    /// Marketplace base URL used to rebuild canonical item URLs.
    #[serde(default = "default_marketplace_base_url")]
    pub marketplace_base_url: String,

    // === Enumeration ===
    /// Maximum items to process per scan (0 = unlimited).
    #[serde(default)]
    pub max_items: usize,

    /// Maximum scroll attempts during URL enumeration.
    #[serde(default = "default_max_scrolls")]
    pub max_scrolls: u32,

    /// Consecutive no-progress scroll rounds before declaring a stall.
    #[serde(default = "default_stall_limit")]
    pub stall_limit: u32,

    /// Base pause after a scroll action, milliseconds.
    #[serde(default = "default_scroll_pause_ms")]
    pub scroll_pause_ms: u64,

    /// Random jitter added to each scroll pause, milliseconds.
    #[serde(default = "default_scroll_jitter_ms")]
    pub scroll_jitter_ms: u64,

    // === Browser ===
    /// WebDriver endpoint (chromedriver / selenium).
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Run the browser headless.
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Per-navigation timeout in milliseconds.
    #[serde(default = "default_nav_timeout_ms")]
    pub nav_timeout_ms: u64,

    /// Navigation retry attempts per item before skipping it.
    #[serde(default = "default_nav_retries")]
    pub nav_retries: u32,

    // === OpenSea APIs ===
    /// OpenSea API key.
    #[serde(default)]
    pub opensea_api_key: String,

    /// OpenSea API v2 base URL.
    #[serde(default = "default_opensea_api_url")]
    pub opensea_api_url: String,

    /// Request timeout for enrichment calls, milliseconds.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Retries after the first attempt for transient enrichment failures.
    #[serde(default = "default_enrich_retries")]
    pub enrich_retries: u32,

    /// Base backoff delay between enrichment retries, milliseconds.
    #[serde(default = "default_enrich_retry_delay_ms")]
    pub enrich_retry_delay_ms: u64,

    // === Price oracle ===
    /// ETH/USD price feed endpoint.
    #[serde(default = "default_eth_price_url")]
    pub eth_price_url: String,

    /// Oracle refresh interval in seconds.
    #[serde(default = "default_eth_price_refresh_secs")]
    pub eth_price_refresh_secs: u64,

    /// Age beyond which an oracle quote is flagged stale, seconds.
    #[serde(default = "default_eth_price_stale_secs")]
    pub eth_price_stale_secs: u64,

    // === Operation modes ===
    /// Re-run full scan cycles forever.
    #[serde(default)]
    pub continuous: bool,

    /// Sleep between scan cycles in continuous mode, seconds.
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// Drop NO_OFFER results from the persisted output.
    #[serde(default = "default_true")]
    pub offer_only: bool,

    /// Directory for batch output files.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    // === Notifications ===
    /// Discord webhook URL for arbitrage alerts. Unset disables notifications.
    #[serde(default)]
    pub discord_webhook_url: Option<String>,

    // === Observability ===
    /// Expose Prometheus metrics.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Metrics listener port.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_listing_url() -> String {
    "https://www.niftygateway.com/explore/nfts/?sort=-likes&chain%5B0%5D=ethereum&tags=Generative%20Art%2CPainting%2CCollage%2CDigital%20Painting%20and%20Drawing".to_string()
}

fn default_marketplace_base_url() -> String {
    "https://www.niftygateway.com".to_string()
}

fn default_max_scrolls() -> u32 {
    50
}

fn default_stall_limit() -> u32 {
    3
}

fn default_scroll_pause_ms() -> u64 {
    1000
}

fn default_scroll_jitter_ms() -> u64 {
    400
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_true() -> bool {
    true
}

fn default_nav_timeout_ms() -> u64 {
    15_000
}

fn default_nav_retries() -> u32 {
    2
}

fn default_opensea_api_url() -> String {
    "https://api.opensea.io/api/v2".to_string()
}

fn default_http_timeout_ms() -> u64 {
    10_000
}

fn default_enrich_retries() -> u32 {
    3
}

fn default_enrich_retry_delay_ms() -> u64 {
    3_000
}

fn default_eth_price_url() -> String {
    "https://api.coingecko.com/api/v3/simple/price?ids=ethereum&vs_currencies=usd".to_string()
}

fn default_eth_price_refresh_secs() -> u64 {
    60
}

fn default_eth_price_stale_secs() -> u64 {
    600
}

fn default_scan_interval_secs() -> u64 {
    10
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.opensea_api_key.is_empty() {
            return Err("OPENSEA_API_KEY is required".to_string());
        }

        url::Url::parse(&self.listing_url)
            .map_err(|e| format!("LISTING_URL is not a valid URL: {e}"))?;
        url::Url::parse(&self.webdriver_url)
            .map_err(|e| format!("WEBDRIVER_URL is not a valid URL: {e}"))?;

        if self.max_scrolls == 0 {
            return Err("MAX_SCROLLS must be at least 1".to_string());
        }

        if self.stall_limit == 0 {
            return Err("STALL_LIMIT must be at least 1".to_string());
        }

        if self.continuous && self.scan_interval_secs == 0 {
            return Err("SCAN_INTERVAL_SECS must be > 0 in continuous mode".to_string());
        }

        if let Some(url) = &self.discord_webhook_url {
            if !url.starts_with("https://") {
                return Err("DISCORD_WEBHOOK_URL must be an https:// URL".to_string());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
impl Config {
    /// Config with all defaults and a test API key, for unit tests.
    pub fn for_tests() -> Self {
        Config {
            listing_url: default_listing_url(),
            marketplace_base_url: default_marketplace_base_url(),
            max_items: 0,
            max_scrolls: default_max_scrolls(),
            stall_limit: default_stall_limit(),
            scroll_pause_ms: 1,
            scroll_jitter_ms: 0,
            webdriver_url: default_webdriver_url(),
            headless: true,
            nav_timeout_ms: default_nav_timeout_ms(),
            nav_retries: default_nav_retries(),
            opensea_api_key: "test-key".to_string(),
            opensea_api_url: default_opensea_api_url(),
            http_timeout_ms: default_http_timeout_ms(),
            enrich_retries: default_enrich_retries(),
            enrich_retry_delay_ms: 1,
            eth_price_url: default_eth_price_url(),
            eth_price_refresh_secs: default_eth_price_refresh_secs(),
            eth_price_stale_secs: default_eth_price_stale_secs(),
            continuous: false,
            scan_interval_secs: default_scan_interval_secs(),
            offer_only: true,
            output_dir: default_output_dir(),
            discord_webhook_url: None,
            metrics_enabled: false,
            metrics_port: default_metrics_port(),
            rust_log: default_log_level(),
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_sensible() {
        assert_eq!(default_max_scrolls(), 50);
        assert_eq!(default_stall_limit(), 3);
        assert_eq!(default_scan_interval_secs(), 10);
        assert!(default_true());
        assert!(default_listing_url().contains("niftygateway.com"));
    }

    #[test]
    fn validate_rejects_empty_api_key() {
        let mut config = Config::for_tests();
        config.opensea_api_key = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_malformed_urls() {
        let mut config = Config::for_tests();
        config.listing_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::for_tests();
        config.webdriver_url = "/no-scheme".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_interval_in_continuous_mode() {
        let mut config = Config::for_tests();
        config.continuous = true;
        config.scan_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_plain_http_webhook() {
        let mut config = Config::for_tests();
        config.discord_webhook_url = Some("http://example.com/hook".to_string());
        assert!(config.validate().is_err());

        config.discord_webhook_url = Some("https://discord.com/api/webhooks/1/x".to_string());
        assert!(config.validate().is_ok());
    }
}
