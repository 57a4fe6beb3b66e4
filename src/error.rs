//! Unified error types for the arbitrage scanner.

use thiserror::Error;

/// Unified error type for the scanner.
#[derive(Error, Debug)]
pub enum ScannerError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Browser session error.
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    /// Enrichment API error.
    #[error("enrichment error: {0}")]
    Enrich(#[from] EnrichError),

    /// Classification error.
    #[error("classification error: {0}")]
    Classify(#[from] ClassifyError),

    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Browser navigation and DOM access errors.
#[derive(Error, Debug)]
pub enum BrowserError {
    /// Navigation to a URL failed.
    #[error("navigation to {url} failed: {reason}")]
    Navigation {
        /// The URL that failed to load.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Page load or element wait timed out.
    #[error("timed out loading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// A DOM handle went stale between read and use.
    #[error("stale element reference: {0}")]
    StaleElement(String),

    /// In-page script execution failed.
    #[error("script execution failed: {0}")]
    ScriptFailed(String),

    /// The browser session itself is unusable. Aborts the current scan cycle.
    #[error("browser session lost: {0}")]
    SessionLost(String),

    /// Underlying WebDriver protocol error.
    #[error("webdriver error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),
}

impl BrowserError {
    /// Whether the scan cycle must be aborted (session is gone).
    pub fn is_fatal(&self) -> bool {
        matches!(self, BrowserError::SessionLost(_))
    }

    /// Whether the operation is worth retrying at the item level.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BrowserError::Navigation { .. }
                | BrowserError::Timeout { .. }
                | BrowserError::StaleElement(_)
        )
    }
}

/// External API enrichment errors. Always contained at the item level.
#[derive(Error, Debug)]
pub enum EnrichError {
    /// HTTP transport error.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Rate limited by the API.
    #[error("rate limited: retry after {retry_after_seconds}s")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_seconds: u64,
    },

    /// Resource definitively absent (404 / no offer).
    #[error("not found: {0}")]
    NotFound(String),

    /// Unexpected HTTP status.
    #[error("unexpected status {status} from {endpoint}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Endpoint that returned it.
        endpoint: String,
    },

    /// Response body did not match the expected shape.
    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl EnrichError {
    /// Transient failures get bounded retries with backoff; definitive ones do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            EnrichError::RateLimited { .. } => true,
            EnrichError::Http(e) => e.is_timeout() || e.is_connect(),
            EnrichError::UnexpectedStatus { status, .. } => *status >= 500,
            EnrichError::NotFound(_) | EnrichError::Parse(_) => false,
        }
    }

    /// Server-prescribed wait before the next attempt, when the response
    /// carried one.
    pub fn suggested_delay(&self) -> Option<std::time::Duration> {
        match self {
            EnrichError::RateLimited {
                retry_after_seconds,
            } => Some(std::time::Duration::from_secs(*retry_after_seconds)),
            _ => None,
        }
    }
}

/// Arbitrage classification errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ClassifyError {
    /// Floor price must be strictly positive; zero would divide by zero.
    #[error("invalid floor price: {0} (must be > 0)")]
    InvalidFloorPrice(rust_decimal::Decimal),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, ScannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_lost_is_fatal() {
        assert!(BrowserError::SessionLost("gone".into()).is_fatal());
        assert!(!BrowserError::Timeout { url: "u".into() }.is_fatal());
    }

    #[test]
    fn navigation_failures_are_retryable() {
        assert!(BrowserError::Navigation {
            url: "u".into(),
            reason: "r".into()
        }
        .is_retryable());
        assert!(BrowserError::StaleElement("e".into()).is_retryable());
        assert!(!BrowserError::SessionLost("gone".into()).is_retryable());
    }

    #[test]
    fn enrich_retryability() {
        assert!(EnrichError::RateLimited {
            retry_after_seconds: 3
        }
        .is_retryable());
        assert!(EnrichError::UnexpectedStatus {
            status: 502,
            endpoint: "e".into()
        }
        .is_retryable());
        assert!(!EnrichError::NotFound("x".into()).is_retryable());
        assert!(!EnrichError::UnexpectedStatus {
            status: 400,
            endpoint: "e".into()
        }
        .is_retryable());
    }

    #[test]
    fn only_rate_limits_carry_a_suggested_delay() {
        assert_eq!(
            EnrichError::RateLimited {
                retry_after_seconds: 7
            }
            .suggested_delay(),
            Some(std::time::Duration::from_secs(7))
        );
        assert_eq!(EnrichError::NotFound("x".into()).suggested_delay(), None);
        assert_eq!(
            EnrichError::UnexpectedStatus {
                status: 503,
                endpoint: "e".into()
            }
            .suggested_delay(),
            None
        );
    }
}
