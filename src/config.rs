//! Tunable constants for the swap engine.

use std::time::Duration;

/// Numeric knobs used across the price oracle, response validator and
/// retry policy. Centralized so a host application can tighten or loosen
/// them without touching call sites.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Maximum allowed deviation between a quoted price and the oracle's
    /// market price, in parts per million.
    pub max_allowed_fee_diff_ppm: u32,
    /// Multiplier applied to the nominal confirmation wait when bounding
    /// a ToBTC escrow's expiry.
    pub max_safety_factor: u32,
    /// Assumed average time between Bitcoin blocks.
    pub bitcoin_blocktime_secs: u64,
    /// Extra blocks of slack added on top of the nominal confirmation target.
    pub grace_period_blocks: u32,
    /// Minimum time an escrow must remain open before its expiry, measured
    /// from the moment the quote is validated.
    pub min_send_window_secs: i64,
    /// Ceiling on `data.confirmations` accepted from an intermediary.
    pub max_confirmations: u32,
    /// Timeout applied to HTTP GET requests to an intermediary.
    pub http_get_timeout: Duration,
    /// Timeout applied to HTTP POST requests to an intermediary.
    pub http_post_timeout: Duration,
    /// Max attempts for `tryWithRetries`-style retryable operations.
    pub retry_attempts: u32,
    /// Base backoff delay; doubled each attempt up to `retry_max_backoff`.
    pub retry_base_backoff: Duration,
    /// Backoff ceiling.
    pub retry_max_backoff: Duration,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            max_allowed_fee_diff_ppm: 2_000,
            max_safety_factor: 2,
            bitcoin_blocktime_secs: 600,
            grace_period_blocks: 10,
            min_send_window_secs: 1_800,
            max_confirmations: 6,
            http_get_timeout: Duration::from_secs(10),
            http_post_timeout: Duration::from_secs(30),
            retry_attempts: 3,
            retry_base_backoff: Duration::from_millis(500),
            retry_max_backoff: Duration::from_secs(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = SdkConfig::default();
        assert_eq!(cfg.max_allowed_fee_diff_ppm, 2_000);
        assert_eq!(cfg.max_safety_factor, 2);
        assert_eq!(cfg.bitcoin_blocktime_secs, 600);
        assert_eq!(cfg.grace_period_blocks, 10);
        assert_eq!(cfg.min_send_window_secs, 1_800);
        assert_eq!(cfg.max_confirmations, 6);
        assert_eq!(cfg.retry_attempts, 3);
    }
}
