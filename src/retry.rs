//! `tryWithRetries`-style bounded retry with exponential backoff (§5).

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::SdkConfig;
use crate::error::{Error, Result};

/// Retry `op` up to `config.retry_attempts` times, backing off by
/// doubling `retry_base_backoff` each attempt up to `retry_max_backoff`,
/// but only for errors where `only_retry_if` returns `true`. Any other
/// error surfaces immediately. Honors cancellation between attempts.
pub async fn try_with_retries<T, F, Fut>(
    config: &SdkConfig,
    cancel: &CancellationToken,
    mut op: F,
    only_retry_if: impl Fn(&Error) -> bool,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    let mut backoff = config.retry_base_backoff;

    loop {
        attempt += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Aborted("operation cancelled".to_string())),
            r = op() => r,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if attempt < config.retry_attempts && only_retry_if(&err) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Aborted("operation cancelled".to_string())),
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = std::cmp::min(backoff * 2, config.retry_max_backoff);
            }
            Err(err) => return Err(err),
        }
    }
}

/// The retry predicate used throughout the oracle and intermediary
/// client: only transport-level failures are retried locally (§4.1, §7).
pub fn retry_on_network_error(err: &Error) -> bool {
    err.is_retryable()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_network_errors_until_success() {
        let config = SdkConfig {
            retry_base_backoff: Duration::from_millis(1),
            retry_max_backoff: Duration::from_millis(4),
            ..SdkConfig::default()
        };
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result = try_with_retries(
            &config,
            &cancel,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(Error::Network("timeout".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            },
            retry_on_network_error,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_matching_errors() {
        let config = SdkConfig::default();
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result: Result<()> = try_with_retries(
            &config,
            &cancel,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::User("bad address".to_string())) }
            },
            retry_on_network_error,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_aborts_between_attempts() {
        let config = SdkConfig::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<()> = try_with_retries(
            &config,
            &cancel,
            || async { Err(Error::Network("down".to_string())) },
            retry_on_network_error,
        )
        .await;

        assert!(matches!(result, Err(Error::Aborted(_))));
    }
}
