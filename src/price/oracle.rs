//! Fail-over algorithm and pricing checks (§4.1).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::config::SdkConfig;
use crate::error::{Error, Result};
use crate::retry::{retry_on_network_error, try_with_retries};
use crate::types::TokenId;

use super::PriceProvider;

/// Tri-state provider health, stored as an `AtomicU8` the way the teacher
/// guards shared mutable state (`storage::memory`'s `RwLock`), but lock-free
/// here since it's a single byte read on every dispatch decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operational {
    Unknown,
    Up,
    Down,
}

const UNKNOWN: u8 = 0;
const UP: u8 = 1;
const DOWN: u8 = 2;

fn load_operational(flag: &AtomicU8) -> Operational {
    match flag.load(Ordering::SeqCst) {
        UP => Operational::Up,
        DOWN => Operational::Down,
        _ => Operational::Unknown,
    }
}

struct ProviderSlot {
    provider: Arc<dyn PriceProvider>,
    operational: AtomicU8,
}

/// A quoted price, accounting for the `$fixed-<amount>` and `$ignore`
/// markers a token's registered price entry may carry (§3 PriceEntry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceQuote {
    /// uSat/token, sourced from a live provider.
    Market(u64),
    /// `$fixed-<amount>` — short-circuits provider lookup.
    Fixed(u64),
    /// `$ignore` — excludes this token from price-dependent checks.
    Ignore,
}

/// Parse a registered price-entry marker string, if it is one.
pub fn parse_price_marker(s: &str) -> Option<PriceQuote> {
    if s == "$ignore" {
        return Some(PriceQuote::Ignore);
    }
    s.strip_prefix("$fixed-")
        .and_then(|rest| rest.parse::<u64>().ok())
        .map(PriceQuote::Fixed)
}

/// Result of a fee-validity check (`isValidAmountSend`/`isValidAmountReceive`).
#[derive(Debug, Clone, Copy)]
pub struct PriceCheck {
    pub is_valid: bool,
    pub difference_ppm: i64,
    pub sats_base_fee: u64,
    pub fee_ppm: u32,
}

#[derive(Default)]
struct CacheEntry {
    value: u64,
    as_of: u64,
}

/// Multi-provider price source with fail-over (§4.1).
pub struct PriceOracle {
    providers: Vec<ProviderSlot>,
    config: SdkConfig,
    token_cache: Mutex<HashMap<String, CacheEntry>>,
}

impl PriceOracle {
    pub fn new(providers: Vec<Arc<dyn PriceProvider>>, config: SdkConfig) -> Self {
        Self {
            providers: providers
                .into_iter()
                .map(|provider| ProviderSlot {
                    provider,
                    operational: AtomicU8::new(UNKNOWN),
                })
                .collect(),
            config,
            token_cache: Mutex::new(HashMap::new()),
        }
    }

    /// BTC/USD price, via the fail-over algorithm.
    pub async fn get_usd_price(&self, cancel: &CancellationToken) -> Result<f64> {
        self.dispatch(cancel, |slot| slot.provider.usd_price()).await
    }

    /// Price for a token in uSat/token. A `$fixed`/`$ignore` marker on
    /// `price_marker` short-circuits provider dispatch entirely.
    pub async fn get_price(
        &self,
        token: &TokenId,
        price_marker: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<PriceQuote> {
        if let Some(marker) = price_marker.and_then(parse_price_marker) {
            return Ok(marker);
        }

        let value = self
            .dispatch(cancel, |slot| slot.provider.token_price_usat(token))
            .await?;

        if let Ok(mut cache) = self.token_cache.lock() {
            cache.insert(
                token.0.clone(),
                CacheEntry {
                    value,
                    as_of: now_secs(),
                },
            );
        }

        Ok(PriceQuote::Market(value))
    }

    /// Core fail-over dispatch shared by `get_usd_price` and `get_price`.
    ///
    /// 1. If any provider is `Up`, call only it.
    /// 2. Else race every provider that is `Up` or `Unknown`; if that set
    ///    is empty, reset all to `Unknown` and race all of them. First
    ///    success wins and marks that provider `Up`; every failure marks
    ///    its provider `Down`.
    /// 3. The whole call is retried with bounded exponential backoff on
    ///    transport error (§5 `tryWithRetries`).
    async fn dispatch<T, F>(&self, cancel: &CancellationToken, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: for<'a> Fn(&'a ProviderSlot) -> super::ProviderFuture<'a, T> + Copy,
    {
        try_with_retries(
            &self.config,
            cancel,
            || self.dispatch_once(op),
            retry_on_network_error,
        )
        .await
    }

    async fn dispatch_once<T, F>(&self, op: F) -> Result<T>
    where
        F: for<'a> Fn(&'a ProviderSlot) -> super::ProviderFuture<'a, T>,
    {
        if let Some(slot) = self
            .providers
            .iter()
            .find(|slot| load_operational(&slot.operational) == Operational::Up)
        {
            return match op(slot).await {
                Ok(value) => Ok(value),
                Err(_) => {
                    slot.operational.store(DOWN, Ordering::SeqCst);
                    // `providers` is non-empty here (we just found a slot in it), so
                    // `race_remaining` always has at least this slot to retry against
                    // after resetting it to Unknown — propagate its result as-is
                    // rather than re-surfacing the now-stale error.
                    self.race_remaining(op).await
                }
            };
        }

        self.race_remaining(op).await
    }

    async fn race_remaining<T, F>(&self, op: F) -> Result<T>
    where
        F: for<'a> Fn(&'a ProviderSlot) -> super::ProviderFuture<'a, T>,
    {
        let mut candidates: Vec<&ProviderSlot> = self
            .providers
            .iter()
            .filter(|slot| load_operational(&slot.operational) != Operational::Down)
            .collect();

        if candidates.is_empty() {
            for slot in &self.providers {
                slot.operational.store(UNKNOWN, Ordering::SeqCst);
            }
            candidates = self.providers.iter().collect();
        }

        if candidates.is_empty() {
            return Err(Error::Other("no price providers configured".to_string()));
        }

        let mut futures = FuturesUnordered::new();
        for slot in &candidates {
            futures.push(async move { (slot, op(slot).await) });
        }

        let mut first_non_transport: Option<Error> = None;
        let mut first_error: Option<Error> = None;

        while let Some((slot, result)) = futures.next().await {
            match result {
                Ok(value) => {
                    slot.operational.store(UP, Ordering::SeqCst);
                    return Ok(value);
                }
                Err(err) => {
                    slot.operational.store(DOWN, Ordering::SeqCst);
                    if !err.is_retryable() && first_non_transport.is_none() {
                        first_non_transport = Some(err_clone(&err));
                    }
                    if first_error.is_none() {
                        first_error = Some(err_clone(&err));
                    }
                    let _ = err;
                }
            }
        }

        Err(first_non_transport
            .or(first_error)
            .unwrap_or_else(|| Error::Other("all price providers failed".to_string())))
    }

    /// `isValidAmountSend`/`isValidAmountReceive`: compare the market-implied
    /// token amount against the LP's quote and bound the deviation (§4.1).
    pub fn check_price(
        &self,
        amount_sats: u64,
        base_fee_sats: u64,
        fee_ppm: u32,
        token_amount: u64,
        market_price_usat: u64,
    ) -> PriceCheck {
        let net_sats = amount_sats.saturating_sub(base_fee_sats);
        let market_token_amount = if market_price_usat == 0 {
            0
        } else {
            (net_sats as u128 * 1_000_000 / market_price_usat as u128) as u64
        };

        let difference_ppm = if market_token_amount == 0 {
            0
        } else {
            let diff = token_amount as i128 - market_token_amount as i128;
            (diff.saturating_mul(1_000_000) / market_token_amount as i128) as i64
        };

        PriceCheck {
            is_valid: difference_ppm.unsigned_abs() as u64 <= self.config.max_allowed_fee_diff_ppm as u64,
            difference_ppm,
            sats_base_fee: base_fee_sats,
            fee_ppm,
        }
    }
}

fn err_clone(err: &Error) -> Error {
    Error::Other(err.to_string())
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    struct FakeProvider {
        name: &'static str,
        fail_calls: AtomicU32,
        fails_first_n: u32,
        price: u64,
    }

    impl PriceProvider for FakeProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        fn usd_price(&self) -> super::super::ProviderFuture<'_, f64> {
            Box::pin(async move {
                let n = self.fail_calls.fetch_add(1, Ordering::SeqCst);
                if n < self.fails_first_n {
                    Err(Error::Network(format!("{} down", self.name)))
                } else {
                    Ok(self.price as f64)
                }
            })
        }

        fn token_price_usat(&self, _token: &TokenId) -> super::super::ProviderFuture<'_, u64> {
            Box::pin(async move {
                let n = self.fail_calls.fetch_add(1, Ordering::SeqCst);
                if n < self.fails_first_n {
                    Err(Error::Network(format!("{} down", self.name)))
                } else {
                    Ok(self.price)
                }
            })
        }
    }

    #[tokio::test]
    async fn fails_over_to_working_provider() {
        let providers: Vec<Arc<dyn PriceProvider>> = vec![
            Arc::new(FakeProvider {
                name: "binance",
                fail_calls: AtomicU32::new(0),
                fails_first_n: u32::MAX,
                price: 0,
            }),
            Arc::new(FakeProvider {
                name: "okx",
                fail_calls: AtomicU32::new(0),
                fails_first_n: u32::MAX,
                price: 0,
            }),
            Arc::new(FakeProvider {
                name: "coingecko",
                fail_calls: AtomicU32::new(0),
                fails_first_n: 0,
                price: 42,
            }),
            Arc::new(FakeProvider {
                name: "coinpaprika",
                fail_calls: AtomicU32::new(0),
                fails_first_n: u32::MAX,
                price: 0,
            }),
        ];
        let oracle = PriceOracle::new(providers, SdkConfig::default());
        let cancel = CancellationToken::new();

        let price = oracle.get_usd_price(&cancel).await.unwrap();
        assert_eq!(price, 42.0);
        assert_eq!(load_operational(&oracle.providers[2].operational), Operational::Up);
    }

    #[test]
    fn fixed_and_ignore_markers_short_circuit() {
        assert_eq!(parse_price_marker("$fixed-1500"), Some(PriceQuote::Fixed(1500)));
        assert_eq!(parse_price_marker("$ignore"), Some(PriceQuote::Ignore));
        assert_eq!(parse_price_marker("not-a-marker"), None);
    }

    #[test]
    fn price_within_ppm_bound_is_valid() {
        let oracle = PriceOracle::new(vec![], SdkConfig::default());
        // 100_000 sats net at 1000 uSat/token market price => 100_000_000 token units.
        let check = oracle.check_price(100_000, 0, 100, 100_000_000, 1_000);
        assert!(check.is_valid);
        assert_eq!(check.difference_ppm, 0);
    }

    #[test]
    fn price_beyond_ppm_bound_is_invalid() {
        let oracle = PriceOracle::new(vec![], SdkConfig::default());
        // Quoted token amount 1% (10_000 ppm) above market, bound is 2000 ppm.
        let check = oracle.check_price(100_000, 0, 100, 101_000_000, 1_000);
        assert!(!check.is_valid);
        assert!(check.difference_ppm > oracle.config.max_allowed_fee_diff_ppm as i64);
    }
}
