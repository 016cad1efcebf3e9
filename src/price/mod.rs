//! Redundant price oracle: multiple exchange providers with automatic
//! fail-over, used to validate an LP's quoted fee against the market (§4.1).

mod oracle;
pub mod providers;

pub use oracle::{PriceCheck, PriceOracle, PriceQuote};

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::types::TokenId;

/// Boxed future returned by `PriceProvider` methods.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A leaf exchange-price source. Binance, OKX, CoinGecko and CoinPaprika
/// are each one implementation of this capability (§4.1).
pub trait PriceProvider: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// BTC/USD price.
    fn usd_price(&self) -> ProviderFuture<'_, f64>;

    /// Token price in micro-satoshis per token unit.
    fn token_price_usat(&self, token: &TokenId) -> ProviderFuture<'_, u64>;
}
