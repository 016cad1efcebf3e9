//! Binance exchange price provider: fetches a BTC-quoted pair and chains
//! it against the token's own USDT pair to derive uSat/token (§4.1).

use serde::Deserialize;

use super::get_json;
use crate::error::Error;
use crate::price::{PriceProvider, ProviderFuture};
use crate::types::TokenId;

const BASE_URL: &str = "https://api.binance.com/api/v3/ticker/price";

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

pub struct BinanceProvider {
    client: reqwest::Client,
    base_url: String,
}

impl BinanceProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
        }
    }

    async fn ticker(&self, symbol: &str) -> crate::error::Result<f64> {
        let url = format!("{}?symbol={symbol}", self.base_url);
        let ticker: TickerPrice = get_json(&self.client, &url).await?;
        ticker
            .price
            .parse::<f64>()
            .map_err(|e| Error::Parse(format!("binance price '{}' unparsable: {e}", ticker.price)))
    }
}

impl PriceProvider for BinanceProvider {
    fn name(&self) -> &'static str {
        "binance"
    }

    fn usd_price(&self) -> ProviderFuture<'_, f64> {
        Box::pin(async move { self.ticker("BTCUSDT").await })
    }

    fn token_price_usat(&self, token: &TokenId) -> ProviderFuture<'_, u64> {
        let token = token.clone();
        Box::pin(async move {
            // Chain TOKEN/USDT and BTC/USDT into uSat/token.
            let token_usdt = self.ticker(&format!("{}USDT", token.0)).await?;
            let btc_usdt = self.ticker("BTCUSDT").await?;
            if btc_usdt <= 0.0 {
                return Err(Error::Other("binance returned non-positive BTC price".to_string()));
            }
            let btc_per_token = token_usdt / btc_usdt;
            Ok((btc_per_token * 100_000_000.0 * 1_000_000.0) as u64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_name() {
        let provider = BinanceProvider::new(reqwest::Client::new());
        assert_eq!(provider.name(), "binance");
    }
}
