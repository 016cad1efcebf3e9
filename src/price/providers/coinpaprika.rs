//! CoinPaprika REST price provider (§4.1): the last-resort provider in
//! the default fail-over order, same shape as CoinGecko.

use serde::Deserialize;

use super::get_json;
use crate::error::Error;
use crate::price::{PriceProvider, ProviderFuture};
use crate::types::TokenId;

const BASE_URL: &str = "https://api.coinpaprika.com/v1/tickers";

#[derive(Debug, Deserialize)]
struct TickerResponse {
    quotes: Quotes,
}

#[derive(Debug, Deserialize)]
struct Quotes {
    #[serde(rename = "USD")]
    usd: UsdQuote,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    price: f64,
}

pub struct CoinPaprikaProvider {
    client: reqwest::Client,
    base_url: String,
}

impl CoinPaprikaProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
        }
    }

    async fn usd_value(&self, coin_id: &str) -> crate::error::Result<f64> {
        let url = format!("{}/{coin_id}", self.base_url);
        let resp: TickerResponse = get_json(&self.client, &url).await?;
        Ok(resp.quotes.usd.price)
    }
}

impl PriceProvider for CoinPaprikaProvider {
    fn name(&self) -> &'static str {
        "coinpaprika"
    }

    fn usd_price(&self) -> ProviderFuture<'_, f64> {
        Box::pin(async move { self.usd_value("btc-bitcoin").await })
    }

    fn token_price_usat(&self, token: &TokenId) -> ProviderFuture<'_, u64> {
        let coin_id = token.0.clone();
        Box::pin(async move {
            let token_usd = self.usd_value(&coin_id).await?;
            let btc_usd = self.usd_value("btc-bitcoin").await?;
            if btc_usd <= 0.0 {
                return Err(Error::Other(
                    "coinpaprika returned non-positive BTC price".to_string(),
                ));
            }
            let btc_per_token = token_usd / btc_usd;
            Ok((btc_per_token * 100_000_000.0 * 1_000_000.0) as u64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_name() {
        let provider = CoinPaprikaProvider::new(reqwest::Client::new());
        assert_eq!(provider.name(), "coinpaprika");
    }
}
