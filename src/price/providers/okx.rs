//! OKX exchange price provider: same chained-pair strategy as Binance,
//! against OKX's own ticker endpoint shape (§4.1).

use serde::Deserialize;

use super::get_json;
use crate::error::Error;
use crate::price::{PriceProvider, ProviderFuture};
use crate::types::TokenId;

const BASE_URL: &str = "https://www.okx.com/api/v5/market/ticker";

#[derive(Debug, Deserialize)]
struct OkxResponse {
    data: Vec<OkxTicker>,
}

#[derive(Debug, Deserialize)]
struct OkxTicker {
    last: String,
}

pub struct OkxProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OkxProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
        }
    }

    async fn last_price(&self, inst_id: &str) -> crate::error::Result<f64> {
        let url = format!("{}?instId={inst_id}", self.base_url);
        let resp: OkxResponse = get_json(&self.client, &url).await?;
        let ticker = resp
            .data
            .first()
            .ok_or_else(|| Error::Parse(format!("okx returned no ticker data for {inst_id}")))?;
        ticker
            .last
            .parse::<f64>()
            .map_err(|e| Error::Parse(format!("okx price '{}' unparsable: {e}", ticker.last)))
    }
}

impl PriceProvider for OkxProvider {
    fn name(&self) -> &'static str {
        "okx"
    }

    fn usd_price(&self) -> ProviderFuture<'_, f64> {
        Box::pin(async move { self.last_price("BTC-USDT").await })
    }

    fn token_price_usat(&self, token: &TokenId) -> ProviderFuture<'_, u64> {
        let token = token.clone();
        Box::pin(async move {
            let token_usdt = self.last_price(&format!("{}-USDT", token.0)).await?;
            let btc_usdt = self.last_price("BTC-USDT").await?;
            if btc_usdt <= 0.0 {
                return Err(Error::Other("okx returned non-positive BTC price".to_string()));
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
        let provider = OkxProvider::new(reqwest::Client::new());
        assert_eq!(provider.name(), "okx");
    }
}
