//! CoinGecko REST price provider (§4.1). Unlike the exchange-style
//! providers this queries a single `simple/price` endpoint that already
//! returns a USD-denominated value per coin id.

use std::collections::HashMap;

use super::get_json;
use crate::error::Error;
use crate::price::{PriceProvider, ProviderFuture};
use crate::types::TokenId;

const BASE_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

pub struct CoinGeckoProvider {
    client: reqwest::Client,
    base_url: String,
}

impl CoinGeckoProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
        }
    }

    async fn usd_value(&self, coin_id: &str) -> crate::error::Result<f64> {
        let url = format!("{}?ids={coin_id}&vs_currencies=usd", self.base_url);
        let resp: HashMap<String, HashMap<String, f64>> = get_json(&self.client, &url).await?;
        resp.get(coin_id)
            .and_then(|m| m.get("usd"))
            .copied()
            .ok_or_else(|| Error::Parse(format!("coingecko response missing usd value for {coin_id}")))
    }

    /// Map a generic token identifier onto CoinGecko's coin-id convention.
    /// Hosts that need a different mapping should wrap this provider.
    fn coin_id(token: &TokenId) -> String {
        token.0.to_lowercase()
    }
}

impl PriceProvider for CoinGeckoProvider {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    fn usd_price(&self) -> ProviderFuture<'_, f64> {
        Box::pin(async move { self.usd_value("bitcoin").await })
    }

    fn token_price_usat(&self, token: &TokenId) -> ProviderFuture<'_, u64> {
        let coin_id = Self::coin_id(token);
        Box::pin(async move {
            let token_usd = self.usd_value(&coin_id).await?;
            let btc_usd = self.usd_value("bitcoin").await?;
            if btc_usd <= 0.0 {
                return Err(Error::Other("coingecko returned non-positive BTC price".to_string()));
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
    fn coin_id_lowercases_token() {
        assert_eq!(CoinGeckoProvider::coin_id(&TokenId("USDC".into())), "usdc");
    }
}
