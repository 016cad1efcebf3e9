//! Leaf `PriceProvider` implementations (§4.1).

pub mod binance;
pub mod coingecko;
pub mod coinpaprika;
pub mod okx;

pub use binance::BinanceProvider;
pub use coingecko::CoinGeckoProvider;
pub use coinpaprika::CoinPaprikaProvider;
pub use okx::OkxProvider;

use crate::error::{Error, Result};

/// Shared GET-JSON helper, the same shape as `IntermediaryClient`'s and
/// the teacher's `ApiClient::get_json` (`api/client.rs`).
pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Network(format!("GET {url} failed: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::Network(format!(
            "GET {url} returned {}",
            response.status()
        )));
    }

    let text = response
        .text()
        .await
        .map_err(|e| Error::Network(format!("failed to read response body: {e}")))?;

    log::debug!("GET {url} response: {text}");

    serde_json::from_str(&text)
        .map_err(|e| Error::Parse(format!("failed to parse response from {url}: {e}. body: {text}")))
}
