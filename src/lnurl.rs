//! LNURL-pay resolution: bech32 `LNURL1…`, bare `lnurlp://`/`lnurlw://`
//! URLs, and lightning-address (`user@domain`) identifiers (§6). AES
//! success-action ciphertext is decoded by the caller — this module only
//! enforces the size/host invariants the spec calls out and hands back
//! the still-encrypted fields.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::SuccessAction;

const MAX_DESCRIPTION_LEN: usize = 144;
const MAX_AES_CIPHERTEXT_LEN: usize = 4096;

/// Resolve any of the supported LNURL input forms into the plain HTTPS
/// (or `.onion` HTTP) endpoint URL to fetch the pay request from.
pub fn resolve(input: &str) -> Result<String> {
    let trimmed = input.trim();

    if let Some(rest) = trimmed.strip_prefix("lnurlp://").or_else(|| trimmed.strip_prefix("lnurlw://")) {
        return Ok(format!("{}{rest}", scheme_for_host(rest)));
    }

    if trimmed.to_ascii_lowercase().starts_with("lnurl1") {
        return decode_bech32_lnurl(trimmed);
    }

    if let Some((user, domain)) = trimmed.split_once('@') {
        if !user.is_empty() && !domain.is_empty() && !domain.contains('@') {
            return Ok(format!("{}{domain}/.well-known/lnurlp/{user}", scheme_for_host(domain)));
        }
    }

    Err(Error::Parse(format!("unrecognized lnurl input: {trimmed}")))
}

fn scheme_for_host(host_and_path: &str) -> &'static str {
    let host = host_and_path.split(['/', '?']).next().unwrap_or(host_and_path);
    if host.ends_with(".onion") {
        "http://"
    } else {
        "https://"
    }
}

fn decode_bech32_lnurl(encoded: &str) -> Result<String> {
    let (_hrp, data) =
        bech32::decode(encoded).map_err(|e| Error::Parse(format!("invalid bech32 lnurl: {e}")))?;
    String::from_utf8(data).map_err(|e| Error::Parse(format!("lnurl payload is not valid utf-8: {e}")))
}

/// `GET <endpoint>` response describing the LNURL-pay callback (§6).
#[derive(Debug, Clone, Deserialize)]
pub struct PayRequest {
    pub callback: String,
    #[serde(rename = "minSendable")]
    pub min_sendable_msat: u64,
    #[serde(rename = "maxSendable")]
    pub max_sendable_msat: u64,
    pub metadata: String,
    #[serde(rename = "commentAllowed", default)]
    pub comment_allowed: u32,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// `GET <callback>?amount=…` response carrying the final invoice (§6).
#[derive(Debug, Clone, Deserialize)]
pub struct PayResponse {
    #[serde(default)]
    pub pr: Option<String>,
    #[serde(rename = "successAction", default)]
    pub success_action: Option<SuccessAction>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

fn check_error_status(status: &Option<String>, reason: &Option<String>) -> Result<()> {
    if status.as_deref() == Some("ERROR") {
        return Err(Error::Intermediary(format!(
            "lnurl endpoint returned ERROR: {}",
            reason.clone().unwrap_or_default()
        )));
    }
    Ok(())
}

/// Thin HTTP surface over an LNURL-pay endpoint.
pub struct LnurlClient {
    client: reqwest::Client,
}

impl LnurlClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub async fn fetch_pay_request(&self, input: &str) -> Result<PayRequest> {
        let url = resolve(input)?;
        let resp: PayRequest = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("GET {url} failed: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Parse(format!("invalid lnurl pay request body: {e}")))?;

        check_error_status(&resp.status, &resp.reason)?;
        if resp.tag.as_deref() != Some("payRequest") {
            return Err(Error::Intermediary("lnurl endpoint is not a payRequest".to_string()));
        }
        Ok(resp)
    }

    /// Request the final invoice for `amount_msat`, validating the
    /// success action against the pay request's own domain (§6: "URL
    /// host must equal payRequest domain").
    pub async fn request_invoice(
        &self,
        pay_request: &PayRequest,
        amount_msat: u64,
        comment: Option<&str>,
    ) -> Result<PayResponse> {
        if amount_msat < pay_request.min_sendable_msat || amount_msat > pay_request.max_sendable_msat {
            return Err(Error::User(format!(
                "amount {amount_msat} msat outside [{}, {}]",
                pay_request.min_sendable_msat, pay_request.max_sendable_msat
            )));
        }
        if let Some(c) = comment {
            if c.len() as u32 > pay_request.comment_allowed {
                return Err(Error::User("comment exceeds commentAllowed length".to_string()));
            }
        }

        let mut url = reqwest::Url::parse(&pay_request.callback)
            .map_err(|e| Error::Parse(format!("invalid lnurl callback url: {e}")))?;
        url.query_pairs_mut().append_pair("amount", &amount_msat.to_string());
        if let Some(c) = comment {
            url.query_pairs_mut().append_pair("comment", c);
        }

        let resp: PayResponse = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("lnurl invoice request failed: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Parse(format!("invalid lnurl pay response body: {e}")))?;

        check_error_status(&resp.status, &resp.reason)?;
        if resp.pr.is_none() {
            return Err(Error::Intermediary("lnurl pay response missing pr".to_string()));
        }

        if let Some(action) = &resp.success_action {
            validate_success_action(action, &pay_request.callback)?;
        }

        Ok(resp)
    }
}

impl Default for LnurlClient {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_success_action(action: &SuccessAction, callback: &str) -> Result<()> {
    match action {
        SuccessAction::Message { message } => {
            if message.len() > MAX_DESCRIPTION_LEN {
                return Err(Error::Intermediary("successAction message exceeds 144 chars".to_string()));
            }
        }
        SuccessAction::Url { description, url } => {
            if description.len() > MAX_DESCRIPTION_LEN {
                return Err(Error::Intermediary("successAction description exceeds 144 chars".to_string()));
            }
            let action_host = reqwest::Url::parse(url)
                .map_err(|e| Error::Parse(format!("invalid successAction url: {e}")))?
                .host_str()
                .map(str::to_string);
            let callback_host = reqwest::Url::parse(callback)
                .map_err(|e| Error::Parse(format!("invalid lnurl callback url: {e}")))?
                .host_str()
                .map(str::to_string);
            if action_host != callback_host {
                return Err(Error::Intermediary(
                    "successAction url host does not match payRequest domain".to_string(),
                ));
            }
        }
        SuccessAction::Aes {
            description,
            ciphertext,
            ..
        } => {
            if description.len() > MAX_DESCRIPTION_LEN {
                return Err(Error::Intermediary("successAction description exceeds 144 chars".to_string()));
            }
            if ciphertext.len() > MAX_AES_CIPHERTEXT_LEN {
                return Err(Error::Intermediary("successAction ciphertext exceeds 4096 chars".to_string()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_bare_lnurlp_scheme() {
        let url = resolve("lnurlp://lp.example/.well-known/lnurlp/alice").unwrap();
        assert_eq!(url, "https://lp.example/.well-known/lnurlp/alice");
    }

    #[test]
    fn resolves_onion_to_plain_http() {
        let url = resolve("lnurlp://abc123.onion/.well-known/lnurlp/alice").unwrap();
        assert!(url.starts_with("http://"));
    }

    #[test]
    fn resolves_lightning_address() {
        let url = resolve("alice@lp.example").unwrap();
        assert_eq!(url, "https://lp.example/.well-known/lnurlp/alice");
    }

    #[test]
    fn rejects_unrecognized_input() {
        assert!(resolve("not-a-lnurl-thing").is_err());
    }

    #[test]
    fn url_success_action_host_mismatch_rejected() {
        let action = SuccessAction::Url {
            description: "d".into(),
            url: "https://evil.example/x".into(),
        };
        let err = validate_success_action(&action, "https://lp.example/callback").unwrap_err();
        assert!(matches!(err, Error::Intermediary(_)));
    }

    #[test]
    fn oversized_description_rejected() {
        let action = SuccessAction::Message {
            message: "x".repeat(200),
        };
        assert!(validate_success_action(&action, "https://lp.example/callback").is_err());
    }
}
