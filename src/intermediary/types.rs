//! Wire DTOs for the intermediary (LP) HTTP API (§6).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{SignatureData, SwapData};

/// Generic response envelope every LP endpoint wraps its payload in.
///
/// `data` is kept as raw JSON at deserialize time rather than eagerly typed
/// as `T`: an error envelope (e.g. `20003`/`20004` out-of-bounds) carries a
/// `{min, max}` shape instead of `T`, and a strict `Option<T>` field would
/// make the whole envelope fail to parse on that path. Call `data()` for the
/// success shape or `out_of_bounds_data()` on the bounds-error path.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound = "")]
pub struct Envelope<T> {
    pub code: u32,
    pub msg: String,
    #[serde(default, rename = "data")]
    raw_data: Option<serde_json::Value>,
    #[serde(default, rename = "signDataPrefetch")]
    pub sign_data_prefetch: Option<serde_json::Value>,
    #[serde(default, rename = "lnPublicKey")]
    pub ln_public_key: Option<String>,
    #[serde(skip)]
    _marker: std::marker::PhantomData<T>,
}

impl<T: serde::de::DeserializeOwned> Envelope<T> {
    /// Parse `data` as `T`, the success-path payload shape.
    pub fn data(&self) -> Result<Option<T>> {
        self.raw_data
            .clone()
            .map(|v| serde_json::from_value(v).map_err(|e| Error::Parse(format!("failed to parse envelope data: {e}"))))
            .transpose()
    }

    /// Parse `data` as `OutOfBoundsData`, for the `20003`/`20004` error path.
    pub fn out_of_bounds_data(&self) -> Result<OutOfBoundsData> {
        let value = self
            .raw_data
            .clone()
            .ok_or_else(|| Error::Intermediary("out-of-bounds envelope carried no data".to_string()))?;
        serde_json::from_value(value).map_err(|e| Error::Parse(format!("failed to parse out-of-bounds data: {e}")))
    }
}

pub const CODE_SUCCESS: u32 = 20000;
pub const CODE_OUT_OF_BOUNDS_MIN: u32 = 20003;
pub const CODE_OUT_OF_BOUNDS_MAX: u32 = 20004;

/// Refund-authorization polling codes (ToBTC/ToBTCLN post-commit, §4.4).
pub const CODE_REFUND_DATA: u32 = 20000;
pub const CODE_PAID: u32 = 20006;
pub const CODE_NOT_FOUND: u32 = 20007;
pub const CODE_PENDING: u32 = 20008;
pub const CODE_EXPIRED: u32 = 20010;

/// Payment-authorization polling codes (FromBTCLN post-commit, §4.4).
pub const CODE_AUTH_DATA: u32 = 10000;
pub const CODE_PAYMENT_PENDING: u32 = 10003;
pub const CODE_PAYMENT_EXPIRED: u32 = 10004;
pub const CODE_ALREADY_COMMITTED: u32 = 10005;
pub const CODE_PAYMENT_PAID: u32 = 10006;

#[derive(Debug, Clone, Deserialize)]
pub struct OutOfBoundsData {
    pub min: u64,
    pub max: u64,
}

/// `POST /info` discovery request.
#[derive(Debug, Clone, Serialize)]
pub struct InfoRequest {
    pub nonce: String,
}

/// `POST /info` response: LP's per-chain addresses and a signed envelope
/// echoing the nonce the registry generated for this call (§4.2).
#[derive(Debug, Clone, Deserialize)]
pub struct InfoResponse {
    pub address: String,
    pub envelope: serde_json::Value,
    pub signature: String,
    pub chains: std::collections::HashMap<String, ChainInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainInfo {
    pub address: String,
    pub signature: String,
}

/// Init-quote response shared by all four direction endpoints: the
/// escrow descriptor plus the LP's authorization to commit it.
#[derive(Debug, Clone, Deserialize)]
pub struct InitResponseData {
    #[serde(flatten)]
    pub data: SwapData,
    pub swap_fee: u64,
    pub network_fee: u64,
    pub total_fee: u64,
    pub total: u64,
    pub amount: u64,
    pub signature_data: SignatureData,
    pub fee_rate: u64,
    pub routing_fee_sats: Option<u64>,
    /// The minted BOLT11 invoice, present only on FromBTCLN responses.
    #[serde(default)]
    pub pr: Option<String>,
}

/// `POST /tobtc/payInvoice` request body.
#[derive(Debug, Clone, Serialize)]
pub struct ToBtcRequest {
    pub address: String,
    pub amount: u64,
    pub exact_in: bool,
    pub confirmation_target: u32,
    pub confirmations: u32,
    pub nonce: String,
    pub token: String,
    pub offerer: String,
    pub fee_rate: u64,
}

/// `POST /tobtcln/payInvoice` request body.
#[derive(Debug, Clone, Serialize)]
pub struct ToBtcLnRequest {
    pub pr: String,
    pub max_fee: u64,
    pub expiry_timestamp: i64,
    pub token: String,
    pub offerer: String,
    pub exact_in: bool,
    pub fee_rate: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
}

/// `POST /tobtcln/payInvoiceExactIn` confirm request body.
#[derive(Debug, Clone, Serialize)]
pub struct ToBtcLnExactInConfirmRequest {
    pub pr: String,
    pub req_id: String,
    pub fee_rate: u64,
}

/// `POST /frombtc/getAddress` request body.
#[derive(Debug, Clone, Serialize)]
pub struct FromBtcRequest {
    pub address: String,
    pub amount: u64,
    pub token: String,
    pub exact_out: bool,
    pub sequence: u64,
    pub claimer_bounty: u64,
    pub fee_rate: u64,
}

/// `POST /frombtcln/createInvoice` request body.
#[derive(Debug, Clone, Serialize)]
pub struct FromBtcLnRequest {
    pub payment_hash: String,
    pub amount: u64,
    pub address: String,
    pub token: String,
    pub description_hash: Option<String>,
    pub exact_out: bool,
    pub fee_rate: u64,
}

/// `GET /getRefundAuthorization` response payload (ToBTC/ToBTCLN post-commit).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RefundAuthorizationData {
    pub signature_data: Option<SignatureData>,
    pub tx_id: Option<String>,
    pub secret: Option<String>,
}

/// `GET /getInvoicePaymentAuth` response payload (FromBTCLN post-commit).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PaymentAuthorizationData {
    pub signature_data: Option<SignatureData>,
    pub secret: Option<String>,
}

/// Per-token advertised service terms (§3 Intermediary).
#[derive(Debug, Clone, Deserialize)]
pub struct AdvertisedService {
    pub swap_base_fee: u64,
    pub swap_fee_ppm: u32,
    pub tokens: Vec<String>,
}

/// Per-token reputation counters (§3 Intermediary).
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct Reputation {
    pub success_volume: u64,
    pub success_count: u64,
    pub fail_volume: u64,
    pub fail_count: u64,
    pub coop_close_volume: u64,
    pub coop_close_count: u64,
}
