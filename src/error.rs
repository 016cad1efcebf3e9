//! Error types for the atomic swap client SDK.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Bounds carried by a `RequestError` when an LP reports an amount out of its
/// advertised `[min, max]` window (response codes `20003`/`20004`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds {
    pub min: u64,
    pub max: u64,
}

/// Errors that can occur in the atomic swap client SDK.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller-side misuse: invalid address, amount out of range, wrong state, etc.
    #[error("invalid request: {0}")]
    User(String),

    /// Non-2xx HTTP response or an unparseable body from an intermediary.
    #[error("request error (http {http_code:?}): {message}")]
    Request {
        http_code: Option<u16>,
        message: String,
        out_of_bounds: Option<OutOfBounds>,
    },

    /// An intermediary's response violated a validation rule in `ResponseValidator`.
    #[error("intermediary error: {0}")]
    Intermediary(String),

    /// Transport-level failure; retryable.
    #[error("network error: {0}")]
    Network(String),

    /// The operation was cancelled via a cancellation token.
    #[error("aborted: {0}")]
    Aborted(String),

    /// A cryptographic signature failed to verify.
    #[error("signature verification failed: {0}")]
    SignatureVerification(String),

    /// LP reported a terminal failure of a lightning payment receive.
    #[error("payment auth error (code {code}): {data}")]
    PaymentAuth { code: u32, data: String },

    /// Swap not found in the registry/storage index.
    #[error("swap not found: {0}")]
    SwapNotFound(String),

    /// Storage backend failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Parse error (hex, JSON, bech32, bolt11, addresses, …).
    #[error("parse error: {0}")]
    Parse(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Bitcoin-related error (address/script construction, signature checks).
    #[error("bitcoin error: {0}")]
    Bitcoin(String),

    /// Generic error with context.
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn request(http_code: Option<u16>, message: impl Into<String>) -> Self {
        Error::Request {
            http_code,
            message: message.into(),
            out_of_bounds: None,
        }
    }

    pub fn out_of_bounds(http_code: Option<u16>, message: impl Into<String>, min: u64, max: u64) -> Self {
        Error::Request {
            http_code,
            message: message.into(),
            out_of_bounds: Some(OutOfBounds { min, max }),
        }
    }

    /// Whether this error class is safe to retry per `tryWithRetries` policy (§5).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(format!("{:#}", err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Network(err.to_string())
    }
}
