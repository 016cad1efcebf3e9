//! Cross-chain atomic swap client SDK: a transport-agnostic protocol
//! engine for swapping Bitcoin (on-chain or Lightning) against a
//! smart-contract-chain token via untrusted liquidity-provider
//! intermediaries. See `SPEC_FULL.md` for the full module map; this
//! crate implements the protocol engine only — chain execution,
//! Bitcoin/Lightning node operation, and wallet key management are
//! supplied by the host application through the traits in `contract`.

pub mod client;
pub mod config;
pub mod contract;
pub mod error;
pub mod event_reactor;
pub mod hash;
pub mod intermediary;
pub mod lnurl;
pub mod price;
pub mod retry;
pub mod signature;
pub mod storage;
pub mod swap;
pub mod types;
pub mod validator;

pub use client::{Client, Collaborators};
pub use config::SdkConfig;
pub use error::{Error, Result};
pub use types::{Direction, Network, Swap, SwapData, SwapState};
