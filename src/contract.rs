//! External collaborator traits: the on-chain contract adapter and its
//! event source, plus the Bitcoin/Lightning RPC surfaces a concrete
//! SDK build plugs in. The core only ever talks to these through trait
//! objects — it never executes smart-chain transactions, runs a Bitcoin
//! node, or routes Lightning payments itself (§1 Non-goals).

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::types::{Direction, SignatureData, SwapData};

/// Boxed future returned by collaborator trait methods, mirroring the
/// storage layer's `StorageFuture` (`crate::storage`).
pub type ContractFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// On-chain escrow events the reactor fuses into swap-state transitions (§5).
#[derive(Debug, Clone)]
pub enum ChainEvent {
    Initialize {
        payment_hash: [u8; 32],
        commit_tx_id: String,
    },
    Claim {
        payment_hash: [u8; 32],
        claim_tx_id: String,
        secret: Option<[u8; 32]>,
    },
    Refund {
        payment_hash: [u8; 32],
        refund_tx_id: String,
    },
}

/// A subscription to on-chain escrow events for a smart-chain adapter.
pub trait ChainEvents: Send + Sync {
    /// Returns the next batch of events observed since the last call.
    /// The reactor drains these in arrival order (§5).
    fn poll_events(&self) -> ContractFuture<'_, Vec<ChainEvent>>;
}

/// The on-chain contract adapter: init/claim/refund plus authorization
/// signature verification and balance queries. Concrete implementations
/// are chain-specific and live outside this crate.
pub trait SwapContract: Send + Sync {
    /// Lock the escrow where the caller is the payer (ToBTC*, pay-in).
    fn init_pay_in(
        &self,
        data: &SwapData,
        signature: &SignatureData,
        fee_rate: u64,
    ) -> ContractFuture<'_, String>;

    /// Lock the escrow where the LP is the payer (FromBTC*, pay-out).
    fn init(
        &self,
        data: &SwapData,
        signature: &SignatureData,
        fee_rate: u64,
    ) -> ContractFuture<'_, String>;

    /// Claim a committed escrow by revealing its secret (or tx proof).
    fn claim(&self, payment_hash: &[u8; 32], secret: &[u8; 32]) -> ContractFuture<'_, String>;

    /// Refund a committed escrow past its expiry.
    fn refund(&self, payment_hash: &[u8; 32]) -> ContractFuture<'_, String>;

    /// Verify an LP's `init` authorization signature (pay-out directions).
    fn is_valid_init_authorization(
        &self,
        data: &SwapData,
        signature: &SignatureData,
        fee_rate: u64,
    ) -> ContractFuture<'_, bool>;

    /// Verify an LP's `claim-init` authorization signature (pay-in directions).
    fn is_valid_claim_init_authorization(
        &self,
        data: &SwapData,
        signature: &SignatureData,
        fee_rate: u64,
    ) -> ContractFuture<'_, bool>;

    /// Read the LP's on-chain token balance, used by the liquidity check (§4.3).
    fn get_balance(&self, address: &str, token: &crate::types::TokenId) -> ContractFuture<'_, u64>;

    /// Whether the escrow has expired per on-chain status, used to decide
    /// QUOTE_EXPIRED vs. continuing to wait for commit (§4.4).
    fn is_expired(&self, payment_hash: &[u8; 32]) -> ContractFuture<'_, bool>;
}

/// Whether `SwapContract::init` or `init_pay_in` applies, derived from
/// the direction rather than threaded through call sites.
pub fn commit_method_for(direction: Direction) -> CommitMethod {
    if direction.is_pay_in() {
        CommitMethod::InitPayIn
    } else {
        CommitMethod::Init
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMethod {
    InitPayIn,
    Init,
}

/// A single confirmed/unconfirmed Bitcoin transaction observation, as
/// reported by `BitcoinRpc` (external collaborator; §1 Non-goals).
#[derive(Debug, Clone)]
pub struct BitcoinTxObservation {
    pub txid: String,
    pub confirmations: u32,
    pub vout_value_sats: u64,
}

/// Minimal Bitcoin RPC surface the FromBTC watchdog needs.
pub trait BitcoinRpc: Send + Sync {
    /// Observations of transactions paying `address`, most recent first.
    fn watch_address(&self, address: &str) -> ContractFuture<'_, Vec<BitcoinTxObservation>>;

    fn current_tip_height(&self) -> ContractFuture<'_, u32>;
}

/// Minimal Lightning node surface the response validator and post-commit
/// watchdogs need (node capacity lookups, nothing payment-routing).
pub trait LightningApi: Send + Sync {
    /// Published channel capacity for a node, in satoshis, or `None` if
    /// the node can't be resolved in the public graph.
    fn node_capacity(&self, node_pubkey: &str) -> ContractFuture<'_, Option<u64>>;
}
