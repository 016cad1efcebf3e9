//! Shared data model for the swap engine: networks, tokens, swap payloads.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Serde module for serializing `[u8; 32]` as hex strings.
pub(crate) mod hex_bytes32 {
    use super::*;

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

/// Serde module for serializing `[u8; 8]` (escrow nonces) as hex strings.
pub(crate) mod hex_bytes8 {
    use super::*;

    pub fn serialize<S>(bytes: &[u8; 8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 8], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 8 bytes"))
    }
}

/// Bitcoin network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Bitcoin,
    Testnet,
    Regtest,
    Mutinynet,
}

impl Network {
    /// Convert to the `bitcoin` crate's network type.
    pub fn to_bitcoin_network(self) -> bitcoin::Network {
        match self {
            Network::Bitcoin => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Regtest => bitcoin::Network::Regtest,
            Network::Mutinynet => bitcoin::Network::Signet,
        }
    }
}

impl std::str::FromStr for Network {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bitcoin" | "mainnet" => Ok(Network::Bitcoin),
            "testnet" | "testnet3" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            "mutinynet" | "signet" => Ok(Network::Mutinynet),
            _ => Err(crate::error::Error::Parse(format!("unknown network: {s}"))),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Bitcoin => write!(f, "bitcoin"),
            Network::Testnet => write!(f, "testnet"),
            Network::Regtest => write!(f, "regtest"),
            Network::Mutinynet => write!(f, "mutinynet"),
        }
    }
}

/// Identifier for a smart-chain token. Kept as an opaque string (the core
/// never interprets chain semantics beyond comparing for equality) — the
/// concrete chain adapter lives behind `SwapContract`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId(pub String);

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TokenId {
    fn from(s: &str) -> Self {
        TokenId(s.to_string())
    }
}

/// Four swap directions, sharing one lifecycle skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    ToBtc,
    ToBtcLn,
    FromBtc,
    FromBtcLn,
    /// Trusted gas-bootstrapping swap variant (§4.5).
    LnForGas,
}

impl Direction {
    /// Whether the user funds the escrow (pay-in) or the LP does (pay-out).
    pub fn is_pay_in(self) -> bool {
        matches!(self, Direction::ToBtc | Direction::ToBtcLn)
    }
}

/// Escrow data-type discriminator, mirrored client-side from the LP's
/// response and checked against the direction (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowType {
    Htlc,
    Chain,
    ChainNonced,
}

impl EscrowType {
    /// The escrow type a direction-correct LP response must carry.
    pub fn expected_for(direction: Direction) -> Self {
        match direction {
            Direction::ToBtcLn | Direction::FromBtcLn | Direction::LnForGas => EscrowType::Htlc,
            Direction::FromBtc => EscrowType::Chain,
            Direction::ToBtc => EscrowType::ChainNonced,
        }
    }
}

/// Immutable-after-quote escrow descriptor (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapData {
    pub offerer: String,
    pub claimer: String,
    pub token: TokenId,
    pub amount: u64,
    #[serde(with = "hex_bytes32")]
    pub hash: [u8; 32],
    /// Absolute expiry, Unix seconds.
    pub expiry: i64,
    #[serde(with = "hex_bytes8")]
    pub escrow_nonce: [u8; 8],
    pub confirmations: u32,
    pub sequence: u64,
    #[serde(rename = "type")]
    pub escrow_type: EscrowType,
    pub security_deposit: u64,
    pub claimer_bounty: u64,
    pub pay_in: bool,
}

impl SwapData {
    pub fn is_pay_in(&self) -> bool {
        self.pay_in
    }
}

/// Pricing snapshot recorded at quote time (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PricingInfo {
    pub is_valid: bool,
    pub difference_ppm: i64,
    pub sats_base_fee: u64,
    pub fee_ppm: u32,
}

/// The LP's authorization for committing the escrow on-chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureData {
    pub prefix: String,
    pub timeout: i64,
    pub signature: String,
}

/// LNURL success-action metadata, carried undecrypted when `tag == "aes"`
/// (AES-CBC decoding is an external collaborator's job — §1, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum SuccessAction {
    #[serde(rename = "message")]
    Message { message: String },
    #[serde(rename = "url")]
    Url { description: String, url: String },
    #[serde(rename = "aes")]
    Aes {
        description: String,
        ciphertext: String,
        iv: String,
    },
}

/// Direction-specific payload carried alongside the common `SwapData`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SwapPayload {
    ToBtc {
        address: String,
        script_pubkey: Vec<u8>,
    },
    ToBtcLn {
        bolt11: String,
        max_routing_fee_sats: u64,
        lnurl: Option<String>,
        success_action: Option<SuccessAction>,
    },
    FromBtc {
        deposit_address: String,
        claimer_bounty: u64,
    },
    FromBtcLn {
        bolt11: String,
        #[serde(with = "hex_bytes32")]
        preimage: [u8; 32],
    },
    LnForGas {
        bolt11: String,
    },
}

/// Per-direction lifecycle state (§4.5). Kept as one tagged enum rather
/// than five separate FSMs; `swap::fsm` enforces which edges are legal
/// for a given `Direction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapState {
    Created,
    Committed,
    Claimed,
    Refundable,
    Refunded,
    QuoteExpired,
    Failed,
    // FromBTCLN-specific.
    PrCreated,
    PrPaid,
    ClaimCommitted,
    ClaimClaimed,
    // LnForGas-specific.
    Finished,
    Expired,
}

impl SwapState {
    /// Terminal states end a swap's lifecycle (Invariant 3).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SwapState::Claimed
                | SwapState::Refunded
                | SwapState::Failed
                | SwapState::QuoteExpired
                | SwapState::ClaimClaimed
                | SwapState::Finished
                | SwapState::Expired
        )
    }
}

/// The central entity: one atomic swap, keyed by `payment_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swap {
    /// Schema version; bumped on breaking serialization changes (§3 ADD).
    pub version: u8,
    #[serde(with = "hex_bytes32")]
    pub payment_hash: [u8; 32],
    pub direction: Direction,
    pub state: SwapState,
    pub data: SwapData,
    pub pricing_info: Option<PricingInfo>,
    pub swap_fee: u64,
    pub network_fee: u64,
    pub swap_fee_btc: u64,
    pub signature_data: Option<SignatureData>,
    pub fee_rate: u64,
    pub payload: SwapPayload,
    pub commit_tx_id: Option<String>,
    pub claim_tx_id: Option<String>,
    pub refund_tx_id: Option<String>,
    /// Signature authorization expiry, absolute wall-clock seconds.
    pub expiry: i64,
}

impl Swap {
    pub const CURRENT_VERSION: u8 = 1;

    /// Current schema bump has no migrations; reserved for future ones
    /// (§3 ADD). Forward-compatible loads already ignore unknown fields —
    /// this seam is for semantic changes a field rename can't express.
    pub fn migrate(&mut self) {
        if self.version < Self::CURRENT_VERSION {
            self.version = Self::CURRENT_VERSION;
        }
    }

    pub fn total_fee(&self) -> u64 {
        self.swap_fee + self.network_fee
    }

    pub fn is_pay_in(&self) -> bool {
        self.data.is_pay_in()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_roundtrip() {
        use std::str::FromStr;
        for n in [Network::Bitcoin, Network::Testnet, Network::Regtest, Network::Mutinynet] {
            let s = n.to_string();
            assert_eq!(Network::from_str(&s).unwrap(), n);
        }
    }

    #[test]
    fn escrow_type_matches_direction() {
        assert_eq!(EscrowType::expected_for(Direction::ToBtc), EscrowType::ChainNonced);
        assert_eq!(EscrowType::expected_for(Direction::ToBtcLn), EscrowType::Htlc);
        assert_eq!(EscrowType::expected_for(Direction::FromBtc), EscrowType::Chain);
        assert_eq!(EscrowType::expected_for(Direction::FromBtcLn), EscrowType::Htlc);
    }

    #[test]
    fn pay_in_directions() {
        assert!(Direction::ToBtc.is_pay_in());
        assert!(Direction::ToBtcLn.is_pay_in());
        assert!(!Direction::FromBtc.is_pay_in());
        assert!(!Direction::FromBtcLn.is_pay_in());
    }

    #[test]
    fn terminal_states() {
        assert!(SwapState::Claimed.is_terminal());
        assert!(SwapState::Refunded.is_terminal());
        assert!(!SwapState::Created.is_terminal());
        assert!(!SwapState::Committed.is_terminal());
    }
}
