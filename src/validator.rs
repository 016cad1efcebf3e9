//! The adversarial response validator: every check an untrusted LP's
//! quote must pass before a `Swap` is built from it (§4.3).
//!
//! Every check here reconstructs an expected value from the caller's own
//! inputs and compares by equality before trusting anything the LP
//! returned — the same "rebuild and compare" shape the teacher uses to
//! validate a reconstructed VHTLC address against the one the server
//! handed back (`vhtlc.rs::claim`, `vtxo_swap.rs::claim_server_vhtlc`).

use crate::config::SdkConfig;
use crate::contract::{LightningApi, SwapContract};
use crate::error::{Error, Result};
use crate::hash::{from_btc_hash, to_btc_hash};
use crate::intermediary::types::InitResponseData;
use crate::types::{Direction, EscrowType, SwapData, TokenId};

/// The caller's own, independently-derived inputs for one quote request.
/// Every field the LP returns is checked against these, never trusted
/// on its own.
pub struct RequestContext<'a> {
    pub direction: Direction,
    pub requested_token: &'a TokenId,
    pub exact_in: bool,
    /// The side the user fixed: input amount if `exact_in`, else output amount.
    pub requested_amount: u64,
    pub lp_address: &'a str,
    pub max_confirmations: u32,
    /// Escrow nonce for ToBTC (`None` for lightning/FromBTC directions, which
    /// use the zero nonce per §3/§4.3).
    pub escrow_nonce: Option<[u8; 8]>,
    /// ToBTC only: confirmation target requested of the LP.
    pub confirmation_target: Option<u32>,
    /// ToBTCLN only: the max routing fee the caller authorized.
    pub max_routing_fee_sats: Option<u64>,
    /// ToBTCLN only: the expiry timestamp the caller requested.
    pub expiry_timestamp: Option<i64>,
    /// FromBTC only: requested sequence number.
    pub sequence: Option<u64>,
    /// FromBTC only: chain parameters needed to recompute the claimer bounty.
    pub from_btc_bounty_inputs: Option<FromBtcBountyInputs>,
    /// FromBTCLN only: caller-chosen preimage.
    pub preimage: Option<[u8; 32]>,
    /// FromBTCLN only: optional description hash the invoice must commit to.
    pub description_hash: Option<[u8; 32]>,
    /// Output script the hash binds to (ToBTC/FromBTC).
    pub output_script: Option<Vec<u8>>,
    /// Bolt11-decoded payment_hash (ToBTCLN).
    pub bolt11_payment_hash: Option<[u8; 32]>,
}

/// Chain parameters needed to recompute FromBTC's claimer bounty (§4.3).
pub struct FromBtcBountyInputs {
    pub claim_fee: u64,
    pub start_timestamp: i64,
    pub block_safety_factor: u32,
    pub current_btc_tip_height: u32,
    pub relay_btc_tip_height: u32,
    pub fee_per_block: u64,
}

fn compute_claimer_bounty(config: &SdkConfig, inputs: &FromBtcBountyInputs, expiry: i64) -> u64 {
    let blocks_until_expiry = ((expiry - inputs.start_timestamp).max(0) as u64)
        / config.bitcoin_blocktime_secs
        * inputs.block_safety_factor as u64;
    let lag_blocks = inputs
        .current_btc_tip_height
        .saturating_sub(inputs.relay_btc_tip_height) as u64;
    inputs.claim_fee + (blocks_until_expiry + lag_blocks) * inputs.fee_per_block
}

/// Run every check from §4.3 that does not require an async collaborator
/// (contract signature checks and the liquidity check are run
/// separately — see `validate_signature` and `validate_liquidity` — so
/// callers can run them concurrently per the wrapper's fan-out design).
pub fn validate_response(
    config: &SdkConfig,
    now: i64,
    ctx: &RequestContext<'_>,
    resp: &InitResponseData,
) -> Result<()> {
    validate_common(config, ctx, resp)?;

    match ctx.direction {
        Direction::ToBtc => validate_to_btc(config, now, ctx, resp),
        Direction::ToBtcLn => validate_to_btcln(ctx, resp),
        Direction::FromBtc => validate_from_btc(config, now, ctx, resp),
        Direction::FromBtcLn | Direction::LnForGas => Ok(()),
    }
}

fn validate_common(config: &SdkConfig, ctx: &RequestContext<'_>, resp: &InitResponseData) -> Result<()> {
    if resp.total_fee != resp.swap_fee + resp.network_fee {
        return Err(Error::Intermediary("totalFee != swapFee + networkFee".to_string()));
    }

    if ctx.exact_in {
        if resp.total != ctx.requested_amount {
            return Err(Error::Intermediary("total != requestedInput".to_string()));
        }
    } else if resp.amount != ctx.requested_amount {
        return Err(Error::Intermediary("amount != requestedOutput".to_string()));
    }

    if &resp.data.token != ctx.requested_token {
        return Err(Error::Intermediary("data.token != requestedToken".to_string()));
    }

    let expected_hash = compute_expected_hash(ctx)?;
    if resp.data.hash != expected_hash {
        return Err(Error::Intermediary("Invalid data returned - paymentHash".to_string()));
    }

    let expected_type = EscrowType::expected_for(ctx.direction);
    if resp.data.escrow_type != expected_type {
        return Err(Error::Intermediary("data.type does not match direction".to_string()));
    }

    match ctx.direction {
        Direction::ToBtc | Direction::ToBtcLn => {
            if resp.data.claimer != ctx.lp_address {
                return Err(Error::Intermediary("data.claimer != lp.addressForChain".to_string()));
            }
        }
        Direction::FromBtc | Direction::FromBtcLn => {
            if resp.data.offerer != ctx.lp_address {
                return Err(Error::Intermediary("data.offerer != lp.addressForChain".to_string()));
            }
        }
        Direction::LnForGas => {}
    }

    if resp.data.confirmations > ctx.max_confirmations {
        return Err(Error::Intermediary("data.confirmations exceeds maxConfirmations".to_string()));
    }

    let expected_nonce = ctx.escrow_nonce.unwrap_or([0u8; 8]);
    if resp.data.escrow_nonce != expected_nonce {
        return Err(Error::Intermediary("data.escrowNonce does not match requested nonce".to_string()));
    }

    Ok(())
}

fn compute_expected_hash(ctx: &RequestContext<'_>) -> Result<[u8; 32]> {
    match ctx.direction {
        Direction::ToBtc => {
            let nonce = ctx
                .escrow_nonce
                .ok_or_else(|| Error::User("ToBTC request missing escrow nonce".to_string()))?;
            let script = ctx
                .output_script
                .as_ref()
                .ok_or_else(|| Error::User("ToBTC request missing output script".to_string()))?;
            Ok(to_btc_hash(&nonce, ctx.requested_amount, script))
        }
        Direction::FromBtc => {
            let script = ctx
                .output_script
                .as_ref()
                .ok_or_else(|| Error::User("FromBTC request missing output script".to_string()))?;
            Ok(from_btc_hash(ctx.requested_amount, script))
        }
        Direction::ToBtcLn => ctx
            .bolt11_payment_hash
            .ok_or_else(|| Error::User("ToBTCLN request missing bolt11 payment hash".to_string())),
        Direction::FromBtcLn => {
            let preimage = ctx
                .preimage
                .ok_or_else(|| Error::User("FromBTCLN request missing preimage".to_string()))?;
            Ok(crate::hash::from_btcln_hash(&preimage))
        }
        Direction::LnForGas => ctx
            .bolt11_payment_hash
            .ok_or_else(|| Error::User("LnForGas request missing bolt11 payment hash".to_string())),
    }
}

fn validate_to_btc(config: &SdkConfig, now: i64, ctx: &RequestContext<'_>, resp: &InitResponseData) -> Result<()> {
    let confirmation_target = ctx.confirmation_target.unwrap_or(0);
    let max_expiry = now
        + ((resp.data.confirmations + confirmation_target + config.grace_period_blocks) as i64
            * config.max_safety_factor as i64
            * config.bitcoin_blocktime_secs as i64);

    if resp.data.expiry > max_expiry {
        return Err(Error::Intermediary("data.expiry exceeds maximum allowed escrow window".to_string()));
    }

    if resp.data.expiry - now < config.min_send_window_secs {
        return Err(Error::Intermediary("expiry - now below minSendWindow".to_string()));
    }

    Ok(())
}

fn validate_to_btcln(ctx: &RequestContext<'_>, resp: &InitResponseData) -> Result<()> {
    let max_fee = ctx
        .max_routing_fee_sats
        .ok_or_else(|| Error::User("ToBTCLN request missing max routing fee".to_string()))?;
    let routing_fee = resp.routing_fee_sats.unwrap_or(0);
    if routing_fee > max_fee {
        return Err(Error::Intermediary("Invalid max fee sats returned".to_string()));
    }

    if let Some(expected_expiry) = ctx.expiry_timestamp {
        if resp.data.expiry != expected_expiry {
            return Err(Error::Intermediary("data.expiry != options.expiryTimestamp".to_string()));
        }
    }

    Ok(())
}

fn validate_from_btc(config: &SdkConfig, now: i64, ctx: &RequestContext<'_>, resp: &InitResponseData) -> Result<()> {
    let bounty_inputs = ctx
        .from_btc_bounty_inputs
        .as_ref()
        .ok_or_else(|| Error::User("FromBTC request missing bounty inputs".to_string()))?;
    let expected_bounty = compute_claimer_bounty(config, bounty_inputs, resp.data.expiry);
    if resp.data.claimer_bounty != expected_bounty {
        return Err(Error::Intermediary("data.claimerBounty does not match computed bounty".to_string()));
    }

    if resp.data.expiry - now < config.min_send_window_secs {
        return Err(Error::Intermediary("expiry - now below minSendWindow".to_string()));
    }

    if let Some(expected_sequence) = ctx.sequence {
        if resp.data.sequence != expected_sequence {
            return Err(Error::Intermediary("data.sequence != requestedSequence".to_string()));
        }
    }

    Ok(())
}

/// FromBTCLN's node-capacity check: the LP's advertised lightning node
/// must resolve in the public graph and have capacity for the swap
/// (§4.3). `None` capacity rejects outright; less than double the swap
/// amount is accepted but should be surfaced as a soft warning by the
/// caller.
pub async fn validate_lightning_node_capacity(
    api: &dyn LightningApi,
    node_pubkey: &str,
    amount_sats: u64,
) -> Result<NodeCapacityCheck> {
    let capacity = api
        .node_capacity(node_pubkey)
        .await?
        .ok_or_else(|| Error::Intermediary(format!("LP lightning node {node_pubkey} not found in public graph")))?;

    if capacity < amount_sats {
        return Err(Error::Intermediary(format!(
            "LP lightning node capacity {capacity} below swap amount {amount_sats}"
        )));
    }

    Ok(NodeCapacityCheck {
        capacity,
        soft_warning: capacity / 2 < amount_sats,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct NodeCapacityCheck {
    pub capacity: u64,
    pub soft_warning: bool,
}

/// Signature authorization check (§4.3): `isValidInitAuthorization` for
/// pay-out directions, `isValidClaimInitAuthorization` for pay-in
/// directions, delegated to the chain-specific `SwapContract`.
pub async fn validate_signature(
    contract: &dyn SwapContract,
    data: &SwapData,
    resp: &InitResponseData,
) -> Result<()> {
    let valid = if data.is_pay_in() {
        contract
            .is_valid_claim_init_authorization(data, &resp.signature_data, resp.fee_rate)
            .await?
    } else {
        contract
            .is_valid_init_authorization(data, &resp.signature_data, resp.fee_rate)
            .await?
    };

    if valid {
        Ok(())
    } else {
        Err(Error::SignatureVerification(
            "LP authorization signature failed to verify".to_string(),
        ))
    }
}

/// Liquidity check (§4.3): the LP must have enough on-chain token balance
/// to honor the escrow it just quoted.
pub async fn validate_liquidity(
    contract: &dyn SwapContract,
    lp_address: &str,
    data: &SwapData,
) -> Result<()> {
    let balance = contract.get_balance(lp_address, &data.token).await?;
    if balance < data.amount {
        Err(Error::Intermediary(format!(
            "LP balance {balance} below escrow amount {}",
            data.amount
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EscrowType;

    fn base_data(hash: [u8; 32]) -> SwapData {
        SwapData {
            offerer: "offerer".into(),
            claimer: "lp-address".into(),
            token: "X".into(),
            amount: 100_000,
            hash,
            expiry: 10_000,
            escrow_nonce: [1, 2, 3, 4, 5, 6, 7, 8],
            confirmations: 2,
            sequence: 0,
            escrow_type: EscrowType::ChainNonced,
            security_deposit: 0,
            claimer_bounty: 0,
            pay_in: true,
        }
    }

    fn base_resp(data: SwapData) -> InitResponseData {
        InitResponseData {
            data,
            swap_fee: 500,
            network_fee: 2_000,
            total_fee: 2_500,
            total: 102_500,
            amount: 100_000,
            signature_data: crate::types::SignatureData {
                prefix: "init".into(),
                timeout: 0,
                signature: String::new(),
            },
            fee_rate: 1,
            routing_fee_sats: None,
            pr: None,
        }
    }

    #[test]
    fn to_btc_hash_mismatch_is_rejected() {
        let script = vec![1, 2, 3];
        let nonce = [1, 2, 3, 4, 5, 6, 7, 8];
        let data = base_data([0xAA; 32]);
        let resp = base_resp(data);
        let ctx = RequestContext {
            direction: Direction::ToBtc,
            requested_token: &TokenId("X".into()),
            exact_in: false,
            requested_amount: 100_000,
            lp_address: "lp-address",
            max_confirmations: 6,
            escrow_nonce: Some(nonce),
            confirmation_target: Some(3),
            max_routing_fee_sats: None,
            expiry_timestamp: None,
            sequence: None,
            from_btc_bounty_inputs: None,
            preimage: None,
            description_hash: None,
            output_script: Some(script),
            bolt11_payment_hash: None,
        };

        let err = validate_response(&SdkConfig::default(), 0, &ctx, &resp).unwrap_err();
        assert!(matches!(err, Error::Intermediary(_)));
    }

    #[test]
    fn to_btc_hash_match_is_accepted() {
        let script = vec![1, 2, 3];
        let nonce = [1, 2, 3, 4, 5, 6, 7, 8];
        let hash = to_btc_hash(&nonce, 100_000, &script);
        let data = base_data(hash);
        let mut resp = base_resp(data);
        resp.data.expiry = 1_000_000;

        let ctx = RequestContext {
            direction: Direction::ToBtc,
            requested_token: &TokenId("X".into()),
            exact_in: false,
            requested_amount: 100_000,
            lp_address: "lp-address",
            max_confirmations: 6,
            escrow_nonce: Some(nonce),
            confirmation_target: Some(3),
            max_routing_fee_sats: None,
            expiry_timestamp: None,
            sequence: None,
            from_btc_bounty_inputs: None,
            preimage: None,
            description_hash: None,
            output_script: Some(script),
            bolt11_payment_hash: None,
        };

        validate_response(&SdkConfig::default(), 0, &ctx, &resp).unwrap();
    }

    #[test]
    fn to_btcln_excess_routing_fee_rejected() {
        let hash = [0x11; 32];
        let mut data = base_data(hash);
        data.escrow_type = EscrowType::Htlc;
        data.pay_in = true;
        let mut resp = base_resp(data);
        resp.routing_fee_sats = Some(150);

        let ctx = RequestContext {
            direction: Direction::ToBtcLn,
            requested_token: &TokenId("X".into()),
            exact_in: false,
            requested_amount: 100_000,
            lp_address: "lp-address",
            max_confirmations: 6,
            escrow_nonce: None,
            confirmation_target: None,
            max_routing_fee_sats: Some(100),
            expiry_timestamp: None,
            sequence: None,
            from_btc_bounty_inputs: None,
            preimage: None,
            description_hash: None,
            output_script: None,
            bolt11_payment_hash: Some(hash),
        };

        let err = validate_response(&SdkConfig::default(), 0, &ctx, &resp).unwrap_err();
        match err {
            Error::Intermediary(msg) => assert!(msg.contains("max fee")),
            other => panic!("expected Intermediary error, got {other:?}"),
        }
    }

    #[test]
    fn fee_additivity_enforced() {
        let hash = [0x11; 32];
        let mut data = base_data(hash);
        data.escrow_type = EscrowType::Htlc;
        let mut resp = base_resp(data);
        resp.total_fee = 9999; // inconsistent with swap_fee + network_fee

        let ctx = RequestContext {
            direction: Direction::ToBtcLn,
            requested_token: &TokenId("X".into()),
            exact_in: false,
            requested_amount: 100_000,
            lp_address: "lp-address",
            max_confirmations: 6,
            escrow_nonce: None,
            confirmation_target: None,
            max_routing_fee_sats: Some(1000),
            expiry_timestamp: None,
            sequence: None,
            from_btc_bounty_inputs: None,
            preimage: None,
            description_hash: None,
            output_script: None,
            bolt11_payment_hash: Some(hash),
        };

        let err = validate_response(&SdkConfig::default(), 0, &ctx, &resp).unwrap_err();
        assert!(matches!(err, Error::Intermediary(_)));
    }
}
