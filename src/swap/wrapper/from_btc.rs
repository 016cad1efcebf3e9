//! FromBTC: receive funds sent to a Bitcoin deposit address; the hash
//! binds (amount, output script) with a zero nonce (§4.3).

use tokio_util::sync::CancellationToken;

use crate::config::SdkConfig;
use crate::contract::{BitcoinRpc, ChainEvent, SwapContract};
use crate::error::{Error, Result};
use crate::hash::from_btc_hash;
use crate::intermediary::client::unwrap_envelope;
use crate::intermediary::types::FromBtcRequest;
use crate::intermediary::IntermediaryClient;
use crate::retry::{retry_on_network_error, try_with_retries};
use crate::swap::index::{SwapIndex, TxIdKind};
use crate::types::{Direction, PricingInfo, Swap, SwapPayload, SwapState, TokenId};
use crate::validator::{validate_response, FromBtcBountyInputs, RequestContext};

pub struct FromBtcParams {
    pub output_script: Vec<u8>,
    pub amount: u64,
    pub token: TokenId,
    pub exact_out: bool,
    pub sequence: u64,
    pub claimer_bounty: u64,
    pub fee_rate: u64,
}

/// Run the per-LP quote (§4.4). `bounty_inputs` lets the caller recompute
/// the claimer bounty the LP must have quoted (§4.3).
pub async fn quote_one(
    config: &SdkConfig,
    client: &IntermediaryClient,
    chain: &str,
    lp_address: &str,
    params: &FromBtcParams,
    deposit_address: &str,
    bounty_inputs: FromBtcBountyInputs,
    now: i64,
) -> Result<Swap> {
    let expected_hash = from_btc_hash(params.amount, &params.output_script);

    let request = FromBtcRequest {
        address: deposit_address.to_string(),
        amount: params.amount,
        token: params.token.0.clone(),
        exact_out: params.exact_out,
        sequence: params.sequence,
        claimer_bounty: params.claimer_bounty,
        fee_rate: params.fee_rate,
    };

    let envelope = try_with_retries(
        config,
        &CancellationToken::new(),
        || client.init_from_btc(chain, &request),
        retry_on_network_error,
    )
    .await?;
    let resp = unwrap_envelope(envelope)?;

    let ctx = RequestContext {
        direction: Direction::FromBtc,
        requested_token: &params.token,
        exact_in: params.exact_out,
        requested_amount: params.amount,
        lp_address,
        max_confirmations: config.max_confirmations,
        escrow_nonce: None,
        confirmation_target: None,
        max_routing_fee_sats: None,
        expiry_timestamp: None,
        sequence: Some(params.sequence),
        from_btc_bounty_inputs: Some(bounty_inputs),
        preimage: None,
        description_hash: None,
        output_script: Some(params.output_script.clone()),
        bolt11_payment_hash: None,
    };
    validate_response(config, now, &ctx, &resp)?;

    if resp.data.hash != expected_hash {
        return Err(Error::Intermediary("Invalid data returned - paymentHash".to_string()));
    }

    Ok(Swap {
        version: Swap::CURRENT_VERSION,
        payment_hash: resp.data.hash,
        direction: Direction::FromBtc,
        state: SwapState::Created,
        pricing_info: None,
        swap_fee: resp.swap_fee,
        network_fee: resp.network_fee,
        swap_fee_btc: 0,
        signature_data: Some(resp.signature_data),
        fee_rate: resp.fee_rate,
        payload: SwapPayload::FromBtc {
            deposit_address: deposit_address.to_string(),
            claimer_bounty: resp.data.claimer_bounty,
        },
        commit_tx_id: None,
        claim_tx_id: None,
        refund_tx_id: None,
        expiry: resp.data.expiry,
        data: resp.data,
    })
}

pub fn attach_pricing(swap: &mut Swap, oracle_check: crate::price::PriceCheck) {
    swap.pricing_info = Some(PricingInfo {
        is_valid: oracle_check.is_valid,
        difference_ppm: oracle_check.difference_ppm,
        sats_base_fee: oracle_check.sats_base_fee,
        fee_ppm: oracle_check.fee_ppm,
    });
}

/// Commit phase: FromBTC is always pay-out, so the LP initializes the
/// escrow on-chain and the user never signs a funding transaction — the
/// user's "commit" is simply accepting the quote and waiting to send BTC.
pub async fn commit(index: &SwapIndex, payment_hash_hex: &str) -> Result<()> {
    let swap = index
        .get(payment_hash_hex)
        .await
        .ok_or_else(|| Error::SwapNotFound(payment_hash_hex.to_string()))?;
    if swap.state != SwapState::Created {
        return Err(Error::User("commit called on swap not in CREATED state".to_string()));
    }
    index.save_and_emit(payment_hash_hex, SwapState::Committed).await
}

/// Watch the deposit address for an on-chain payment with enough
/// confirmations, then claim the LP's escrow (§4.4).
pub async fn watch_and_claim(
    index: &SwapIndex,
    contract: &dyn SwapContract,
    rpc: &dyn BitcoinRpc,
    payment_hash_hex: &str,
    cancel: &CancellationToken,
    poll_interval: std::time::Duration,
) -> Result<String> {
    let swap = index
        .get(payment_hash_hex)
        .await
        .ok_or_else(|| Error::SwapNotFound(payment_hash_hex.to_string()))?;
    let SwapPayload::FromBtc { deposit_address, .. } = &swap.payload else {
        return Err(Error::User("swap is not a FromBTC swap".to_string()));
    };

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Aborted("deposit watch cancelled".to_string()));
        }

        let observations = rpc.watch_address(deposit_address).await?;
        if let Some(obs) = observations
            .iter()
            .find(|o| o.vout_value_sats >= swap.data.amount && o.confirmations >= swap.data.confirmations)
        {
            let txid_bytes: [u8; 32] = hex::decode(&obs.txid)
                .ok()
                .and_then(|v| v.try_into().ok())
                .ok_or_else(|| Error::Parse(format!("malformed txid from BitcoinRpc: {}", obs.txid)))?;
            let claim_tx_id = contract.claim(&swap.payment_hash, &txid_bytes).await?;
            index
                .save_and_emit_with_tx_id(payment_hash_hex, SwapState::Claimed, TxIdKind::Claim, claim_tx_id.clone())
                .await?;
            return Ok(claim_tx_id);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Aborted("deposit watch cancelled".to_string())),
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}

/// Refund path when the escrow expires before a valid deposit is seen.
pub async fn refund(index: &SwapIndex, contract: &dyn SwapContract, payment_hash_hex: &str) -> Result<String> {
    let swap = index
        .get(payment_hash_hex)
        .await
        .ok_or_else(|| Error::SwapNotFound(payment_hash_hex.to_string()))?;
    if swap.state != SwapState::Refundable {
        return Err(Error::User("refund called on swap not in REFUNDABLE state".to_string()));
    }
    let refund_tx_id = contract.refund(&swap.payment_hash).await?;
    index
        .save_and_emit_with_tx_id(payment_hash_hex, SwapState::Refunded, TxIdKind::Refund, refund_tx_id.clone())
        .await?;
    Ok(refund_tx_id)
}

/// React to an `Initialize`/`Claim`/`Refund` chain event for a FromBTC
/// swap (§5 event reactor).
pub async fn on_chain_event(index: &SwapIndex, event: &ChainEvent) -> Result<()> {
    match event {
        ChainEvent::Initialize { payment_hash, commit_tx_id } => {
            let key = hex::encode(payment_hash);
            index
                .save_and_emit_with_tx_id(&key, SwapState::Committed, TxIdKind::Commit, commit_tx_id.clone())
                .await
        }
        ChainEvent::Claim { payment_hash, claim_tx_id, .. } => {
            let key = hex::encode(payment_hash);
            index
                .save_and_emit_with_tx_id(&key, SwapState::Claimed, TxIdKind::Claim, claim_tx_id.clone())
                .await
        }
        ChainEvent::Refund { payment_hash, refund_tx_id } => {
            let key = hex::encode(payment_hash);
            index
                .save_and_emit_with_tx_id(&key, SwapState::Refunded, TxIdKind::Refund, refund_tx_id.clone())
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_hash_uses_zero_nonce() {
        let script = vec![9, 9, 9];
        let a = from_btc_hash(1000, &script);
        let b = crate::hash::to_btc_hash(&[0u8; 8], 1000, &script);
        assert_eq!(a, b);
    }
}
