//! ToBTC: pay out to a Bitcoin address; hash binds (nonce, amount, output script).

use std::str::FromStr;
use std::sync::Arc;

use bitcoin::Address;
use tokio_util::sync::CancellationToken;

use crate::config::SdkConfig;
use crate::contract::SwapContract;
use crate::error::{Error, Result};
use crate::hash::{generate_escrow_nonce, to_btc_hash};
use crate::intermediary::client::unwrap_envelope;
use crate::intermediary::types::{ToBtcRequest, CODE_EXPIRED, CODE_NOT_FOUND, CODE_PAID, CODE_PENDING, CODE_REFUND_DATA};
use crate::intermediary::IntermediaryClient;
use crate::retry::{retry_on_network_error, try_with_retries};
use crate::swap::index::{SwapIndex, TxIdKind};
use crate::types::{Direction, EscrowType, Network, PricingInfo, SignatureData, Swap, SwapData, SwapPayload, SwapState, TokenId};
use crate::validator::{validate_response, RequestContext};

/// User-supplied parameters for a ToBTC quote request.
pub struct ToBtcParams {
    pub address: String,
    pub network: Network,
    pub amount: u64,
    pub exact_in: bool,
    pub confirmation_target: u32,
    pub confirmations: u32,
    pub token: TokenId,
    pub offerer: String,
    pub fee_rate: u64,
}

/// Run the per-LP quote: build the request, call the LP, validate its
/// response, and assemble a `Swap` in state CREATED (§4.4 Quoting).
pub async fn quote_one(
    config: &SdkConfig,
    client: &IntermediaryClient,
    chain: &str,
    lp_address: &str,
    params: &ToBtcParams,
    now: i64,
) -> Result<Swap> {
    let address = Address::from_str(&params.address)
        .map_err(|e| Error::User(format!("invalid bitcoin address: {e}")))?
        .require_network(params.network.to_bitcoin_network())
        .map_err(|e| Error::User(format!("address does not match network: {e}")))?;
    let script_pubkey = address.script_pubkey();

    let nonce = generate_escrow_nonce(now as u64);
    let expected_hash = to_btc_hash(&nonce, params.amount, script_pubkey.as_bytes());

    let request = ToBtcRequest {
        address: params.address.clone(),
        amount: params.amount,
        exact_in: params.exact_in,
        confirmation_target: params.confirmation_target,
        confirmations: params.confirmations,
        nonce: hex::encode(nonce),
        token: params.token.0.clone(),
        offerer: params.offerer.clone(),
        fee_rate: params.fee_rate,
    };

    let envelope = try_with_retries(
        config,
        &CancellationToken::new(),
        || client.init_to_btc(chain, &request),
        retry_on_network_error,
    )
    .await?;
    let resp = unwrap_envelope(envelope)?;

    let ctx = RequestContext {
        direction: Direction::ToBtc,
        requested_token: &params.token,
        exact_in: params.exact_in,
        requested_amount: params.amount,
        lp_address,
        max_confirmations: config.max_confirmations,
        escrow_nonce: Some(nonce),
        confirmation_target: Some(params.confirmation_target),
        max_routing_fee_sats: None,
        expiry_timestamp: None,
        sequence: None,
        from_btc_bounty_inputs: None,
        preimage: None,
        description_hash: None,
        output_script: Some(script_pubkey.as_bytes().to_vec()),
        bolt11_payment_hash: None,
    };
    validate_response(config, now, &ctx, &resp)?;

    if resp.data.hash != expected_hash {
        return Err(Error::Intermediary("Invalid data returned - paymentHash".to_string()));
    }

    Ok(Swap {
        version: Swap::CURRENT_VERSION,
        payment_hash: resp.data.hash,
        direction: Direction::ToBtc,
        state: SwapState::Created,
        pricing_info: None,
        swap_fee: resp.swap_fee,
        network_fee: resp.network_fee,
        swap_fee_btc: 0,
        signature_data: Some(resp.signature_data),
        fee_rate: resp.fee_rate,
        payload: SwapPayload::ToBtc {
            address: params.address.clone(),
            script_pubkey: script_pubkey.as_bytes().to_vec(),
        },
        commit_tx_id: None,
        claim_tx_id: None,
        refund_tx_id: None,
        expiry: resp.data.expiry,
        data: resp.data,
    })
}

/// Attach a market-implied pricing snapshot to a freshly quoted swap (§4.1).
pub fn attach_pricing(swap: &mut Swap, oracle_check: crate::price::PriceCheck) {
    swap.pricing_info = Some(PricingInfo {
        is_valid: oracle_check.is_valid,
        difference_ppm: oracle_check.difference_ppm,
        sats_base_fee: oracle_check.sats_base_fee,
        fee_ppm: oracle_check.fee_ppm,
    });
}

/// Commit phase (§4.4): re-check the authorization is still valid, then
/// call `SwapContract::init_pay_in` (ToBTC is always pay-in).
pub async fn commit(
    index: &SwapIndex,
    contract: &dyn SwapContract,
    payment_hash_hex: &str,
) -> Result<String> {
    let swap = index
        .get(payment_hash_hex)
        .await
        .ok_or_else(|| Error::SwapNotFound(payment_hash_hex.to_string()))?;

    if swap.state != SwapState::Created {
        return Err(Error::User("commit called on swap not in CREATED state".to_string()));
    }

    let signature = swap
        .signature_data
        .as_ref()
        .ok_or_else(|| Error::User("swap has no signature authorization".to_string()))?;

    let still_valid = contract
        .is_valid_claim_init_authorization(&swap.data, signature, swap.fee_rate)
        .await?;
    if !still_valid {
        index.save_and_emit(payment_hash_hex, SwapState::QuoteExpired).await?;
        return Err(Error::Intermediary("authorization expired before commit".to_string()));
    }

    let commit_tx_id = contract.init_pay_in(&swap.data, signature, swap.fee_rate).await?;
    index
        .save_and_emit_with_tx_id(payment_hash_hex, SwapState::Committed, TxIdKind::Commit, commit_tx_id.clone())
        .await?;
    Ok(commit_tx_id)
}

/// Post-commit polling (§4.4): poll `getRefundAuthorization` until a
/// terminal response code is seen.
pub async fn poll_post_commit(
    index: &SwapIndex,
    client: &IntermediaryClient,
    payment_hash_hex: &str,
    cancel: &CancellationToken,
    poll_interval: std::time::Duration,
) -> Result<()> {
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Aborted("post-commit poll cancelled".to_string()));
        }

        let swap = index
            .get(payment_hash_hex)
            .await
            .ok_or_else(|| Error::SwapNotFound(payment_hash_hex.to_string()))?;
        let sequence = swap.data.sequence;

        let envelope = client.get_refund_authorization(payment_hash_hex, sequence).await?;
        let data = envelope.data()?;
        match envelope.code {
            CODE_REFUND_DATA if data.as_ref().and_then(|d| d.signature_data.as_ref()).is_some() => {
                index.save_and_emit(payment_hash_hex, SwapState::Refundable).await?;
                return Ok(());
            }
            CODE_PAID => {
                let data = data.unwrap_or_default();
                match (&data.tx_id, &data.secret) {
                    (None, None) => {
                        // "paid, proof pending" per the spec's resolved open question — keep polling.
                    }
                    (Some(tx_id), _) => {
                        index
                            .save_and_emit_with_tx_id(payment_hash_hex, SwapState::Claimed, TxIdKind::Claim, tx_id.clone())
                            .await?;
                        return Ok(());
                    }
                    (None, Some(_)) => {
                        index.save_and_emit(payment_hash_hex, SwapState::Claimed).await?;
                        return Ok(());
                    }
                }
            }
            CODE_PENDING | CODE_NOT_FOUND => {}
            CODE_EXPIRED => {
                index.save_and_emit(payment_hash_hex, SwapState::Refundable).await?;
                return Ok(());
            }
            other => {
                return Err(Error::Intermediary(format!("unexpected refund-auth code {other}")));
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Aborted("post-commit poll cancelled".to_string())),
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}

/// Refund path: call `SwapContract::refund` once state is REFUNDABLE, and
/// wait for the matching `RefundEvent` to confirm REFUNDED (§4.4).
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

pub fn commit_method(direction: Direction) -> Arc<str> {
    match crate::contract::commit_method_for(direction) {
        crate::contract::CommitMethod::InitPayIn => Arc::from("init_pay_in"),
        crate::contract::CommitMethod::Init => Arc::from("init"),
    }
}
