//! ToBTCLN: pay out to a BOLT11 invoice; hash is the invoice's payment_hash.

use std::str::FromStr;

use lightning_invoice::Bolt11Invoice;
use tokio_util::sync::CancellationToken;

use crate::config::SdkConfig;
use crate::contract::SwapContract;
use crate::error::{Error, Result};
use crate::intermediary::client::unwrap_envelope;
use crate::intermediary::types::{
    ToBtcLnExactInConfirmRequest, ToBtcLnRequest, CODE_EXPIRED, CODE_NOT_FOUND, CODE_PAID, CODE_PENDING,
    CODE_REFUND_DATA,
};
use crate::intermediary::IntermediaryClient;
use crate::retry::{retry_on_network_error, try_with_retries};
use crate::swap::index::{SwapIndex, TxIdKind};
use crate::types::{Direction, PricingInfo, Swap, SwapPayload, SwapState, TokenId};
use crate::validator::{validate_response, RequestContext};

pub struct ToBtcLnParams {
    pub bolt11: String,
    pub max_routing_fee_sats: u64,
    pub token: TokenId,
    pub offerer: String,
    pub fee_rate: u64,
    pub lnurl: Option<String>,
}

fn decode_invoice(bolt11: &str) -> Result<(Bolt11Invoice, [u8; 32], i64)> {
    let invoice = Bolt11Invoice::from_str(bolt11).map_err(|e| Error::Parse(format!("invalid bolt11 invoice: {e}")))?;
    let payment_hash: [u8; 32] = *invoice.payment_hash().as_ref();
    let expiry = invoice
        .timestamp()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
        + invoice.expiry_time().as_secs() as i64;
    Ok((invoice, payment_hash, expiry))
}

/// Exact-out quoting (the common case): `create()` single-shot request (§4.4).
pub async fn quote_one(
    config: &SdkConfig,
    client: &IntermediaryClient,
    chain: &str,
    lp_address: &str,
    params: &ToBtcLnParams,
    now: i64,
) -> Result<Swap> {
    let (_invoice, payment_hash, expiry) = decode_invoice(&params.bolt11)?;

    // Invoice expiry exactly equal to `now` is QUOTE_EXPIRED territory (§8 boundary behavior).
    if expiry <= now {
        return Err(Error::User("bolt11 invoice already expired".to_string()));
    }

    let request = ToBtcLnRequest {
        pr: params.bolt11.clone(),
        max_fee: params.max_routing_fee_sats,
        expiry_timestamp: expiry,
        token: params.token.0.clone(),
        offerer: params.offerer.clone(),
        exact_in: false,
        fee_rate: params.fee_rate,
        amount: None,
    };

    let envelope = try_with_retries(
        config,
        &CancellationToken::new(),
        || client.init_to_btcln(chain, &request),
        retry_on_network_error,
    )
    .await?;
    let resp = unwrap_envelope(envelope)?;

    let ctx = RequestContext {
        direction: Direction::ToBtcLn,
        requested_token: &params.token,
        exact_in: false,
        requested_amount: resp.amount,
        lp_address,
        max_confirmations: config.max_confirmations,
        escrow_nonce: None,
        confirmation_target: None,
        max_routing_fee_sats: Some(params.max_routing_fee_sats),
        expiry_timestamp: Some(expiry),
        sequence: None,
        from_btc_bounty_inputs: None,
        preimage: None,
        description_hash: None,
        output_script: None,
        bolt11_payment_hash: Some(payment_hash),
    };
    validate_response(config, now, &ctx, &resp)?;

    Ok(Swap {
        version: Swap::CURRENT_VERSION,
        payment_hash: resp.data.hash,
        direction: Direction::ToBtcLn,
        state: SwapState::Created,
        pricing_info: None,
        swap_fee: resp.swap_fee,
        network_fee: resp.network_fee,
        swap_fee_btc: 0,
        signature_data: Some(resp.signature_data),
        fee_rate: resp.fee_rate,
        payload: SwapPayload::ToBtcLn {
            bolt11: params.bolt11.clone(),
            max_routing_fee_sats: params.max_routing_fee_sats,
            lnurl: params.lnurl.clone(),
            success_action: None,
        },
        commit_tx_id: None,
        claim_tx_id: None,
        refund_tx_id: None,
        expiry: resp.data.expiry,
        data: resp.data,
    })
}

/// Exact-in prepare step: ask the LP how much BTC input buys the invoice's
/// amount, getting back a `reqId` to confirm against (§6).
pub async fn prepare_exact_in(
    config: &SdkConfig,
    client: &IntermediaryClient,
    chain: &str,
    params: &ToBtcLnParams,
    amount_sats: u64,
) -> Result<crate::intermediary::types::InitResponseData> {
    let (_invoice, _payment_hash, expiry) = decode_invoice(&params.bolt11)?;
    let request = ToBtcLnRequest {
        pr: params.bolt11.clone(),
        max_fee: params.max_routing_fee_sats,
        expiry_timestamp: expiry,
        token: params.token.0.clone(),
        offerer: params.offerer.clone(),
        exact_in: true,
        fee_rate: params.fee_rate,
        amount: Some(amount_sats),
    };

    let envelope = try_with_retries(
        config,
        &CancellationToken::new(),
        || client.prepare_to_btcln_exact_in(chain, &request),
        retry_on_network_error,
    )
    .await?;
    unwrap_envelope(envelope)
}

/// Exact-in confirm step: submit the `reqId` from `prepare_exact_in` to
/// lock in the final invoice (§6).
pub async fn confirm_exact_in(
    config: &SdkConfig,
    client: &IntermediaryClient,
    chain: &str,
    bolt11: &str,
    req_id: &str,
    fee_rate: u64,
) -> Result<crate::intermediary::types::InitResponseData> {
    let request = ToBtcLnExactInConfirmRequest {
        pr: bolt11.to_string(),
        req_id: req_id.to_string(),
        fee_rate,
    };
    let envelope = try_with_retries(
        config,
        &CancellationToken::new(),
        || client.init_to_btcln_exact_in(chain, &request),
        retry_on_network_error,
    )
    .await?;
    unwrap_envelope(envelope)
}

pub fn attach_pricing(swap: &mut Swap, oracle_check: crate::price::PriceCheck) {
    swap.pricing_info = Some(PricingInfo {
        is_valid: oracle_check.is_valid,
        difference_ppm: oracle_check.difference_ppm,
        sats_base_fee: oracle_check.sats_base_fee,
        fee_ppm: oracle_check.fee_ppm,
    });
}

/// Commit phase (§4.4): re-check the authorization is still valid, then
/// call `SwapContract::init_pay_in` (ToBTCLN is always pay-in).
pub async fn commit(index: &SwapIndex, contract: &dyn SwapContract, payment_hash_hex: &str) -> Result<String> {
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
/// terminal response code is seen (routing either to REFUNDABLE once the
/// LP signs a refund, or to CLAIMED once the LP reports payment).
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

/// Refund path: call `SwapContract::refund` once state is REFUNDABLE.
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
