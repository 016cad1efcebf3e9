//! FromBTCLN: receive via a BOLT11 invoice the LP pays into; the client
//! picks the preimage up front and the hash is `SHA256(preimage)` (§4.3).

use tokio_util::sync::CancellationToken;

use crate::config::SdkConfig;
use crate::contract::SwapContract;
use crate::error::{Error, Result};
use crate::hash::from_btcln_hash;
use crate::intermediary::client::unwrap_envelope;
use crate::intermediary::types::{
    FromBtcLnRequest, CODE_ALREADY_COMMITTED, CODE_AUTH_DATA, CODE_PAYMENT_EXPIRED, CODE_PAYMENT_PAID,
    CODE_PAYMENT_PENDING,
};
use crate::intermediary::IntermediaryClient;
use crate::retry::{retry_on_network_error, try_with_retries};
use crate::swap::index::{SwapIndex, TxIdKind};
use crate::types::{Direction, PricingInfo, Swap, SwapPayload, SwapState, TokenId};
use crate::validator::{validate_response, RequestContext};

pub struct FromBtcLnParams {
    pub preimage: [u8; 32],
    pub amount: u64,
    pub token: TokenId,
    pub description_hash: Option<[u8; 32]>,
    pub exact_out: bool,
    pub fee_rate: u64,
    pub claimer_address: String,
}

/// Run the per-LP quote: ask the LP to mint an invoice over our own
/// preimage-derived hash (§4.4).
pub async fn quote_one(
    config: &SdkConfig,
    client: &IntermediaryClient,
    chain: &str,
    lp_address: &str,
    params: &FromBtcLnParams,
    now: i64,
) -> Result<Swap> {
    let expected_hash = from_btcln_hash(&params.preimage);

    let request = FromBtcLnRequest {
        payment_hash: hex::encode(expected_hash),
        amount: params.amount,
        address: params.claimer_address.clone(),
        token: params.token.0.clone(),
        description_hash: params.description_hash.map(hex::encode),
        exact_out: params.exact_out,
        fee_rate: params.fee_rate,
    };

    let envelope = try_with_retries(
        config,
        &CancellationToken::new(),
        || client.init_from_btcln(chain, &request),
        retry_on_network_error,
    )
    .await?;
    let resp = unwrap_envelope(envelope)?;

    let ctx = RequestContext {
        direction: Direction::FromBtcLn,
        requested_token: &params.token,
        exact_in: params.exact_out,
        requested_amount: params.amount,
        lp_address,
        max_confirmations: config.max_confirmations,
        escrow_nonce: None,
        confirmation_target: None,
        max_routing_fee_sats: None,
        expiry_timestamp: None,
        sequence: None,
        from_btc_bounty_inputs: None,
        preimage: Some(params.preimage),
        description_hash: params.description_hash,
        output_script: None,
        bolt11_payment_hash: None,
    };
    validate_response(config, now, &ctx, &resp)?;

    if resp.data.hash != expected_hash {
        return Err(Error::Intermediary("Invalid data returned - paymentHash".to_string()));
    }

    let bolt11 = resp
        .pr
        .clone()
        .ok_or_else(|| Error::Intermediary("createInvoice response missing pr".to_string()))?;
    let invoice_hash = crate::hash::bolt11_payment_hash(&bolt11)?;
    if invoice_hash != expected_hash {
        return Err(Error::Intermediary(
            "invoice payment_hash does not match requested preimage hash".to_string(),
        ));
    }

    Ok(Swap {
        version: Swap::CURRENT_VERSION,
        payment_hash: resp.data.hash,
        direction: Direction::FromBtcLn,
        state: SwapState::PrCreated,
        pricing_info: None,
        swap_fee: resp.swap_fee,
        network_fee: resp.network_fee,
        swap_fee_btc: 0,
        signature_data: Some(resp.signature_data),
        fee_rate: resp.fee_rate,
        payload: SwapPayload::FromBtcLn {
            bolt11,
            preimage: params.preimage,
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

/// Poll `getInvoicePaymentAuth` until the LP reports the invoice paid and
/// hands back a claim-init authorization (§4.4), then commit the claim
/// escrow and reveal the preimage.
pub async fn poll_and_claim(
    index: &SwapIndex,
    client: &IntermediaryClient,
    contract: &dyn SwapContract,
    payment_hash_hex: &str,
    cancel: &CancellationToken,
    poll_interval: std::time::Duration,
) -> Result<String> {
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Aborted("invoice payment poll cancelled".to_string()));
        }

        let envelope = client.get_invoice_payment_auth(payment_hash_hex).await?;
        match envelope.code {
            CODE_AUTH_DATA => {
                let data = envelope
                    .data()?
                    .ok_or_else(|| Error::Intermediary("AUTH_DATA response carried no data".to_string()))?;
                let signature = data
                    .signature_data
                    .ok_or_else(|| Error::Intermediary("AUTH_DATA response missing signature_data".to_string()))?;

                let swap = index
                    .get(payment_hash_hex)
                    .await
                    .ok_or_else(|| Error::SwapNotFound(payment_hash_hex.to_string()))?;

                let still_valid = contract
                    .is_valid_init_authorization(&swap.data, &signature, swap.fee_rate)
                    .await?;
                if !still_valid {
                    return Err(Error::SignatureVerification(
                        "LP init authorization failed to verify".to_string(),
                    ));
                }

                index.save_and_emit(payment_hash_hex, SwapState::PrPaid).await?;

                let SwapPayload::FromBtcLn { preimage, .. } = &swap.payload else {
                    return Err(Error::User("swap is not a FromBTCLN swap".to_string()));
                };
                let preimage = *preimage;

                let commit_tx_id = contract.init(&swap.data, &signature, swap.fee_rate).await?;
                index
                    .save_and_emit_with_tx_id(payment_hash_hex, SwapState::ClaimCommitted, TxIdKind::Commit, commit_tx_id)
                    .await?;

                let claim_tx_id = contract.claim(&swap.payment_hash, &preimage).await?;
                index
                    .save_and_emit_with_tx_id(payment_hash_hex, SwapState::ClaimClaimed, TxIdKind::Claim, claim_tx_id.clone())
                    .await?;
                return Ok(claim_tx_id);
            }
            CODE_PAYMENT_PENDING => {}
            CODE_PAYMENT_EXPIRED => {
                index.save_and_emit(payment_hash_hex, SwapState::QuoteExpired).await?;
                return Err(Error::Intermediary("invoice payment authorization expired".to_string()));
            }
            CODE_ALREADY_COMMITTED => {
                return Err(Error::Intermediary("swap already committed by another claim attempt".to_string()));
            }
            CODE_PAYMENT_PAID => {
                return Err(Error::Intermediary(
                    "invoice already paid out by a prior claim attempt".to_string(),
                ));
            }
            other => {
                return Err(Error::Intermediary(format!("unexpected payment-auth code {other}")));
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Aborted("invoice payment poll cancelled".to_string())),
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_derives_from_preimage() {
        let preimage = [7u8; 32];
        let hash = from_btcln_hash(&preimage);
        assert_ne!(hash, preimage);
        assert_eq!(hash, from_btcln_hash(&preimage));
    }
}
