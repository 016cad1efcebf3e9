//! Direction-specific orchestration: create/quote/validate/persist, then
//! commit, then post-commit watchdogs (§4.4). Each of the four concrete
//! wrappers (`to_btc`, `to_btcln`, `from_btc`, `from_btcln`) shares the
//! quoting fan-out scaffolding in this module.

pub mod from_btc;
pub mod from_btcln;
pub mod to_btc;
pub mod to_btcln;

use std::future::Future;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::types::Swap;

/// One LP's quote outcome: either a `Swap` in its initial post-quote
/// state, or the error that aborted that LP's child task. A failure for
/// one LP never affects another's outcome (§4.4, §7).
pub struct QuoteOutcome {
    pub intermediary_url: String,
    pub result: Result<Swap>,
}

/// Fan out `per_lp` across every LP in `lps`, each under its own child
/// cancellation token derived from `root_cancel` — the Rust analogue of
/// the spec's per-LP child `AbortController` (§4.4, §9).
///
/// Cancelling `root_cancel` cascades to every child, so every still
/// pending per-LP task resolves with `Error::Aborted` (Testable
/// property 6, "Abort cascade").
pub async fn quote_all<F, Fut>(lps: Vec<String>, root_cancel: CancellationToken, per_lp: F) -> Vec<QuoteOutcome>
where
    F: Fn(String, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Swap>> + Send + 'static,
{
    let per_lp = std::sync::Arc::new(per_lp);
    let mut tasks = JoinSet::new();

    for lp in lps {
        let child_cancel = root_cancel.child_token();
        let per_lp = per_lp.clone();
        let lp_for_task = lp.clone();
        tasks.spawn(async move {
            let result = tokio::select! {
                biased;
                _ = child_cancel.cancelled() => Err(Error::Aborted(format!("quote from {lp_for_task} aborted"))),
                r = per_lp(lp_for_task.clone(), child_cancel.clone()) => r,
            };
            QuoteOutcome {
                intermediary_url: lp_for_task,
                result,
            }
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(join_err) => outcomes.push(QuoteOutcome {
                intermediary_url: "unknown".to_string(),
                result: Err(Error::Other(format!("quote task panicked: {join_err}"))),
            }),
        }
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn dummy_swap() -> Swap {
        use crate::types::{Direction, EscrowType, SwapData, SwapPayload, SwapState};
        Swap {
            version: Swap::CURRENT_VERSION,
            payment_hash: [0u8; 32],
            direction: Direction::ToBtc,
            state: SwapState::Created,
            data: SwapData {
                offerer: "o".into(),
                claimer: "c".into(),
                token: "X".into(),
                amount: 1,
                hash: [0u8; 32],
                expiry: 0,
                escrow_nonce: [0; 8],
                confirmations: 0,
                sequence: 0,
                escrow_type: EscrowType::ChainNonced,
                security_deposit: 0,
                claimer_bounty: 0,
                pay_in: true,
            },
            pricing_info: None,
            swap_fee: 0,
            network_fee: 0,
            swap_fee_btc: 0,
            signature_data: None,
            fee_rate: 0,
            payload: SwapPayload::ToBtc {
                address: "a".into(),
                script_pubkey: vec![],
            },
            commit_tx_id: None,
            claim_tx_id: None,
            refund_tx_id: None,
            expiry: 0,
        }
    }

    #[tokio::test]
    async fn independent_lp_failure_does_not_affect_others() {
        let lps = vec!["lp-a".to_string(), "lp-b".to_string()];
        let root = CancellationToken::new();

        let outcomes = quote_all(lps, root, |lp, _cancel| async move {
            if lp == "lp-a" {
                Err(Error::Intermediary("lp-a misbehaved".to_string()))
            } else {
                Ok(dummy_swap())
            }
        })
        .await;

        assert_eq!(outcomes.len(), 2);
        let a = outcomes.iter().find(|o| o.intermediary_url == "lp-a").unwrap();
        let b = outcomes.iter().find(|o| o.intermediary_url == "lp-b").unwrap();
        assert!(a.result.is_err());
        assert!(b.result.is_ok());
    }

    #[tokio::test]
    async fn aborting_root_rejects_pending_quotes() {
        let lps = vec!["lp-a".to_string()];
        let root = CancellationToken::new();
        let started = Arc::new(AtomicU32::new(0));
        let started_clone = started.clone();
        root.cancel();

        let outcomes = quote_all(lps, root, move |_lp, _cancel| {
            started_clone.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                Ok(dummy_swap())
            }
        })
        .await;

        assert!(matches!(outcomes[0].result, Err(Error::Aborted(_))));
    }
}
