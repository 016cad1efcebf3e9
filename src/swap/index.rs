//! In-memory swap registry, write-through to a `SwapStorage` backend
//! (§3 "Storage index", §5 ordering guarantees).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use crate::contract::ChainEvent;
use crate::error::Result;
use crate::storage::SwapStorage;
use crate::swap::fsm;
use crate::types::{Swap, SwapState};

/// Emitted whenever a swap transitions state, after the new state has
/// been persisted (§5: "persists changed swaps before emitting swapState").
#[derive(Debug, Clone)]
pub struct SwapStateChanged {
    pub payment_hash_hex: String,
    pub from: SwapState,
    pub to: SwapState,
}

/// Which transaction-id field a transition should record alongside its
/// new state, so a host application can retrieve the tx id of the
/// commit/claim/refund it just drove (§3 Data Model).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxIdKind {
    Commit,
    Claim,
    Refund,
}

struct Inner {
    swaps: HashMap<String, Swap>,
    /// Events received before `load_all` has finished draining persisted
    /// swaps are buffered here and replayed after, per §5's init ordering
    /// requirement.
    buffered_events: VecDeque<ChainEvent>,
    loaded: bool,
}

/// Write-through index: `paymentHash -> Swap`, backed by a `SwapStorage`.
pub struct SwapIndex {
    storage: Arc<dyn SwapStorage>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<SwapStateChanged>,
}

impl SwapIndex {
    pub fn new(storage: Arc<dyn SwapStorage>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            storage,
            inner: Mutex::new(Inner {
                swaps: HashMap::new(),
                buffered_events: VecDeque::new(),
                loaded: false,
            }),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwapStateChanged> {
        self.events.subscribe()
    }

    /// Batch-load every persisted swap on `init()`. Any events queued by
    /// `buffer_event` while this was running are drained afterward, in
    /// arrival order (§5).
    pub async fn load_all(&self) -> Result<Vec<ChainEvent>> {
        let swaps = self.storage.get_all().await?;
        let mut guard = self.inner.lock().await;
        for mut swap in swaps {
            swap.migrate();
            guard.swaps.insert(hex::encode(swap.payment_hash), swap);
        }
        guard.loaded = true;
        Ok(guard.buffered_events.drain(..).collect())
    }

    /// Record an event observed while the table is (or might still be)
    /// loading. Once `load_all` has completed, events pass straight
    /// through instead of being buffered.
    pub async fn buffer_event(&self, event: ChainEvent) -> Option<ChainEvent> {
        let mut guard = self.inner.lock().await;
        if guard.loaded {
            Some(event)
        } else {
            guard.buffered_events.push_back(event);
            None
        }
    }

    pub async fn get(&self, payment_hash_hex: &str) -> Option<Swap> {
        self.inner.lock().await.swaps.get(payment_hash_hex).cloned()
    }

    /// Insert a brand-new swap (post-quote, state CREATED).
    pub async fn insert(&self, swap: Swap) -> Result<()> {
        let key = hex::encode(swap.payment_hash);
        self.storage.store(&key, &swap).await?;
        self.inner.lock().await.swaps.insert(key, swap);
        Ok(())
    }

    /// Transition a swap's state, persist it, then broadcast the change —
    /// the `_saveAndEmit` pattern from §3/§5: mutations happen only
    /// through this path, and a write always precedes its notification.
    pub async fn save_and_emit(&self, payment_hash_hex: &str, new_state: SwapState) -> Result<()> {
        self.save_and_emit_inner(payment_hash_hex, new_state, None).await
    }

    /// Same as `save_and_emit`, additionally recording the transaction id
    /// produced by this transition (commit/claim/refund) on the persisted
    /// `Swap` (§3 Data Model: `commitTxId`/`claimTxId`/`refundTxId`).
    pub async fn save_and_emit_with_tx_id(
        &self,
        payment_hash_hex: &str,
        new_state: SwapState,
        tx_id_kind: TxIdKind,
        tx_id: impl Into<String>,
    ) -> Result<()> {
        self.save_and_emit_inner(payment_hash_hex, new_state, Some((tx_id_kind, tx_id.into())))
            .await
    }

    async fn save_and_emit_inner(
        &self,
        payment_hash_hex: &str,
        new_state: SwapState,
        tx_id: Option<(TxIdKind, String)>,
    ) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let swap = guard
            .swaps
            .get_mut(payment_hash_hex)
            .ok_or_else(|| crate::error::Error::SwapNotFound(payment_hash_hex.to_string()))?;

        let from = swap.state;
        if !fsm::is_valid_transition(swap.direction, from, new_state) {
            return Err(crate::error::Error::User(format!(
                "illegal transition {from:?} -> {new_state:?} for {:?}",
                swap.direction
            )));
        }
        swap.state = new_state;
        if let Some((kind, id)) = tx_id {
            match kind {
                TxIdKind::Commit => swap.commit_tx_id = Some(id),
                TxIdKind::Claim => swap.claim_tx_id = Some(id),
                TxIdKind::Refund => swap.refund_tx_id = Some(id),
            }
        }
        let persisted = swap.clone();
        drop(guard);

        self.storage.store(payment_hash_hex, &persisted).await?;

        let _ = self.events.send(SwapStateChanged {
            payment_hash_hex: payment_hash_hex.to_string(),
            from,
            to: new_state,
        });
        Ok(())
    }

    /// Remove a swap once it is terminal and its quote has expired, or
    /// on explicit user removal (§3 Lifecycle).
    pub async fn remove_if_terminal_and_expired(&self, payment_hash_hex: &str, now: i64) -> Result<bool> {
        let mut guard = self.inner.lock().await;
        let Some(swap) = guard.swaps.get(payment_hash_hex) else {
            return Ok(false);
        };
        if swap.state.is_terminal() && swap.expiry <= now {
            guard.swaps.remove(payment_hash_hex);
            drop(guard);
            self.storage.delete(payment_hash_hex).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub async fn remove(&self, payment_hash_hex: &str) -> Result<()> {
        self.inner.lock().await.swaps.remove(payment_hash_hex);
        self.storage.delete(payment_hash_hex).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemorySwapStorage;
    use crate::types::{Direction, EscrowType, SwapData, SwapPayload};

    fn dummy_swap(payment_hash: [u8; 32]) -> Swap {
        Swap {
            version: Swap::CURRENT_VERSION,
            payment_hash,
            direction: Direction::ToBtc,
            state: SwapState::Created,
            data: SwapData {
                offerer: "offerer".into(),
                claimer: "claimer".into(),
                token: "X".into(),
                amount: 1000,
                hash: payment_hash,
                expiry: 0,
                escrow_nonce: [0; 8],
                confirmations: 1,
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
                address: "addr".into(),
                script_pubkey: vec![],
            },
            commit_tx_id: None,
            claim_tx_id: None,
            refund_tx_id: None,
            expiry: 0,
        }
    }

    #[tokio::test]
    async fn save_and_emit_persists_before_broadcasting() {
        let storage = Arc::new(MemorySwapStorage::new());
        let index = SwapIndex::new(storage.clone());
        let swap = dummy_swap([3u8; 32]);
        let key = hex::encode(swap.payment_hash);
        index.insert(swap).await.unwrap();

        let mut rx = index.subscribe();
        index.save_and_emit(&key, SwapState::Committed).await.unwrap();

        let persisted = storage.get(&key).await.unwrap().unwrap();
        assert_eq!(persisted.state, SwapState::Committed);

        let change = rx.recv().await.unwrap();
        assert_eq!(change.from, SwapState::Created);
        assert_eq!(change.to, SwapState::Committed);
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected() {
        let storage = Arc::new(MemorySwapStorage::new());
        let index = SwapIndex::new(storage);
        let swap = dummy_swap([4u8; 32]);
        let key = hex::encode(swap.payment_hash);
        index.insert(swap).await.unwrap();

        // ToBTC has no direct CREATED -> CLAIMED edge.
        let result = index.save_and_emit(&key, SwapState::Claimed).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn events_buffered_until_load_completes() {
        let storage = Arc::new(MemorySwapStorage::new());
        let index = SwapIndex::new(storage);

        let event = ChainEvent::Initialize {
            payment_hash: [9u8; 32],
            commit_tx_id: "tx".into(),
        };
        assert!(index.buffer_event(event).await.is_none());

        let drained = index.load_all().await.unwrap();
        assert_eq!(drained.len(), 1);

        let event2 = ChainEvent::Refund {
            payment_hash: [9u8; 32],
            refund_tx_id: "tx2".into(),
        };
        assert!(index.buffer_event(event2).await.is_some());
    }
}
