//! Async storage abstraction for the swap registry.
//!
//! The core never owns a storage backend — it depends on a key/value
//! CRUD interface (§1 Non-goals) keyed by payment-hash hex, the same way
//! the wallet layer this crate was adapted from depends on `WalletStorage`.

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::types::Swap;

/// Boxed future returned by storage trait methods. Native targets only
/// are in scope for this crate (no WASM surface — see `TEACHER.txt`
/// drop notes in DESIGN.md), so futures are always `Send`.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Typed storage for swap documents, keyed by payment-hash hex.
///
/// Implementations persist whatever `Swap` carries; unknown fields on
/// load are tolerated by `serde`'s default behavior so the schema can
/// grow without a migration for additive changes (§6).
pub trait SwapStorage: Send + Sync {
    /// Fetch a swap by payment-hash hex. `Ok(None)` if absent.
    fn get(&self, payment_hash_hex: &str) -> StorageFuture<'_, Option<Swap>>;

    /// Persist a swap, overwriting any existing entry with the same key.
    fn store(&self, payment_hash_hex: &str, swap: &Swap) -> StorageFuture<'_, ()>;

    /// Remove a swap. No-op if absent.
    fn delete(&self, payment_hash_hex: &str) -> StorageFuture<'_, ()>;

    /// List every stored payment-hash key.
    fn list(&self) -> StorageFuture<'_, Vec<String>>;

    /// Batch-load every stored swap, used on `init()` (§5 ordering note).
    fn get_all(&self) -> StorageFuture<'_, Vec<Swap>>;
}

/// In-memory swap storage, for tests and for hosts that don't need
/// durability across process restarts.
#[cfg(test)]
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::RwLock;

    #[derive(Default)]
    pub struct MemorySwapStorage {
        swaps: RwLock<HashMap<String, Swap>>,
    }

    impl MemorySwapStorage {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl SwapStorage for MemorySwapStorage {
        fn get(&self, payment_hash_hex: &str) -> StorageFuture<'_, Option<Swap>> {
            let key = payment_hash_hex.to_string();
            Box::pin(async move {
                let swaps = self.swaps.read().unwrap();
                Ok(swaps.get(&key).cloned())
            })
        }

        fn store(&self, payment_hash_hex: &str, swap: &Swap) -> StorageFuture<'_, ()> {
            let key = payment_hash_hex.to_string();
            let swap = swap.clone();
            Box::pin(async move {
                let mut swaps = self.swaps.write().unwrap();
                swaps.insert(key, swap);
                Ok(())
            })
        }

        fn delete(&self, payment_hash_hex: &str) -> StorageFuture<'_, ()> {
            let key = payment_hash_hex.to_string();
            Box::pin(async move {
                let mut swaps = self.swaps.write().unwrap();
                swaps.remove(&key);
                Ok(())
            })
        }

        fn list(&self) -> StorageFuture<'_, Vec<String>> {
            Box::pin(async move {
                let swaps = self.swaps.read().unwrap();
                Ok(swaps.keys().cloned().collect())
            })
        }

        fn get_all(&self) -> StorageFuture<'_, Vec<Swap>> {
            Box::pin(async move {
                let swaps = self.swaps.read().unwrap();
                Ok(swaps.values().cloned().collect())
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemorySwapStorage;
    use super::*;
    use crate::types::{Direction, EscrowType, SwapData, SwapPayload, SwapState};

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
    async fn store_get_delete_roundtrip() {
        let storage = MemorySwapStorage::new();
        let swap = dummy_swap([1u8; 32]);
        let key = hex::encode(swap.payment_hash);

        assert!(storage.get(&key).await.unwrap().is_none());
        storage.store(&key, &swap).await.unwrap();
        let loaded = storage.get(&key).await.unwrap().unwrap();
        assert_eq!(loaded.payment_hash, swap.payment_hash);

        storage.delete(&key).await.unwrap();
        assert!(storage.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_all_and_list_see_stored_swaps() {
        let storage = MemorySwapStorage::new();
        let a = dummy_swap([1u8; 32]);
        let b = dummy_swap([2u8; 32]);
        storage.store(&hex::encode(a.payment_hash), &a).await.unwrap();
        storage.store(&hex::encode(b.payment_hash), &b).await.unwrap();

        assert_eq!(storage.list().await.unwrap().len(), 2);
        assert_eq!(storage.get_all().await.unwrap().len(), 2);
    }
}
