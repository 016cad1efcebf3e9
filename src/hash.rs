//! Hash and nonce construction for the three non-lightning escrow schemes.
//!
//! ToBTC and FromBTC bind their payment hash to an output script, amount
//! and escrow nonce so the hash cannot be replayed against a different
//! payout target. FromBTCLN's hash is a plain `SHA256(preimage)`.

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Unix-time offset subtracted before the nonce's 5-byte timestamp prefix
/// (§9 DESIGN NOTES — specified exactly, not guessed).
const NONCE_EPOCH_OFFSET: u64 = 700_000_000;

/// Build an escrow nonce: `be5(floor(now_s) - 700_000_000) || crypto_rand(3)`.
pub fn generate_escrow_nonce(now_s: u64) -> [u8; 8] {
    generate_escrow_nonce_with_rng(now_s, &mut rand::rngs::OsRng)
}

fn generate_escrow_nonce_with_rng(now_s: u64, rng: &mut impl RngCore) -> [u8; 8] {
    let offset = now_s.checked_sub(NONCE_EPOCH_OFFSET).unwrap_or(0);
    let mut nonce = [0u8; 8];
    // be5: big-endian, low 5 bytes of the offset.
    let be = offset.to_be_bytes();
    nonce[..5].copy_from_slice(&be[3..8]);
    rng.fill_bytes(&mut nonce[5..8]);
    nonce
}

/// `SHA256(le8(nonce) || le8(amount) || outputScript)` — ToBTC's hash.
///
/// Invariant 1 (§3), Testable property 1 (§8): for every ToBTC swap,
/// `data.hash == SHA256(le8(nonce) || le8(amount) || outputScript)`.
pub fn to_btc_hash(nonce: &[u8; 8], amount: u64, output_script: &[u8]) -> [u8; 32] {
    chain_hash(u64::from_be_bytes(*nonce), amount, output_script)
}

/// `SHA256(le8(0) || le8(amount) || outputScript)` — FromBTC's hash.
pub fn from_btc_hash(amount: u64, output_script: &[u8]) -> [u8; 32] {
    chain_hash(0, amount, output_script)
}

fn chain_hash(nonce: u64, amount: u64, output_script: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(nonce.to_le_bytes());
    hasher.update(amount.to_le_bytes());
    hasher.update(output_script);
    hasher.finalize().into()
}

/// `SHA256(secret)` — FromBTCLN's hash (Invariant 7).
pub fn from_btcln_hash(secret: &[u8; 32]) -> [u8; 32] {
    Sha256::digest(secret).into()
}

/// Verify `SHA256(secret) == expected_hash`, as required at FromBTCLN claim time.
pub fn verify_preimage(secret: &[u8; 32], expected_hash: &[u8; 32]) -> Result<()> {
    if &from_btcln_hash(secret) == expected_hash {
        Ok(())
    } else {
        Err(Error::Intermediary("secret does not hash to paymentHash".to_string()))
    }
}

/// Decode a BOLT11 invoice string and return its payment hash.
pub fn bolt11_payment_hash(bolt11: &str) -> Result<[u8; 32]> {
    use std::str::FromStr;
    let invoice = lightning_invoice::Bolt11Invoice::from_str(bolt11)
        .map_err(|e| Error::Parse(format!("invalid bolt11 invoice: {e}")))?;
    Ok(*invoice.payment_hash().as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn nonce_encodes_offset_timestamp() {
        let now = 1_700_000_000u64;
        let nonce = generate_escrow_nonce_with_rng(now, &mut StepRng::new(1, 1));
        let offset = now - NONCE_EPOCH_OFFSET;
        let be = offset.to_be_bytes();
        assert_eq!(&nonce[..5], &be[3..8]);
    }

    #[test]
    fn to_btc_hash_integrity() {
        let nonce = [0, 0, 0, 0, 0, 1, 2, 3];
        let script = b"dummy-script";
        let amount = 100_000u64;
        let h1 = to_btc_hash(&nonce, amount, script);
        let h2 = to_btc_hash(&nonce, amount, script);
        assert_eq!(h1, h2);
        // Changing any hash-contributing field invalidates the hash (Invariant 1).
        let h3 = to_btc_hash(&nonce, amount + 1, script);
        assert_ne!(h1, h3);
    }

    #[test]
    fn from_btc_hash_uses_zero_nonce() {
        let script = b"dummy-script";
        let amount = 50_000u64;
        let expected = chain_hash(0, amount, script);
        assert_eq!(from_btc_hash(amount, script), expected);
    }

    #[test]
    fn preimage_roundtrip() {
        let secret = [7u8; 32];
        let hash = from_btcln_hash(&secret);
        assert!(verify_preimage(&secret, &hash).is_ok());
        let wrong = [8u8; 32];
        assert!(verify_preimage(&wrong, &hash).is_err());
    }
}
