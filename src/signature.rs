//! Recoverable-ECDSA signature verification for LP authorization and
//! discovery-envelope signatures.
//!
//! Grounded on the `secp-recovery` feature of the `bitcoin` crate
//! (already part of the teacher's dependency stack) and the tagged-hash
//! idiom from its key-derivation module.

use bitcoin::secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// BIP340-style tagged hash: `SHA256(SHA256(tag) || SHA256(tag) || data)`.
pub fn tagged_hash(tag: &str, data: &[u8]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    hasher.update(data);
    hasher.finalize().into()
}

/// Parse a `65`-byte (recovery id in the first byte, then 64 bytes r||s)
/// hex-encoded recoverable signature.
fn parse_recoverable(signature_hex: &str) -> Result<RecoverableSignature> {
    let bytes = hex::decode(signature_hex)
        .map_err(|e| Error::Parse(format!("signature is not valid hex: {e}")))?;
    if bytes.len() != 65 {
        return Err(Error::Parse(format!(
            "recoverable signature must be 65 bytes, got {}",
            bytes.len()
        )));
    }
    let recovery_id = RecoveryId::from_i32(bytes[0] as i32)
        .map_err(|e| Error::SignatureVerification(format!("invalid recovery id: {e}")))?;
    RecoverableSignature::from_compact(&bytes[1..], recovery_id)
        .map_err(|e| Error::SignatureVerification(format!("malformed recoverable signature: {e}")))
}

/// Recover the signer's public key from a message hash and recoverable signature.
pub fn recover_pubkey(message_hash: &[u8; 32], signature_hex: &str) -> Result<PublicKey> {
    let secp = Secp256k1::new();
    let sig = parse_recoverable(signature_hex)?;
    let message = Message::from_digest(*message_hash);
    secp.recover_ecdsa(&message, &sig)
        .map_err(|e| Error::SignatureVerification(format!("signature recovery failed: {e}")))
}

/// Verify that `signature_hex` recovers to `expected_pubkey_hex` over `message_hash`.
///
/// This is the building block behind `isValidInitAuthorization` and
/// `isValidClaimInitAuthorization` (§4.3): callers hash the fields that
/// make up the authorization (escrow data, fee rate, prefix, timeout)
/// with `tagged_hash` before calling this.
pub fn verify_recoverable_signature(
    message_hash: &[u8; 32],
    signature_hex: &str,
    expected_pubkey_hex: &str,
) -> Result<()> {
    let expected = PublicKey::from_slice(
        &hex::decode(expected_pubkey_hex).map_err(|e| Error::Parse(format!("invalid pubkey hex: {e}")))?,
    )
    .map_err(|e| Error::Parse(format!("invalid pubkey: {e}")))?;

    let recovered = recover_pubkey(message_hash, signature_hex)?;
    if recovered == expected {
        Ok(())
    } else {
        Err(Error::SignatureVerification(
            "signature does not recover to expected public key".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::SecretKey;

    #[test]
    fn tagged_hash_is_deterministic() {
        let a = tagged_hash("swap/init-auth", b"payload");
        let b = tagged_hash("swap/init-auth", b"payload");
        assert_eq!(a, b);
        let c = tagged_hash("swap/init-auth", b"other-payload");
        assert_ne!(a, c);
    }

    #[test]
    fn recovers_and_verifies_own_signature() {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[7u8; 32]).unwrap();
        let public = PublicKey::from_secret_key(&secp, &secret);

        let hash = tagged_hash("swap/init-auth", b"escrow-fields");
        let message = Message::from_digest(hash);
        let recoverable = secp.sign_ecdsa_recoverable(&message, &secret);
        let (recovery_id, compact) = recoverable.serialize_compact();
        let mut sig_bytes = vec![recovery_id.to_i32() as u8];
        sig_bytes.extend_from_slice(&compact);
        let signature_hex = hex::encode(sig_bytes);

        let recovered = recover_pubkey(&hash, &signature_hex).unwrap();
        assert_eq!(recovered, public);

        verify_recoverable_signature(&hash, &signature_hex, &hex::encode(public.serialize())).unwrap();
    }

    #[test]
    fn rejects_signature_from_wrong_key() {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[7u8; 32]).unwrap();
        let other_secret = SecretKey::from_slice(&[9u8; 32]).unwrap();
        let other_public = PublicKey::from_secret_key(&secp, &other_secret);

        let hash = tagged_hash("swap/init-auth", b"escrow-fields");
        let message = Message::from_digest(hash);
        let recoverable = secp.sign_ecdsa_recoverable(&message, &secret);
        let (recovery_id, compact) = recoverable.serialize_compact();
        let mut sig_bytes = vec![recovery_id.to_i32() as u8];
        sig_bytes.extend_from_slice(&compact);
        let signature_hex = hex::encode(sig_bytes);

        let result = verify_recoverable_signature(&hash, &signature_hex, &hex::encode(other_public.serialize()));
        assert!(result.is_err());
    }
}
