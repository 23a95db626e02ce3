//! The `Signer` port (spec §6) and an Ed25519 implementation, grounded on
//! the SHA-256 + hex hashing pattern in
//! `knhk-workflow-engine::receipts::receipt_generator::Receipt` — but signing
//! with a real asymmetric key instead of re-hashing, since a mandate's
//! signature must be checkable by a party that never saw the signer's
//! secret key.

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;

/// What the orchestrator/mandate manager needs from a signing identity.
pub trait Signer: Send + Sync {
    fn key_id(&self) -> &str;
    fn algorithm(&self) -> &'static str;
    /// Hex-encoded signature over `message`.
    fn sign(&self, message: &[u8]) -> String;
    /// Verify a hex-encoded signature produced by the key named `key_id`.
    /// A signer only recognizes its own `key_id`; unknown key ids fail
    /// verification rather than panicking, since a chain legitimately can
    /// carry signatures from other parties this process never minted.
    fn verify(&self, message: &[u8], signature_hex: &str, key_id: &str) -> bool;
}

/// A single Ed25519 keypair, generated once at construction — the in-memory
/// test signer the other examples use to exercise sign/verify without a KMS.
pub struct Ed25519Signer {
    key_id: String,
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl Ed25519Signer {
    pub fn generate(key_id: impl Into<String>) -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        Self { key_id: key_id.into(), signing_key, verifying_key }
    }
}

impl Signer for Ed25519Signer {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn algorithm(&self) -> &'static str {
        "ed25519"
    }

    fn sign(&self, message: &[u8]) -> String {
        let sig: Signature = self.signing_key.sign(message);
        hex::encode(sig.to_bytes())
    }

    fn verify(&self, message: &[u8], signature_hex: &str, key_id: &str) -> bool {
        if key_id != self.key_id {
            return false;
        }
        let Ok(raw) = hex::decode(signature_hex) else { return false };
        let Ok(bytes) = raw.as_slice().try_into() else { return false };
        let sig = Signature::from_bytes(bytes);
        self.verifying_key.verify(message, &sig).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let signer = Ed25519Signer::generate("key-1");
        let sig = signer.sign(b"hello");
        assert!(signer.verify(b"hello", &sig, "key-1"));
    }

    #[test]
    fn tampered_message_fails_verification() {
        let signer = Ed25519Signer::generate("key-1");
        let sig = signer.sign(b"hello");
        assert!(!signer.verify(b"goodbye", &sig, "key-1"));
    }

    #[test]
    fn unknown_key_id_fails_verification() {
        let signer = Ed25519Signer::generate("key-1");
        let sig = signer.sign(b"hello");
        assert!(!signer.verify(b"hello", &sig, "key-2"));
    }
}
