//! `MandateChainManager` — builds, signs, and verifies hash-linked mandate
//! chains (spec §4.4).
//!
//! The teacher repo has no multi-writer concurrency control to generalize
//! (its job queue relies on Postgres row locking, not an in-process guard
//! table), so the per-chain lock here is this crate's own: one
//! `tokio::sync::Mutex` per `chainId`, created on first touch and reused,
//! guarding the append path so sequence numbers and hash links are assigned
//! without interleaving (spec §5).

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::error::MandateError;
use crate::hash::compute_hash;
use crate::models::{
    ChainFailure, ChainFailureKind, ChainVerification, Mandate, MandateKind, MandateSignature,
    MandateStatus,
};
use crate::signer::Signer;

pub struct MandateChainManager {
    chains: StdMutex<HashMap<String, Vec<Mandate>>>,
    chain_locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Default for MandateChainManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MandateChainManager {
    pub fn new() -> Self {
        Self { chains: StdMutex::new(HashMap::new()), chain_locks: StdMutex::new(HashMap::new()) }
    }

    fn lock_for(&self, chain_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.chain_locks.lock().unwrap();
        locks.entry(chain_id.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// Create the next mandate in a chain (or start a new one when `chain_id`
    /// is `None`) and sign it immediately with `signer`.
    pub async fn create(
        &self,
        kind: MandateKind,
        content: Value,
        chain_id: Option<String>,
        signer: &dyn Signer,
    ) -> Result<Mandate, MandateError> {
        let chain_id = chain_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let lock = self.lock_for(&chain_id);
        let _guard = lock.lock().await;

        let mut chains = self.chains.lock().unwrap();
        let history = chains.entry(chain_id.clone()).or_default();
        let sequence = history.len() as u32;
        let prev_hash = history.last().map(|m| m.hash.clone()).unwrap_or_default();
        let hash = compute_hash(&chain_id, sequence, kind, &content, &prev_hash);

        let signature = MandateSignature {
            key_id: signer.key_id().to_string(),
            signature: signer.sign(hash.as_bytes()),
            algorithm: signer.algorithm().to_string(),
            signed_at: Utc::now(),
        };

        let mandate = Mandate {
            mandate_id: Uuid::new_v4().to_string(),
            chain_id,
            sequence,
            kind,
            status: MandateStatus::Signed,
            content,
            prev_hash,
            hash,
            signatures: vec![signature],
            created_at: Utc::now(),
        };

        history.push(mandate.clone());
        Ok(mandate)
    }

    /// Add an additional signature to an already-created mandate (e.g. a
    /// second approver), without changing its position in the chain.
    pub async fn sign(&self, mandate_id: &str, signer: &dyn Signer) -> Result<Mandate, MandateError> {
        self.mutate(mandate_id, |mandate| {
            mandate.signatures.push(MandateSignature {
                key_id: signer.key_id().to_string(),
                signature: signer.sign(mandate.hash.as_bytes()),
                algorithm: signer.algorithm().to_string(),
                signed_at: Utc::now(),
            });
            Ok(())
        })
        .await
    }

    pub async fn approve(&self, mandate_id: &str, _actor: &str) -> Result<Mandate, MandateError> {
        self.transition(mandate_id, &[MandateStatus::Signed], MandateStatus::Approved).await
    }

    pub async fn reject(&self, mandate_id: &str, _actor: &str) -> Result<Mandate, MandateError> {
        self.transition(mandate_id, &[MandateStatus::Pending, MandateStatus::Signed, MandateStatus::Approved], MandateStatus::Rejected).await
    }

    pub async fn cancel(&self, mandate_id: &str, _actor: &str) -> Result<Mandate, MandateError> {
        self.transition(
            mandate_id,
            &[MandateStatus::Pending, MandateStatus::Signed, MandateStatus::Approved],
            MandateStatus::Cancelled,
        )
        .await
    }

    /// Mark a PAYMENT (or APPROVAL-gated) mandate as executed once the step
    /// it authorizes has actually run. Not named in spec §4.4's contract
    /// list but required to reach the EXECUTED state in the status machine.
    pub async fn mark_executed(&self, mandate_id: &str) -> Result<Mandate, MandateError> {
        self.transition(mandate_id, &[MandateStatus::Signed, MandateStatus::Approved], MandateStatus::Executed).await
    }

    /// Sweep every mandate against `now`, moving any non-terminal mandate
    /// past its kind's TTL to EXPIRED, and returning the ones that moved.
    pub fn expire_due(&self, now: DateTime<Utc>) -> Vec<Mandate> {
        let mut chains = self.chains.lock().unwrap();
        let mut expired = Vec::new();
        for history in chains.values_mut() {
            for mandate in history.iter_mut() {
                if mandate.is_expired(now) {
                    mandate.status = MandateStatus::Expired;
                    expired.push(mandate.clone());
                }
            }
        }
        expired
    }

    /// Snapshot of a chain's mandates in sequence order, reflecting live
    /// status (unlike a `Store`'s append-only ledger, which keeps each
    /// mandate as it was persisted at creation time).
    pub fn chain(&self, chain_id: &str) -> Vec<Mandate> {
        self.chains.lock().unwrap().get(chain_id).cloned().unwrap_or_default()
    }

    /// Recompute hash links and re-verify every signature in a chain.
    pub fn verify(&self, chain_id: &str, signer: &dyn Signer) -> Result<ChainVerification, MandateError> {
        let chains = self.chains.lock().unwrap();
        let history = chains.get(chain_id).ok_or_else(|| MandateError::ChainNotFound(chain_id.to_string()))?;

        let mut failures = Vec::new();
        let mut prev_hash = String::new();
        let mut expected_sequence = 0u32;

        for mandate in history {
            if mandate.sequence != expected_sequence {
                failures.push(ChainFailure {
                    sequence: mandate.sequence,
                    kind: ChainFailureKind::SequenceGap,
                    message: format!("expected sequence {expected_sequence}, found {}", mandate.sequence),
                });
            }
            expected_sequence = mandate.sequence + 1;

            if mandate.prev_hash != prev_hash {
                failures.push(ChainFailure {
                    sequence: mandate.sequence,
                    kind: ChainFailureKind::ChainMismatch,
                    message: format!("prevHash does not match predecessor's hash at sequence {}", mandate.sequence),
                });
            }

            let recomputed = compute_hash(&mandate.chain_id, mandate.sequence, mandate.kind, &mandate.content, &mandate.prev_hash);
            if recomputed != mandate.hash {
                failures.push(ChainFailure {
                    sequence: mandate.sequence,
                    kind: ChainFailureKind::ChainMismatch,
                    message: "stored hash does not match recomputed content hash".to_string(),
                });
            }

            for sig in &mandate.signatures {
                if !signer.verify(mandate.hash.as_bytes(), &sig.signature, &sig.key_id) {
                    failures.push(ChainFailure {
                        sequence: mandate.sequence,
                        kind: ChainFailureKind::SignatureInvalid,
                        message: format!("signature from key '{}' does not verify", sig.key_id),
                    });
                }
            }

            prev_hash = mandate.hash.clone();
        }

        Ok(ChainVerification { ok: failures.is_empty(), failures })
    }

    async fn transition(&self, mandate_id: &str, allowed_from: &[MandateStatus], to: MandateStatus) -> Result<Mandate, MandateError> {
        self.mutate(mandate_id, |mandate| {
            if !allowed_from.contains(&mandate.status) {
                return Err(MandateError::InvalidTransition { mandate_id: mandate.mandate_id.clone(), from: mandate.status, to });
            }
            mandate.status = to;
            Ok(())
        })
        .await
    }

    async fn mutate(
        &self,
        mandate_id: &str,
        f: impl FnOnce(&mut Mandate) -> Result<(), MandateError>,
    ) -> Result<Mandate, MandateError> {
        let lock = {
            let chains = self.chains.lock().unwrap();
            let chain_id = chains
                .values()
                .flatten()
                .find(|m| m.mandate_id == mandate_id)
                .map(|m| m.chain_id.clone())
                .ok_or_else(|| MandateError::NotFound(mandate_id.to_string()))?;
            drop(chains);
            self.lock_for(&chain_id)
        };
        let _guard = lock.lock().await;

        let mut chains = self.chains.lock().unwrap();
        let mandate = chains
            .values_mut()
            .flatten()
            .find(|m| m.mandate_id == mandate_id)
            .ok_or_else(|| MandateError::NotFound(mandate_id.to_string()))?;
        f(mandate)?;
        Ok(mandate.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signer() -> crate::signer::Ed25519Signer {
        crate::signer::Ed25519Signer::generate("key-1")
    }

    #[tokio::test]
    async fn create_starts_a_chain_at_sequence_zero() {
        let mgr = MandateChainManager::new();
        let s = signer();
        let m = mgr.create(MandateKind::Intent, json!({"a": 1}), None, &s).await.unwrap();
        assert_eq!(m.sequence, 0);
        assert_eq!(m.prev_hash, "");
        assert_eq!(m.status, MandateStatus::Signed);
    }

    #[tokio::test]
    async fn chain_links_by_hash_and_sequence() {
        let mgr = MandateChainManager::new();
        let s = signer();
        let first = mgr.create(MandateKind::Intent, json!({"a": 1}), None, &s).await.unwrap();
        let second = mgr.create(MandateKind::Cart, json!({"b": 2}), Some(first.chain_id.clone()), &s).await.unwrap();
        assert_eq!(second.sequence, 1);
        assert_eq!(second.prev_hash, first.hash);
    }

    #[tokio::test]
    async fn verify_passes_on_untampered_chain() {
        let mgr = MandateChainManager::new();
        let s = signer();
        let first = mgr.create(MandateKind::Intent, json!({"a": 1}), None, &s).await.unwrap();
        mgr.create(MandateKind::Payment, json!({"amount": 10}), Some(first.chain_id.clone()), &s).await.unwrap();

        let report = mgr.verify(&first.chain_id, &s).unwrap();
        assert!(report.ok, "expected no failures, got {:?}", report.failures);
    }

    #[tokio::test]
    async fn approve_requires_signed_status() {
        let mgr = MandateChainManager::new();
        let s = signer();
        let first = mgr.create(MandateKind::Approval, json!({}), None, &s).await.unwrap();
        let approved = mgr.approve(&first.mandate_id, "ops@example.com").await.unwrap();
        assert_eq!(approved.status, MandateStatus::Approved);

        let err = mgr.approve(&first.mandate_id, "ops@example.com").await.unwrap_err();
        assert!(matches!(err, MandateError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn tampering_content_is_detected_by_verify() {
        let mgr = MandateChainManager::new();
        let s = signer();
        let first = mgr.create(MandateKind::Intent, json!({"a": 1}), None, &s).await.unwrap();
        let second = mgr.create(MandateKind::Payment, json!({"amount": 10}), Some(first.chain_id.clone()), &s).await.unwrap();
        let third = mgr.create(MandateKind::Cancellation, json!({"reason": "refund"}), Some(first.chain_id.clone()), &s).await.unwrap();
        let _ = third;

        {
            let mut chains = mgr.chains.lock().unwrap();
            let history = chains.get_mut(&first.chain_id).unwrap();
            history[1].content = json!({"amount": 999});
        }

        let report = mgr.verify(&first.chain_id, &s).unwrap();
        assert!(!report.ok);
        assert!(report.failures.iter().any(|f| f.sequence == second.sequence && f.kind == ChainFailureKind::ChainMismatch));
    }
}
