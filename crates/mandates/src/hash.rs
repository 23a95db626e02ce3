//! Canonical hashing of mandate records (spec §4.4/§6), grounded on
//! `Receipt::hash_data`/`compute_signature` in
//! `knhk-workflow-engine::receipts::receipt_generator` (SHA-256, hex-encoded).

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::models::MandateKind;

/// Fixed field order per spec §6: `chainId, sequence, kind, content, prevHash`.
/// `content` is a `serde_json::Value`, whose `Map` is a `BTreeMap` by
/// default, so it serializes with sorted keys without extra work.
#[derive(Serialize)]
struct Canonical<'a> {
    #[serde(rename = "chainId")]
    chain_id: &'a str,
    sequence: u32,
    kind: MandateKind,
    content: &'a Value,
    #[serde(rename = "prevHash")]
    prev_hash: &'a str,
}

/// Compute the hex-encoded SHA-256 hash of a mandate's canonical bytes.
pub fn compute_hash(chain_id: &str, sequence: u32, kind: MandateKind, content: &Value, prev_hash: &str) -> String {
    let canonical = Canonical { chain_id, sequence, kind, content, prev_hash };
    let bytes = serde_json::to_vec(&canonical).expect("canonical mandate form is always serializable");
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_is_deterministic() {
        let content = json!({ "b": 2, "a": 1 });
        let h1 = compute_hash("chain-1", 0, MandateKind::Intent, &content, "");
        let h2 = compute_hash("chain-1", 0, MandateKind::Intent, &content, "");
        assert_eq!(h1, h2);
    }

    #[test]
    fn hash_changes_with_content() {
        let h1 = compute_hash("chain-1", 0, MandateKind::Intent, &json!({"amount": 1}), "");
        let h2 = compute_hash("chain-1", 0, MandateKind::Intent, &json!({"amount": 2}), "");
        assert_ne!(h1, h2);
    }

    #[test]
    fn key_order_does_not_affect_hash() {
        let h1 = compute_hash("c", 0, MandateKind::Cart, &json!({"a": 1, "b": 2}), "");
        let h2 = compute_hash("c", 0, MandateKind::Cart, &json!({"b": 2, "a": 1}), "");
        assert_eq!(h1, h2);
    }
}
