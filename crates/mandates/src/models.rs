//! Data model for the mandate chain (spec §3, "Mandate").

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MandateKind {
    Intent,
    Cart,
    Payment,
    Approval,
    Cancellation,
}

impl MandateKind {
    /// Default time-to-live before a mandate of this kind expires while
    /// sitting short of a terminal status (spec §4.4).
    pub fn default_ttl(self) -> Duration {
        match self {
            MandateKind::Intent => Duration::hours(24),
            MandateKind::Cart => Duration::hours(1),
            MandateKind::Payment => Duration::minutes(15),
            MandateKind::Approval => Duration::hours(72),
            MandateKind::Cancellation => Duration::hours(72),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MandateStatus {
    Pending,
    Signed,
    Approved,
    Executed,
    Rejected,
    Cancelled,
    Expired,
}

impl MandateStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MandateStatus::Executed
                | MandateStatus::Rejected
                | MandateStatus::Cancelled
                | MandateStatus::Expired
        )
    }
}

/// One signature over a mandate's `hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MandateSignature {
    pub key_id: String,
    /// Hex-encoded signature bytes.
    pub signature: String,
    pub algorithm: String,
    pub signed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mandate {
    pub mandate_id: String,
    pub chain_id: String,
    pub sequence: u32,
    pub kind: MandateKind,
    pub status: MandateStatus,
    pub content: Value,
    /// Hex-encoded hash of the predecessor record; empty for sequence 0.
    pub prev_hash: String,
    /// Hex-encoded hash of this record.
    pub hash: String,
    pub signatures: Vec<MandateSignature>,
    pub created_at: DateTime<Utc>,
}

impl Mandate {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        now - self.created_at > self.kind.default_ttl()
    }
}

/// Result of `MandateChainManager::verify`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainVerification {
    pub ok: bool,
    pub failures: Vec<ChainFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainFailure {
    pub sequence: u32,
    pub kind: ChainFailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainFailureKind {
    ChainMismatch,
    SequenceGap,
    SignatureInvalid,
}
