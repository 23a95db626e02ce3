//! Error types for the `mandates` crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MandateError {
    #[error("mandate '{0}' not found")]
    NotFound(String),

    #[error("chain '{0}' not found")]
    ChainNotFound(String),

    #[error("mandate '{mandate_id}' prevHash does not match chain tail (chain {chain_id})")]
    ChainMismatch { chain_id: String, mandate_id: String },

    #[error("chain '{chain_id}' has a sequence gap at index {at}")]
    SequenceGap { chain_id: String, at: u32 },

    #[error("mandate '{mandate_id}' has an invalid signature from key '{key_id}'")]
    SignatureInvalid { mandate_id: String, key_id: String },

    #[error("mandate '{mandate_id}' cannot transition from {from:?} to {to:?}")]
    InvalidTransition { mandate_id: String, from: crate::models::MandateStatus, to: crate::models::MandateStatus },

    #[error("mandate '{0}' has expired")]
    Expired(String),
}
