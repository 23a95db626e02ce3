//! `mandates` crate — the cryptographically linked mandate chain (spec §4.4).

pub mod error;
pub mod hash;
pub mod manager;
pub mod models;
pub mod signer;

pub use error::MandateError;
pub use manager::MandateChainManager;
pub use models::{
    ChainFailure, ChainFailureKind, ChainVerification, Mandate, MandateKind, MandateSignature,
    MandateStatus,
};
pub use signer::{Ed25519Signer, Signer};
