//! Shared data model, crypto primitives, and error taxonomy for TEE-Rex.
//!
//! This crate has no notion of HTTP, enclaves, or subprocesses; it is the
//! part of the system every other `teerex-*` crate links against.

pub mod armor;
pub mod attestation;
pub mod console;
pub mod envelope;
pub mod error;
pub mod logger;
pub mod or_env;
pub mod proof;
pub mod shutdown;
pub mod vault;

pub use attestation::{AttestationArtifact, Nonce, ServerMode};
pub use error::{ErrorCode, ErrorResponse};
pub use proof::ChonkProof;
pub use vault::{KeyAlgorithm, PublicKey, VaultKeypair};
