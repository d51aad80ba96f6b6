//! The Remote Prover Client (spec §4.7): fetches and verifies a TEE-Rex
//! server's attestation, encrypts witness data to its attested public key,
//! and drives `/prove` to completion with bounded retries.

pub mod backoff;
mod client;
pub mod error;
pub mod witness;

pub use client::{ProverClient, PROVE_TIMEOUT};
pub use error::ClientError;
