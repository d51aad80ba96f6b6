//! The server-side Attestation Provider (spec §4.2): binds the vault public
//! key to the running platform via a variant-dispatched assertion. One
//! variant is selected per enclave instance via [`crate::config::Config`];
//! unlike the client-side verifier, the server never needs to dispatch on
//! more than one mode at a time.

mod nitro;
mod sgx;
mod standard;

use teerex_core::{AttestationArtifact, Nonce, PublicKey, ServerMode};

use crate::error::ProveError;

pub fn attest(
    mode: ServerMode,
    public_key: &PublicKey,
    nonce: Option<&Nonce>,
) -> Result<AttestationArtifact, ProveError> {
    match mode {
        ServerMode::Standard => Ok(standard::attest(public_key)),
        ServerMode::Nitro => nitro::attest(public_key, nonce),
        ServerMode::Sgx => sgx::attest(public_key),
    }
}

/// The self-signed debug root CA PEM in use by the `nitro` provider, if it
/// has been exercised at least once. Exposed so a demo CLI or test harness
/// can configure a matching `teerex_verify::VerifierConfig` (see DESIGN.md).
pub fn nitro_debug_root_ca_pem() -> Result<String, ProveError> {
    nitro::debug_root_ca_pem()
}
