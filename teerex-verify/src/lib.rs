//! The client-side Attestation Verifier: decode an [`AttestationArtifact`],
//! check its chain of trust (or call out to a remote appraisal service),
//! confirm freshness and measurements, and return the vault public key it
//! binds to.

pub mod config;
pub mod error;
mod nitro;
mod sgx;
mod standard;

pub use config::{MeasurementSlot, VerifierConfig};
pub use error::{AttestError, InvalidReason};
use teerex_core::{AttestationArtifact, Nonce, PublicKey, ServerMode};

/// Verify an attestation artifact against the given policy, returning the
/// vault public key it attests to. Dispatches per `artifact.mode()`; see
/// each mode's module for its specific checks.
pub async fn verify(
    artifact: &AttestationArtifact,
    config: &VerifierConfig,
    nonce: Option<&Nonce>,
    http: &reqwest::Client,
) -> Result<PublicKey, AttestError> {
    match artifact.mode() {
        ServerMode::Standard => standard::verify(artifact, config),
        ServerMode::Nitro => nitro::verify(artifact, config, nonce),
        ServerMode::Sgx => sgx::verify(artifact, config, http).await,
    }
}

#[cfg(test)]
mod test {
    use teerex_core::{KeyAlgorithm, VaultKeypair};

    use super::*;

    #[tokio::test]
    async fn standard_mode_roundtrips_public_key() {
        let vault = VaultKeypair::generate(KeyAlgorithm::X25519);
        let artifact = AttestationArtifact::Standard {
            public_key: vault.public_key().armored(),
        };
        let config = VerifierConfig::default();
        let http = reqwest::Client::new();
        let result = verify(&artifact, &config, None, &http).await.unwrap();
        assert_eq!(result, *vault.public_key());
    }
}
