//! Verification for `standard` mode: no hardware attestation at all.

use teerex_core::{AttestationArtifact, PublicKey};

use crate::config::VerifierConfig;
use crate::error::AttestError;

pub fn verify(
    artifact: &AttestationArtifact,
    config: &VerifierConfig,
) -> Result<PublicKey, AttestError> {
    let AttestationArtifact::Standard { public_key } = artifact else {
        unreachable!("dispatched only for ServerMode::Standard");
    };

    if config.require_attestation {
        return Err(AttestError::AttestationRequired);
    }

    tracing::warn!(
        "accepting unattested `standard` public key; this deployment has no \
         hardware attestation and provides no assurance against a \
         compromised host"
    );

    PublicKey::from_armored(public_key)
        .map_err(|_| AttestError::Invalid(crate::error::InvalidReason::Encoding))
}

#[cfg(test)]
mod test {
    use teerex_core::{KeyAlgorithm, VaultKeypair};

    use super::*;

    fn artifact() -> AttestationArtifact {
        let vault = VaultKeypair::generate(KeyAlgorithm::X25519);
        AttestationArtifact::Standard {
            public_key: vault.public_key().armored(),
        }
    }

    #[test]
    fn accepted_when_attestation_not_required() {
        let config = VerifierConfig::default();
        assert!(verify(&artifact(), &config).is_ok());
    }

    #[test]
    fn rejected_when_attestation_required() {
        let config = VerifierConfig {
            require_attestation: true,
            ..Default::default()
        };
        assert!(matches!(
            verify(&artifact(), &config),
            Err(AttestError::AttestationRequired)
        ));
    }
}
