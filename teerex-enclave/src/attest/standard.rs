//! `standard` mode: no attestation, just the raw vault public key. Used in
//! development, when `requireAttestation=false` on the client side.

use teerex_core::{AttestationArtifact, PublicKey};

pub fn attest(public_key: &PublicKey) -> AttestationArtifact {
    AttestationArtifact::Standard {
        public_key: public_key.armored(),
    }
}
