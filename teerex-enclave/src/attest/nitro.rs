//! `nitro` mode Attestation Provider.
//!
//! A real Nitro enclave calls the NSM (Nitro Security Module) device once
//! and caches the handle (spec §4.2, C5); the returned attestation document
//! is signed by an AWS-issued certificate chained to AWS's own root CA.
//! `aws-nitro-enclaves-nsm-api`'s device ioctl path requires its `nix`
//! feature, which needs the Nitro kernel driver and is unavailable off
//! hardware — this workspace depends on the crate with `default-features =
//! false` for exactly that reason (see root Cargo.toml).
//!
//! Off hardware, this provider runs the same "debug mode" AWS Nitro itself
//! supports: the attestation document is still a genuine COSE_Sign1 envelope
//! over a CBOR-encoded [`NitroAttestationDoc`], but `certificate` is a
//! self-signed leaf (see [`crate::cert`]) rather than one chained to the
//! production AWS root. Verifiers must be configured with that self-signed
//! certificate as their `vendor_root_ca_pem` to accept it — the same
//! trust-downgrade a real debug-mode enclave requires of its verifiers.

use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use aws_nitro_enclaves_nsm_api::api::Digest;
use coset::{iana, CborSerializable, CoseSign1Builder, HeaderBuilder};
use serde_bytes::ByteBuf;
use teerex_core::attestation::NitroAttestationDoc;
use teerex_core::{AttestationArtifact, Nonce, PublicKey};

use crate::cert::SelfSignedCert;
use crate::error::ProveError;

/// The cached "device handle": a self-signed signing certificate generated
/// once per process and reused for every `/attestation` request (C5, P8).
static HANDLE: OnceLock<SelfSignedCert> = OnceLock::new();

fn handle() -> Result<&'static SelfSignedCert, ProveError> {
    if let Some(h) = HANDLE.get() {
        return Ok(h);
    }
    let cert = SelfSignedCert::generate("teerex-nitro-debug")
        .map_err(ProveError::Unavailable)?;
    Ok(HANDLE.get_or_init(|| cert))
}

/// The PEM of the self-signed certificate currently in use, for callers that
/// need to configure a client's `vendor_root_ca_pem` to match (dev/test only).
pub fn debug_root_ca_pem() -> Result<String, ProveError> {
    Ok(handle()?.to_pem())
}

pub fn attest(
    public_key: &PublicKey,
    nonce: Option<&Nonce>,
) -> Result<AttestationArtifact, ProveError> {
    let handle = handle()?;

    let mut pcrs = BTreeMap::new();
    pcrs.insert(0, ByteBuf::from(vec![0u8; 48]));

    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;

    let doc = NitroAttestationDoc {
        module_id: "teerex-debug-nsm".to_string(),
        digest: Digest::SHA384,
        timestamp: now_ms,
        pcrs,
        certificate: ByteBuf::from(handle.cert_der.clone()),
        cabundle: vec![],
        public_key: Some(ByteBuf::from(public_key.raw.clone())),
        user_data: None,
        nonce: nonce.map(|n| ByteBuf::from(n.0.clone())),
    };

    let mut payload = Vec::new();
    ciborium::ser::into_writer(&doc, &mut payload)
        .map_err(|e| ProveError::Unavailable(anyhow::anyhow!(e)))?;

    let protected = HeaderBuilder::new().algorithm(iana::Algorithm::ES384).build();
    let sign1 = CoseSign1Builder::new()
        .protected(protected)
        .payload(payload)
        .create_signature(&[], |tbs| {
            // COSE_Sign1 (RFC 8152) is always fixed-length r||s, never
            // ASN.1 DER; `sign_der` is for this cert's own X.509
            // `signatureValue`, a different field with a different
            // encoding convention.
            handle.sign(tbs).expect("self-signed cert key always signs")
        })
        .build();

    let attestation_document = sign1
        .to_vec()
        .map_err(|e| ProveError::Unavailable(anyhow::anyhow!(e)))?;

    Ok(AttestationArtifact::Nitro {
        public_key: public_key.armored(),
        attestation_document,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use teerex_core::{KeyAlgorithm, VaultKeypair};

    #[test]
    fn produced_artifact_verifies_against_its_own_root() {
        let vault = VaultKeypair::generate(KeyAlgorithm::X25519);
        let artifact = attest(vault.public_key(), None).unwrap();
        let pem = debug_root_ca_pem().unwrap();

        let config = teerex_verify::VerifierConfig {
            vendor_root_ca_pem: Some(pem),
            ..Default::default()
        };
        let rt = tokio::runtime::Runtime::new().unwrap();
        let http = reqwest::Client::new();
        let result = rt
            .block_on(teerex_verify::verify(&artifact, &config, None, &http))
            .unwrap();
        assert_eq!(result, *vault.public_key());
    }

    /// A vendor root CA of the same subject but a different keypair must
    /// still fail the chain check; the cert, not the name, is the trust
    /// anchor.
    #[test]
    fn chain_not_rooted_at_trust_anchor_is_rejected() {
        let vault = VaultKeypair::generate(KeyAlgorithm::X25519);
        let artifact = attest(vault.public_key(), None).unwrap();

        let unrelated = crate::cert::SelfSignedCert::generate("teerex-nitro-debug").unwrap();
        let config = teerex_verify::VerifierConfig {
            vendor_root_ca_pem: Some(unrelated.to_pem()),
            ..Default::default()
        };
        let rt = tokio::runtime::Runtime::new().unwrap();
        let http = reqwest::Client::new();
        let err = rt
            .block_on(teerex_verify::verify(&artifact, &config, None, &http))
            .unwrap_err();
        assert!(matches!(
            err,
            teerex_verify::AttestError::Invalid(teerex_verify::InvalidReason::ChainFailed)
        ));
    }
}
