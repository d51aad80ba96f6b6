//! The Attestation Artifact data model: a bytes-plus-mode record that binds
//! the vault public key to the platform (spec §3).

use aws_nitro_enclaves_nsm_api::api::AttestationDoc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::vault::PublicKey;

/// Which Attestation Provider variant produced an artifact.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServerMode {
    Standard,
    Nitro,
    Sgx,
}

impl std::str::FromStr for ServerMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "nitro" => Ok(Self::Nitro),
            "sgx" => Ok(Self::Sgx),
            _ => Err(anyhow::anyhow!("invalid mode `{s}`, expected one of: standard, nitro, sgx")),
        }
    }
}

impl std::fmt::Display for ServerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Standard => "standard",
            Self::Nitro => "nitro",
            Self::Sgx => "sgx",
        };
        f.write_str(s)
    }
}

/// Optional per-request challenge bytes supplied by the client to thwart
/// replay. When supplied, the artifact must echo it verbatim.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct Nonce(pub Vec<u8>);

/// The wire shape of `GET /attestation`'s 200 response: a tagged union on
/// `mode` (spec §6).
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum AttestationArtifact {
    #[serde(rename_all = "camelCase")]
    Standard { public_key: String },
    #[serde(rename_all = "camelCase")]
    Nitro {
        public_key: String,
        #[serde(with = "base64_bytes")]
        attestation_document: Vec<u8>,
    },
    #[serde(rename_all = "camelCase")]
    Sgx {
        public_key: String,
        #[serde(with = "base64_bytes")]
        quote: Vec<u8>,
    },
}

impl AttestationArtifact {
    pub fn mode(&self) -> ServerMode {
        match self {
            Self::Standard { .. } => ServerMode::Standard,
            Self::Nitro { .. } => ServerMode::Nitro,
            Self::Sgx { .. } => ServerMode::Sgx,
        }
    }

    pub fn public_key_armored(&self) -> &str {
        match self {
            Self::Standard { public_key }
            | Self::Nitro { public_key, .. }
            | Self::Sgx { public_key, .. } => public_key,
        }
    }
}

mod base64_bytes {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(&s)
            .map_err(serde::de::Error::custom)
    }
}

/// SGX-side binding: `user_report_data = SHA-256(publicKey) || zero-pad(32)`.
pub fn sgx_report_data(public_key: &PublicKey) -> [u8; 64] {
    let digest = Sha256::digest(public_key.armored().as_bytes());
    let mut report_data = [0u8; 64];
    report_data[..32].copy_from_slice(&digest);
    report_data
}

/// Re-exported so downstream crates don't need a direct dependency on
/// `aws-nitro-enclaves-nsm-api` just to name the type.
pub type NitroAttestationDoc = AttestationDoc;

#[cfg(test)]
mod test {
    use super::*;
    use crate::vault::{KeyAlgorithm, VaultKeypair};

    #[test]
    fn standard_artifact_wire_shape() {
        let vault = VaultKeypair::generate(KeyAlgorithm::X25519);
        let artifact = AttestationArtifact::Standard {
            public_key: vault.public_key().armored(),
        };
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["mode"], "standard");
        assert!(json["publicKey"].is_string());
    }

    #[test]
    fn sgx_report_data_binds_leading_32_bytes() {
        let vault = VaultKeypair::generate(KeyAlgorithm::X25519);
        let report_data = sgx_report_data(vault.public_key());
        let expected = Sha256::digest(vault.public_key().armored().as_bytes());
        assert_eq!(&report_data[..32], &expected[..]);
        assert_eq!(&report_data[32..], &[0u8; 32]);
    }
}
