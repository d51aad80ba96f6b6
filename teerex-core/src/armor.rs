//! Armored (text) encoding for public keys.
//!
//! The wire format is `teerex1<alg-tag><base64(raw public key)>`, e.g.
//! `teerex1x25519AbCd...==`. It's self-describing enough that a verifier can
//! tell which KEM algorithm a key belongs to without out-of-band context.

use thiserror::Error;

use crate::vault::KeyAlgorithm;

const PREFIX: &str = "teerex1";

#[derive(Debug, Error)]
pub enum ArmorError {
    #[error("armored key is missing the `{PREFIX}` prefix")]
    MissingPrefix,
    #[error("armored key has an unrecognized algorithm tag")]
    UnknownAlgorithm,
    #[error("armored key base64 payload is malformed: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("armored key payload has the wrong length for its algorithm")]
    BadLength,
}

pub fn encode(alg: KeyAlgorithm, raw: &[u8]) -> String {
    use base64::Engine as _;
    let tag = alg.tag();
    let b64 = base64::engine::general_purpose::STANDARD.encode(raw);
    format!("{PREFIX}{tag}{b64}")
}

pub fn decode(armored: &str) -> Result<(KeyAlgorithm, Vec<u8>), ArmorError> {
    use base64::Engine as _;
    let rest = armored.strip_prefix(PREFIX).ok_or(ArmorError::MissingPrefix)?;
    let (alg, b64) = KeyAlgorithm::ALL
        .iter()
        .find_map(|alg| rest.strip_prefix(alg.tag()).map(|b64| (*alg, b64)))
        .ok_or(ArmorError::UnknownAlgorithm)?;
    let raw = base64::engine::general_purpose::STANDARD.decode(b64)?;
    if raw.len() != alg.public_key_len() {
        return Err(ArmorError::BadLength);
    }
    Ok((alg, raw))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip() {
        let raw = [0x42u8; 32];
        let armored = encode(KeyAlgorithm::X25519, &raw);
        assert!(armored.starts_with(PREFIX));
        let (alg, decoded) = decode(&armored).unwrap();
        assert_eq!(alg, KeyAlgorithm::X25519);
        assert_eq!(decoded, raw);
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(matches!(
            decode("not-armored"),
            Err(ArmorError::MissingPrefix)
        ));
    }
}
