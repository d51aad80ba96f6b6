//! The proof transport format: `[4-byte BE field count N || N * 32 bytes]`.
//!
//! The core's responsibility ends at producing this exact layout from the
//! native prover's raw output file (spec §4.5); it has no opinion on what
//! the 32-byte field elements mean.

use thiserror::Error;

pub const FIELD_ELEMENT_LEN: usize = 32;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ProofFormatError {
    #[error("proof bytes too short to contain a field count")]
    Truncated,
    #[error("declared field count {declared} doesn't match body length {body_len}")]
    LengthMismatch { declared: u32, body_len: usize },
}

/// A decoded proof: a sequence of 32-byte field elements.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ChonkProof {
    pub field_elements: Vec<[u8; FIELD_ELEMENT_LEN]>,
}

impl ChonkProof {
    /// Wrap raw field-element bytes (as produced by the native prover's
    /// output file) into the wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let n = self.field_elements.len() as u32;
        let mut out = Vec::with_capacity(4 + self.field_elements.len() * FIELD_ELEMENT_LEN);
        out.extend_from_slice(&n.to_be_bytes());
        for elem in &self.field_elements {
            out.extend_from_slice(elem);
        }
        out
    }

    /// Parse `[4-byte BE N || N * 32 bytes]` back into field elements.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProofFormatError> {
        if bytes.len() < 4 {
            return Err(ProofFormatError::Truncated);
        }
        let (count_bytes, body) = bytes.split_at(4);
        let n = u32::from_be_bytes(count_bytes.try_into().unwrap());
        let expected_len = n as usize * FIELD_ELEMENT_LEN;
        if body.len() != expected_len {
            return Err(ProofFormatError::LengthMismatch {
                declared: n,
                body_len: body.len(),
            });
        }
        let field_elements = body
            .chunks_exact(FIELD_ELEMENT_LEN)
            .map(|chunk| chunk.try_into().unwrap())
            .collect();
        Ok(Self { field_elements })
    }

    /// Build the wire format directly from a raw byte blob that is a
    /// multiple of 32 bytes (the native prover's `proof` output file).
    pub fn from_raw_field_bytes(raw: &[u8]) -> Result<Vec<u8>, ProofFormatError> {
        if raw.len() % FIELD_ELEMENT_LEN != 0 {
            return Err(ProofFormatError::LengthMismatch {
                declared: (raw.len() / FIELD_ELEMENT_LEN) as u32,
                body_len: raw.len(),
            });
        }
        let n = (raw.len() / FIELD_ELEMENT_LEN) as u32;
        let mut out = Vec::with_capacity(4 + raw.len());
        out.extend_from_slice(&n.to_be_bytes());
        out.extend_from_slice(raw);
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn scenario_1_standard_roundtrip() {
        // spec §8 scenario 1: a proof of the form [0x00 0x00 0x00 0x02 || 64 bytes].
        let mut raw = vec![0x00, 0x00, 0x00, 0x02];
        raw.extend_from_slice(&[0u8; 64]);
        let proof = ChonkProof::from_bytes(&raw).unwrap();
        assert_eq!(proof.field_elements.len(), 2);
    }

    proptest! {
        // (P7) round-trip on the proof transport.
        #[test]
        fn p7_roundtrips(elements in proptest::collection::vec(any::<[u8; 32]>(), 0..8)) {
            let proof = ChonkProof { field_elements: elements.clone() };
            let bytes = proof.to_bytes();
            let decoded = ChonkProof::from_bytes(&bytes).unwrap();
            prop_assert_eq!(decoded.field_elements, elements);
        }
    }
}
