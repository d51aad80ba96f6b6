//! Proof Request payload shapes (spec §6, "payload serialization matrix").
//! `standard`/`nitro` servers expect UTF-8 JSON; `sgx` expects a
//! self-describing binary packing so the native prover CLI can ingest it
//! directly without a JSON parsing step inside the enclave.

use serde::{Deserialize, Serialize};
use teerex_core::ServerMode;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionStep {
    #[serde(with = "base64_bytes")]
    pub witness: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub bytecode: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub vk: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSteps {
    pub execution_steps: Vec<ExecutionStep>,
}

impl ExecutionSteps {
    /// Serialize for the wire, dispatching on the server's mode (spec §6).
    pub fn encode(&self, mode: ServerMode) -> anyhow::Result<Vec<u8>> {
        match mode {
            ServerMode::Standard | ServerMode::Nitro => {
                Ok(serde_json::to_vec(self)?)
            }
            ServerMode::Sgx => {
                let mut buf = Vec::new();
                ciborium::ser::into_writer(self, &mut buf)?;
                Ok(buf)
            }
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

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> ExecutionSteps {
        ExecutionSteps {
            execution_steps: vec![ExecutionStep {
                witness: vec![1, 2, 3],
                bytecode: vec![4, 5, 6],
                vk: vec![7, 8, 9],
            }],
        }
    }

    #[test]
    fn standard_and_nitro_encode_as_json() {
        let steps = sample();
        let bytes = steps.encode(ServerMode::Standard).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json["executionSteps"][0]["witness"].is_string());

        let nitro_bytes = steps.encode(ServerMode::Nitro).unwrap();
        assert_eq!(bytes, nitro_bytes);
    }

    #[test]
    fn sgx_encodes_as_binary_not_json() {
        let steps = sample();
        let bytes = steps.encode(ServerMode::Sgx).unwrap();
        assert!(serde_json::from_slice::<serde_json::Value>(&bytes).is_err());
        let decoded: ExecutionSteps = ciborium::de::from_reader(bytes.as_slice()).unwrap();
        assert_eq!(decoded.execution_steps[0].witness, vec![1, 2, 3]);
    }
}
