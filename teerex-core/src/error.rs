//! The stable wire error taxonomy shared by server and client.
//!
//! Every HTTP error response this system emits serializes to exactly one
//! [`ErrorResponse`]; `code` is one of the nine identifiers below and is
//! meant to be matched on by callers (including other languages), so it
//! never changes shape once shipped.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Stable wire identifiers. Renaming a variant is a breaking change.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ErrorCode {
    /// base64/format error on the `/prove` body.
    InvalidEnvelope,
    /// decryption or AEAD tag check failed.
    AuthenticationFailed,
    /// native prover exited nonzero.
    ProverFailed,
    /// encoding, signature, chain, or freshness failure.
    AttestationInvalid,
    /// chain valid but measurement not accepted.
    AttestationMeasurementMismatch,
    /// challenge echo absent or wrong.
    AttestationNonceMismatch,
    /// client policy demands a TEE but the server reports `standard`.
    AttestationRequired,
    /// enclave bridge or platform attestation device unreachable.
    Unavailable,
    /// rate limiter rejected the request.
    RateLimited,
}

impl ErrorCode {
    /// The HTTP status this code maps to. Caller faults are 4xx; everything
    /// the server or the prover is responsible for is 5xx, except
    /// `RateLimited` which is conventionally 429 regardless of fault.
    pub fn http_status(self) -> u16 {
        match self {
            Self::InvalidEnvelope => 400,
            Self::AuthenticationFailed => 400,
            Self::AttestationNonceMismatch => 400,
            Self::AttestationRequired => 400,
            Self::AttestationMeasurementMismatch => 409,
            Self::AttestationInvalid => 422,
            Self::RateLimited => 429,
            Self::ProverFailed => 500,
            Self::Unavailable => 503,
        }
    }
}

/// The exact JSON shape of every error response in this system.
///
/// `/prove`'s error body in spec is `{ "error": "<code>" }`; `msg` is an
/// additive field carrying a human-readable (never secret) detail, present
/// on every response this crate builds but safely ignored by any client that
/// only reads `error`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "error")]
    pub code: ErrorCode,
    pub msg: String,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self { code, msg: msg.into() }
    }

    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.msg, self.code.as_ref())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wire_shape_matches_spec() {
        let err = ErrorResponse::new(ErrorCode::InvalidEnvelope, "bad base64");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["error"], "invalidEnvelope");
        assert_eq!(err.http_status(), 400);
    }
}
