//! Client-side verification failures, with enough detail in `reason` to
//! support the testable properties in spec §8 (`EXPIRED`, `CHAIN_FAILED`,
//! `REPORT_DATA_MISMATCH`, ...) while still collapsing to one of the nine
//! stable wire identifiers for anything that crosses a process boundary.

use teerex_core::ErrorCode;
use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InvalidReason {
    Encoding,
    Signature,
    ChainFailed,
    Expired,
    ReportDataMismatch,
    Jwt,
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Encoding => "ENCODING",
            Self::Signature => "SIGNATURE",
            Self::ChainFailed => "CHAIN_FAILED",
            Self::Expired => "EXPIRED",
            Self::ReportDataMismatch => "REPORT_DATA_MISMATCH",
            Self::Jwt => "JWT",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum AttestError {
    #[error("attestation required but server reported standard mode")]
    AttestationRequired,

    #[error("attestation invalid: {0}")]
    Invalid(InvalidReason),

    #[error("attestation measurement mismatch")]
    MeasurementMismatch,

    #[error("attestation nonce mismatch")]
    NonceMismatch,

    #[error("appraisal service unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

impl AttestError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AttestationRequired => ErrorCode::AttestationRequired,
            Self::Invalid(_) => ErrorCode::AttestationInvalid,
            Self::MeasurementMismatch => ErrorCode::AttestationMeasurementMismatch,
            Self::NonceMismatch => ErrorCode::AttestationNonceMismatch,
            Self::Unavailable(_) => ErrorCode::Unavailable,
        }
    }
}
