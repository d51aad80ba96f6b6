//! Server-side error taxonomy: every failure mode this enclave's HTTP
//! handlers can produce, mapped onto the stable wire `ErrorCode`s.

use teerex_core::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum ProveError {
    #[error("malformed request body")]
    InvalidEnvelope,
    #[error("envelope authentication failed")]
    AuthenticationFailed,
    #[error("native prover failed: {0}")]
    ProverFailed(#[source] anyhow::Error),
    #[error("attestation device unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

impl ProveError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidEnvelope => ErrorCode::InvalidEnvelope,
            Self::AuthenticationFailed => ErrorCode::AuthenticationFailed,
            Self::ProverFailed(_) => ErrorCode::ProverFailed,
            Self::Unavailable(_) => ErrorCode::Unavailable,
        }
    }
}

impl From<teerex_core::vault::VaultError> for ProveError {
    fn from(err: teerex_core::vault::VaultError) -> Self {
        match err {
            teerex_core::vault::VaultError::MalformedEnvelope => Self::InvalidEnvelope,
            teerex_core::vault::VaultError::AuthenticationFailed => Self::AuthenticationFailed,
        }
    }
}
