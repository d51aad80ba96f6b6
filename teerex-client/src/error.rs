//! Remote Prover Client failure modes (spec §4.7, §7).

use teerex_core::ErrorResponse;
use teerex_verify::AttestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("attestation verification failed: {0}")]
    Attestation(#[from] AttestError),

    #[error("server rejected the request: {0}")]
    Server(ErrorResponse),

    #[error("malformed server response: {0}")]
    Decode(#[source] anyhow::Error),
}

impl ClientError {
    /// Transport faults are the only ones spec §4.7/§7 calls out as
    /// retryable; a well-formed error response from the server (caller
    /// fault or prover fault) is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
