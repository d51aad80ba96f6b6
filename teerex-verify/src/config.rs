//! Client-supplied verification policy (spec §6, "Attestation verifier
//! inputs").

use std::collections::HashMap;
use std::time::Duration;

use secrecy::SecretString;

/// Default freshness window: 5 minutes.
pub const DEFAULT_MAX_AGE_MS: u64 = 5 * 60 * 1000;
/// Clock skew tolerance added on top of `max_age_ms`.
pub const CLOCK_SKEW_TOLERANCE_MS: u64 = 30_000;

/// Measurement-slot key: nitro uses small integer slots, sgx names its two
/// slots explicitly.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum MeasurementSlot {
    Index(u32),
    Named(&'static str),
}

#[derive(Clone, Default)]
pub struct VerifierConfig {
    /// If true, `standard` mode artifacts are rejected with
    /// `AttestationRequired`.
    pub require_attestation: bool,
    /// Expected measurement bytes per slot. Any slot present here must match
    /// exactly, byte for byte.
    pub expected_measurements: HashMap<MeasurementSlot, Vec<u8>>,
    /// Maximum artifact age before clock-skew tolerance is added.
    pub max_age_ms: Option<u64>,
    /// Overrides the hardcoded vendor root CA (PEM). Defaults to the
    /// platform vendor's published root.
    pub vendor_root_ca_pem: Option<String>,
    /// The SGX remote appraisal service endpoint. When unset, SGX artifacts
    /// are verified with a local DCAP chain check instead.
    pub appraisal_endpoint: Option<String>,
    pub appraisal_api_key: Option<SecretString>,
    /// Nonce the caller expects echoed back. `None` means no replay check.
    pub expected_nonce: Option<Vec<u8>>,
}

impl VerifierConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_millis(self.max_age_ms.unwrap_or(DEFAULT_MAX_AGE_MS))
    }

    pub fn freshness_budget(&self) -> Duration {
        self.max_age() + Duration::from_millis(CLOCK_SKEW_TOLERANCE_MS)
    }
}
