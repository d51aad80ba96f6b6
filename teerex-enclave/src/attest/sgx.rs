//! `sgx` mode Attestation Provider.
//!
//! A real SGX platform writes `user_report_data` to `/dev/attestation/user_report_data`
//! (Gramine) or calls the AESM quoting service, then reads back a DCAP quote
//! wrapping a QE-signed [`sgx_isa::Report`] (spec §4.2). `dcap-ql`'s quote
//! *generation* path needs `libsgx_dcap_ql`/the SGX driver, neither of which
//! is available off hardware; this workspace depends on `dcap-ql` with only
//! its quote-*parsing* feature for exactly that reason (see root Cargo.toml).
//!
//! Off hardware, this provider emits the raw [`sgx_isa::Report`] bytes it
//! would otherwise hand to the quoting service — a genuine report structure
//! with `reportdata` correctly bound to the vault public key, but not yet
//! wrapped and QE-signed into a DCAP quote. `teerex-verify`'s SGX path
//! therefore only accepts artifacts from this provider through a test double
//! appraisal service (see DESIGN.md); a real deployment needs genuine DCAP
//! quoting hardware regardless of which crate generates it.

use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest as _, Sha256};
use sgx_isa::Report;
use teerex_core::attestation::sgx_report_data;
use teerex_core::{AttestationArtifact, PublicKey};

use crate::error::ProveError;

/// The cached "device handle": in a real deployment, the AESM client
/// connection opened once per process (C5, P8). Off hardware there's no
/// device to hold open; this records only that attestation has been
/// requested at least once, for parity with the cached-handle invariant.
static HANDLE: OnceLock<()> = OnceLock::new();

fn handle() -> &'static () {
    HANDLE.get_or_init(|| ())
}

pub fn attest(public_key: &PublicKey) -> Result<AttestationArtifact, ProveError> {
    let _handle = handle();

    let report_data = sgx_report_data(public_key);
    let mut report = zeroed_report();
    report.reportdata = report_data;
    // A real measurement is burned into the enclave image by the SGX
    // loader at EINIT; off hardware there is none, so the identity slots
    // are left at zero and the freshness nonce below stands in for what a
    // quote's QE report would otherwise bind.
    let nonce_seed = Sha256::digest(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
            .to_be_bytes(),
    );
    report.isvsvn = u16::from_be_bytes([nonce_seed[0], nonce_seed[1]]);

    let quote = report_to_bytes(&report);

    Ok(AttestationArtifact::Sgx {
        public_key: public_key.armored(),
        quote,
    })
}

fn zeroed_report() -> Report {
    Report::try_copy_from(&vec![0u8; Report::UNPADDED_SIZE])
        .expect("zero buffer of the exact unpadded size always parses")
}

fn report_to_bytes(report: &Report) -> Vec<u8> {
    // SAFETY: `Report` is `#[repr(C, align(512))]` with no padding bytes
    // left uninitialized by `zeroed_report` + field assignment above.
    unsafe {
        std::slice::from_raw_parts(
            report as *const Report as *const u8,
            Report::UNPADDED_SIZE,
        )
    }
    .to_vec()
}

#[cfg(test)]
mod test {
    use super::*;
    use teerex_core::{KeyAlgorithm, VaultKeypair};

    #[test]
    fn report_data_binds_public_key_hash() {
        let vault = VaultKeypair::generate(KeyAlgorithm::X25519);
        let artifact = attest(vault.public_key()).unwrap();
        let AttestationArtifact::Sgx { quote, .. } = artifact else {
            panic!("expected sgx artifact");
        };
        let report = Report::try_copy_from(&quote[..Report::UNPADDED_SIZE]).unwrap();
        let expected = Sha256::digest(vault.public_key().armored().as_bytes());
        assert_eq!(&report.reportdata[..32], &expected[..]);
    }
}
