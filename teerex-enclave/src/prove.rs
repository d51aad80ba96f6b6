//! The Prove Service (spec §4.5): per-request orchestrator. Decrypts an
//! envelope with the Key Vault, hands the plaintext witness to the native
//! prover subprocess, and shapes its raw output into the wire proof format.
//!
//! (C1) a single request flows linearly through these steps with no internal
//! parallelism; the subprocess wait is the expensive, blocking step. (C2)
//! this runs concurrently with `/attestation` handlers against the same
//! read-only vault.

use std::path::Path;
use std::process::Stdio;

use teerex_core::{ChonkProof, VaultKeypair};
use tokio::process::Command;

use crate::config::Config;
use crate::error::ProveError;

const PROOF_FILE_NAME: &str = "proof";
const INPUTS_FILE_NAME: &str = "ivc_inputs";

/// Decrypt `envelope`, run the native prover over its plaintext, and return
/// the wire-format proof bytes (`[4-byte BE N || N*32 bytes]`).
pub async fn prove(
    envelope: &[u8],
    vault: &VaultKeypair,
    config: &Config,
) -> Result<Vec<u8>, ProveError> {
    let witness = teerex_core::envelope::decrypt(envelope, vault)?;

    let scratch = tempfile::tempdir().map_err(|e| ProveError::ProverFailed(e.into()))?;
    let inputs_path = scratch.path().join(INPUTS_FILE_NAME);
    tokio::fs::write(&inputs_path, &witness)
        .await
        .map_err(|e| ProveError::ProverFailed(e.into()))?;

    let raw = run_prover(&inputs_path, scratch.path(), config).await?;
    // `scratch` is dropped (and its directory removed) on every exit path,
    // including the `?` above, satisfying the "clean up on all exit paths"
    // rule (spec §4.5 step 6).

    ChonkProof::from_raw_field_bytes(&raw)
        .map_err(|e| ProveError::ProverFailed(anyhow::anyhow!(e)))
}

async fn run_prover(
    inputs_path: &Path,
    output_dir: &Path,
    config: &Config,
) -> Result<Vec<u8>, ProveError> {
    let output = Command::new(&config.prover_path)
        .arg("prove")
        .arg("--scheme")
        .arg("chonk")
        .arg("--ivc_inputs_path")
        .arg(inputs_path)
        .arg("-o")
        .arg(output_dir)
        .env_clear()
        .env("CRS_PATH", &config.crs_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ProveError::ProverFailed(e.into()))?;

    if !output.status.success() {
        tracing::warn!(
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr),
            "native prover exited nonzero",
        );
        return Err(ProveError::ProverFailed(anyhow::anyhow!(
            "prover exited with {}",
            output.status
        )));
    }

    tokio::fs::read(output_dir.join(PROOF_FILE_NAME))
        .await
        .map_err(|e| ProveError::ProverFailed(e.into()))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write as _;
    use teerex_core::KeyAlgorithm;

    fn fake_prover_script(body: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prover");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\n{body}").unwrap();
        drop(file);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn success_path_wraps_raw_field_bytes() {
        let script_dir = fake_prover_script(
            r#"
            out_dir="$7"
            printf '\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\001' > "$out_dir/proof"
            exit 0
            "#,
        );
        let vault = VaultKeypair::generate(KeyAlgorithm::X25519);
        let envelope = teerex_core::envelope::encrypt(b"witness bytes", vault.public_key());
        let config = Config {
            mode: teerex_core::ServerMode::Standard,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            prover_path: script_dir.path().join("prover"),
            crs_path: std::env::temp_dir(),
            max_body_bytes: 1024,
            trust_hops: 0,
            behind_proxy: false,
        };
        let proof = prove(&envelope, &vault, &config).await.unwrap();
        let decoded = ChonkProof::from_bytes(&proof).unwrap();
        assert_eq!(decoded.field_elements.len(), 1);
    }

    #[tokio::test]
    async fn nonzero_exit_is_prover_failed() {
        let script_dir = fake_prover_script("exit 1");
        let vault = VaultKeypair::generate(KeyAlgorithm::X25519);
        let envelope = teerex_core::envelope::encrypt(b"witness bytes", vault.public_key());
        let config = Config {
            mode: teerex_core::ServerMode::Standard,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            prover_path: script_dir.path().join("prover"),
            crs_path: std::env::temp_dir(),
            max_body_bytes: 1024,
            trust_hops: 0,
            behind_proxy: false,
        };
        let err = prove(&envelope, &vault, &config).await.unwrap_err();
        assert!(matches!(err, ProveError::ProverFailed(_)));
    }

    #[tokio::test]
    async fn tampered_envelope_is_authentication_failed() {
        let vault = VaultKeypair::generate(KeyAlgorithm::X25519);
        let mut envelope = teerex_core::envelope::encrypt(b"witness bytes", vault.public_key());
        let last = envelope.len() - 1;
        envelope[last] ^= 1;
        let config = Config {
            mode: teerex_core::ServerMode::Standard,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            prover_path: "/bin/false".into(),
            crs_path: std::env::temp_dir(),
            max_body_bytes: 1024,
            trust_hops: 0,
            behind_proxy: false,
        };
        let err = prove(&envelope, &vault, &config).await.unwrap_err();
        assert!(matches!(err, ProveError::AuthenticationFailed));
    }
}
