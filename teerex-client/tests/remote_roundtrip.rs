//! End-to-end (spec §8 scenario 1 style): a real `teerex-enclave` router,
//! driven entirely through `ProverClient`, in `standard` mode backed by a
//! fake prover shell script.

use std::io::Write as _;
use std::sync::Arc;

use teerex_client::witness::{ExecutionStep, ExecutionSteps};
use teerex_client::ProverClient;
use teerex_core::{ChonkProof, KeyAlgorithm, ServerMode, VaultKeypair};
use teerex_enclave::config::Config;
use teerex_enclave::server::{router, AppState};
use teerex_verify::VerifierConfig;

fn fake_prover_script() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prover");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        r#"#!/bin/sh
        out_dir="$7"
        printf '\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\000\042' > "$out_dir/proof"
        exit 0
        "#
    )
    .unwrap();
    drop(file);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    dir
}

#[tokio::test]
async fn standard_mode_remote_prove_round_trip() {
    let script_dir = fake_prover_script();
    let vault = VaultKeypair::generate(KeyAlgorithm::X25519);
    let config = Config {
        mode: ServerMode::Standard,
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        prover_path: script_dir.path().join("prover"),
        crs_path: std::env::temp_dir(),
        max_body_bytes: 8 * 1024 * 1024,
        trust_hops: 0,
        behind_proxy: false,
    };
    let state = Arc::new(AppState { vault, config });
    let app = router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .await
            .unwrap();
    });

    let base_url = format!("http://{addr}");
    let client = ProverClient::new(base_url, VerifierConfig::default());

    let steps = ExecutionSteps {
        execution_steps: vec![ExecutionStep {
            witness: vec![1, 2, 3],
            bytecode: vec![4, 5, 6],
            vk: vec![7, 8, 9],
        }],
    };

    let proof = client.prove(&steps).await.unwrap();
    let mut expected = [0u8; 32];
    expected[31] = 0x22;
    assert_eq!(proof, ChonkProof { field_elements: vec![expected] });
}

#[tokio::test]
async fn attestation_cache_is_reused_within_freshness_window() {
    let script_dir = fake_prover_script();
    let vault = VaultKeypair::generate(KeyAlgorithm::X25519);
    let config = Config {
        mode: ServerMode::Standard,
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        prover_path: script_dir.path().join("prover"),
        crs_path: std::env::temp_dir(),
        max_body_bytes: 8 * 1024 * 1024,
        trust_hops: 0,
        behind_proxy: false,
    };
    let state = Arc::new(AppState { vault, config });
    let app = router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .await
            .unwrap();
    });

    let base_url = format!("http://{addr}");
    let client = ProverClient::new(base_url, VerifierConfig::default());

    let first = client.attested_public_key(None, false).await.unwrap();
    let second = client.attested_public_key(None, false).await.unwrap();
    assert_eq!(first, second);
}
