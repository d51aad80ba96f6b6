use argh::FromArgs;

/// the TEE-Rex demo CLI
#[derive(Debug, FromArgs)]
pub struct Args {
    #[argh(subcommand)]
    cmd: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Attestation(AttestationCommand),
    Prove(ProveCommand),
}

/// fetch and verify the server's attestation, printing its public key and mode
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "attestation")]
struct AttestationCommand {
    /// base URL of the TEE-Rex prove service, e.g. http://127.0.0.1:8443
    #[argh(option)]
    base_url: String,

    /// reject `standard` mode attestations instead of accepting them
    #[argh(switch)]
    require_attestation: bool,

    /// PEM file overriding the hardcoded vendor root CA
    #[argh(option)]
    vendor_root_ca_pem: Option<std::path::PathBuf>,
}

/// run a full proving round trip: attest, then `POST /prove`
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "prove")]
struct ProveCommand {
    /// base URL of the TEE-Rex prove service
    #[argh(option)]
    base_url: String,

    /// reject `standard` mode attestations instead of accepting them
    #[argh(switch)]
    require_attestation: bool,

    /// PEM file overriding the hardcoded vendor root CA
    #[argh(option)]
    vendor_root_ca_pem: Option<std::path::PathBuf>,

    /// path to the witness bytes
    #[argh(option)]
    witness: std::path::PathBuf,

    /// path to the circuit bytecode
    #[argh(option)]
    bytecode: std::path::PathBuf,

    /// path to the verifying key
    #[argh(option)]
    vk: std::path::PathBuf,

    /// where to write the resulting proof; prints hex to stdout if omitted
    #[argh(option)]
    out: Option<std::path::PathBuf>,
}

impl Args {
    pub fn run(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("failed to build tokio runtime");
        match self.cmd {
            Command::Attestation(args) => rt.block_on(run_attestation(args)),
            Command::Prove(args) => rt.block_on(run_prove(args)),
        }
    }
}

async fn verifier_config(
    require_attestation: bool,
    vendor_root_ca_pem: Option<std::path::PathBuf>,
) -> anyhow::Result<teerex_verify::VerifierConfig> {
    let vendor_root_ca_pem = match vendor_root_ca_pem {
        Some(path) => Some(tokio::fs::read_to_string(&path).await?),
        None => None,
    };
    Ok(teerex_verify::VerifierConfig {
        require_attestation,
        vendor_root_ca_pem,
        ..Default::default()
    })
}

async fn run_attestation(args: AttestationCommand) -> anyhow::Result<()> {
    let verifier = verifier_config(args.require_attestation, args.vendor_root_ca_pem).await?;
    let client = teerex_client::ProverClient::new(args.base_url, verifier);

    let public_key = client.attested_public_key(None, false).await?;
    let mode = client
        .cached_mode()
        .expect("attested_public_key always populates the cache on success");

    println!("mode:       {mode}");
    println!("public key: {}", public_key.armored());
    Ok(())
}

async fn run_prove(args: ProveCommand) -> anyhow::Result<()> {
    let verifier = verifier_config(args.require_attestation, args.vendor_root_ca_pem).await?;
    let client = teerex_client::ProverClient::new(args.base_url, verifier);

    let witness = tokio::fs::read(&args.witness).await?;
    let bytecode = tokio::fs::read(&args.bytecode).await?;
    let vk = tokio::fs::read(&args.vk).await?;
    let steps = teerex_client::witness::ExecutionSteps {
        execution_steps: vec![teerex_client::witness::ExecutionStep {
            witness,
            bytecode,
            vk,
        }],
    };

    let proof = client.prove(&steps).await?;
    let proof_bytes = proof.to_bytes();

    match args.out {
        Some(path) => {
            tokio::fs::write(&path, &proof_bytes).await?;
            println!("wrote {} bytes to {}", proof_bytes.len(), path.display());
        }
        None => {
            let hex: String = proof_bytes.iter().map(|b| format!("{b:02x}")).collect();
            println!("{hex}");
        }
    }
    Ok(())
}
