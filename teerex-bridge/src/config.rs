//! Bridge configuration: layered env-var defaults with CLI-flag override,
//! in the same `flags > env > defaults` style as `teerex_enclave::config`.

use std::net::SocketAddr;
use std::path::PathBuf;

use argh::FromArgs;
use teerex_core::or_env::OrEnvExt as _;

const DEFAULT_CHANNEL_PATH: &str = "/tmp/teerex-bridge.sock";
const DEFAULT_PROVE_ADDR: &str = "127.0.0.1:5000";

/// The host-side half of the bridge: listens on an externally-reachable TCP
/// port and forwards each connection onto the enclave channel.
#[derive(FromArgs, Debug)]
pub struct HostArgs {
    /// externally-reachable socket address to listen on.
    /// Env: `TEEREX_BRIDGE_BIND_ADDR`. Required.
    #[argh(option)]
    pub bind_addr: Option<SocketAddr>,

    /// path to the enclave channel socket to dial (stands in for the
    /// platform vsock address). Env: `TEEREX_BRIDGE_CHANNEL_PATH`.
    /// Default: /tmp/teerex-bridge.sock.
    #[argh(option)]
    pub channel_path: Option<PathBuf>,
}

impl HostArgs {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut args: Self = argh::from_env();
        args.bind_addr.or_env_mut("TEEREX_BRIDGE_BIND_ADDR")?;
        args.channel_path.or_env_mut("TEEREX_BRIDGE_CHANNEL_PATH")?;
        Ok(args)
    }

    pub fn into_config(self) -> anyhow::Result<HostConfig> {
        Ok(HostConfig {
            bind_addr: self
                .bind_addr
                .ok_or_else(|| anyhow::anyhow!("bind-addr is required (env or --bind-addr)"))?,
            channel_path: self
                .channel_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CHANNEL_PATH)),
        })
    }
}

#[derive(Clone, Debug)]
pub struct HostConfig {
    pub bind_addr: SocketAddr,
    pub channel_path: PathBuf,
}

/// The enclave-side half of the bridge: listens on the enclave channel and
/// forwards each connection to the prove service's loopback address.
#[derive(FromArgs, Debug)]
pub struct EnclaveArgs {
    /// path to the enclave channel socket to bind (stands in for the
    /// platform vsock address). Env: `TEEREX_BRIDGE_CHANNEL_PATH`.
    /// Default: /tmp/teerex-bridge.sock.
    #[argh(option)]
    pub channel_path: Option<PathBuf>,

    /// loopback address the prove service listens on.
    /// Env: `TEEREX_BIND_ADDR`. Default: 127.0.0.1:5000.
    #[argh(option)]
    pub prove_addr: Option<SocketAddr>,
}

impl EnclaveArgs {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut args: Self = argh::from_env();
        args.channel_path.or_env_mut("TEEREX_BRIDGE_CHANNEL_PATH")?;
        args.prove_addr.or_env_mut("TEEREX_BIND_ADDR")?;
        Ok(args)
    }

    pub fn into_config(self) -> EnclaveConfig {
        EnclaveConfig {
            channel_path: self
                .channel_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CHANNEL_PATH)),
            prove_addr: self
                .prove_addr
                .unwrap_or_else(|| DEFAULT_PROVE_ADDR.parse().unwrap()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EnclaveConfig {
    pub channel_path: PathBuf,
    pub prove_addr: SocketAddr,
}
