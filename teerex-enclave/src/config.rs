//! Enclave-side configuration (spec §3 supplement): layered env-var defaults
//! with CLI-flag override, in the workspace's `flags > env > defaults` style
//! (see `teerex_core::or_env`).

use std::net::SocketAddr;
use std::path::PathBuf;

use argh::FromArgs;
use teerex_core::or_env::OrEnvExt as _;
use teerex_core::ServerMode;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_PROVER_PATH: &str = "prover";
const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;
const DEFAULT_TRUST_HOPS: u32 = 1;
/// `trust_hops` is a specific, bounded count, not "trust all hops" (spec §9);
/// reject anything past a small number of reverse-proxy layers rather than
/// treating a large value as an unbounded trust setting.
const MAX_TRUST_HOPS: u32 = 32;

/// The TEE-Rex in-enclave prove server.
#[derive(FromArgs, Debug)]
pub struct Args {
    /// attestation provider mode: standard, nitro, or sgx.
    /// Env: `TEEREX_MODE`. Default: standard.
    #[argh(option)]
    pub mode: Option<ServerMode>,

    /// socket address the prove service listens on.
    /// Env: `TEEREX_BIND_ADDR`. Default: 127.0.0.1:5000.
    #[argh(option)]
    pub bind_addr: Option<SocketAddr>,

    /// path to the native prover binary.
    /// Env: `TEEREX_PROVER_PATH`. Default: "prover".
    #[argh(option)]
    pub prover_path: Option<PathBuf>,

    /// directory containing the CRS files (`bn254_g1.dat`, `bn254_g2.dat`,
    /// `grumpkin_g1.flat.dat`). Env: `CRS_PATH`. Required.
    #[argh(option)]
    pub crs_path: Option<PathBuf>,

    /// maximum accepted `/prove` request body size, in bytes.
    /// Env: `TEEREX_MAX_BODY_BYTES`. Default: 8388608 (8 MiB).
    #[argh(option)]
    pub max_body_bytes: Option<usize>,

    /// number of reverse-proxy hops to trust for rate-limiting client IP
    /// resolution (spec §4.5). 0 means no proxy is present. Required to be
    /// nonzero when `--behind-proxy` is set.
    /// Env: `TEEREX_TRUST_HOPS`. Default: 1.
    #[argh(option)]
    pub trust_hops: Option<u32>,

    /// whether this server sits behind a reverse proxy that injects a
    /// forwarded-for header. When set, a `trust_hops` of zero is a startup
    /// configuration error rather than a per-request one (spec §8).
    /// Env: `TEEREX_BEHIND_PROXY`. Default: false.
    #[argh(option)]
    pub behind_proxy: Option<bool>,
}

impl Args {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut args: Self = argh::from_env();
        args.mode.or_env_mut("TEEREX_MODE")?;
        args.bind_addr.or_env_mut("TEEREX_BIND_ADDR")?;
        args.prover_path.or_env_mut("TEEREX_PROVER_PATH")?;
        args.crs_path.or_env_mut("CRS_PATH")?;
        args.max_body_bytes.or_env_mut("TEEREX_MAX_BODY_BYTES")?;
        args.trust_hops.or_env_mut("TEEREX_TRUST_HOPS")?;
        args.behind_proxy.or_env_mut("TEEREX_BEHIND_PROXY")?;
        Ok(args)
    }

    pub fn into_config(self) -> anyhow::Result<Config> {
        let crs_path = self
            .crs_path
            .ok_or_else(|| anyhow::anyhow!("CRS_PATH is required (env or --crs-path)"))?;
        let trust_hops = self.trust_hops.unwrap_or(DEFAULT_TRUST_HOPS);
        let behind_proxy = self.behind_proxy.unwrap_or(false);

        // spec §8/§9: "trust none" while a forwarded-for header is expected
        // makes the rate limiter unable to resolve any client IP, and an
        // unbounded hop count defeats the point of a bounded trust setting;
        // both are configuration faults rejected at startup, not per-request.
        if behind_proxy && trust_hops == 0 {
            anyhow::bail!(
                "TEEREX_TRUST_HOPS is 0 but --behind-proxy is set: the rate \
                 limiter could not resolve a client IP from any request"
            );
        }
        if trust_hops > MAX_TRUST_HOPS {
            anyhow::bail!(
                "TEEREX_TRUST_HOPS={trust_hops} exceeds the maximum of \
                 {MAX_TRUST_HOPS}; trust-hops must be a specific, bounded count"
            );
        }

        Ok(Config {
            mode: self.mode.unwrap_or(ServerMode::Standard),
            bind_addr: self
                .bind_addr
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.parse().unwrap()),
            prover_path: self
                .prover_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROVER_PATH)),
            crs_path,
            max_body_bytes: self.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES),
            trust_hops,
            behind_proxy,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub mode: ServerMode,
    pub bind_addr: SocketAddr,
    pub prover_path: PathBuf,
    pub crs_path: PathBuf,
    pub max_body_bytes: usize,
    pub trust_hops: u32,
    pub behind_proxy: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    fn base_args() -> Args {
        Args {
            mode: None,
            bind_addr: None,
            prover_path: None,
            crs_path: Some(PathBuf::from("/crs")),
            max_body_bytes: None,
            trust_hops: None,
            behind_proxy: None,
        }
    }

    #[test]
    fn zero_trust_hops_behind_a_proxy_is_rejected_at_init() {
        let args = Args {
            trust_hops: Some(0),
            behind_proxy: Some(true),
            ..base_args()
        };
        assert!(args.into_config().is_err());
    }

    #[test]
    fn zero_trust_hops_without_a_proxy_is_accepted() {
        let args = Args {
            trust_hops: Some(0),
            behind_proxy: Some(false),
            ..base_args()
        };
        assert!(args.into_config().is_ok());
    }

    #[test]
    fn unbounded_trust_hops_is_rejected_at_init() {
        let args = Args {
            trust_hops: Some(MAX_TRUST_HOPS + 1),
            behind_proxy: Some(true),
            ..base_args()
        };
        assert!(args.into_config().is_err());
    }

    #[test]
    fn default_trust_hops_is_accepted() {
        let config = base_args().into_config().unwrap();
        assert_eq!(config.trust_hops, DEFAULT_TRUST_HOPS);
        assert!(!config.behind_proxy);
    }
}
