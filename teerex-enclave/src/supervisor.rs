//! The enclave-interior Runtime Supervisor (spec §4.8).
//!
//! Brings up the prove service in a fixed order: assign the loopback
//! address, start listening, emit exactly one startup banner line, then
//! stop talking. On shutdown, stop accepting new connections and let
//! in-flight requests drain up to a bounded deadline before exiting.
//!
//! The companion bridge process (host TCP ↔ enclave channel forwarding,
//! spec §4.4) lives in `teerex-bridge` and is started by the same host-side
//! sequencing this module documents but does not itself execute — the
//! bridge needs privileged datagram-device access this process does not
//! have (spec §4.4).

use std::sync::Arc;
use std::time::Duration;

use teerex_core::console::Console;
use teerex_core::shutdown::ShutdownChannel;
use teerex_core::VaultKeypair;

use crate::config::Config;
use crate::server::{self, AppState};

/// The deadline an in-flight request gets to finish after shutdown begins
/// (spec §4.8's "bounded deadline"), matching the Remote Prover Client's own
/// per-request timeout (spec §4.7) so a draining request is never cut off
/// before its caller would have given up anyway.
const DRAIN_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// Run the prove service to completion. Emits the single startup banner line
/// required by spec §4.8 once the listener is bound and ready, then serves
/// until `shutdown` fires.
pub async fn run(config: Config, shutdown: ShutdownChannel) -> anyhow::Result<()> {
    let vault = VaultKeypair::generate(teerex_core::KeyAlgorithm::X25519);
    let bind_addr = config.bind_addr;
    let state = Arc::new(AppState { vault, config });
    let router = server::router(state);

    // Step 1-2: assign the loopback address and wait for readiness (the
    // socket is listening) before announcing anything.
    let listener = server::bind(bind_addr).await?;

    let console = Console::stdout();
    console.banner(&format!("teerex-enclave: prove service ready on {bind_addr}"))?;
    // Step 5: nothing written after the banner may reach a reader that
    // isn't there (C4). `tracing`'s own stdout writer is a separate fd in a
    // real deployment's shell-level redirect; this seal covers everything
    // this process writes directly through `console`.
    console.seal();

    server::serve_on(listener, router, shutdown, DRAIN_DEADLINE).await
}
