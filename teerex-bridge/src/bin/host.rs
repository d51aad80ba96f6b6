//! The bridge's host-side entrypoint: runs outside the enclave, on the
//! untrusted host, forwarding an externally-reachable TCP port onto the
//! enclave channel (spec §4.4).

use std::sync::Arc;

use teerex_bridge::channel::UnixChannel;
use teerex_bridge::config::HostArgs;
use teerex_bridge::server;
use teerex_core::shutdown::ShutdownChannel;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    teerex_core::logger::init();

    let config = HostArgs::from_env()?.into_config()?;
    let channel = Arc::new(UnixChannel::new(&config.channel_path));
    let shutdown = ShutdownChannel::new();

    let shutdown_sender = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_sender.send();
        }
    });

    server::serve_host(config.bind_addr, channel, shutdown).await
}
