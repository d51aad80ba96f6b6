//! The bridge's enclave-side entrypoint: runs inside the enclave interior,
//! alongside the prove service, as a separate unprivileged-adjacent process
//! (spec §4.4, §4.8 startup step 3).

use teerex_bridge::channel::UnixChannelListener;
use teerex_bridge::config::EnclaveArgs;
use teerex_bridge::server;
use teerex_core::shutdown::ShutdownChannel;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    teerex_core::logger::init();

    let config = EnclaveArgs::from_env()?.into_config();
    let listener = UnixChannelListener::bind(&config.channel_path)?;
    let shutdown = ShutdownChannel::new();

    let shutdown_sender = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_sender.send();
        }
    });

    server::serve_enclave(listener, config.prove_addr, shutdown).await
}
