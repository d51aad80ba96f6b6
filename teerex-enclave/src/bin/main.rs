//! The in-enclave prove service entrypoint.

use teerex_core::shutdown::ShutdownChannel;
use teerex_enclave::config::Args;
use teerex_enclave::supervisor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    teerex_core::logger::init();

    let config = Args::from_env()?.into_config()?;
    let shutdown = ShutdownChannel::new();

    let shutdown_sender = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_sender.send();
        }
    });

    supervisor::run(config, shutdown).await
}
