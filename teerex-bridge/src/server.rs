//! The two accept loops the bridge runs, one per side of the channel (spec
//! §4.4): the host side listens on an externally-reachable TCP port and
//! dials out on the channel per connection; the enclave side listens on the
//! channel and dials the prove service's loopback TCP port per connection.

use std::net::SocketAddr;
use std::sync::Arc;

use teerex_core::shutdown::ShutdownChannel;
use tokio::net::{TcpListener, TcpStream};

use crate::channel::{EnclaveChannel, EnclaveListener};
use crate::forward::forward;

/// Accept external TCP connections on `bind_addr` and forward each one onto
/// a fresh channel connection.
pub async fn serve_host<E>(
    bind_addr: SocketAddr,
    channel: Arc<E>,
    shutdown: ShutdownChannel,
) -> anyhow::Result<()>
where
    E: EnclaveChannel + 'static,
{
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(%bind_addr, "bridge listening for host connections");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (tcp, peer) = accepted?;
                let channel = Arc::clone(&channel);
                tokio::spawn(async move {
                    if let Err(e) = forward_one_host(tcp, channel.as_ref()).await {
                        tracing::warn!(%peer, error = %e, "bridge connection ended");
                    }
                });
            }
            () = shutdown.recv() => {
                tracing::info!("bridge (host side) shutting down");
                return Ok(());
            }
        }
    }
}

async fn forward_one_host<E: EnclaveChannel>(tcp: TcpStream, channel: &E) -> anyhow::Result<()> {
    let conn = channel.connect().await?;
    forward(tcp, conn).await
}

/// Accept channel connections and forward each one to the prove service
/// listening on `prove_addr` (loopback inside the enclave).
pub async fn serve_enclave<L>(
    listener: L,
    prove_addr: SocketAddr,
    shutdown: ShutdownChannel,
) -> anyhow::Result<()>
where
    L: EnclaveListener + 'static,
{
    tracing::info!(%prove_addr, "bridge listening for enclave channel connections");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let conn = accepted?;
                tokio::spawn(async move {
                    if let Err(e) = forward_one_enclave(conn, prove_addr).await {
                        tracing::warn!(error = %e, "bridge connection ended");
                    }
                });
            }
            () = shutdown.recv() => {
                tracing::info!("bridge (enclave side) shutting down");
                return Ok(());
            }
        }
    }
}

async fn forward_one_enclave<C>(conn: C, prove_addr: SocketAddr) -> anyhow::Result<()>
where
    C: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let tcp = TcpStream::connect(prove_addr).await?;
    forward(tcp, conn).await
}
