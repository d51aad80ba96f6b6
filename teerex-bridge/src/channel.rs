//! The enclave channel (spec §4.4): the platform's hypervisor-mediated
//! datagram/stream socket between an untrusted host and the enclave's
//! interior. A real Nitro/SGX deployment backs this with a vsock; this demo
//! build stands in with a Unix domain socket (a documented Open Question
//! resolution, see DESIGN.md) so the framing and forwarding logic in
//! [`crate::forward`] can be exercised without real enclave hardware. A real
//! deployment swaps in a vsock implementation behind the same traits.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{UnixListener, UnixStream};

/// The host side of the channel: dial out to the enclave interior.
#[async_trait]
pub trait EnclaveChannel: Send + Sync {
    type Conn: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn connect(&self) -> io::Result<Self::Conn>;
}

/// The enclave side of the channel: accept connections from the host.
#[async_trait]
pub trait EnclaveListener: Send + Sync {
    type Conn: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn accept(&self) -> io::Result<Self::Conn>;
}

/// Dials a fixed Unix domain socket path, standing in for a vsock `connect`.
pub struct UnixChannel {
    path: PathBuf,
}

impl UnixChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EnclaveChannel for UnixChannel {
    type Conn = UnixStream;

    async fn connect(&self) -> io::Result<Self::Conn> {
        UnixStream::connect(&self.path).await
    }
}

/// Binds a fixed Unix domain socket path, standing in for a vsock `accept`.
pub struct UnixChannelListener {
    inner: UnixListener,
}

impl UnixChannelListener {
    /// Removes a stale socket file left by a prior run before binding, the
    /// same way a fresh vsock port is simply re-bound on enclave restart.
    pub fn bind(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(Self {
            inner: UnixListener::bind(path)?,
        })
    }
}

#[async_trait]
impl EnclaveListener for UnixChannelListener {
    type Conn = UnixStream;

    async fn accept(&self) -> io::Result<Self::Conn> {
        let (stream, _addr) = self.inner.accept().await?;
        Ok(stream)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn connect_and_accept_carry_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.sock");
        let listener = UnixChannelListener::bind(&path).unwrap();
        let channel = UnixChannel::new(&path);

        let server = tokio::spawn(async move {
            let mut conn = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            conn.read_exact(&mut buf).await.unwrap();
            conn.write_all(b"world").await.unwrap();
        });

        let mut conn = channel.connect().await.unwrap();
        conn.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"world");

        server.await.unwrap();
    }
}
