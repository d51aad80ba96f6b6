//! The bidirectional byte-forwarder itself (spec §4.4): a plain stream
//! (external TCP on the host side, loopback TCP to the prove service on the
//! enclave side) on one end, the framed enclave channel on the other.
//!
//! Half-close is not relied on (spec §4.4): both directions run until
//! either side hits EOF or an error, at which point the whole connection is
//! torn down rather than left half-open.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::framing::{read_frame, write_frame, MAX_FRAME_BYTES};

/// Forward `plain` (an unframed byte stream) and `channel` (a framed one) to
/// each other until one side closes or errors.
pub async fn forward<P, C>(plain: P, channel: C) -> anyhow::Result<()>
where
    P: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (plain_read, plain_write) = tokio::io::split(plain);
    let (channel_read, channel_write) = tokio::io::split(channel);

    tokio::select! {
        res = plain_to_channel(plain_read, channel_write) => res,
        res = channel_to_plain(channel_read, plain_write) => res,
    }
}

async fn plain_to_channel<R, W>(mut plain: R, mut channel: W) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; MAX_FRAME_BYTES];
    loop {
        let n = plain.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        write_frame(&mut channel, &buf[..n]).await?;
    }
}

async fn channel_to_plain<R, W>(mut channel: R, mut plain: W) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = match read_frame(&mut channel).await {
            Ok(frame) => frame,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        plain.write_all(&frame).await?;
        plain.flush().await?;
    }
}
