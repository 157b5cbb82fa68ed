//! Length-prefixed framing shared by every channel.
//!
//! # Frame layout
//!
//! ```text
//! [0..4]  length   u32 BE
//! [4..]   payload  [u8]   plaintext (screen) or ChaCha20 ciphertext (rest)
//! ```
//!
//! `recv_frame` distinguishes a clean EOF (peer closed before any byte —
//! returns `Ok(None)`) from a mid-frame disconnect (fewer bytes than
//! declared — a protocol error).

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use pairview_core::{ConnectionError, PairViewError, ProtocolError};

/// Upper bound on a declared payload length.  Base64 JPEG screen frames at
/// the default resolution stay well under this.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Write a 4-byte big-endian length followed by `payload` as one logical
/// write.
pub async fn send_frame<W>(stream: &mut W, payload: &[u8]) -> Result<(), PairViewError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);

    stream
        .write_all(&buf)
        .await
        .map_err(ConnectionError::Send)?;
    stream.flush().await.map_err(ConnectionError::Send)?;
    debug!("sent frame ({} bytes)", payload.len());
    Ok(())
}

/// Read one frame.  `Ok(None)` means the peer closed cleanly before the
/// length prefix; a close after any byte of a frame is a
/// [`ProtocolError::ShortFrame`].
pub async fn recv_frame<R>(stream: &mut R) -> Result<Option<Bytes>, PairViewError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match read_full(stream, &mut len_buf).await.map_err(ConnectionError::Recv)? {
        0 => return Ok(None),
        4 => {}
        got => return Err(ProtocolError::ShortFrame { expected: 4, got }.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge { len }.into());
    }

    let mut payload = vec![0u8; len];
    let got = read_full(stream, &mut payload).await.map_err(ConnectionError::Recv)?;
    if got < len {
        return Err(ProtocolError::ShortFrame { expected: len, got }.into());
    }
    debug!("received frame ({len} bytes)");
    Ok(Some(Bytes::from(payload)))
}

/// Read until `buf` is full or the peer closes; returns bytes read.
async fn read_full<R>(stream: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
