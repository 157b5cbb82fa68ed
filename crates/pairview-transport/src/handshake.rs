//! Password handshake, carried on the screen channel.
//!
//! ```text
//! client                         host
//!   │  frame(password)            │   Listening → AwaitingPassword
//!   ├────────────────────────────►│
//!   │                             │   byte-compare against own password
//!   │  "AUTH_SUCCESS " + nonce    │   → Authenticated
//!   │◄────────────────────────────┤
//!   │         — or —              │
//!   │  "AUTH_FAILED"              │   → Rejected, connection closed
//!   │◄────────────────────────────┤
//! ```
//!
//! The response is raw bytes, not a length-prefixed frame (legacy wire
//! shape).  This exchange is the sole distribution point for the session
//! key material; the other channels trust their ports once it succeeds.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use pairview_core::{AuthenticationError, ConnectionError, PairViewError};

use crate::crypto::NONCE_LEN;
use crate::framing::{recv_frame, send_frame};

pub const AUTH_SUCCESS: &[u8] = b"AUTH_SUCCESS ";
pub const AUTH_FAILED: &[u8] = b"AUTH_FAILED";

/// Largest handshake response the client will buffer.
const RESPONSE_LIMIT: usize = 1024;

/// Host side: read the client's claimed password and answer it.
///
/// Returns `Ok(true)` when the client authenticated and the connection may
/// move on to screen streaming; `Ok(false)` when it was rejected (or
/// vanished mid-handshake) and the caller should drop the socket.
pub async fn respond<S>(stream: &mut S, password: &str, nonce: &str) -> Result<bool, PairViewError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(claimed) = recv_frame(stream).await? else {
        warn!("peer closed during authentication");
        return Ok(false);
    };

    if claimed.as_ref() != password.as_bytes() {
        warn!("password mismatch — rejecting peer");
        // Best effort: the peer may already be gone.
        let _ = stream.write_all(AUTH_FAILED).await;
        let _ = stream.flush().await;
        return Ok(false);
    }

    let mut reply = Vec::with_capacity(AUTH_SUCCESS.len() + nonce.len());
    reply.extend_from_slice(AUTH_SUCCESS);
    reply.extend_from_slice(nonce.as_bytes());
    stream.write_all(&reply).await.map_err(ConnectionError::Send)?;
    stream.flush().await.map_err(ConnectionError::Send)?;

    info!("peer authenticated");
    Ok(true)
}

/// Client side: present `password` and wait for the verdict.
///
/// Returns the session nonce on acceptance.
pub async fn initiate<S>(stream: &mut S, password: &str) -> Result<String, PairViewError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    send_frame(stream, password.as_bytes()).await?;

    let mut buf = Vec::with_capacity(64);
    loop {
        if buf.starts_with(AUTH_FAILED) {
            warn!("authentication failed — password rejected");
            return Err(AuthenticationError::Rejected.into());
        }
        if buf.len() >= AUTH_SUCCESS.len() + NONCE_LEN {
            break;
        }

        let mut chunk = [0u8; 64];
        let n = stream.read(&mut chunk).await.map_err(ConnectionError::Recv)?;
        if n == 0 {
            // Closed before a complete verdict.
            if buf.starts_with(AUTH_FAILED) {
                return Err(AuthenticationError::Rejected.into());
            }
            return Err(AuthenticationError::MalformedResponse.into());
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > RESPONSE_LIMIT {
            return Err(AuthenticationError::MalformedResponse.into());
        }
    }

    if !buf.starts_with(AUTH_SUCCESS) {
        return Err(AuthenticationError::MalformedResponse.into());
    }

    let nonce = &buf[AUTH_SUCCESS.len()..AUTH_SUCCESS.len() + NONCE_LEN];
    let nonce = std::str::from_utf8(nonce)
        .map_err(|_| AuthenticationError::MalformedResponse)?
        .to_owned();

    info!("authenticated, nonce received");
    Ok(nonce)
}
