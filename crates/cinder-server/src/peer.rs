//! One-shot peer RPC client.
//!
//! Opens a fresh connection to a peer, writes one JSON message line,
//! reads one JSON response line, and closes. Every call — connect,
//! write, and read together — is bounded by the caller's budget, so a
//! dead peer costs at most one timeout. Used by the replicator, the
//! heartbeat emitter, elections, and SYNC catch-up.

use std::time::Duration;

use bytes::BytesMut;
use cinder_protocol::{PeerMessage, Response};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Errors from a single peer call. All of them are absorbed by the
/// caller — a failed peer RPC never propagates to a client.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("call timed out")]
    Timeout,

    #[error("peer closed the connection before responding")]
    ConnectionClosed,

    #[error("message codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Sends `msg` to `addr` and waits for the one-line response, all
/// within `budget`.
pub async fn call(addr: &str, msg: &PeerMessage, budget: Duration) -> Result<Response, PeerError> {
    tokio::time::timeout(budget, call_inner(addr, msg))
        .await
        .map_err(|_| PeerError::Timeout)?
}

async fn call_inner(addr: &str, msg: &PeerMessage) -> Result<Response, PeerError> {
    let mut stream = TcpStream::connect(addr).await?;

    let mut line = serde_json::to_string(msg)?;
    line.push('\n');
    stream.write_all(line.as_bytes()).await?;

    let mut buf = BytesMut::with_capacity(4096);
    loop {
        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let raw = buf.split_to(pos + 1);
            let response = serde_json::from_slice(&raw[..raw.len() - 1])?;
            return Ok(response);
        }
        let n = stream.read_buf(&mut buf).await?;
        if n == 0 {
            return Err(PeerError::ConnectionClosed);
        }
    }
}
