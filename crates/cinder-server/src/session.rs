//! Per-connection session.
//!
//! Reads newline-terminated request lines from a TCP stream, executes
//! each through the handler, and writes one JSON response line per
//! request. Several lines arriving in one read are each answered, in
//! order, with the responses batched into a single write. Malformed
//! lines get an error reply and the session continues; disconnects and
//! I/O errors end the session without ceremony.

use std::sync::Arc;

use bytes::BytesMut;
use cinder_protocol::Response;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::handler::{self, Action};
use crate::node::Node;

/// Initial read buffer capacity; covers typical request lines without
/// reallocating.
const BUF_CAPACITY: usize = 4096;

/// Ceiling on buffered bytes without a newline. A client streaming an
/// endless unterminated line gets disconnected instead of growing the
/// buffer forever.
const MAX_BUF_SIZE: usize = 16 * 1024 * 1024;

/// Drives one client or peer connection to completion.
pub async fn handle(mut stream: TcpStream, node: Arc<Node>) -> std::io::Result<()> {
    let mut buf = BytesMut::with_capacity(BUF_CAPACITY);
    let mut out = BytesMut::with_capacity(BUF_CAPACITY);

    loop {
        if buf.len() > MAX_BUF_SIZE {
            let resp = Response::error("Request line too long");
            let _ = stream.write_all(resp.to_line().as_bytes()).await;
            return Ok(());
        }

        if stream.read_buf(&mut buf).await? == 0 {
            return Ok(()); // clean disconnect
        }

        // answer every complete line in the buffer, batching the writes
        out.clear();
        let mut shutdown_requested = false;
        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let raw = buf.split_to(pos + 1);
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);

            match handler::handle_line(&node, &line) {
                Action::Reply(resp) => out.extend_from_slice(resp.to_line().as_bytes()),
                Action::Shutdown(resp) => {
                    out.extend_from_slice(resp.to_line().as_bytes());
                    shutdown_requested = true;
                    break;
                }
            }
        }

        if !out.is_empty() {
            stream.write_all(&out).await?;
        }

        if shutdown_requested {
            // the acknowledgment is on the wire; now take the node down
            let _ = stream.flush().await;
            node.begin_shutdown();
            return Ok(());
        }
    }
}
