//! TCP listener and accept loop.

use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::node::Node;
use crate::session;

/// Binds the listener and accepts connections until shutdown.
///
/// Returns `Ok(())` when the shutdown signal fires; a bind failure
/// (port in use, bad address) surfaces as the error.
pub async fn run(
    host: &str,
    port: u16,
    node: Arc<Node>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = bind(host, port).await?;
    info!(host, port, "listening");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("shutdown requested; listener stopping");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer_addr) = accepted?;
                let node = Arc::clone(&node);
                tokio::spawn(async move {
                    if let Err(e) = session::handle(stream, node).await {
                        debug!(%peer_addr, "session error: {e}");
                    }
                });
            }
        }
    }
}

/// Binds with `SO_REUSEADDR` so a restarted node can rebind its port
/// while old sockets linger in TIME_WAIT.
async fn bind(host: &str, port: u16) -> std::io::Result<TcpListener> {
    let addr = tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("address did not resolve: {host}:{port}"),
            )
        })?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(1024)
}
