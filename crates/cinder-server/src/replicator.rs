//! Primary → secondary write fan-out.
//!
//! Invoked by the command handler after a successful local mutation.
//! The outbound RPCs run in spawned tasks so the client response never
//! waits on the network; failures are counted and logged and the sync
//! task repairs them later. The primary has already acknowledged the
//! write by the time a replica proves unreachable — there is nothing
//! to roll back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cinder_core::LogOp;
use cinder_protocol::PeerMessage;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cluster_manager::ClusterManager;

pub struct Replicator {
    node_id: String,
    cluster: Arc<ClusterManager>,
    failures: Arc<AtomicU64>,
}

impl Replicator {
    pub fn new(node_id: impl Into<String>, cluster: Arc<ClusterManager>) -> Self {
        Self {
            node_id: node_id.into(),
            cluster,
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Fans one mutation out to every peer currently believed to be a
    /// secondary. Returns immediately.
    pub fn replicate(&self, operation: LogOp, key: &str, value: Option<Value>) {
        let peers = self.cluster.secondary_peers();
        let budget = self.cluster.timing().peer_call_timeout;

        for peer in peers {
            let msg = PeerMessage::Replicate {
                operation,
                key: key.to_string(),
                value: value.clone(),
            };
            let failures = Arc::clone(&self.failures);
            let from = self.node_id.clone();
            tokio::spawn(async move {
                match crate::peer::call(&peer.addr(), &msg, budget).await {
                    Ok(resp) if resp.is_ok() => {
                        debug!(peer = %peer.id, key = %msg_key(&msg), "replicated");
                    }
                    Ok(resp) => {
                        failures.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            node = %from,
                            peer = %peer.id,
                            reply = resp.message.as_deref().unwrap_or(""),
                            "replication refused"
                        );
                    }
                    Err(e) => {
                        failures.fetch_add(1, Ordering::Relaxed);
                        warn!(node = %from, peer = %peer.id, "replication not delivered: {e}");
                    }
                }
            });
        }
    }

    /// Total replication calls that failed or were refused since
    /// startup.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

fn msg_key(msg: &PeerMessage) -> &str {
    match msg {
        PeerMessage::Replicate { key, .. } => key,
        _ => "",
    }
}
