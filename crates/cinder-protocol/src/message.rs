//! Inter-node messages.
//!
//! Peer traffic arrives on the same listener as client traffic, as one
//! JSON object per line tagged by its `"type"` field. The tag values
//! are the wire-level message names (`REPLICATE`, `HEARTBEAT`, ...).

use cinder_core::LogOp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity and address of a cluster member, as carried by
/// REGISTER_NODE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node_id: String,
    pub host: String,
    pub port: u16,
    /// "primary" or "secondary"; absent when the sender doesn't know.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// A message from one node to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PeerMessage {
    /// Inserts or updates a peer-table entry.
    #[serde(rename = "REGISTER_NODE")]
    RegisterNode { node: NodeInfo },

    /// One mutation fanned out by the primary. Only meaningful at a
    /// secondary.
    #[serde(rename = "REPLICATE")]
    Replicate {
        operation: LogOp,
        key: String,
        #[serde(default)]
        value: Option<Value>,
    },

    /// Primary liveness signal. Carries the sender's term so a stale
    /// primary (e.g. one restarted with `--primary`) can step down.
    #[serde(rename = "HEARTBEAT")]
    Heartbeat { from_node: String, term: u64 },

    /// Vote solicitation from a candidate.
    #[serde(rename = "ELECTION")]
    Election { candidate_id: String, term: u64 },

    /// Catch-up request: send me your log entries newer than
    /// `since_timestamp`.
    #[serde(rename = "SYNC")]
    Sync {
        from_node: String,
        since_timestamp: f64,
    },
}
