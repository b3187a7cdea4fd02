//! Static cluster membership and protocol timing.
//!
//! Membership is fixed at startup and identical on every node. The
//! canonical deployment is three nodes on localhost; the test harness
//! overrides it to run clusters on free ports.

use std::time::Duration;

use rand::Rng;

use crate::error::ClusterError;

/// Identity and endpoint of one configured member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSpec {
    pub id: String,
    pub host: String,
    pub port: u16,
}

impl PeerSpec {
    /// Parses the `id@host:port` form used by `--peers`.
    pub fn parse(s: &str) -> Result<Self, ClusterError> {
        let invalid = || ClusterError::InvalidPeerSpec(s.to_string());
        let (id, addr) = s.split_once('@').ok_or_else(invalid)?;
        let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
        if id.is_empty() || host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse().map_err(|_| invalid())?;
        Ok(Self {
            id: id.to_string(),
            host: host.to_string(),
            port,
        })
    }

    /// `host:port`, as passed to a connector.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The full cluster membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    nodes: Vec<PeerSpec>,
}

impl ClusterConfig {
    pub fn new(nodes: Vec<PeerSpec>) -> Self {
        Self { nodes }
    }

    /// The canonical three-node localhost cluster.
    pub fn canonical() -> Self {
        Self::new(vec![
            PeerSpec { id: "node1".into(), host: "127.0.0.1".into(), port: 6379 },
            PeerSpec { id: "node2".into(), host: "127.0.0.1".into(), port: 6380 },
            PeerSpec { id: "node3".into(), host: "127.0.0.1".into(), port: 6381 },
        ])
    }

    /// Number of configured members.
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[PeerSpec] {
        &self.nodes
    }

    /// The member named `id`, or an error if it isn't configured.
    pub fn member(&self, id: &str) -> Result<&PeerSpec, ClusterError> {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .ok_or_else(|| ClusterError::UnknownNode(id.to_string()))
    }

    /// Every member except `id`.
    pub fn peers_of(&self, id: &str) -> Vec<PeerSpec> {
        self.nodes.iter().filter(|n| n.id != id).cloned().collect()
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Protocol timing knobs.
///
/// Defaults follow the protocol contract: primaries heartbeat every
/// 2 s, secondaries call an election 5–8 s (uniform, re-drawn on every
/// reset) after the last accepted heartbeat, and every peer RPC is
/// bounded by 2 s. Tests shrink these to keep deadline arithmetic fast.
#[derive(Debug, Clone)]
pub struct Timing {
    /// How often a primary announces itself to every peer.
    pub heartbeat_interval: Duration,
    /// Lower bound of the randomized election timeout.
    pub election_timeout_min: Duration,
    /// Upper bound of the randomized election timeout.
    pub election_timeout_max: Duration,
    /// Per-call budget for one peer RPC (connect + send + read).
    pub peer_call_timeout: Duration,
    /// How often a secondary pulls missed log entries via SYNC.
    pub sync_interval: Duration,
}

impl Timing {
    /// Draws a fresh election timeout, uniform over the configured
    /// range.
    pub fn random_election_timeout(&self) -> Duration {
        let min = self.election_timeout_min.as_millis() as u64;
        let max = self.election_timeout_max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(2),
            election_timeout_min: Duration::from_secs(5),
            election_timeout_max: Duration::from_secs(8),
            peer_call_timeout: Duration::from_secs(2),
            sync_interval: Duration::from_secs(10),
        }
    }
}
