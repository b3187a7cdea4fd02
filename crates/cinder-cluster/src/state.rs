//! Role, term, vote, and peer-table state for one node.
//!
//! [`ClusterState`] implements the election rules as pure transitions:
//! callers pass in `Instant::now()` and get a typed outcome back. The
//! server holds this behind a mutex and never keeps the lock across
//! network I/O — outbound calls are made from snapshots taken here.

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::{ClusterConfig, PeerSpec, Timing};

/// The role of a node in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Serves all client reads and writes; replicates to secondaries.
    Primary,
    /// Replicates from the primary; rejects client reads and writes.
    Secondary,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Primary => "primary",
            NodeRole::Secondary => "secondary",
        }
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What this node believes about one peer.
#[derive(Debug, Clone)]
pub struct PeerState {
    pub spec: PeerSpec,
    pub role: NodeRole,
    /// When the last valid heartbeat from this peer arrived.
    pub last_heartbeat: Option<Instant>,
}

/// Result of handling an ELECTION vote request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    Granted,
    /// The candidate's term is behind ours; it should adopt `current`.
    StaleTerm { current: u64 },
    /// We already voted for a different candidate this term.
    AlreadyVoted { voted_for: String },
}

/// Result of handling a HEARTBEAT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// Heartbeat accepted; `stepped_down` is set when it carried a
    /// higher term that demoted a local primary.
    Accepted { stepped_down: bool },
    /// The sender's term is behind ours; it should adopt `current`.
    StaleTerm { current: u64 },
}

/// All mutable cluster state owned by one node.
pub struct ClusterState {
    node_id: String,
    config: ClusterConfig,
    timing: Timing,
    role: NodeRole,
    current_term: u64,
    voted_for: Option<String>,
    election_deadline: Instant,
    peers: HashMap<String, PeerState>,
    /// The peer whose heartbeat we accepted most recently — the only
    /// node a secondary can assume is the current primary, used as the
    /// SYNC target.
    primary_hint: Option<String>,
}

impl ClusterState {
    /// Builds the state for `node_id`. `bootstrap_primary` is the
    /// `--primary` hint: start in the PRIMARY role at term 0 and let
    /// term comparison resolve any conflict later.
    pub fn new(
        config: ClusterConfig,
        timing: Timing,
        node_id: impl Into<String>,
        bootstrap_primary: bool,
        now: Instant,
    ) -> Self {
        let node_id = node_id.into();
        let peers = config
            .peers_of(&node_id)
            .into_iter()
            .map(|spec| {
                (
                    spec.id.clone(),
                    PeerState { spec, role: NodeRole::Secondary, last_heartbeat: None },
                )
            })
            .collect();
        let election_deadline = now + timing.random_election_timeout();
        Self {
            node_id,
            config,
            timing,
            role: if bootstrap_primary { NodeRole::Primary } else { NodeRole::Secondary },
            current_term: 0,
            voted_for: None,
            election_deadline,
            peers,
            primary_hint: None,
        }
    }

    // -- inspection --

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn is_primary(&self) -> bool {
        self.role == NodeRole::Primary
    }

    pub fn current_term(&self) -> u64 {
        self.current_term
    }

    pub fn voted_for(&self) -> Option<&str> {
        self.voted_for.as_deref()
    }

    pub fn cluster_size(&self) -> usize {
        self.config.size()
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// The peer to pull SYNC catch-up from, if any heartbeat has been
    /// accepted yet.
    pub fn primary_hint(&self) -> Option<&PeerSpec> {
        self.primary_hint
            .as_deref()
            .and_then(|id| self.peers.get(id))
            .map(|p| &p.spec)
    }

    /// Endpoint snapshot of every peer.
    pub fn peer_specs(&self) -> Vec<PeerSpec> {
        self.peers.values().map(|p| p.spec.clone()).collect()
    }

    /// Endpoint snapshot of the peers currently believed to be
    /// secondaries — the replication fan-out targets.
    pub fn secondary_peers(&self) -> Vec<PeerSpec> {
        self.peers
            .values()
            .filter(|p| p.role == NodeRole::Secondary)
            .map(|p| p.spec.clone())
            .collect()
    }

    pub fn last_heartbeat(&self, peer_id: &str) -> Option<Instant> {
        self.peers.get(peer_id).and_then(|p| p.last_heartbeat)
    }

    // -- transitions --

    /// Adopts `term` if it is newer. Clears the vote record and demotes
    /// a primary. Returns `true` when the term advanced.
    pub fn observe_term(&mut self, term: u64, now: Instant) -> bool {
        if term <= self.current_term {
            return false;
        }
        self.current_term = term;
        self.voted_for = None;
        if self.role == NodeRole::Primary {
            self.role = NodeRole::Secondary;
            self.reset_election_deadline(now);
        }
        true
    }

    /// Applies the vote rules for an `ELECTION {candidate, term}`.
    pub fn handle_vote_request(
        &mut self,
        candidate: &str,
        term: u64,
        now: Instant,
    ) -> VoteOutcome {
        if term < self.current_term {
            return VoteOutcome::StaleTerm { current: self.current_term };
        }
        self.observe_term(term, now);

        match &self.voted_for {
            Some(voted) if voted != candidate => {
                VoteOutcome::AlreadyVoted { voted_for: voted.clone() }
            }
            _ => {
                self.voted_for = Some(candidate.to_string());
                // granting a vote is a sign of an election in progress;
                // give the candidate time before we contest
                self.reset_election_deadline(now);
                VoteOutcome::Granted
            }
        }
    }

    /// Applies a `HEARTBEAT {from, term}`.
    ///
    /// A valid heartbeat advances the sender's peer entry, marks the
    /// sender as the presumed primary, and pushes out our election
    /// deadline. A primary defends its term: a heartbeat that doesn't
    /// carry a strictly newer term is answered as stale.
    pub fn record_heartbeat(&mut self, from: &str, term: u64, now: Instant) -> HeartbeatOutcome {
        if term < self.current_term {
            return HeartbeatOutcome::StaleTerm { current: self.current_term };
        }
        if self.role == NodeRole::Primary && term == self.current_term {
            return HeartbeatOutcome::StaleTerm { current: self.current_term };
        }

        let stepped_down = self.role == NodeRole::Primary;
        self.observe_term(term, now);

        if let Some(peer) = self.peers.get_mut(from) {
            peer.last_heartbeat = Some(now);
            peer.role = NodeRole::Primary;
            self.primary_hint = Some(from.to_string());
        }
        self.reset_election_deadline(now);
        HeartbeatOutcome::Accepted { stepped_down }
    }

    /// Inserts or updates a peer-table entry from a REGISTER_NODE.
    pub fn register_node(&mut self, spec: PeerSpec, role: Option<NodeRole>) {
        let entry = self
            .peers
            .entry(spec.id.clone())
            .or_insert_with(|| PeerState {
                spec: spec.clone(),
                role: NodeRole::Secondary,
                last_heartbeat: None,
            });
        entry.spec = spec;
        if let Some(role) = role {
            entry.role = role;
        }
    }

    /// Whether the election timeout has expired for a secondary.
    pub fn election_due(&self, now: Instant) -> bool {
        self.role == NodeRole::Secondary && now >= self.election_deadline
    }

    /// Starts a candidacy: bump the term, vote for ourselves, re-arm
    /// the deadline so a lost election retries. Returns the new term.
    pub fn begin_candidacy(&mut self, now: Instant) -> u64 {
        self.current_term += 1;
        self.voted_for = Some(self.node_id.clone());
        self.reset_election_deadline(now);
        self.current_term
    }

    /// Promotes to PRIMARY if the candidacy for `term` is still live —
    /// the term hasn't moved and nobody demoted us meanwhile.
    pub fn become_primary(&mut self, term: u64) -> bool {
        if self.current_term != term || self.role != NodeRole::Secondary {
            return false;
        }
        self.role = NodeRole::Primary;
        // we won this term, so every other member is a follower now
        for peer in self.peers.values_mut() {
            peer.role = NodeRole::Secondary;
        }
        self.primary_hint = None;
        true
    }

    /// Re-draws the randomized election deadline from `now`.
    pub fn reset_election_deadline(&mut self, now: Instant) {
        self.election_deadline = now + self.timing.random_election_timeout();
    }
}
