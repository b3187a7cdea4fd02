//! cinder-cluster: the cluster state machine.
//!
//! Owns everything a node knows about its cluster: static membership,
//! its own role and term, the vote record, the peer table with
//! heartbeat timestamps, and the election deadline. Everything here is
//! pure state — no sockets, no tasks — so each transition rule is
//! directly unit-testable. cinder-server wraps [`ClusterState`] in a
//! mutex and drives it from timers and incoming messages.

pub mod config;
pub mod election;
pub mod error;
pub mod state;

pub use config::{ClusterConfig, PeerSpec, Timing};
pub use election::VoteTally;
pub use error::ClusterError;
pub use state::{ClusterState, HeartbeatOutcome, NodeRole, PeerState, VoteOutcome};
