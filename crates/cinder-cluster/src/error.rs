//! Cluster error types.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClusterError {
    /// A `--peers` entry didn't match the `id@host:port` form.
    #[error("invalid peer spec '{0}': expected id@host:port")]
    InvalidPeerSpec(String),

    /// The local `--node-id` is not part of the configured membership.
    #[error("node id '{0}' is not in the cluster membership")]
    UnknownNode(String),
}
