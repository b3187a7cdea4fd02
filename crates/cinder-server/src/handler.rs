//! Request execution.
//!
//! Takes one parsed request line and produces exactly one response.
//! Client reads and writes are admitted only on the primary; peer
//! messages are accepted in any role, with REPLICATE additionally
//! refused at a primary (it is not a replication target).

use cinder_cluster::{HeartbeatOutcome, NodeRole, PeerSpec, VoteOutcome};
use cinder_core::LogOp;
use cinder_protocol::{parse_request, ClientCommand, PeerMessage, Request, Response};
use tracing::debug;

use crate::node::Node;

const NOT_PRIMARY: &str = "This node is not primary. Client operations must go to the current primary.";

/// What the session should do with the produced response.
pub enum Action {
    /// Write the response and keep the session going.
    Reply(Response),
    /// Write the response, then begin process shutdown.
    Shutdown(Response),
}

/// Executes one request line.
pub fn handle_line(node: &Node, line: &str) -> Action {
    match parse_request(line) {
        Ok(Request::Client(command)) => handle_client(node, command),
        Ok(Request::Peer(message)) => Action::Reply(handle_peer(node, message)),
        Err(e) => Action::Reply(Response::error(e.to_string())),
    }
}

fn handle_client(node: &Node, command: ClientCommand) -> Action {
    let response = match command {
        ClientCommand::Set { key, value } => {
            if !node.cluster.is_primary() {
                Response::error(NOT_PRIMARY)
            } else {
                node.store.set(&key, value.clone());
                node.replicator.replicate(LogOp::Set, &key, Some(value));
                Response::ok_message(format!("Key '{key}' set"))
            }
        }

        ClientCommand::Get { key } => {
            if !node.cluster.is_primary() {
                Response::error(NOT_PRIMARY)
            } else {
                match node.store.get(&key) {
                    Some(value) => Response::ok_value(value),
                    None => Response::error(format!("Key '{key}' not found")),
                }
            }
        }

        ClientCommand::Delete { key } => {
            if !node.cluster.is_primary() {
                Response::error(NOT_PRIMARY)
            } else if node.store.delete(&key) {
                node.replicator.replicate(LogOp::Delete, &key, None);
                Response::ok()
            } else {
                Response::error(format!("Key '{key}' not found"))
            }
        }

        ClientCommand::Ping => Response::ok_message("PONG"),

        ClientCommand::Status => {
            let (role, term) = node.cluster.status();
            Response::node_status(node.cluster.node_id(), role.as_str(), term)
        }

        ClientCommand::Shutdown => {
            return Action::Shutdown(Response::ok_message("Server shutting down"));
        }

        // the store is memory-only; these exist as protocol stubs
        ClientCommand::Flush | ClientCommand::Snapshot => {
            Response::ok_message("No persistence enabled")
        }
    };
    Action::Reply(response)
}

fn handle_peer(node: &Node, message: PeerMessage) -> Response {
    match message {
        PeerMessage::RegisterNode { node: info } => {
            let role = match info.role.as_deref() {
                Some("primary") => Some(NodeRole::Primary),
                Some("secondary") => Some(NodeRole::Secondary),
                _ => None,
            };
            node.cluster.register_node(
                PeerSpec {
                    id: info.node_id,
                    host: info.host,
                    port: info.port,
                },
                role,
            );
            Response::ok()
        }

        PeerMessage::Replicate { operation, key, value } => {
            if node.cluster.is_primary() {
                Response::error("This node is primary and not a replication target")
            } else {
                node.store.apply_replicated(operation, &key, value);
                Response::ok()
            }
        }

        PeerMessage::Heartbeat { from_node, term } => {
            match node.cluster.handle_heartbeat(&from_node, term) {
                HeartbeatOutcome::Accepted { .. } => Response::ok(),
                HeartbeatOutcome::StaleTerm { current } => {
                    Response::error_with_term("Stale term", current)
                }
            }
        }

        PeerMessage::Election { candidate_id, term } => {
            let (outcome, current) = node.cluster.handle_vote_request(&candidate_id, term);
            match outcome {
                VoteOutcome::Granted => Response::vote_granted(current),
                VoteOutcome::StaleTerm { .. } => Response::error_with_term("Stale term", current),
                VoteOutcome::AlreadyVoted { .. } => {
                    Response::error_with_term("Already voted", current)
                }
            }
        }

        PeerMessage::Sync { from_node, since_timestamp } => {
            let entries = node.store.entries_since(since_timestamp);
            debug!(
                from = %from_node,
                since = since_timestamp,
                count = entries.len(),
                "serving sync request"
            );
            Response::log_entries(entries)
        }
    }
}
