//! Request classification.
//!
//! One listener carries both client and peer traffic. Peer messages are
//! JSON objects, so a line whose first non-space byte is `{` is decoded
//! as a [`PeerMessage`]; everything else goes through the client
//! command parser.

use crate::command::ClientCommand;
use crate::error::ProtocolError;
use crate::message::PeerMessage;

/// A classified request line.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Client(ClientCommand),
    Peer(PeerMessage),
}

/// Parses one request line into either a client command or a peer
/// message.
pub fn parse_request(line: &str) -> Result<Request, ProtocolError> {
    let trimmed = line.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed)
            .map(Request::Peer)
            .map_err(|e| ProtocolError::InvalidPeerMessage(e.to_string()));
    }
    ClientCommand::parse(trimmed).map(Request::Client)
}
