//! Protocol error types.

use thiserror::Error;

/// Errors produced while parsing a request line.
///
/// All of these are reported back to the client as an ERROR envelope;
/// none of them terminate the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The request line was empty or all whitespace.
    #[error("Empty command")]
    Empty,

    /// The first token didn't match any known command.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// A known command was given the wrong number of arguments.
    #[error("Usage: {0}")]
    WrongArity(&'static str),

    /// The line looked like a peer message (leading `{`) but didn't
    /// decode as one.
    #[error("Invalid peer message: {0}")]
    InvalidPeerMessage(String),
}
