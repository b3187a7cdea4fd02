//! cinder-protocol: the line-delimited wire protocol.
//!
//! Clients and peers share one TCP listener. Every request is a single
//! `\n`-terminated line; every response is a single `\n`-terminated
//! JSON object. A line whose first non-space byte is `{` is a peer
//! message (a JSON object with a `"type"` field); anything else is a
//! plain-text client command dispatched on its first token.
//!
//! Parsing here is pure and synchronous — reading lines off the socket
//! is the server's job.
//!
//! # quick start
//!
//! ```
//! use cinder_protocol::{parse_request, ClientCommand, Request};
//!
//! let req = parse_request("GET user:1").unwrap();
//! assert_eq!(req, Request::Client(ClientCommand::Get { key: "user:1".into() }));
//! ```

pub mod command;
pub mod error;
pub mod message;
pub mod request;
pub mod response;

pub use command::ClientCommand;
pub use error::ProtocolError;
pub use message::{NodeInfo, PeerMessage};
pub use request::{parse_request, Request};
pub use response::{Response, Status};
