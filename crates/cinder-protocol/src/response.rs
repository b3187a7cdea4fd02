//! The JSON response envelope.
//!
//! Every request gets exactly one response line: a JSON object with a
//! `"status"` field plus whichever extra fields the command calls for.
//! Absent fields are omitted from the wire form entirely.

use cinder_core::LogEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome marker carried in every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
}

/// One wire response.
///
/// Constructors cover the envelope shapes the protocol uses; fields stay
/// public so tests and the peer client can inspect whatever came back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub election_term: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<LogEntry>>,
}

impl Response {
    fn base(status: Status) -> Self {
        Self {
            status,
            message: None,
            value: None,
            node_id: None,
            role: None,
            election_term: None,
            term: None,
            entries: None,
        }
    }

    /// Bare `{"status":"OK"}`.
    pub fn ok() -> Self {
        Self::base(Status::Ok)
    }

    pub fn ok_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::base(Status::Ok)
        }
    }

    /// GET success: `{"status":"OK","value":<v>}`.
    pub fn ok_value(value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::base(Status::Ok)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::base(Status::Error)
        }
    }

    /// STATUS success.
    pub fn node_status(node_id: impl Into<String>, role: impl Into<String>, term: u64) -> Self {
        Self {
            node_id: Some(node_id.into()),
            role: Some(role.into()),
            election_term: Some(term),
            ..Self::base(Status::Ok)
        }
    }

    /// Vote granted for `term`.
    pub fn vote_granted(term: u64) -> Self {
        Self {
            message: Some("Vote granted".into()),
            term: Some(term),
            ..Self::base(Status::Ok)
        }
    }

    /// Refusal that carries the receiver's current term so the caller
    /// can adopt it — used for stale-term and already-voted answers.
    pub fn error_with_term(message: impl Into<String>, term: u64) -> Self {
        Self {
            message: Some(message.into()),
            term: Some(term),
            ..Self::base(Status::Error)
        }
    }

    /// SYNC success carrying the requested log tail.
    pub fn log_entries(entries: Vec<LogEntry>) -> Self {
        Self {
            entries: Some(entries),
            ..Self::base(Status::Ok)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Serializes to the wire form: one JSON object plus the line
    /// terminator.
    pub fn to_line(&self) -> String {
        // the envelope contains no map keys that can fail to serialize
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"status":"ERROR","message":"Response serialization failed"}"#.to_string()
        });
        line.push('\n');
        line
    }
}
