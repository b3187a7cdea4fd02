//! Replication log entries.
//!
//! Every mutation applied on the node that originated it is recorded as
//! a [`LogEntry`]. The log is an append-only trace used by SYNC to let
//! peers catch up on writes they missed; it is never truncated while
//! the process lives.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of mutation an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogOp {
    Set,
    Delete,
}

/// One applied mutation.
///
/// `timestamp` is seconds since the Unix epoch, clamped non-decreasing
/// within a process so `entries newer than t` is well-defined. `value`
/// is `None` for deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: f64,
    pub operation: LogOp,
    pub key: String,
    pub value: Option<Value>,
}

/// Current wall-clock time as float seconds since the Unix epoch.
pub fn now_ts() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
