//! The in-memory key space.
//!
//! One mutex guards the map and the replication log together, so a
//! mutation and its log append are a single atomic step. The lock is
//! held only for the duration of one operation — callers must never
//! hold it across network I/O.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use crate::log::{now_ts, LogEntry, LogOp};

/// Thread-safe in-memory store with an append-only replication log.
///
/// Locally originated mutations ([`set`](Store::set) and
/// [`delete`](Store::delete)) are logged; replicated applies
/// ([`apply_replicated`](Store::apply_replicated),
/// [`apply_log_entry`](Store::apply_log_entry)) are not, which keeps
/// the log a trace of writes this node originated and prevents
/// replication loops.
#[derive(Debug, Default)]
pub struct Store {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    map: HashMap<String, Value>,
    log: Vec<LogEntry>,
    /// Timestamp of the newest entry applied from a peer's log via SYNC,
    /// in that peer's clock domain. Used as the `since_timestamp` of the
    /// next SYNC request.
    sync_cursor: f64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// A poisoned lock only means another thread panicked mid-operation;
    /// the map itself is still coherent, so keep serving.
    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Upserts `key` and appends a SET entry to the log. Always succeeds.
    pub fn set(&self, key: &str, value: Value) {
        let mut inner = self.locked();
        let timestamp = inner.next_timestamp();
        inner.map.insert(key.to_string(), value.clone());
        inner.log.push(LogEntry {
            timestamp,
            operation: LogOp::Set,
            key: key.to_string(),
            value: Some(value),
        });
    }

    /// Returns a clone of the value, or `None` if the key is absent.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.locked().map.get(key).cloned()
    }

    /// Removes `key` if present. Appends a DELETE entry only when the
    /// key existed; a miss has no side effects.
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.locked();
        if inner.map.remove(key).is_none() {
            return false;
        }
        let timestamp = inner.next_timestamp();
        inner.log.push(LogEntry {
            timestamp,
            operation: LogOp::Delete,
            key: key.to_string(),
            value: None,
        });
        true
    }

    /// Applies a mutation received from the primary without logging it.
    ///
    /// A replicated SET that somehow carries no value stores JSON null
    /// rather than failing — the primary has already acknowledged the
    /// write, so the secondary's job is to converge, not to veto.
    pub fn apply_replicated(&self, operation: LogOp, key: &str, value: Option<Value>) {
        let mut inner = self.locked();
        match operation {
            LogOp::Set => {
                inner
                    .map
                    .insert(key.to_string(), value.unwrap_or(Value::Null));
            }
            LogOp::Delete => {
                inner.map.remove(key);
            }
        }
    }

    /// Applies one entry from a peer's log (SYNC catch-up) and advances
    /// the sync cursor past it.
    pub fn apply_log_entry(&self, entry: &LogEntry) {
        let mut inner = self.locked();
        match entry.operation {
            LogOp::Set => {
                inner
                    .map
                    .insert(entry.key.clone(), entry.value.clone().unwrap_or(Value::Null));
            }
            LogOp::Delete => {
                inner.map.remove(&entry.key);
            }
        }
        if entry.timestamp > inner.sync_cursor {
            inner.sync_cursor = entry.timestamp;
        }
    }

    /// The `since_timestamp` to use for the next SYNC request.
    pub fn sync_cursor(&self) -> f64 {
        self.locked().sync_cursor
    }

    /// Log entries strictly newer than `since`, in append order.
    pub fn entries_since(&self, since: f64) -> Vec<LogEntry> {
        self.locked()
            .log
            .iter()
            .filter(|e| e.timestamp > since)
            .cloned()
            .collect()
    }

    /// A consistent copy of the entire map.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.locked().map.clone()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.locked().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locked().map.is_empty()
    }

    /// Number of locally originated log entries.
    pub fn log_len(&self) -> usize {
        self.locked().log.len()
    }
}

impl Inner {
    /// Wall-clock timestamp clamped so log order and timestamp order
    /// never disagree, even if the clock steps backwards.
    fn next_timestamp(&self) -> f64 {
        let now = now_ts();
        match self.log.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        }
    }
}
