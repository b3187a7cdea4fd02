//! Client command parsing.
//!
//! Client commands are plain text: an uppercase-insensitive keyword,
//! then whitespace-separated arguments. The SET value is special — it
//! is the raw remainder of the line, decoded as JSON when possible and
//! stored as a string otherwise, so clients can write scalars, arrays,
//! and objects without extra quoting rules.

use serde_json::Value;

use crate::error::ProtocolError;

/// A parsed client command, ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    /// SET <key> <value>. Upserts; the value is JSON or a raw string.
    Set { key: String, value: Value },

    /// GET <key>. Returns the value or a key-not-found error.
    Get { key: String },

    /// DELETE <key>. Removes the key if present.
    Delete { key: String },

    /// PING. Liveness check, answered by any role.
    Ping,

    /// STATUS. Reports node id, role, and election term.
    Status,

    /// SHUTDOWN. Orderly process exit.
    Shutdown,

    /// FLUSH. Persistence stub — the store is memory-only.
    Flush,

    /// SNAPSHOT. Persistence stub — the store is memory-only.
    Snapshot,
}

impl ClientCommand {
    /// Parses one request line into a command.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ProtocolError::Empty);
        }

        let (keyword, rest) = split_token(line);
        match keyword.to_ascii_uppercase().as_str() {
            "SET" => {
                let (key, raw_value) = split_token(rest);
                if key.is_empty() || raw_value.is_empty() {
                    return Err(ProtocolError::WrongArity("SET <key> <value>"));
                }
                Ok(Self::Set {
                    key: key.to_string(),
                    value: parse_value(raw_value),
                })
            }
            "GET" => Ok(Self::Get {
                key: single_key(rest, "GET <key>")?,
            }),
            "DELETE" => Ok(Self::Delete {
                key: single_key(rest, "DELETE <key>")?,
            }),
            "PING" => no_args(rest, Self::Ping, "PING"),
            "STATUS" => no_args(rest, Self::Status, "STATUS"),
            "SHUTDOWN" => no_args(rest, Self::Shutdown, "SHUTDOWN"),
            "FLUSH" => no_args(rest, Self::Flush, "FLUSH"),
            "SNAPSHOT" => no_args(rest, Self::Snapshot, "SNAPSHOT"),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

/// Splits off the first whitespace-delimited token; the remainder starts
/// at its first non-space character.
fn split_token(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(idx) => (&s[..idx], s[idx..].trim_start()),
        None => (s, ""),
    }
}

fn single_key(rest: &str, usage: &'static str) -> Result<String, ProtocolError> {
    let (key, trailing) = split_token(rest);
    if key.is_empty() || !trailing.is_empty() {
        return Err(ProtocolError::WrongArity(usage));
    }
    Ok(key.to_string())
}

fn no_args(
    rest: &str,
    command: ClientCommand,
    usage: &'static str,
) -> Result<ClientCommand, ProtocolError> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(ProtocolError::WrongArity(usage))
    }
}

/// Decodes a SET value: JSON when it parses, otherwise the raw text as
/// a string (with one pair of surrounding double quotes stripped, so a
/// client that quotes without escaping still round-trips).
fn parse_value(raw: &str) -> Value {
    if let Ok(value) = serde_json::from_str(raw) {
        return value;
    }
    let stripped = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);
    Value::String(stripped.to_string())
}
