//! Status types published by the canary probe server
//!
//! These mirror the JSON the server pushes over the WebSocket feed. Targets
//! arrive once per connection inside a snapshot; status updates follow, one
//! per probe result.

#![warn(missing_docs)]

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A single monitored endpoint known to the probe server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Target {
    /// Human-readable name
    pub name: String,
    /// Probed address; unique per target
    pub host: String,
    /// Free-form tag used for client-side filtering (empty when absent)
    #[serde(default, deserialize_with = "tag_or_empty")]
    pub tag: String,
    /// Probe interval in seconds
    pub interval_s: u64,
}

fn tag_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Probe outcome
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Status {
    /// Probe could not determine health
    Unknown,
    /// Target is failing
    Fire,
    /// Target is healthy
    Okay,
}

impl Status {
    /// Icon shown alongside the status in alerts
    pub fn icon(self) -> &'static str {
        match self {
            Status::Unknown => "🚨",
            Status::Fire => "🔥",
            Status::Okay => "✅",
        }
    }

    /// Wire name of the status
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Unknown => "Unknown",
            Status::Fire => "Fire",
            Status::Okay => "Okay",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status code reported by a probe
///
/// The feed documents a number, but the server's own check model carries a
/// string (e.g. `"200 OK"`), so both forms are accepted and shown verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum StatusCode {
    /// Numeric code such as `200`
    Numeric(u64),
    /// Textual code as sent by the server
    Text(String),
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Numeric(code) => write!(f, "{}", code),
            StatusCode::Text(text) => f.write_str(text),
        }
    }
}

impl From<u64> for StatusCode {
    fn from(code: u64) -> Self {
        StatusCode::Numeric(code)
    }
}

/// Initial full listing sent once per connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    /// HTTP targets in server order
    pub http: Vec<Target>,
}

/// Latest probe result for one target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Target the result belongs to
    pub target: Target,
    /// Probe outcome
    pub status: Status,
    /// Code reported by the probe
    pub status_code: StatusCode,
    /// ISO-8601 timestamp of the probe, kept verbatim
    pub time: String,
    /// Round-trip latency, when the server reports it
    #[serde(default)]
    pub latency_ms: Option<u64>,
    /// Reason phrase, when the server reports it
    #[serde(default)]
    pub status_reason: Option<String>,
}
