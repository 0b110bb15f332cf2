//! Protocol codec for the probe server feed
//!
//! Every text frame is either a snapshot (`{"http": [...]}`) or a single
//! status update. Decoding is side-effect free; callers drop frames that
//! fail to decode and keep the connection open.

#![warn(missing_docs)]

use serde_json::Value;
use thiserror::Error;

use crate::types::{Snapshot, StatusUpdate, Target};

/// Codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// Payload is not JSON at all
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// Payload is JSON but not an object
    #[error("Expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// Object has an `http` key but the target list is malformed
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(#[source] serde_json::Error),

    /// Object is not a well-formed status update
    #[error("Malformed status update: {0}")]
    MalformedUpdate(#[source] serde_json::Error),
}

/// A decoded feed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Full target listing
    Snapshot(Vec<Target>),
    /// Probe result for one target
    Update(StatusUpdate),
}

impl Decoded {
    /// Short label for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Decoded::Snapshot(_) => "snapshot",
            Decoded::Update(_) => "update",
        }
    }
}

/// Decode a raw text frame
pub fn decode(payload: &str) -> Result<Decoded, CodecError> {
    let value: Value = serde_json::from_str(payload).map_err(CodecError::InvalidJson)?;

    let is_snapshot = match &value {
        Value::Object(map) => map.contains_key("http"),
        other => return Err(CodecError::NotAnObject(json_kind(other))),
    };

    if is_snapshot {
        let snapshot: Snapshot =
            serde_json::from_value(value).map_err(CodecError::MalformedSnapshot)?;
        Ok(Decoded::Snapshot(snapshot.http))
    } else {
        let update: StatusUpdate =
            serde_json::from_value(value).map_err(CodecError::MalformedUpdate)?;
        Ok(Decoded::Update(update))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Status, StatusCode};

    #[test]
    fn test_decode_snapshot() {
        let decoded = decode(
            r#"{"http":[{"name":"A","host":"h1","tag":"x","interval_s":5},{"name":"B","host":"h2","tag":"y","interval_s":60}]}"#,
        )
        .unwrap();

        match decoded {
            Decoded::Snapshot(targets) => {
                assert_eq!(targets.len(), 2);
                assert_eq!(targets[0].host, "h1");
                assert_eq!(targets[1].interval_s, 60);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_update() {
        let decoded = decode(
            r#"{"target":{"name":"A","host":"h1","tag":"x","interval_s":5},"status":"Fire","status_code":500,"time":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        match decoded {
            Decoded::Update(update) => {
                assert_eq!(update.target.host, "h1");
                assert_eq!(update.status, Status::Fire);
                assert_eq!(update.status_code, StatusCode::Numeric(500));
                assert_eq!(update.time, "2024-01-01T00:00:00Z");
                assert_eq!(update.latency_ms, None);
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_update_with_server_extras() {
        let decoded = decode(
            r#"{"alert":false,"latency_ms":42,"need_to_alert":false,"status_code":"200 OK","status_reason":"OK","status":"Okay","target":{"alert":false,"basic_auth":null,"host":"h1","interval_s":5,"name":"A","tag_metric":null,"tag":null},"time":"2024-01-01T00:00:05Z"}"#,
        )
        .unwrap();

        let Decoded::Update(update) = decoded else {
            panic!("expected update");
        };
        assert_eq!(update.latency_ms, Some(42));
        assert_eq!(update.status_reason.as_deref(), Some("OK"));
        assert_eq!(update.status_code.to_string(), "200 OK");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode("not json"), Err(CodecError::InvalidJson(_))));
        assert!(matches!(decode("[1,2]"), Err(CodecError::NotAnObject("array"))));
        assert!(matches!(
            decode(r#"{"http":"nope"}"#),
            Err(CodecError::MalformedSnapshot(_))
        ));
        assert!(matches!(
            decode(r#"{"target":{"host":"h1"},"status":"Sideways"}"#),
            Err(CodecError::MalformedUpdate(_))
        ));
    }
}
