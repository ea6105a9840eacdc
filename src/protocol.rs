//! Real-time channel wire messages
//!
//! ```text
//! { "op": "snapshot", "ts": "<ISO-8601>", "state":   { key: value, ... } }
//! { "op": "patch",    "ts": "<ISO-8601>", "changes": { key: value, ... } }
//! ```

use crate::state::StateMap;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Message pushed to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum SyncMessage {
    /// Full state, sent once when a subscriber connects (or resyncs)
    Snapshot { ts: String, state: StateMap },
    /// Keys committed by one poll cycle or one override
    Patch { ts: String, changes: StateMap },
}

impl SyncMessage {
    pub fn snapshot(state: StateMap) -> Self {
        SyncMessage::Snapshot {
            ts: timestamp(Utc::now()),
            state,
        }
    }

    pub fn patch(changes: StateMap) -> Self {
        SyncMessage::Patch {
            ts: timestamp(Utc::now()),
            changes,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Message a subscriber may send back
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Ask for a fresh snapshot
    Resync,
}

/// RFC 3339 UTC with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_timestamp_format() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 5).unwrap();
        assert_eq!(timestamp(at), "2024-05-01T12:30:05.000Z");
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let mut state = StateMap::new();
        state.insert("a".to_string(), "x".to_string());
        let msg = SyncMessage::Snapshot {
            ts: "2024-05-01T12:30:05.000Z".to_string(),
            state,
        };

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({ "op": "snapshot", "ts": "2024-05-01T12:30:05.000Z", "state": { "a": "x" } })
        );
    }

    #[test]
    fn test_patch_wire_shape() {
        let mut changes = StateMap::new();
        changes.insert("score".to_string(), "3-1".to_string());
        let msg = SyncMessage::patch(changes);

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["op"], "patch");
        assert_eq!(value["changes"], json!({ "score": "3-1" }));
        assert!(value["ts"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_client_resync_parses() {
        let msg: ClientMessage = serde_json::from_str(r#"{"op":"resync"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Resync);
        assert!(serde_json::from_str::<ClientMessage>(r#"{"op":"other"}"#).is_err());
    }
}
