//! Wire protocol for the repository watcher connection.
//!
//! Outbound requests are tagged by `action`; inbound frames are tagged
//! by `type`, and the only recognized type is `refresh`. Refresh events
//! come in two shapes: a full snapshot (`counts`) that replaces the
//! whole view, and a single-repository delta that upserts by key. The
//! canonical delta field names are `repository`/`stars`; the historical
//! `repo`/`count` aliases are accepted on decode only and never
//! re-emitted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::WatchInterval;

pub const REFRESH_TYPE: &str = "refresh";

/// Client -> watcher request, tagged by `action`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientRequest {
    Subscribe {
        repository: String,
        interval: WatchInterval,
    },
    Unsubscribe {
        repository: String,
    },
}

/// Watcher -> client refresh event, canonical internal form.
///
/// The `kind` discriminant is always written on encode. On decode it is
/// honored when present; legacy frames that predate the discriminant
/// fall back to shape inference (`counts` means snapshot, a repository
/// plus star count means delta).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefreshEvent {
    Snapshot(SnapshotCounts),
    Delta(StarDelta),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotCounts {
    pub counts: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StarDelta {
    #[serde(alias = "repo")]
    pub repository: String,
    #[serde(alias = "count")]
    pub stars: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("message encode failed: {0}")]
    Encode(String),
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("unknown message kind: {0}")]
    UnknownKind(String),
}

pub fn encode_request(request: &ClientRequest) -> Result<String, WireError> {
    serde_json::to_string(request).map_err(|err| WireError::Encode(err.to_string()))
}

/// Encodes a refresh event the way the watcher emits it, with the
/// outer `type` tag. Used by tests and service stubs; the dashboard
/// itself only decodes.
pub fn encode_event(event: &RefreshEvent) -> Result<String, WireError> {
    let mut value =
        serde_json::to_value(event).map_err(|err| WireError::Encode(err.to_string()))?;
    let Some(object) = value.as_object_mut() else {
        return Err(WireError::Encode("refresh event is not an object".to_string()));
    };
    object.insert("type".to_string(), Value::String(REFRESH_TYPE.to_string()));
    serde_json::to_string(&value).map_err(|err| WireError::Encode(err.to_string()))
}

/// Decodes one inbound text frame into the canonical event type.
///
/// Frames with an unrecognized `type` are `UnknownKind`; anything that
/// is not a JSON object with a string `type`, or that matches neither
/// refresh shape, is `Malformed`. Both are non-fatal to the caller.
pub fn decode_event(text: &str) -> Result<RefreshEvent, WireError> {
    let value: Value =
        serde_json::from_str(text).map_err(|err| WireError::Malformed(err.to_string()))?;
    let Some(message_type) = value.get("type").and_then(Value::as_str) else {
        return Err(WireError::Malformed("missing `type` tag".to_string()));
    };
    if message_type != REFRESH_TYPE {
        return Err(WireError::UnknownKind(message_type.to_string()));
    }

    if value.get("kind").is_some() {
        return serde_json::from_value(value).map_err(|err| WireError::Malformed(err.to_string()));
    }

    // Legacy frame without the discriminant: infer the shape.
    if value.get("counts").is_some() {
        let snapshot: SnapshotCounts =
            serde_json::from_value(value).map_err(|err| WireError::Malformed(err.to_string()))?;
        return Ok(RefreshEvent::Snapshot(snapshot));
    }
    let delta: StarDelta =
        serde_json::from_value(value).map_err(|err| WireError::Malformed(err.to_string()))?;
    Ok(RefreshEvent::Delta(delta))
}
