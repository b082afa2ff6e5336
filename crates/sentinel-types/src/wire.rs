//! Text stream protocol shared by the broadcaster and the agent.
//!
//! ```text
//! data: {"type":"connected","id":"<connection-id>"}
//!
//! data: <base64 of JSON-encoded ChangedEvent>
//!
//! : keepalive
//!
//! ```
//!
//! Every frame is terminated by a blank line.

use crate::error::CodecError;
use crate::event::ChangedEvent;
use crate::resource::Resource;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Prefix of a data line.
pub const DATA_PREFIX: &str = "data: ";

/// Prefix of an event-type line.
pub const EVENT_PREFIX: &str = "event: ";

/// Comment-only frame written when a stream is idle.
pub const KEEPALIVE_FRAME: &str = ": keepalive";

/// Blank line closing every frame.
pub const FRAME_TERMINATOR: &str = "\n\n";

/// Event type whose payload is always a [`ChangedEvent`].
pub const CHANGED_EVENT_TYPE: &str = "changed";

/// Handshake object sent once per accepted stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// Always `"connected"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Server-generated connection id.
    pub id: String,
}

impl Handshake {
    const KIND: &'static str = "connected";

    /// Handshake for a connection id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            id: id.into(),
        }
    }
}

/// The data carried by a change frame: base64 of the event's JSON encoding.
pub fn encode_changed_payload(event: &ChangedEvent) -> Result<String, CodecError> {
    let json = serde_json::to_vec(event)?;
    Ok(STANDARD.encode(json))
}

/// Encode a change event as a `data:` frame (without terminator).
pub fn encode_changed_frame(event: &ChangedEvent) -> Result<String, CodecError> {
    Ok(format!("{DATA_PREFIX}{}", encode_changed_payload(event)?))
}

/// JSON body of the handshake for a connection id.
pub fn connected_payload(id: &str) -> String {
    // A two-string struct cannot fail to serialize.
    serde_json::to_string(&Handshake::new(id)).unwrap_or_default()
}

/// The handshake frame announcing a connection id (without terminator).
pub fn connected_frame(id: &str) -> String {
    format!("{DATA_PREFIX}{}", connected_payload(id))
}

/// Append the blank line that closes a frame.
pub fn terminate(frame: &str) -> String {
    let mut out = String::with_capacity(frame.len() + FRAME_TERMINATOR.len());
    out.push_str(frame);
    out.push_str(FRAME_TERMINATOR);
    out
}

/// A decoded frame payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// The stream handshake.
    Connected {
        /// Connection id assigned by the server.
        id: String,
    },
    /// A full change event.
    Changed(ChangedEvent),
    /// A bare resource snapshot.
    Resource(Resource),
}

impl Payload {
    /// The resource carried by this payload, if any.
    pub fn into_resource(self) -> Option<Resource> {
        match self {
            Payload::Connected { .. } => None,
            Payload::Changed(event) => Some(event.resource),
            Payload::Resource(resource) => Some(resource),
        }
    }
}

/// Decode the accumulated data of one frame.
///
/// A payload starting with `{` is raw JSON, anything else is base64 of
/// JSON. With the `changed` event type the JSON must be a [`ChangedEvent`];
/// with any other type a ChangedEvent-shaped object is unwrapped and
/// everything else is read as a plain [`Resource`].
pub fn decode_payload(event_type: &str, data: &str) -> Result<Payload, CodecError> {
    let trimmed = data.trim();
    let json = if trimmed.starts_with('{') {
        trimmed.as_bytes().to_vec()
    } else {
        STANDARD.decode(trimmed)?
    };

    let value: serde_json::Value = serde_json::from_slice(&json)?;
    let object = value
        .as_object()
        .ok_or_else(|| CodecError::Malformed("payload is not a JSON object".to_string()))?;

    if object.get("type").and_then(|t| t.as_str()) == Some(Handshake::KIND) {
        let handshake: Handshake = serde_json::from_value(value)?;
        return Ok(Payload::Connected { id: handshake.id });
    }

    if event_type == CHANGED_EVENT_TYPE || object.contains_key("resource") {
        return Ok(Payload::Changed(serde_json::from_value(value)?));
    }

    Ok(Payload::Resource(serde_json::from_value(value)?))
}
