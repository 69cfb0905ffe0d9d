//! Replication protocol: messages exchanged on every peer connection.
//!
//! DESIGN
//! ======
//! Each message is a [`Frame`] routed by syscall:
//!
//! | message            | syscall         | status  | data                  |
//! |--------------------|-----------------|---------|-----------------------|
//! | `RequestFullState` | `canvas:sync`   | request | `{}`                  |
//! | `FullState`        | `canvas:sync`   | done    | `{"actions": [...]}`  |
//! | `Action`           | `canvas:action` | request | `{"action": {...}}`   |
//! | `Roster`           | `mesh:roster`   | request | `{"peers": [...]}`    |
//!
//! Unknown syscalls decode to `None` and are dropped by the caller. There is
//! no relaying: the mesh is fully connected, so every action reaches each
//! peer directly from its author.

use frames::{Frame, Status};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::action::DrawingAction;
use crate::room::PeerIdentity;

pub const SYNC: &str = "canvas:sync";
pub const ACTION: &str = "canvas:action";
pub const ROSTER: &str = "mesh:roster";

#[derive(Debug, Clone, PartialEq)]
pub enum PeerMessage {
    RequestFullState,
    FullState { actions: Vec<DrawingAction> },
    Action { action: DrawingAction },
    /// Other identities the sender is connected to.
    Roster { peers: Vec<PeerIdentity> },
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Codec(#[from] frames::CodecError),
    #[error("malformed {syscall} payload: {source}")]
    Payload {
        syscall: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A decoded frame plus its protocol meaning, if it has one.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub frame: Frame,
    pub message: Option<PeerMessage>,
}

// =============================================================================
// OUTBOUND
// =============================================================================

#[must_use]
pub fn request_full_state() -> Frame {
    Frame::request(SYNC, json!({}))
}

/// Answer `request` with the given log.
#[must_use]
pub fn full_state(request: &Frame, actions: &[DrawingAction]) -> Frame {
    request.done(json!({ "actions": actions }))
}

#[must_use]
pub fn action(action: &DrawingAction) -> Frame {
    Frame::request(ACTION, json!({ "action": action }))
}

#[must_use]
pub fn roster(peers: &[PeerIdentity]) -> Frame {
    Frame::request(ROSTER, json!({ "peers": peers }))
}

// =============================================================================
// INBOUND
// =============================================================================

/// Decode wire bytes into a frame and its protocol message.
///
/// # Errors
///
/// Returns [`ProtocolError::Codec`] for undecodable bytes and
/// [`ProtocolError::Payload`] when a known syscall carries a bad payload.
pub fn decode(bytes: &[u8]) -> Result<Inbound, ProtocolError> {
    let frame = frames::decode_frame(bytes)?;
    let message = parse(&frame)?;
    Ok(Inbound { frame, message })
}

/// Interpret a frame. `Ok(None)` for syscalls this protocol does not know.
///
/// # Errors
///
/// Returns [`ProtocolError::Payload`] when a known syscall carries a bad payload.
pub fn parse(frame: &Frame) -> Result<Option<PeerMessage>, ProtocolError> {
    let message = match (frame.syscall.as_str(), frame.status) {
        (SYNC, Status::Request) => PeerMessage::RequestFullState,
        (SYNC, Status::Done) => PeerMessage::FullState { actions: field(frame, "actions")? },
        (ACTION, Status::Request) => PeerMessage::Action { action: field(frame, "action")? },
        (ROSTER, Status::Request) => PeerMessage::Roster { peers: field(frame, "peers")? },
        _ => return Ok(None),
    };
    Ok(Some(message))
}

fn field<T: DeserializeOwned>(frame: &Frame, key: &str) -> Result<T, ProtocolError> {
    let value = frame.data.get(key).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|source| ProtocolError::Payload { syscall: frame.syscall.clone(), source })
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
