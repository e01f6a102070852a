// Subjects and wire format shared by the object server and its replicas

use crate::object::{ObjectSet, Pose};
use serde::{Deserialize, Serialize};
use std::fmt;


/// Full object set, published only by the object server
pub const OBJECT_LIST_SUBJECT: &str = "objects.list";

/// Prefix shared by every add/update subject
pub const OBJECT_UPDATE_PREFIX: &str = "objects.update";

/// Insert-or-update requests
pub const OBJECT_ADD_SUBJECT: &str = "objects.update.add";

/// Generic update requests
pub const OBJECT_UPDATE_SUBJECT: &str = "objects.update.generic";

/// Matches the add subject, the generic update subject and every
/// writer-annotated variant. The server merges all of them the same way.
pub const OBJECT_UPDATES_PATTERN: &str = "objects.update.>";

/// Pose of the agent owning a replica
pub const POSE_SUBJECT: &str = "pose";

/// Update subject annotated with the writer's intent, e.g. `viewer`
pub fn update_subject(intent: &str) -> String {
    format!("{}.{}", OBJECT_UPDATE_PREFIX, intent)
}

/// Type-tagged message envelope.
///
/// Encoded as CBOR so every `f64`, including NaN and infinities, survives
/// the trip unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    ObjectList(ObjectSet),
    Pose(Pose),
}

impl WireMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::ObjectList(_) => "object_list",
            WireMessage::Pose(_) => "pose",
        }
    }
}

/// Errors decoding a message received from the bus
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    Malformed(String),
    UnexpectedKind {
        expected: &'static str,
        found: &'static str,
    },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Malformed(reason) => write!(f, "malformed message: {}", reason),
            ProtocolError::UnexpectedKind { expected, found } => {
                write!(f, "expected '{}' message, got '{}'", expected, found)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Serialize a message for the bus
pub fn encode(message: &WireMessage) -> Result<Vec<u8>, ProtocolError> {
    serde_cbor::to_vec(message).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// Deserialize any message from the bus
pub fn decode(payload: &[u8]) -> Result<WireMessage, ProtocolError> {
    serde_cbor::from_slice(payload).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

pub fn encode_object_set(set: &ObjectSet) -> Result<Vec<u8>, ProtocolError> {
    encode(&WireMessage::ObjectList(set.clone()))
}

/// Deserialize an object set, rejecting messages of any other type
pub fn decode_object_set(payload: &[u8]) -> Result<ObjectSet, ProtocolError> {
    match decode(payload)? {
        WireMessage::ObjectList(set) => Ok(set),
        other => Err(ProtocolError::UnexpectedKind {
            expected: "object_list",
            found: other.kind(),
        }),
    }
}

/// Deserialize a pose, rejecting messages of any other type
pub fn decode_pose(payload: &[u8]) -> Result<Pose, ProtocolError> {
    match decode(payload)? {
        WireMessage::Pose(pose) => Ok(pose),
        other => Err(ProtocolError::UnexpectedKind {
            expected: "pose",
            found: other.kind(),
        }),
    }
}
