//! Connection attach parameters: room id and role.
//!
//! A client names the room and its role in the WebSocket upgrade query
//! (`?room=<id>&role=sender|viewer`). [`AttachParams`] holds the raw query
//! values; [`AttachParams::validate`] turns them into an [`AttachRequest`] or
//! an [`AttachError`] that the transport uses to refuse the connection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role of a connection within a room. Fixed for the connection's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Publishes location updates into the room.
    Sender,
    /// Receives location updates published in the room.
    Viewer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => write!(f, "sender"),
            Self::Viewer => write!(f, "viewer"),
        }
    }
}

impl FromStr for Role {
    type Err = AttachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sender" => Ok(Self::Sender),
            "viewer" => Ok(Self::Viewer),
            "" => Err(AttachError::MissingRole),
            other => Err(AttachError::UnknownRole(other.to_string())),
        }
    }
}

/// Reasons an attach request is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachError {
    /// No room id, or an empty one, was supplied.
    #[error("missing room id")]
    MissingRoomId,
    /// No role, or an empty one, was supplied.
    #[error("missing role")]
    MissingRole,
    /// The role is neither `sender` nor `viewer`.
    #[error("unknown role {0:?}")]
    UnknownRole(String),
}

/// Raw attach parameters as they arrive in the upgrade query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttachParams {
    /// Room identifier.
    pub room: Option<String>,
    /// Requested role, `sender` or `viewer`.
    pub role: Option<String>,
}

/// A validated attach request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachRequest {
    /// Non-empty room identifier.
    pub room_id: String,
    /// Requested role.
    pub role: Role,
}

impl AttachParams {
    /// Validates the raw parameters.
    ///
    /// The room id is opaque: any non-empty string is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`AttachError`] if the room id or role is missing or empty, or
    /// the role is not recognised.
    pub fn validate(self) -> Result<AttachRequest, AttachError> {
        let room_id = self
            .room
            .filter(|r| !r.is_empty())
            .ok_or(AttachError::MissingRoomId)?;
        let role = self.role.as_deref().unwrap_or_default().parse()?;
        Ok(AttachRequest { room_id, role })
    }
}
