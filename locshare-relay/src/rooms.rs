//! Room registry for the relay server.
//!
//! Tracks which connections are attached to which room and in which role,
//! and forwards location updates from a room's senders to its viewers.
//! The transport layer drives the registry through three entry points:
//! [`RoomRegistry::attach`] when a connection is accepted,
//! [`RoomRegistry::on_message`] for every inbound frame, and
//! [`RoomRegistry::on_close`] once the connection is gone.
//!
//! A room exists only while at least one connection is attached to it.
//! Room entries are ephemeral and lost on relay restart.

use std::collections::HashMap;
use std::fmt;

use locshare_proto::codec;
use locshare_proto::location::{Envelope, LocationUpdate};
use locshare_proto::session::{AttachError, Role};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

/// Default maximum accepted inbound frame size in bytes (16 KB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 16 * 1024;

/// Outbound half of a connection: serialized frames pushed by the relay.
///
/// Pushes use `try_send`, so a full or closed sink never blocks a forward.
pub type OutboundSink = mpsc::Sender<String>;

/// Unique identifier of one attached connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generates a fresh, time-ordered connection id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle for an attached connection, returned by [`RoomRegistry::attach`].
///
/// The handle is a reference, not ownership: the room's membership map owns
/// the connection's sink. Dropping the handle does not detach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    id: ConnectionId,
    room_id: String,
    role: Role,
}

impl Connection {
    /// Unique id of this connection.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Room this connection is attached to.
    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Role the connection attached with.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }
}

/// Errors surfaced by the registry.
///
/// Only [`RelayError::InvalidAttach`] is ever reported to a client (by
/// refusing the connection). The other variants describe frames the relay
/// dropped; the transport logs them and keeps the connection open.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Missing room id or role, or an unknown role.
    #[error("invalid attach: {0}")]
    InvalidAttach(#[from] AttachError),
    /// The frame is oversized, not JSON, or not a well-formed envelope.
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    /// A viewer connection tried to publish.
    #[error("viewer connections cannot publish")]
    WrongRoleSend,
}

/// Per-forward delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Viewers whose sink accepted the update.
    pub delivered: usize,
    /// Viewers skipped because their sink was full or closed.
    pub skipped: usize,
}

/// What [`RoomRegistry::on_message`] did with a well-formed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A location update was pushed to the room's viewers.
    Forwarded(Delivery),
    /// The frame carried an unrecognised `type` and was ignored.
    Ignored,
}

/// Snapshot of a room's membership counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomMembers {
    /// Number of attached sender connections.
    pub senders: usize,
    /// Number of attached viewer connections.
    pub viewers: usize,
}

#[derive(Default)]
struct Room {
    senders: HashMap<ConnectionId, OutboundSink>,
    viewers: HashMap<ConnectionId, OutboundSink>,
}

impl Room {
    fn members_mut(&mut self, role: Role) -> &mut HashMap<ConnectionId, OutboundSink> {
        match role {
            Role::Sender => &mut self.senders,
            Role::Viewer => &mut self.viewers,
        }
    }

    fn is_empty(&self) -> bool {
        self.senders.is_empty() && self.viewers.is_empty()
    }
}

/// In-memory registry of active rooms.
///
/// Thread-safe via [`RwLock`]: attach and detach take the write lock, so
/// membership changes and empty-room removal are serialized. Forwarding only
/// holds the read lock while copying the viewer sinks.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Room>>,
    max_payload_size: usize,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    /// Creates an empty registry with the default payload size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_payload_size(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Creates an empty registry that drops inbound frames larger than
    /// `max_payload_size` bytes.
    #[must_use]
    pub fn with_max_payload_size(max_payload_size: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            max_payload_size,
        }
    }

    /// Attaches a connection to `room_id` in the given role.
    ///
    /// Creates the room if no connection is currently attached to it. No
    /// limit is placed on the number of senders or viewers, and nothing is
    /// sent to the other members.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidAttach`] if `room_id` is empty.
    pub async fn attach(
        &self,
        room_id: &str,
        role: Role,
        sink: OutboundSink,
    ) -> Result<Connection, RelayError> {
        if room_id.is_empty() {
            return Err(AttachError::MissingRoomId.into());
        }

        let connection = Connection {
            id: ConnectionId::new(),
            room_id: room_id.to_string(),
            role,
        };

        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(room_id.to_string()).or_insert_with(|| {
            tracing::info!(room_id = %room_id, "room opened");
            Room::default()
        });
        room.members_mut(role).insert(connection.id, sink);
        drop(rooms);

        Ok(connection)
    }

    /// Detaches a connection, removing its room once the room is empty.
    ///
    /// Idempotent: returns `false` if the connection was not attached.
    pub async fn detach(&self, connection: &Connection) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(&connection.room_id) else {
            return false;
        };

        let removed = room
            .members_mut(connection.role)
            .remove(&connection.id)
            .is_some();

        if room.is_empty() {
            rooms.remove(&connection.room_id);
            tracing::info!(room_id = %connection.room_id, "room closed");
        }
        drop(rooms);

        removed
    }

    /// Transport callback for one inbound frame from `connection`.
    ///
    /// Viewers may not publish, frames must fit the payload limit and decode
    /// as an envelope, and envelopes with an unknown `type` are ignored. A
    /// `loc` envelope from a sender is forwarded to the room's viewers.
    ///
    /// Nothing is ever sent back to `connection`; the caller decides whether
    /// to log the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::WrongRoleSend`] for frames from viewers and
    /// [`RelayError::MalformedMessage`] for frames that cannot be decoded.
    pub async fn on_message(
        &self,
        connection: &Connection,
        bytes: &[u8],
    ) -> Result<Dispatch, RelayError> {
        if connection.role != Role::Sender {
            return Err(RelayError::WrongRoleSend);
        }

        if bytes.len() > self.max_payload_size {
            return Err(RelayError::MalformedMessage(format!(
                "frame too large: {} bytes (max {})",
                bytes.len(),
                self.max_payload_size
            )));
        }

        let envelope =
            codec::decode(bytes).map_err(|e| RelayError::MalformedMessage(e.to_string()))?;

        match envelope {
            Envelope::Loc(update) => self
                .forward(connection, &update)
                .await
                .map(Dispatch::Forwarded),
            Envelope::Unknown => Ok(Dispatch::Ignored),
        }
    }

    /// Transport callback for a closed connection. Same as [`Self::detach`].
    pub async fn on_close(&self, connection: &Connection) -> bool {
        self.detach(connection).await
    }

    /// Pushes `update` to every viewer attached to the sender's room.
    ///
    /// Works on a snapshot of the viewer set taken under the read lock.
    /// Viewers whose sink is full or closed are skipped for this update;
    /// there is no retry and no backlog. A connection that is no longer
    /// attached delivers to nobody.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::WrongRoleSend`] if `connection` is a viewer.
    pub async fn forward(
        &self,
        connection: &Connection,
        update: &LocationUpdate,
    ) -> Result<Delivery, RelayError> {
        if connection.role != Role::Sender {
            return Err(RelayError::WrongRoleSend);
        }

        let payload =
            codec::encode(update).map_err(|e| RelayError::MalformedMessage(e.to_string()))?;

        let viewers: Vec<OutboundSink> = {
            let rooms = self.rooms.read().await;
            match rooms.get(&connection.room_id) {
                Some(room) if room.senders.contains_key(&connection.id) => {
                    room.viewers.values().cloned().collect()
                }
                _ => return Ok(Delivery::default()),
            }
        };

        let mut delivery = Delivery::default();
        for sink in &viewers {
            if sink.try_send(payload.clone()).is_ok() {
                delivery.delivered += 1;
            } else {
                delivery.skipped += 1;
            }
        }

        tracing::debug!(
            room_id = %connection.room_id,
            conn = %connection.id,
            delivered = delivery.delivered,
            skipped = delivery.skipped,
            "location forwarded"
        );

        Ok(delivery)
    }

    /// Returns the number of active rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Returns the membership counts for a room, if it exists.
    pub async fn members(&self, room_id: &str) -> Option<RoomMembers> {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).map(|room| RoomMembers {
            senders: room.senders.len(),
            viewers: room.viewers.len(),
        })
    }
}
