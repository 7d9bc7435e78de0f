//! Room id allocation for new sharing sessions.
//!
//! A room id is the only thing standing between a sharing session and an
//! uninvited viewer, so ids are drawn from the thread-local CSPRNG: 8 random
//! bytes rendered as 16 lowercase hex characters.

use std::fmt::Write;

use axum::Json;
use serde::{Deserialize, Serialize};

/// Number of random bytes in a room id.
pub const ROOM_ID_BYTES: usize = 8;

/// Response body of `GET /new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoom {
    /// Freshly allocated room id.
    pub id: String,
}

/// Generates a new random room id.
#[must_use]
pub fn allocate_room_id() -> String {
    let bytes: [u8; ROOM_ID_BYTES] = rand::random();
    bytes
        .iter()
        .fold(String::with_capacity(ROOM_ID_BYTES * 2), |mut id, b| {
            let _ = write!(id, "{b:02x}");
            id
        })
}

/// axum handler for `GET /new`.
pub async fn new_room() -> Json<NewRoom> {
    let id = allocate_room_id();
    tracing::debug!(room_id = %id, "room id allocated");
    Json(NewRoom { id })
}
