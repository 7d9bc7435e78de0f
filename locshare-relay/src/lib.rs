//! Locshare relay server library.
//!
//! Exposes the relay server for use in tests and embedding. Connections
//! attach to a room as a sender or a viewer; location updates published by
//! a room's senders are pushed to every viewer in the same room.

pub mod allocator;
pub mod config;
pub mod relay;
pub mod rooms;
