//! Location message types exchanged between senders, the relay, and viewers.
//!
//! Every application frame is a JSON object tagged by its `type` field. The
//! only type defined today is `"loc"`, carrying a [`LocationUpdate`].

use serde::{Deserialize, Serialize};

/// A single position fix published by a sender.
///
/// The relay forwards these blindly: no range checks on the coordinates and
/// no ordering checks on `ts`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lng: f64,
    /// Horizontal accuracy radius in meters.
    pub accuracy: f64,
    /// Client-side timestamp, milliseconds since the Unix epoch.
    pub ts: i64,
}

/// Top-level application frame, discriminated by the JSON `type` field.
///
/// Unknown `type` values decode to [`Envelope::Unknown`] so future message
/// kinds can be ignored instead of treated as malformed. Fields not listed on
/// [`LocationUpdate`] are discarded during decoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    /// A position fix (`"type": "loc"`).
    Loc(LocationUpdate),
    /// Any other `type` value. Reserved; never sent by the relay.
    #[serde(other)]
    Unknown,
}
