//! JSON encoding and decoding for the Locshare wire protocol.
//!
//! Inbound frames are decoded into an [`Envelope`]; outbound frames are
//! always a freshly serialized `loc` envelope, so extra fields a sender may
//! have attached never reach viewers.

use crate::location::{Envelope, LocationUpdate};

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload is not JSON or does not have the expected shape.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decodes an [`Envelope`] from raw frame bytes.
///
/// Accepts both text and binary frame contents; the bytes must be UTF-8 JSON.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] if the bytes are not valid JSON, lack a
/// `type` field, or a `loc` frame is missing one of its fields.
pub fn decode(bytes: &[u8]) -> Result<Envelope, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Encodes a [`LocationUpdate`] as an outbound `loc` frame.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] if serialization fails.
pub fn encode(update: &LocationUpdate) -> Result<String, CodecError> {
    Ok(serde_json::to_string(&Envelope::Loc(*update))?)
}
