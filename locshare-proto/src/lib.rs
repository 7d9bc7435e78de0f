//! Shared protocol definitions for the Locshare wire format.

pub mod codec;
pub mod location;
pub mod session;
