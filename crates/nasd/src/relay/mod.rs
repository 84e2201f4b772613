//! Stack message relay.
//!
//! A stack has one primary unit that owns all admission decisions. Replica
//! units forward received credential frames to the primary and apply the
//! port authorization states the primary pushes back. This module defines
//! the messages, their wire encoding, and the transport seam.

mod messages;

pub use messages::{
    decode, encode, RelayError, RelayMessage, RelayTransport, MAX_FRAME_LEN, RELAY_VERSION,
};
