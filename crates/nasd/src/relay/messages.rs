//! Relay message definitions and codec.

use nas_types::{PortKey, UnitId, VlanId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current relay protocol version. Bumped whenever the message layout
/// changes; messages from other versions are dropped, never guessed at.
pub const RELAY_VERSION: u32 = 1;

/// Largest credential frame accepted from the wire or from a peer unit.
pub const MAX_FRAME_LEN: usize = 1518;

/// Smallest frame that can carry an Ethernet header.
const MIN_FRAME_LEN: usize = 14;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("relay version mismatch: got {got}, expected {RELAY_VERSION}")]
    VersionMismatch { got: u32 },

    #[error("relay frame length {0} out of bounds")]
    FrameLength(usize),

    #[error("malformed relay message: {0}")]
    Malformed(String),
}

/// Messages exchanged between the primary and replica units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayMessage {
    /// Primary to replica: set the hardware authorization state of a port.
    PortState { port: PortKey, authorized: bool },

    /// Primary to replica: authorization states of every port of a unit,
    /// sent when the unit joins or when admission control is toggled.
    UnitState { unit: UnitId, authorized: Vec<bool> },

    /// Primary to replica: transmit a credential frame on a local port.
    FrameTx { port: PortKey, frame: Vec<u8> },

    /// Replica to primary: a credential frame arrived on a local port.
    FrameRx { port: PortKey, vid: VlanId, frame: Vec<u8> },
}

impl RelayMessage {
    fn frame_len(&self) -> Option<usize> {
        match self {
            RelayMessage::FrameTx { frame, .. } | RelayMessage::FrameRx { frame, .. } => {
                Some(frame.len())
            }
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    msg: RelayMessage,
}

/// Encodes a message for the stack interconnect.
pub fn encode(msg: &RelayMessage) -> Vec<u8> {
    let env = Envelope { version: RELAY_VERSION, msg: msg.clone() };
    serde_json::to_vec(&env).expect("relay messages always serialize")
}

/// Decodes a message received from a peer unit.
///
/// Version mismatches and oversized frames are errors; the caller logs and
/// drops such messages.
pub fn decode(payload: &[u8]) -> Result<RelayMessage, RelayError> {
    let env: Envelope =
        serde_json::from_slice(payload).map_err(|e| RelayError::Malformed(e.to_string()))?;
    if env.version != RELAY_VERSION {
        return Err(RelayError::VersionMismatch { got: env.version });
    }
    if let Some(len) = env.msg.frame_len() {
        if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&len) {
            return Err(RelayError::FrameLength(len));
        }
    }
    Ok(env.msg)
}

/// Transport for relay messages over the stack interconnect.
///
/// The production implementation sits on the stack messaging fabric; tests
/// substitute a recording mock.
pub trait RelayTransport: Send + Sync {
    /// Sends a message to one unit.
    fn send(&self, unit: UnitId, payload: Vec<u8>);

    /// Sends a message to the current primary unit.
    fn to_primary(&self, payload: Vec<u8>);

    /// Sends a message to every other unit in the stack.
    fn broadcast(&self, payload: Vec<u8>);
}
