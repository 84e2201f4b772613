//! Events consumed by the coordinator.

use crate::backend::{BackendOutcome, RequestId};
use crate::error::StopReason;
use crate::session::EngineSignal;
use nas_types::{MacAddress, PortKey, UnitId, VlanId};

/// Why the admission table removed a client entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacRemoveReason {
    /// The client was idle past the aging period.
    AgedOut,
    /// The hold period after a failed attempt elapsed.
    HoldExpired,
    /// The MAC appeared on a different port.
    StationMoved,
    /// The table's limiter shut the whole port down.
    PortShutDown,
}

impl From<MacRemoveReason> for StopReason {
    fn from(reason: MacRemoveReason) -> StopReason {
        match reason {
            MacRemoveReason::AgedOut => StopReason::AgedOut,
            MacRemoveReason::HoldExpired => StopReason::HoldExpired,
            MacRemoveReason::StationMoved => StopReason::StationMoved,
            MacRemoveReason::PortShutDown => StopReason::PortShutDown,
        }
    }
}

/// Everything that can happen to the coordinator, serialized onto one
/// queue. Collaborators post events instead of calling in, so no callback
/// ever runs while the coordinator's lock is held by its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Link state of a local or remote port changed.
    LinkChange { port: PortKey, up: bool },

    /// A credential frame arrived on a port of this unit.
    FrameReceived { port: PortKey, vid: VlanId, frame: Vec<u8> },

    /// A relay payload arrived from a peer unit.
    RelayIn { from: UnitId, payload: Vec<u8> },

    /// The admission table removed a client entry.
    MacRemoved {
        port: PortKey,
        mac: MacAddress,
        vid: VlanId,
        reason: MacRemoveReason,
    },

    /// The backend answered a request.
    BackendResponse { request: RequestId, outcome: BackendOutcome },

    /// A backend request ran out of time.
    BackendTimeout { request: RequestId },

    /// Outcome posted by the credential-exchange engine.
    Engine(EngineSignal),

    /// A unit joined the stack.
    UnitJoin { unit: UnitId },

    /// A unit left the stack.
    UnitLeave { unit: UnitId },

    /// One-second timer tick.
    Tick,
}
