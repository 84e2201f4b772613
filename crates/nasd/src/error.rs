//! Error and stop-reason taxonomy for the admission-control plane.

use nas_types::{PortKey, UnitId};
use thiserror::Error;

/// Errors surfaced by the coordinator and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NasError {
    #[error("parameter out of range: {0}")]
    InvalidParameter(String),

    #[error("unit {0} is not part of the stack")]
    UnknownUnit(UnitId),

    #[error("port {0} does not exist")]
    UnknownPort(PortKey),

    #[error("port {0} is a member of an aggregation")]
    PortIsAggregated(PortKey),

    #[error("port {0} participates in spanning tree")]
    PortInStp(PortKey),

    #[error("this operation is only valid on the primary unit")]
    NotPrimary,

    #[error("session table is full")]
    SessionTableFull,

    #[error("stale session id (generation mismatch)")]
    StaleSessionId,

    #[error("MAC table operation failed on port {0}")]
    MacTableError(PortKey),

    #[error("backend server not ready")]
    BackendNotReady,

    #[error("parse error: {0}")]
    Parse(#[from] nas_types::ParseError),
}

/// Why a session left the authorized (or authenticating) state.
///
/// The reason is recorded on the session and carried into accounting and
/// operator-facing logs when the session is stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StopReason {
    /// Session was (re-)initialized by the operator or by a mode change.
    #[default]
    Initializing,
    /// The backend rejected the supplicant's credentials.
    AuthFailure,
    /// No backend server is configured.
    BackendNotConfigured,
    /// The handshake exceeded the allowed number of protocol rounds.
    TooManyRounds,
    /// The backend did not answer within the request timeout.
    BackendTimeout,
    /// The supplicant restarted the handshake.
    PeerLogoffStart,
    /// The supplicant sent an explicit logoff.
    PeerLogoff,
    /// All authentication rounds failed on a port with fallback enabled.
    ReauthCountExceeded,
    /// The port was forced unauthorized by configuration.
    ForcedUnauthorized,
    /// The MAC-table collaborator failed to admit or move the client.
    AdmissionTableError,
    /// The port lost link.
    LinkDown,
    /// The client's MAC address appeared on another port.
    StationMoved,
    /// The client was inactive longer than the aging period.
    AgedOut,
    /// The hold period after a failed attempt elapsed.
    HoldExpired,
    /// The port's admission mode was reconfigured.
    ModeChanged,
    /// The port was administratively shut down.
    PortShutDown,
    /// The owning unit left the stack.
    Reboot,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Initializing => "Initializing",
            StopReason::AuthFailure => "Authentication failure",
            StopReason::BackendNotConfigured => "Backend server not configured",
            StopReason::TooManyRounds => "Too many authentication rounds",
            StopReason::BackendTimeout => "Backend server timeout",
            StopReason::PeerLogoffStart => "Supplicant restarted authentication",
            StopReason::PeerLogoff => "Supplicant logged off",
            StopReason::ReauthCountExceeded => "Re-authentication count exceeded",
            StopReason::ForcedUnauthorized => "Port forced unauthorized",
            StopReason::AdmissionTableError => "MAC table operation failed",
            StopReason::LinkDown => "Port link down",
            StopReason::StationMoved => "Station moved to another port",
            StopReason::AgedOut => "Client aged out",
            StopReason::HoldExpired => "Hold time expired",
            StopReason::ModeChanged => "Port admission mode changed",
            StopReason::PortShutDown => "Port shut down",
            StopReason::Reboot => "Switch down",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_reason_strings_are_distinct() {
        let reasons = [
            StopReason::Initializing,
            StopReason::AuthFailure,
            StopReason::BackendNotConfigured,
            StopReason::TooManyRounds,
            StopReason::BackendTimeout,
            StopReason::PeerLogoffStart,
            StopReason::PeerLogoff,
            StopReason::ReauthCountExceeded,
            StopReason::ForcedUnauthorized,
            StopReason::AdmissionTableError,
            StopReason::LinkDown,
            StopReason::StationMoved,
            StopReason::AgedOut,
            StopReason::HoldExpired,
            StopReason::ModeChanged,
            StopReason::PortShutDown,
            StopReason::Reboot,
        ];
        let mut seen = std::collections::HashSet::new();
        for r in reasons {
            assert!(seen.insert(r.as_str()), "duplicate string for {r:?}");
        }
    }

    #[test]
    fn test_error_display() {
        let err = NasError::SessionTableFull;
        assert_eq!(err.to_string(), "session table is full");
    }
}
