//! Session record.

use crate::backend::RequestId;
use crate::error::StopReason;
use nas_types::{MacAddress, PortKey, PriorityClass, VlanId};

/// Admission state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Allocated, no handshake started yet.
    #[default]
    Connecting,
    /// Handshake or backend exchange in progress.
    Authenticating,
    /// Client admitted.
    Authorized,
    /// Client denied.
    Unauthorized,
    /// Port fell back to the Guest VLAN; the handshake is suspended.
    GuestVlan,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Authenticating => "authenticating",
            SessionState::Authorized => "authorized",
            SessionState::Unauthorized => "unauthorized",
            SessionState::GuestVlan => "guest-vlan",
        }
    }
}

/// One attached client, or the port-wide session of a port-based port.
///
/// Port-wide sessions carry the zero MAC until the first credential frame
/// reveals the supplicant's address.
#[derive(Debug, Clone)]
pub struct Session {
    pub port: PortKey,
    pub mac: MacAddress,
    /// VLAN the client's MAC was learned on.
    pub vid: VlanId,
    pub state: SessionState,
    pub stop_reason: StopReason,
    /// Identity presented to the backend. For MAC-based admission this is
    /// the hyphenated MAC address.
    pub identity: String,
    /// Overrides granted by the backend in the last acceptance.
    pub backend_vlan: Option<VlanId>,
    pub backend_qos: Option<PriorityClass>,
    /// VLAN the MAC entry had before the first override, so a later clear
    /// restores exactly what was there.
    pub revert_vid: Option<VlanId>,
    /// Outstanding backend request, at most one per session.
    pub request: Option<RequestId>,
    /// Failed handshake rounds since the last success.
    pub failed_rounds: u8,
    /// Tick timestamps, in whole seconds since coordinator start.
    pub created_at: u64,
    pub last_activity: u64,
    pub reauth_at: Option<u64>,
}

impl Session {
    pub fn new(port: PortKey, mac: MacAddress, vid: VlanId, now: u64) -> Self {
        Session {
            port,
            mac,
            vid,
            state: SessionState::Connecting,
            stop_reason: StopReason::Initializing,
            identity: String::new(),
            backend_vlan: None,
            backend_qos: None,
            revert_vid: None,
            request: None,
            failed_rounds: 0,
            created_at: now,
            last_activity: now,
            reauth_at: None,
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.state == SessionState::Authorized
    }

    /// Clears per-attempt state ahead of a fresh handshake. Overrides and
    /// the revert VLAN survive until the coordinator tears them down.
    pub fn restart(&mut self, now: u64) {
        self.state = SessionState::Connecting;
        self.identity.clear();
        self.request = None;
        self.last_activity = now;
    }
}
