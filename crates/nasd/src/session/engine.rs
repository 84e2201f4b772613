//! Seam to the credential-exchange state machine.
//!
//! The engine runs the per-session supplicant handshake. The coordinator
//! drives it through this trait; the engine reports outcomes by posting
//! [`EngineSignal`]s on the coordinator's event queue, never by calling
//! back into the coordinator directly.

use super::arena::SessionId;
use crate::config::AdmissionMode;
use crate::error::StopReason;
use nas_types::{MacAddress, PortKey};

/// Outcomes the engine posts back to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineSignal {
    /// The session's authorization verdict settled.
    ///
    /// `changed` is false when a re-authentication confirms the existing
    /// verdict. `reason` is set for unauthorized verdicts.
    Authorized {
        id: SessionId,
        authorized: bool,
        changed: bool,
        reason: Option<StopReason>,
    },

    /// The engine collected credentials and wants a backend exchange.
    BackendRequest {
        id: SessionId,
        identity: String,
        credentials: Vec<u8>,
        /// Opaque continuation state echoed back on challenges.
        state: Vec<u8>,
    },

    /// The supplicant ended the session, e.g. with a logoff frame; the
    /// coordinator frees it outright instead of marking it unauthorized.
    Stopped { id: SessionId, reason: StopReason },
}

/// Credential-exchange engine interface.
pub trait SessionEngine: Send + Sync {
    /// Binds a freshly allocated session to the engine. The MAC is zero
    /// for port-wide sessions until a frame reveals the supplicant.
    fn attach(&self, id: SessionId, port: PortKey, mode: AdmissionMode, mac: MacAddress);

    /// Releases the engine's half of a session. Must be called before the
    /// session record is freed.
    fn detach(&self, id: SessionId);

    /// Feeds a received credential frame to the session's state machine.
    fn frame_received(&self, id: SessionId, frame: &[u8]);

    /// Forwards a backend challenge to the supplicant. The opaque `state`
    /// must be echoed back in the next [`EngineSignal::BackendRequest`].
    fn backend_challenge(&self, id: SessionId, payload: Vec<u8>, state: Vec<u8>);

    /// Tells the engine how the backend exchange ended, so it can close the
    /// handshake towards the supplicant.
    fn backend_result(&self, id: SessionId, success: bool);

    /// Requests re-authentication, immediately or at the next period.
    fn reauthenticate(&self, id: SessionId, now: bool);

    /// Restarts the handshake from scratch.
    fn reinitialize(&self, id: SessionId);

    /// Suspends or resumes the handshake while the port sits on the Guest
    /// VLAN or is force-authorized.
    fn set_fake_authorized(&self, id: SessionId, fake: bool);

    /// Supplicant reply timeout for every session's handshake.
    fn set_eapol_timeout(&self, secs: u16);
}
