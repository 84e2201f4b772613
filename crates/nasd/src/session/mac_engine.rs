//! Engine for MAC-based admission.
//!
//! MAC-based clients never talk a supplicant protocol: the client's MAC
//! address doubles as its identity and password, and the whole handshake is
//! a single backend exchange. This engine synthesizes that exchange and
//! ignores the supplicant-facing parts of the seam.

use super::arena::SessionId;
use super::engine::{EngineSignal, SessionEngine};
use crate::config::AdmissionMode;
use nas_types::{MacAddress, PortKey};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

pub struct MacAuthEngine {
    signals: UnboundedSender<EngineSignal>,
    clients: Mutex<HashMap<SessionId, MacAddress>>,
}

impl MacAuthEngine {
    pub fn new(signals: UnboundedSender<EngineSignal>) -> Self {
        MacAuthEngine { signals, clients: Mutex::new(HashMap::new()) }
    }

    fn request(&self, id: SessionId) {
        let mac = { self.clients.lock().unwrap_or_else(|e| e.into_inner()).get(&id).copied() };
        let Some(mac) = mac else { return };
        let identity = mac.to_identity_string();
        let _ = self.signals.send(EngineSignal::BackendRequest {
            id,
            credentials: identity.clone().into_bytes(),
            identity,
            state: Vec::new(),
        });
    }
}

impl SessionEngine for MacAuthEngine {
    fn attach(&self, id: SessionId, _port: PortKey, mode: AdmissionMode, mac: MacAddress) {
        if mode != AdmissionMode::MacBased {
            return;
        }
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).insert(id, mac);
        self.request(id);
    }

    fn detach(&self, id: SessionId) {
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).remove(&id);
    }

    fn frame_received(&self, _id: SessionId, _frame: &[u8]) {
        // MAC-based clients have no supplicant.
    }

    fn backend_challenge(&self, id: SessionId, _payload: Vec<u8>, _state: Vec<u8>) {
        // There is no supplicant to relay a challenge to.
        debug!(session = %id, "backend challenged a MAC-based client, failing");
        let _ = self.signals.send(EngineSignal::Authorized {
            id,
            authorized: false,
            changed: true,
            reason: Some(crate::error::StopReason::AuthFailure),
        });
    }

    fn backend_result(&self, _id: SessionId, _success: bool) {}

    fn reauthenticate(&self, id: SessionId, _now: bool) {
        self.request(id);
    }

    fn reinitialize(&self, id: SessionId) {
        self.request(id);
    }

    fn set_fake_authorized(&self, _id: SessionId, _fake: bool) {}

    fn set_eapol_timeout(&self, _secs: u16) {
        // No supplicant handshake, so no reply timer to run.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nas_types::{PortNo, UnitId};
    use pretty_assertions::assert_eq;

    fn setup() -> (MacAuthEngine, tokio::sync::mpsc::UnboundedReceiver<EngineSignal>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (MacAuthEngine::new(tx), rx)
    }

    fn id() -> SessionId {
        use crate::session::SessionManager;
        let mut mgr = SessionManager::new();
        let port = PortKey::new(UnitId::new(1).unwrap(), PortNo(0));
        mgr.alloc(port, MacAddress::ZERO, nas_types::VlanId::DEFAULT, 0).unwrap()
    }

    #[test]
    fn test_attach_requests_backend_exchange() {
        let (engine, mut rx) = setup();
        let sid = id();
        let mac = MacAddress::new([0xaa, 0xbb, 0xcc, 0x00, 0x00, 0x01]);
        let port = PortKey::new(UnitId::new(1).unwrap(), PortNo(3));
        engine.attach(sid, port, AdmissionMode::MacBased, mac);
        match rx.try_recv().unwrap() {
            EngineSignal::BackendRequest { id, identity, credentials, state } => {
                assert_eq!(id, sid);
                assert_eq!(identity, "aa-bb-cc-00-00-01");
                assert_eq!(credentials, identity.as_bytes());
                assert!(state.is_empty());
            }
            other => panic!("unexpected signal {other:?}"),
        }
    }

    #[test]
    fn test_attach_ignores_other_modes() {
        let (engine, mut rx) = setup();
        let port = PortKey::new(UnitId::new(1).unwrap(), PortNo(3));
        engine.attach(id(), port, AdmissionMode::PortBased, MacAddress::ZERO);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_detach_stops_requests() {
        let (engine, mut rx) = setup();
        let sid = id();
        let mac = MacAddress::new([0xaa, 0, 0, 0, 0, 1]);
        let port = PortKey::new(UnitId::new(1).unwrap(), PortNo(0));
        engine.attach(sid, port, AdmissionMode::MacBased, mac);
        let _ = rx.try_recv();
        engine.detach(sid);
        engine.reauthenticate(sid, true);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_challenge_fails_client() {
        let (engine, mut rx) = setup();
        let sid = id();
        engine.backend_challenge(sid, vec![1, 2], vec![]);
        match rx.try_recv().unwrap() {
            EngineSignal::Authorized { id, authorized, .. } => {
                assert_eq!(id, sid);
                assert!(!authorized);
            }
            other => panic!("unexpected signal {other:?}"),
        }
    }
}
