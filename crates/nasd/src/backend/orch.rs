//! Backend request orchestration.

use super::attrs::Attribute;
use crate::error::NasError;
use crate::session::SessionId;
use nas_types::{MacAddress, PortKey};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Handle to an in-flight backend request.
pub type RequestId = u64;

/// Outcome of a backend exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOutcome {
    /// Credentials accepted; the attributes may carry VLAN or QoS grants.
    Accept { attrs: Vec<Attribute> },
    /// Credentials rejected.
    Reject,
    /// The backend wants another round with the supplicant.
    Challenge { payload: Vec<u8>, state: Vec<u8> },
}

/// Seam to the backend server client.
///
/// `allocate` reserves a request handle; `submit` transmits on it and
/// reports whether the backend was reachable; `release` returns the handle.
/// Responses and timeouts arrive asynchronously on the coordinator's event
/// queue, keyed by the request handle.
pub trait BackendClient: Send + Sync {
    fn allocate(&self) -> Option<RequestId>;

    fn submit(
        &self,
        request: RequestId,
        identity: &str,
        credentials: &[u8],
        state: &[u8],
        port: PortKey,
        mac: MacAddress,
    ) -> bool;

    fn release(&self, request: RequestId);
}

/// Lifetime counters for backend exchanges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub requests: u64,
    pub accepts: u64,
    pub rejects: u64,
    pub challenges: u64,
    pub timeouts: u64,
    /// Responses whose request no longer maps to a session.
    pub late_responses: u64,
    pub send_failures: u64,
}

/// Tracks in-flight backend requests and the sessions that own them.
pub struct BackendOrch {
    client: Arc<dyn BackendClient>,
    outstanding: HashMap<RequestId, SessionId>,
    stats: BackendStats,
}

impl BackendOrch {
    pub fn new(client: Arc<dyn BackendClient>) -> Self {
        BackendOrch { client, outstanding: HashMap::new(), stats: BackendStats::default() }
    }

    pub fn stats(&self) -> BackendStats {
        self.stats
    }

    pub fn clear_stats(&mut self) {
        self.stats = BackendStats::default();
    }

    pub fn outstanding_for(&self, request: RequestId) -> Option<SessionId> {
        self.outstanding.get(&request).copied()
    }

    /// Starts a backend exchange for a session.
    ///
    /// A session holds at most one outstanding request: any previous one is
    /// released first, so its eventual response becomes a late response and
    /// is dropped. Returns the new request handle.
    pub fn request(
        &mut self,
        id: SessionId,
        previous: Option<RequestId>,
        identity: &str,
        credentials: &[u8],
        state: &[u8],
        port: PortKey,
        mac: MacAddress,
    ) -> Result<RequestId, NasError> {
        if let Some(old) = previous {
            debug!(session = %id, request = old, "releasing superseded backend request");
            self.outstanding.remove(&old);
            self.client.release(old);
        }
        let Some(request) = self.client.allocate() else {
            warn!(session = %id, "backend has no free request handles");
            return Err(NasError::BackendNotReady);
        };
        if !self.client.submit(request, identity, credentials, state, port, mac) {
            self.stats.send_failures += 1;
            self.client.release(request);
            return Err(NasError::BackendNotReady);
        }
        self.stats.requests += 1;
        self.outstanding.insert(request, id);
        Ok(request)
    }

    /// Resolves a response or timeout to the owning session and releases
    /// the request handle.
    ///
    /// `None` means the request was superseded or its session freed; such
    /// late responses are counted and dropped.
    pub fn complete(&mut self, request: RequestId, outcome: Option<&BackendOutcome>) -> Option<SessionId> {
        self.client.release(request);
        let Some(id) = self.outstanding.remove(&request) else {
            debug!(request, "late backend response dropped");
            self.stats.late_responses += 1;
            return None;
        };
        match outcome {
            Some(BackendOutcome::Accept { .. }) => self.stats.accepts += 1,
            Some(BackendOutcome::Reject) => self.stats.rejects += 1,
            Some(BackendOutcome::Challenge { .. }) => self.stats.challenges += 1,
            None => self.stats.timeouts += 1,
        }
        Some(id)
    }

    /// Drops a session's outstanding request, if any, without a response.
    /// Used when the session is freed mid-exchange.
    pub fn abandon(&mut self, request: RequestId) {
        if self.outstanding.remove(&request).is_some() {
            self.client.release(request);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionManager;
    use nas_types::{PortNo, UnitId, VlanId};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TestClient {
        next: AtomicU64,
        ready: std::sync::atomic::AtomicBool,
        released: Mutex<Vec<RequestId>>,
        submitted: Mutex<Vec<(RequestId, String)>>,
    }

    impl TestClient {
        fn ready() -> Self {
            let c = TestClient::default();
            c.ready.store(true, Ordering::SeqCst);
            c
        }
    }

    impl BackendClient for TestClient {
        fn allocate(&self) -> Option<RequestId> {
            Some(self.next.fetch_add(1, Ordering::SeqCst) + 1)
        }

        fn submit(
            &self,
            request: RequestId,
            identity: &str,
            _credentials: &[u8],
            _state: &[u8],
            _port: PortKey,
            _mac: MacAddress,
        ) -> bool {
            if !self.ready.load(Ordering::SeqCst) {
                return false;
            }
            self.submitted.lock().unwrap().push((request, identity.to_string()));
            true
        }

        fn release(&self, request: RequestId) {
            self.released.lock().unwrap().push(request);
        }
    }

    fn session_id() -> SessionId {
        let mut mgr = SessionManager::new();
        let port = PortKey::new(UnitId::new(1).unwrap(), PortNo(0));
        mgr.alloc(port, MacAddress::ZERO, VlanId::DEFAULT, 0).unwrap()
    }

    fn port() -> PortKey {
        PortKey::new(UnitId::new(1).unwrap(), PortNo(0))
    }

    #[test]
    fn test_request_and_complete() {
        let client = Arc::new(TestClient::ready());
        let mut orch = BackendOrch::new(client.clone());
        let id = session_id();
        let req = orch.request(id, None, "alice", b"eap", b"", port(), MacAddress::ZERO).unwrap();
        assert_eq!(orch.outstanding_for(req), Some(id));

        let outcome = BackendOutcome::Accept { attrs: vec![] };
        assert_eq!(orch.complete(req, Some(&outcome)), Some(id));
        assert_eq!(orch.stats().accepts, 1);
        assert!(client.released.lock().unwrap().contains(&req));
    }

    #[test]
    fn test_new_request_supersedes_old() {
        let client = Arc::new(TestClient::ready());
        let mut orch = BackendOrch::new(client.clone());
        let id = session_id();
        let first = orch.request(id, None, "a", b"", b"", port(), MacAddress::ZERO).unwrap();
        let second =
            orch.request(id, Some(first), "a", b"", b"", port(), MacAddress::ZERO).unwrap();
        assert_ne!(first, second);
        // Old handle was released before the new allocation.
        assert!(client.released.lock().unwrap().contains(&first));
        // A response to the superseded request is a late response.
        assert_eq!(orch.complete(first, Some(&BackendOutcome::Reject)), None);
        assert_eq!(orch.stats().late_responses, 1);
        assert_eq!(orch.outstanding_for(second), Some(id));
    }

    #[test]
    fn test_backend_not_ready() {
        let client = Arc::new(TestClient::default());
        let mut orch = BackendOrch::new(client.clone());
        let id = session_id();
        let err = orch.request(id, None, "a", b"", b"", port(), MacAddress::ZERO).unwrap_err();
        assert_eq!(err, NasError::BackendNotReady);
        assert_eq!(orch.stats().send_failures, 1);
        assert_eq!(client.released.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_timeout_counted() {
        let client = Arc::new(TestClient::ready());
        let mut orch = BackendOrch::new(client);
        let id = session_id();
        let req = orch.request(id, None, "a", b"", b"", port(), MacAddress::ZERO).unwrap();
        assert_eq!(orch.complete(req, None), Some(id));
        assert_eq!(orch.stats().timeouts, 1);
    }

    #[test]
    fn test_abandon() {
        let client = Arc::new(TestClient::ready());
        let mut orch = BackendOrch::new(client.clone());
        let id = session_id();
        let req = orch.request(id, None, "a", b"", b"", port(), MacAddress::ZERO).unwrap();
        orch.abandon(req);
        assert_eq!(orch.complete(req, Some(&BackendOutcome::Reject)), None);
        assert!(client.released.lock().unwrap().contains(&req));
    }
}
