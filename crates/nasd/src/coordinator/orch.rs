//! The coordinator proper.

use super::events::{Event, MacRemoveReason};
use super::seams::{MacAction, MacAddVerdict, MacTable, PortCompatProvider, PortHardware};
use crate::backend::{self, BackendClient, BackendOrch, BackendOutcome, BackendStats, RequestId};
use crate::config::{
    AdmissionMode, GlobalConfig, PortRuntime, ReapplyScope, StackStateStore, UnitConfig,
    VlanOrigin, PORTS_PER_UNIT,
};
use crate::decision::{self, PortStatus};
use crate::error::{NasError, StopReason};
use crate::overrides::{OverrideCallbacks, OverrideController};
use crate::relay::{self, RelayMessage, RelayTransport, MAX_FRAME_LEN};
use crate::session::{EngineSignal, SessionEngine, SessionId, SessionManager, SessionState, SessionStats};
use nas_types::{MacAddress, PortKey, PortNo, UnitId, VlanId};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Minimum seconds between repeated session-exhaustion warnings.
const EXHAUSTION_WARN_HOLDOFF_SECS: u64 = 60;

/// Role of the local unit in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Owns all admission decisions.
    Primary,
    /// Forwards frames to the primary and applies pushed port states.
    Replica,
}

/// Lifetime counters for the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub events: u64,
    pub frames: u64,
    pub frames_ignored: u64,
    pub relay_dropped: u64,
    pub guest_entries: u64,
    pub station_moves: u64,
}

/// The collaborator seams the coordinator drives.
pub struct Collaborators {
    pub engine: Arc<dyn SessionEngine>,
    pub backend: Arc<dyn BackendClient>,
    pub overrides: Arc<dyn OverrideCallbacks>,
    pub mac_table: Arc<dyn MacTable>,
    pub hardware: Arc<dyn PortHardware>,
    pub transport: Arc<dyn RelayTransport>,
    pub compat: Arc<dyn PortCompatProvider>,
}

/// The admission coordinator.
///
/// All state lives behind one mutex. Event handling, the synchronous
/// admission hook, and the admin API each take the lock for the duration of
/// one operation; collaborators are invoked while it is held and must not
/// call back in, they post events instead.
pub struct Coordinator {
    inner: Mutex<Inner>,
}

struct Inner {
    local_unit: UnitId,
    role: Role,
    /// Whole seconds since start, advanced by the tick event.
    now: u64,
    store: StackStateStore,
    runtime: Vec<Vec<PortRuntime>>,
    sessions: SessionManager,
    backend: BackendOrch,
    overrides: OverrideController,
    engine: Arc<dyn SessionEngine>,
    mac_table: Arc<dyn MacTable>,
    hardware: Arc<dyn PortHardware>,
    transport: Arc<dyn RelayTransport>,
    compat: Arc<dyn PortCompatProvider>,
    stats: CoordinatorStats,
    last_exhaustion_warn: Option<u64>,
}

/// Status of one attached client, as reported by the admin API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientStatus {
    pub mac: MacAddress,
    pub vid: VlanId,
    pub state: SessionState,
    pub stop_reason: StopReason,
    pub identity: String,
    pub created_at: u64,
    pub last_activity: u64,
}

impl Coordinator {
    pub fn new(local_unit: UnitId, role: Role, c: Collaborators) -> Self {
        let mut store = StackStateStore::new();
        store.set_present(local_unit, true);
        let mut inner = Inner {
            local_unit,
            role,
            now: 0,
            store,
            runtime: vec![
                vec![PortRuntime::default(); PORTS_PER_UNIT];
                UnitId::MAX as usize
            ],
            sessions: SessionManager::new(),
            backend: BackendOrch::new(c.backend),
            overrides: OverrideController::new(c.overrides),
            engine: c.engine,
            mac_table: c.mac_table,
            hardware: c.hardware,
            transport: c.transport,
            compat: c.compat,
            stats: CoordinatorStats::default(),
            last_exhaustion_warn: None,
        };
        inner.push_timer_config();
        Coordinator { inner: Mutex::new(inner) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Handles one queued event.
    pub fn handle_event(&self, event: Event) {
        let mut inner = self.lock();
        inner.stats.events += 1;
        match event {
            Event::LinkChange { port, up } => inner.on_link_change(port, up),
            Event::FrameReceived { port, vid, frame } => inner.on_local_frame(port, vid, &frame),
            Event::RelayIn { from, payload } => inner.on_relay(from, &payload),
            Event::MacRemoved { port, mac, vid, reason } => {
                inner.on_mac_removed(port, mac, vid, reason)
            }
            Event::BackendResponse { request, outcome } => inner.on_backend(request, Some(outcome)),
            Event::BackendTimeout { request } => inner.on_backend(request, None),
            Event::Engine(signal) => inner.on_engine_signal(signal),
            Event::UnitJoin { unit } => inner.on_unit_join(unit),
            Event::UnitLeave { unit } => inner.on_unit_leave(unit),
            Event::Tick => inner.on_tick(),
        }
    }

    /// Synchronous admission hook for newly learned MAC addresses.
    ///
    /// Called by the admission table before it installs an entry; the
    /// returned verdict is the entry's initial forwarding action.
    pub fn on_mac_add(&self, port: PortKey, mac: MacAddress, vid: VlanId) -> MacAddVerdict {
        self.lock().on_mac_add(port, mac, vid)
    }

    pub fn set_global_config(&self, cfg: GlobalConfig) -> Result<(), NasError> {
        let mut inner = self.lock();
        inner.require_primary()?;
        let old = inner.store.global().clone();
        let scope = inner.store.set_global(cfg)?;
        if scope == ReapplyScope::Global {
            inner.apply_global_change(&old);
        }
        Ok(())
    }

    pub fn set_unit_config(&self, unit: UnitId, cfg: UnitConfig) -> Result<(), NasError> {
        let mut inner = self.lock();
        inner.require_primary()?;
        inner.set_unit_config(unit, cfg)
    }

    pub fn default_unit(&self, unit: UnitId) -> Result<(), NasError> {
        let mut inner = self.lock();
        inner.require_primary()?;
        let scope = inner.store.default_unit(unit);
        inner.apply_scope(scope, Some(unit));
        Ok(())
    }

    pub fn default_all(&self) -> Result<(), NasError> {
        let mut inner = self.lock();
        inner.require_primary()?;
        let scope = inner.store.default_all();
        inner.push_timer_config();
        inner.apply_scope(scope, None);
        Ok(())
    }

    pub fn global_config(&self) -> GlobalConfig {
        self.lock().store.global().clone()
    }

    pub fn unit_config(&self, unit: UnitId) -> UnitConfig {
        self.lock().store.unit(unit).clone()
    }

    pub fn port_status(&self, port: PortKey) -> Result<PortStatus, NasError> {
        let inner = self.lock();
        if !Inner::port_valid(port) {
            return Err(NasError::UnknownPort(port));
        }
        let cfg = inner.store.port(port)?;
        Ok(decision::port_status(inner.store.global(), cfg, inner.rt(port)))
    }

    /// Lists the clients attached to a port.
    pub fn port_clients(&self, port: PortKey) -> Result<Vec<ClientStatus>, NasError> {
        let inner = self.lock();
        if !Inner::port_valid(port) {
            return Err(NasError::UnknownPort(port));
        }
        Ok(inner
            .sessions
            .iter()
            .filter(|(_, s)| s.port == port)
            .map(|(_, s)| ClientStatus {
                mac: s.mac,
                vid: s.vid,
                state: s.state,
                stop_reason: s.stop_reason,
                identity: s.identity.clone(),
                created_at: s.created_at,
                last_activity: s.last_activity,
            })
            .collect())
    }

    /// Resets every lifetime counter.
    pub fn clear_stats(&self) {
        let mut inner = self.lock();
        inner.stats = CoordinatorStats::default();
        inner.backend.clear_stats();
        inner.sessions.clear_stats();
    }

    /// Requests re-authentication of every authorized client on a port.
    ///
    /// Soft: unauthorized clients are left to their own retry schedule.
    pub fn reauthenticate_port(&self, port: PortKey, immediate: bool) -> Result<(), NasError> {
        let inner = self.lock();
        inner.require_primary()?;
        if !Inner::port_valid(port) {
            return Err(NasError::UnknownPort(port));
        }
        for id in inner.sessions.on_port(port) {
            if inner.sessions.get(id).map(|s| s.is_authorized()).unwrap_or(false) {
                inner.engine.reauthenticate(id, immediate);
            }
        }
        Ok(())
    }

    /// Drops all admission state of a port and starts over.
    pub fn reinitialize_port(&self, port: PortKey) -> Result<(), NasError> {
        let mut inner = self.lock();
        inner.require_primary()?;
        if !Inner::port_valid(port) {
            return Err(NasError::UnknownPort(port));
        }
        inner.reinit_port(port, StopReason::Initializing);
        Ok(())
    }

    /// Switches the local role, dropping all decision state.
    pub fn set_role(&self, role: Role) {
        let mut inner = self.lock();
        if inner.role == role {
            return;
        }
        info!(?role, "role change");
        for id in inner.sessions.ids() {
            inner.free_session(id, StopReason::Initializing, false);
        }
        for unit in inner.runtime.iter_mut() {
            for rt in unit.iter_mut() {
                let link = rt.link_up;
                *rt = PortRuntime { link_up: link, ..PortRuntime::default() };
            }
        }
        inner.role = role;
        if role == Role::Primary {
            let units: Vec<UnitId> = inner.store.present_units().collect();
            for unit in units {
                inner.send_unit_state(unit);
            }
        }
    }

    pub fn role(&self) -> Role {
        self.lock().role
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.lock().stats
    }

    pub fn session_stats(&self) -> SessionStats {
        self.lock().sessions.stats()
    }

    pub fn backend_stats(&self) -> BackendStats {
        self.lock().backend.stats()
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }
}

impl Inner {
    fn port_valid(port: PortKey) -> bool {
        port.port.index() < PORTS_PER_UNIT
    }

    fn require_primary(&self) -> Result<(), NasError> {
        if self.role == Role::Primary {
            Ok(())
        } else {
            Err(NasError::NotPrimary)
        }
    }

    fn rt(&self, port: PortKey) -> &PortRuntime {
        &self.runtime[port.unit.index()][port.port.index()]
    }

    fn rt_mut(&mut self, port: PortKey) -> &mut PortRuntime {
        &mut self.runtime[port.unit.index()][port.port.index()]
    }

    /// Logs a session allocation failure. Table exhaustion is logged at
    /// most once per holdoff interval; everything else every time.
    fn alloc_failed(&mut self, port: PortKey, err: &NasError) {
        if *err == NasError::SessionTableFull {
            let due = self
                .last_exhaustion_warn
                .map_or(true, |at| self.now.saturating_sub(at) >= EXHAUSTION_WARN_HOLDOFF_SECS);
            if !due {
                return;
            }
            self.last_exhaustion_warn = Some(self.now);
        }
        warn!(%port, %err, "no session for client, leaving it blocked");
    }

    // ---- frames ------------------------------------------------------

    fn on_local_frame(&mut self, port: PortKey, vid: VlanId, frame: &[u8]) {
        self.stats.frames += 1;
        if frame.len() < 14 || frame.len() > MAX_FRAME_LEN {
            self.stats.frames_ignored += 1;
            return;
        }
        if self.role == Role::Replica {
            let msg = RelayMessage::FrameRx { port, vid, frame: frame.to_vec() };
            self.transport.to_primary(relay::encode(&msg));
            return;
        }
        self.handle_frame(port, vid, frame);
    }

    /// Primary-side handling of a credential frame, local or relayed.
    fn handle_frame(&mut self, port: PortKey, vid: VlanId, frame: &[u8]) {
        if !Self::port_valid(port) || !self.store.is_present(port.unit) {
            self.stats.frames_ignored += 1;
            return;
        }
        let global = self.store.global().clone();
        let Ok(cfg) = self.store.port(port).cloned() else {
            self.stats.frames_ignored += 1;
            return;
        };
        if !global.enabled || !cfg.mode.is_bpdu_based() || !self.rt(port).link_up {
            self.stats.frames_ignored += 1;
            return;
        }
        self.rt_mut(port).frame_seen = true;

        let mut src = [0u8; 6];
        src.copy_from_slice(&frame[6..12]);
        let mac = MacAddress::new(src);

        // A supplicant talking while the port sits on the Guest VLAN takes
        // the port off it, unless such frames are explicitly tolerated.
        if self.rt(port).vlan_origin == VlanOrigin::Guest && !global.guest_vlan_allow_eapol {
            self.exit_guest(port);
        }

        if cfg.mode.is_mac_table_based() {
            if let Some(existing) = self.sessions.find_by_mac(mac) {
                let same_port = self.sessions.get(existing).map(|s| s.port == port).unwrap_or(false);
                if same_port {
                    let now = self.now;
                    if let Ok(s) = self.sessions.get_mut(existing) {
                        s.last_activity = now;
                    }
                    self.engine.frame_received(existing, frame);
                    return;
                }
                self.stats.station_moves += 1;
                self.free_session(existing, StopReason::StationMoved, true);
            }
            if cfg.mode.is_single_client() {
                // A new supplicant displaces the current client.
                for id in self.sessions.on_port(port) {
                    self.free_session(id, StopReason::StationMoved, true);
                }
            }
            if let Err(e) = self.mac_table.add(port, mac, vid, MacAction::KeepBlocked) {
                warn!(%port, %mac, %e, "cannot admit client to the MAC table");
                return;
            }
            match self.sessions.alloc(port, mac, vid, self.now) {
                Ok(id) => {
                    self.engine.attach(id, port, cfg.mode, mac);
                    self.engine.frame_received(id, frame);
                }
                Err(e) => {
                    self.alloc_failed(port, &e);
                    let _ = self.mac_table.set_action(port, mac, vid, MacAction::Block);
                }
            }
        } else {
            // Port-based: one session carries the whole port.
            let id = match self.sessions.first_on_port(port) {
                Some(id) => id,
                None => match self.sessions.alloc(port, MacAddress::ZERO, vid, self.now) {
                    Ok(id) => {
                        self.engine.attach(id, port, cfg.mode, MacAddress::ZERO);
                        id
                    }
                    Err(e) => {
                        self.alloc_failed(port, &e);
                        return;
                    }
                },
            };
            // The supplicant may still hold a session on another port.
            if let Some(existing) = self.sessions.find_by_mac(mac) {
                if existing != id {
                    self.stats.station_moves += 1;
                    self.free_session(existing, StopReason::StationMoved, true);
                }
            }
            let _ = self.sessions.learn_mac(id, mac);
            self.engine.frame_received(id, frame);
        }
    }

    // ---- MAC admission hook ------------------------------------------

    fn on_mac_add(&mut self, port: PortKey, mac: MacAddress, vid: VlanId) -> MacAddVerdict {
        if self.role != Role::Primary || !Self::port_valid(port) {
            return MacAddVerdict::Forward;
        }
        let global_enabled = self.store.global().enabled;
        let Ok(cfg) = self.store.port(port).cloned() else {
            return MacAddVerdict::Forward;
        };
        if !global_enabled || !cfg.mode.is_mac_table_based() {
            return MacAddVerdict::Forward;
        }
        if cfg.mode.is_bpdu_based() {
            // Clients on these ports are admitted through the handshake
            // path; a plain learned MAC stays blocked.
            return MacAddVerdict::Block;
        }
        // MAC-based admission.
        if let Some(existing) = self.sessions.find_by_mac(mac) {
            if let Ok(s) = self.sessions.get(existing) {
                if s.port == port {
                    return if s.is_authorized() {
                        MacAddVerdict::Forward
                    } else {
                        MacAddVerdict::KeepBlocked
                    };
                }
            }
            self.stats.station_moves += 1;
            self.free_session(existing, StopReason::StationMoved, true);
        }
        match self.sessions.alloc(port, mac, vid, self.now) {
            Ok(id) => {
                self.engine.attach(id, port, AdmissionMode::MacBased, mac);
                MacAddVerdict::KeepBlocked
            }
            Err(e) => {
                self.alloc_failed(port, &e);
                MacAddVerdict::Block
            }
        }
    }

    fn on_mac_removed(
        &mut self,
        port: PortKey,
        mac: MacAddress,
        _vid: VlanId,
        reason: MacRemoveReason,
    ) {
        if self.role != Role::Primary {
            return;
        }
        let Some(id) = self.sessions.find_by_mac(mac) else { return };
        let owns = self.sessions.get(id).map(|s| s.port == port).unwrap_or(false);
        if !owns {
            return;
        }
        // The table already dropped the entry.
        self.free_session(id, reason.into(), false);
    }

    // ---- backend ------------------------------------------------------

    fn on_backend(&mut self, request: RequestId, outcome: Option<BackendOutcome>) {
        let Some(id) = self.backend.complete(request, outcome.as_ref()) else {
            // Superseded or freed mid-exchange.
            return;
        };
        let Ok(s) = self.sessions.get_mut(id) else { return };
        s.request = None;
        let port = s.port;
        let Ok(cfg) = self.store.port(port).cloned() else { return };
        let global = self.store.global().clone();
        match outcome {
            Some(BackendOutcome::Accept { attrs }) => {
                let vlan = if global.backend_vlan_enabled && cfg.backend_vlan_enabled {
                    backend::extract_vlan(&attrs)
                } else {
                    None
                };
                let qos = if global.backend_qos_enabled && cfg.backend_qos_enabled {
                    backend::extract_qos_class(&attrs)
                } else {
                    None
                };
                if let Ok(s) = self.sessions.get_mut(id) {
                    s.backend_vlan = vlan;
                    s.backend_qos = qos;
                }
                self.engine.backend_result(id, true);
                self.finalize_verdict(id, true, None);
            }
            Some(BackendOutcome::Reject) => {
                self.engine.backend_result(id, false);
                self.finalize_verdict(id, false, Some(StopReason::AuthFailure));
            }
            Some(BackendOutcome::Challenge { payload, state }) => {
                if let Ok(s) = self.sessions.get_mut(id) {
                    s.state = SessionState::Authenticating;
                }
                self.engine.backend_challenge(id, payload, state);
            }
            None => {
                self.engine.backend_result(id, false);
                self.finalize_verdict(id, false, Some(StopReason::BackendTimeout));
            }
        }
    }

    fn on_engine_signal(&mut self, signal: EngineSignal) {
        match signal {
            EngineSignal::Authorized { id, authorized, changed: _, reason } => {
                self.finalize_verdict(id, authorized, reason);
            }
            EngineSignal::BackendRequest { id, identity, credentials, state } => {
                let Ok(s) = self.sessions.get(id) else { return };
                let (port, mac, previous) = (s.port, s.mac, s.request);
                let Ok(cfg) = self.store.port(port) else { return };
                if !cfg.mode.uses_backend() {
                    return;
                }
                if let Ok(s) = self.sessions.get_mut(id) {
                    s.identity = identity.clone();
                    s.state = SessionState::Authenticating;
                }
                match self.backend.request(id, previous, &identity, &credentials, &state, port, mac)
                {
                    Ok(request) => {
                        if let Ok(s) = self.sessions.get_mut(id) {
                            s.request = Some(request);
                        }
                    }
                    Err(e) => {
                        warn!(%port, %e, "backend exchange failed to start");
                        self.engine.backend_result(id, false);
                        self.finalize_verdict(id, false, Some(StopReason::BackendNotConfigured));
                    }
                }
            }
            EngineSignal::Stopped { id, reason } => {
                self.free_session(id, reason, true);
            }
        }
    }

    // ---- verdicts -----------------------------------------------------

    /// Settles a session's verdict and applies all of its consequences:
    /// counters, MAC-table actions, VLAN and QoS overrides, Guest-VLAN
    /// fallback, and the port's hardware state.
    fn finalize_verdict(&mut self, id: SessionId, authorized: bool, reason: Option<StopReason>) {
        let now = self.now;
        let Ok(s) = self.sessions.get_mut(id) else { return };
        let port = s.port;
        let mac = s.mac;
        if authorized {
            s.state = SessionState::Authorized;
            s.failed_rounds = 0;
            s.last_activity = now;
        } else {
            s.state = SessionState::Unauthorized;
            s.stop_reason = reason.unwrap_or(StopReason::AuthFailure);
            // A handshake that never reached the backend does not count
            // against the Guest-VLAN round budget.
            if reason != Some(StopReason::BackendNotConfigured) {
                s.failed_rounds = s.failed_rounds.saturating_add(1);
            }
        }
        let failed_rounds = s.failed_rounds;
        let grant_vlan = s.backend_vlan;
        let grant_qos = s.backend_qos;

        let global = self.store.global().clone();
        let Ok(cfg) = self.store.port(port).cloned() else { return };

        if let Ok(s) = self.sessions.get_mut(id) {
            s.reauth_at = if authorized && global.reauth_enabled {
                Some(now + u64::from(global.reauth_period_secs))
            } else {
                None
            };
        }
        self.update_counts(port);

        if authorized {
            info!(%port, %mac, "client authorized");
        } else {
            let why = reason.unwrap_or(StopReason::AuthFailure);
            info!(%port, %mac, reason = why.as_str(), "client unauthorized");
        }

        if !authorized
            && reason != Some(StopReason::BackendNotConfigured)
            && cfg.mode.is_bpdu_based()
            && failed_rounds >= global.max_reauth_rounds
            && self.overrides.guest_entry_allowed(&global, &cfg, self.rt(port))
        {
            if let Ok(s) = self.sessions.get_mut(id) {
                s.stop_reason = StopReason::ReauthCountExceeded;
            }
            self.enter_guest(port, global.guest_vlan);
            return;
        }

        if cfg.mode.is_mac_table_based() && !mac.is_zero() {
            if !self.apply_mac_admission(id, authorized, cfg.backend_vlan_enabled) {
                return;
            }
        }

        if cfg.mode.is_single_client() {
            let unit = port.unit.index();
            let pidx = port.port.index();
            if authorized {
                if let Some(vid) = grant_vlan {
                    self.overrides.apply_vlan(
                        port,
                        &mut self.runtime[unit][pidx],
                        vid,
                        VlanOrigin::Backend,
                    );
                } else if self.runtime[unit][pidx].vlan_origin == VlanOrigin::Backend {
                    self.overrides.clear_vlan(port, &mut self.runtime[unit][pidx]);
                }
                if let Some(class) = grant_qos {
                    self.overrides.apply_qos(port, &mut self.runtime[unit][pidx], class);
                } else {
                    self.overrides.clear_qos(port, &mut self.runtime[unit][pidx]);
                }
            } else {
                if self.runtime[unit][pidx].vlan_origin == VlanOrigin::Backend {
                    self.overrides.clear_vlan(port, &mut self.runtime[unit][pidx]);
                }
                self.overrides.clear_qos(port, &mut self.runtime[unit][pidx]);
            }
        }

        self.push_port_state(port);
    }

    /// Reflects a verdict into the MAC admission table, moving the entry to
    /// a granted VLAN or back to the learned one.
    ///
    /// Returns false when the session had to be torn down.
    fn apply_mac_admission(&mut self, id: SessionId, authorized: bool, vlan_grants: bool) -> bool {
        let Ok(s) = self.sessions.get_mut(id) else { return false };
        let port = s.port;
        let mac = s.mac;
        let cur_vid = s.vid;
        let action = if authorized { MacAction::Forward } else { MacAction::Block };
        let target = if authorized && vlan_grants { s.backend_vlan } else { None };

        match target {
            Some(want) if want != cur_vid => {
                if s.revert_vid.is_none() {
                    s.revert_vid = Some(cur_vid);
                }
                s.vid = want;
                // The entry must be deleted on the old VLAN before it can
                // exist on the new one.
                self.mac_table.remove(port, mac, cur_vid);
                if let Err(e) = self.mac_table.add(port, mac, want, action) {
                    warn!(%port, %mac, %e, "cannot move client to assigned VLAN");
                    self.free_session(id, StopReason::AdmissionTableError, false);
                    return false;
                }
            }
            None if s.revert_vid.is_some() => {
                let back = s.revert_vid.take().unwrap_or(cur_vid);
                s.vid = back;
                self.mac_table.remove(port, mac, cur_vid);
                if let Err(e) = self.mac_table.add(port, mac, back, action) {
                    warn!(%port, %mac, %e, "cannot restore client VLAN");
                    self.free_session(id, StopReason::AdmissionTableError, false);
                    return false;
                }
            }
            _ => {
                if let Err(e) = self.mac_table.set_action(port, mac, cur_vid, action) {
                    warn!(%port, %mac, %e, "cannot update client admission");
                    self.free_session(id, StopReason::AdmissionTableError, false);
                    return false;
                }
            }
        }
        true
    }

    // ---- guest VLAN ---------------------------------------------------

    fn enter_guest(&mut self, port: PortKey, guest_vlan: VlanId) {
        self.stats.guest_entries += 1;
        let unit = port.unit.index();
        let pidx = port.port.index();
        self.overrides.enter_guest(port, &mut self.runtime[unit][pidx], guest_vlan);
        let mode = self.store.port(port).map(|c| c.mode).unwrap_or_default();
        for id in self.sessions.on_port(port) {
            let (mac, vid) = match self.sessions.get_mut(id) {
                Ok(s) => {
                    s.state = SessionState::GuestVlan;
                    (s.mac, s.vid)
                }
                Err(_) => continue,
            };
            self.engine.set_fake_authorized(id, true);
            if mode.is_mac_table_based() && !mac.is_zero() {
                let _ = self.mac_table.set_action(port, mac, vid, MacAction::Forward);
            }
        }
        self.update_counts(port);
        self.push_port_state(port);
    }

    fn exit_guest(&mut self, port: PortKey) {
        let unit = port.unit.index();
        let pidx = port.port.index();
        if !self.overrides.exit_guest(port, &mut self.runtime[unit][pidx]) {
            return;
        }
        let now = self.now;
        for id in self.sessions.on_port(port) {
            if let Ok(s) = self.sessions.get_mut(id) {
                s.restart(now);
                s.failed_rounds = 0;
            }
            self.engine.set_fake_authorized(id, false);
            self.engine.reinitialize(id);
        }
        self.update_counts(port);
        self.push_port_state(port);
    }

    // ---- link and units -----------------------------------------------

    fn on_link_change(&mut self, port: PortKey, up: bool) {
        if !Self::port_valid(port) {
            return;
        }
        {
            let rt = self.rt_mut(port);
            if rt.link_up == up {
                return;
            }
            rt.link_up = up;
            rt.frame_seen = false;
        }
        debug!(%port, up, "link change");
        if self.role != Role::Primary {
            return;
        }
        if up {
            self.start_port(port);
        } else {
            for id in self.sessions.on_port(port) {
                self.free_session(id, StopReason::LinkDown, true);
            }
            let unit = port.unit.index();
            let pidx = port.port.index();
            self.overrides.clear_all(port, &mut self.runtime[unit][pidx]);
            self.update_counts(port);
        }
        self.push_port_state(port);
    }

    /// Brings a port under admission control after link-up or a reapply.
    fn start_port(&mut self, port: PortKey) {
        let global = self.store.global();
        let Ok(cfg) = self.store.port(port) else { return };
        if decision::effective_mode(global, cfg) != AdmissionMode::PortBased {
            return;
        }
        if self.sessions.first_on_port(port).is_some() {
            return;
        }
        let mode = cfg.mode;
        match self.sessions.alloc(port, MacAddress::ZERO, VlanId::DEFAULT, self.now) {
            Ok(id) => self.engine.attach(id, port, mode, MacAddress::ZERO),
            Err(e) => self.alloc_failed(port, &e),
        }
    }

    fn on_unit_join(&mut self, unit: UnitId) {
        info!(%unit, "unit joined the stack");
        self.store.set_present(unit, true);
        self.runtime[unit.index()] = vec![PortRuntime::default(); PORTS_PER_UNIT];
        if self.role == Role::Primary {
            self.send_unit_state(unit);
        }
    }

    fn on_unit_leave(&mut self, unit: UnitId) {
        info!(%unit, "unit left the stack");
        self.store.set_present(unit, false);
        if self.role == Role::Primary {
            let ids: Vec<SessionId> = self
                .sessions
                .iter()
                .filter(|(_, s)| s.port.unit == unit)
                .map(|(id, _)| id)
                .collect();
            for id in ids {
                self.free_session(id, StopReason::Reboot, false);
            }
        }
        self.runtime[unit.index()] = vec![PortRuntime::default(); PORTS_PER_UNIT];
    }

    /// Pushes the authorization state of every port of a unit, as one
    /// snapshot message for remote units or directly for local ports.
    fn send_unit_state(&mut self, unit: UnitId) {
        let global = self.store.global().clone();
        let authorized: Vec<bool> = (0..PORTS_PER_UNIT)
            .map(|i| {
                let key = PortKey::new(unit, PortNo(i as u16));
                match self.store.port(key) {
                    Ok(cfg) => decision::hardware_authorized(&global, cfg, self.rt(key)),
                    Err(_) => true,
                }
            })
            .collect();
        if unit == self.local_unit {
            for (i, auth) in authorized.iter().enumerate() {
                self.hardware.set_authorized(PortKey::new(unit, PortNo(i as u16)), *auth);
            }
        } else {
            let msg = RelayMessage::UnitState { unit, authorized };
            self.transport.send(unit, relay::encode(&msg));
        }
    }

    // ---- relay --------------------------------------------------------

    fn on_relay(&mut self, from: UnitId, payload: &[u8]) {
        let msg = match relay::decode(payload) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(%from, %e, "dropping relay message");
                self.stats.relay_dropped += 1;
                return;
            }
        };
        match msg {
            RelayMessage::PortState { port, authorized } => {
                if port.unit == self.local_unit && Self::port_valid(port) {
                    self.hardware.set_authorized(port, authorized);
                } else {
                    self.stats.relay_dropped += 1;
                }
            }
            RelayMessage::UnitState { unit, authorized } => {
                if unit == self.local_unit {
                    for (i, auth) in authorized.iter().take(PORTS_PER_UNIT).enumerate() {
                        self.hardware.set_authorized(PortKey::new(unit, PortNo(i as u16)), *auth);
                    }
                } else {
                    self.stats.relay_dropped += 1;
                }
            }
            RelayMessage::FrameTx { port, frame } => {
                if port.unit == self.local_unit && Self::port_valid(port) {
                    self.hardware.transmit_frame(port, &frame);
                } else {
                    self.stats.relay_dropped += 1;
                }
            }
            RelayMessage::FrameRx { port, vid, frame } => {
                if self.role == Role::Primary {
                    self.handle_frame(port, vid, &frame);
                } else {
                    self.stats.relay_dropped += 1;
                }
            }
        }
    }

    // ---- timer --------------------------------------------------------

    fn on_tick(&mut self) {
        self.now += 1;
        if self.role != Role::Primary {
            return;
        }
        let global = self.store.global().clone();
        if !global.reauth_enabled {
            return;
        }
        let now = self.now;
        for id in self.sessions.ids() {
            let due = self
                .sessions
                .get(id)
                .map(|s| s.is_authorized() && s.reauth_at.is_some_and(|at| at <= now))
                .unwrap_or(false);
            if due {
                if let Ok(s) = self.sessions.get_mut(id) {
                    s.reauth_at = Some(now + u64::from(global.reauth_period_secs));
                }
                self.engine.reauthenticate(id, false);
            }
        }
    }

    // ---- configuration ------------------------------------------------

    fn set_unit_config(&mut self, unit: UnitId, cfg: UnitConfig) -> Result<(), NasError> {
        if cfg.ports.len() != PORTS_PER_UNIT {
            return Err(NasError::InvalidParameter(format!(
                "unit {unit} config must cover {PORTS_PER_UNIT} ports"
            )));
        }
        // Admission control cannot coexist with aggregation or STP.
        for (i, pc) in cfg.ports.iter().enumerate() {
            if pc.mode == AdmissionMode::Disabled {
                continue;
            }
            let key = PortKey::new(unit, PortNo(i as u16));
            if self.compat.is_aggregated(key) {
                return Err(NasError::PortIsAggregated(key));
            }
            if self.compat.in_spanning_tree(key) {
                return Err(NasError::PortInStp(key));
            }
        }
        let old = self.store.unit(unit).clone();
        let scope = self.store.set_unit(unit, cfg.clone())?;
        if scope == ReapplyScope::Unit {
            for i in 0..PORTS_PER_UNIT {
                if old.ports[i] != cfg.ports[i] {
                    let reason = if cfg.ports[i].mode == AdmissionMode::ForceUnauthorized {
                        StopReason::ForcedUnauthorized
                    } else {
                        StopReason::ModeChanged
                    };
                    self.reinit_port(PortKey::new(unit, PortNo(i as u16)), reason);
                }
            }
            if self.store.is_present(unit) {
                self.send_unit_state(unit);
            }
        }
        Ok(())
    }

    /// Applies an accepted global configuration change.
    ///
    /// Timer parameters propagate to the collaborators that run them, and
    /// re-authentication parameters reschedule live sessions in place.
    /// Only changes that reshape admission itself restart the ports.
    fn apply_global_change(&mut self, old: &GlobalConfig) {
        let new = self.store.global().clone();
        self.push_timer_config();
        let disruptive = old.enabled != new.enabled
            || old.backend_vlan_enabled != new.backend_vlan_enabled
            || old.backend_qos_enabled != new.backend_qos_enabled
            || old.guest_vlan_enabled != new.guest_vlan_enabled
            || old.guest_vlan != new.guest_vlan
            || old.guest_vlan_allow_eapol != new.guest_vlan_allow_eapol;
        if disruptive {
            self.apply_scope(ReapplyScope::Global, None);
            return;
        }
        if old.reauth_enabled != new.reauth_enabled
            || old.reauth_period_secs != new.reauth_period_secs
        {
            let now = self.now;
            for id in self.sessions.ids() {
                if let Ok(s) = self.sessions.get_mut(id) {
                    if s.is_authorized() {
                        s.reauth_at = if new.reauth_enabled {
                            Some(now + u64::from(new.reauth_period_secs))
                        } else {
                            None
                        };
                    }
                }
            }
        }
    }

    /// Pushes the global timer parameters to the collaborators owning them.
    fn push_timer_config(&mut self) {
        let g = self.store.global();
        let aging = g.aging_enabled.then_some(g.aging_period_secs);
        let hold = g.hold_enabled.then_some(g.hold_time_secs);
        self.mac_table.set_timers(aging, hold);
        self.engine.set_eapol_timeout(g.eapol_timeout_secs);
    }

    fn apply_scope(&mut self, scope: ReapplyScope, unit: Option<UnitId>) {
        match scope {
            ReapplyScope::None => {}
            ReapplyScope::Unit => {
                if let Some(unit) = unit {
                    self.reapply_unit(unit);
                }
            }
            ReapplyScope::Global => {
                let units: Vec<UnitId> = self.store.present_units().collect();
                for unit in units {
                    self.reapply_unit(unit);
                }
            }
        }
    }

    fn reapply_unit(&mut self, unit: UnitId) {
        for i in 0..PORTS_PER_UNIT {
            self.reinit_port(PortKey::new(unit, PortNo(i as u16)), StopReason::Initializing);
        }
        if self.store.is_present(unit) {
            self.send_unit_state(unit);
        }
    }

    /// Tears down everything on a port and starts over under the current
    /// configuration.
    fn reinit_port(&mut self, port: PortKey, reason: StopReason) {
        for id in self.sessions.on_port(port) {
            self.free_session(id, reason, true);
        }
        let unit = port.unit.index();
        let pidx = port.port.index();
        self.overrides.clear_all(port, &mut self.runtime[unit][pidx]);
        self.rt_mut(port).frame_seen = false;
        self.update_counts(port);
        if self.rt(port).link_up {
            self.start_port(port);
        }
        self.push_port_state(port);
    }

    // ---- shared plumbing ----------------------------------------------

    fn free_session(&mut self, id: SessionId, reason: StopReason, remove_entry: bool) {
        let Ok(s) = self.sessions.get(id) else { return };
        let (port, mac, vid, request) = (s.port, s.mac, s.vid, s.request);
        self.engine.detach(id);
        if let Some(request) = request {
            self.backend.abandon(request);
        }
        if self.sessions.free(id).is_none() {
            return;
        }
        info!(%port, %mac, reason = reason.as_str(), "session freed");
        let mode = self.store.port(port).map(|c| c.mode).unwrap_or_default();
        if remove_entry && mode.is_mac_table_based() && !mac.is_zero() {
            self.mac_table.remove(port, mac, vid);
        }
        self.update_counts(port);
        if mode.is_single_client() && self.sessions.on_port(port).is_empty() {
            let unit = port.unit.index();
            let pidx = port.port.index();
            if self.runtime[unit][pidx].vlan_origin == VlanOrigin::Backend {
                self.overrides.clear_vlan(port, &mut self.runtime[unit][pidx]);
            }
            self.overrides.clear_qos(port, &mut self.runtime[unit][pidx]);
        }
        self.push_port_state(port);
    }

    fn update_counts(&mut self, port: PortKey) {
        let mut auth = 0;
        let mut unauth = 0;
        for (_, s) in self.sessions.iter() {
            if s.port != port {
                continue;
            }
            match s.state {
                SessionState::Authorized => auth += 1,
                SessionState::Unauthorized => unauth += 1,
                _ => {}
            }
        }
        let rt = self.rt_mut(port);
        rt.auth_count = auth;
        rt.unauth_count = unauth;
    }

    /// Programs (or relays) the hardware forwarding state of a port.
    fn push_port_state(&mut self, port: PortKey) {
        if self.role != Role::Primary {
            return;
        }
        let global = self.store.global();
        let Ok(cfg) = self.store.port(port) else { return };
        let authorized = decision::hardware_authorized(global, cfg, self.rt(port));
        if port.unit == self.local_unit {
            self.hardware.set_authorized(port, authorized);
        } else if self.store.is_present(port.unit) {
            let msg = RelayMessage::PortState { port, authorized };
            self.transport.send(port.unit, relay::encode(&msg));
        }
    }
}
