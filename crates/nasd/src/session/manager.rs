//! Session table with MAC lookup.

use super::arena::{Arena, SessionId, NAS_MAX_SESSIONS};
use super::session::Session;
use crate::error::NasError;
use nas_types::{MacAddress, PortKey, VlanId};
use std::collections::HashMap;
use tracing::warn;

/// Lifetime counters for the session table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub allocated: u64,
    pub freed: u64,
    pub alloc_failures: u64,
    pub peak: usize,
}

/// Owns every live session and the MAC address index over them.
#[derive(Debug)]
pub struct SessionManager {
    arena: Arena<Session>,
    by_mac: HashMap<MacAddress, SessionId>,
    stats: SessionStats,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        SessionManager {
            arena: Arena::new(NAS_MAX_SESSIONS),
            by_mac: HashMap::new(),
            stats: SessionStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn clear_stats(&mut self) {
        self.stats = SessionStats::default();
    }

    /// Allocates a session for a client.
    ///
    /// Port-wide sessions pass the zero MAC and are not indexed until a
    /// credential frame reveals the supplicant's address.
    pub fn alloc(
        &mut self,
        port: PortKey,
        mac: MacAddress,
        vid: VlanId,
        now: u64,
    ) -> Result<SessionId, NasError> {
        if !mac.is_zero() && self.by_mac.contains_key(&mac) {
            warn!(%port, %mac, "client already has a session");
            return Err(NasError::InvalidParameter(format!(
                "client {mac} already has a session"
            )));
        }
        let Some(id) = self.arena.insert(Session::new(port, mac, vid, now)) else {
            self.stats.alloc_failures += 1;
            return Err(NasError::SessionTableFull);
        };
        if !mac.is_zero() {
            self.by_mac.insert(mac, id);
        }
        self.stats.allocated += 1;
        self.stats.peak = self.stats.peak.max(self.arena.len());
        Ok(id)
    }

    /// Frees a session. Stale handles return `None`, so a free racing a
    /// free is harmless.
    pub fn free(&mut self, id: SessionId) -> Option<Session> {
        let session = self.arena.remove(id)?;
        if !session.mac.is_zero() {
            self.by_mac.remove(&session.mac);
        }
        self.stats.freed += 1;
        Some(session)
    }

    pub fn get(&self, id: SessionId) -> Result<&Session, NasError> {
        self.arena.get(id).ok_or(NasError::StaleSessionId)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Result<&mut Session, NasError> {
        self.arena.get_mut(id).ok_or(NasError::StaleSessionId)
    }

    pub fn find_by_mac(&self, mac: MacAddress) -> Option<SessionId> {
        self.by_mac.get(&mac).copied()
    }

    /// Records the supplicant MAC learned on a port-wide session.
    ///
    /// Refuses a MAC that is indexed to a different live session; the
    /// caller must free that session first.
    pub fn learn_mac(&mut self, id: SessionId, mac: MacAddress) -> Result<(), NasError> {
        if let Some(&owner) = self.by_mac.get(&mac) {
            if owner != id {
                warn!(%mac, "client already has a session");
                return Err(NasError::InvalidParameter(format!(
                    "client {mac} already has a session"
                )));
            }
        }
        let session = self.arena.get_mut(id).ok_or(NasError::StaleSessionId)?;
        if session.mac == mac {
            return Ok(());
        }
        if !session.mac.is_zero() {
            self.by_mac.remove(&session.mac);
        }
        session.mac = mac;
        if !mac.is_zero() {
            self.by_mac.insert(mac, id);
        }
        Ok(())
    }

    /// Sessions attached to one port.
    pub fn on_port(&self, port: PortKey) -> Vec<SessionId> {
        self.arena
            .iter()
            .filter(|(_, s)| s.port == port)
            .map(|(id, _)| id)
            .collect()
    }

    /// The single session of a port-wide port, if any.
    pub fn first_on_port(&self, port: PortKey) -> Option<SessionId> {
        self.arena.iter().find(|(_, s)| s.port == port).map(|(id, _)| id)
    }

    /// All live session handles.
    pub fn ids(&self) -> Vec<SessionId> {
        self.arena.ids()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SessionId, &Session)> {
        self.arena.iter()
    }
}
