//! Standalone platform adapters.
//!
//! These implement the coordinator's seams for a single-unit switch with no
//! hardware bindings: intended state is logged, the relay has no peers, and
//! no port is aggregated or running spanning tree. Deployments replace them
//! with SDK-backed implementations.

use crate::backend::{BackendClient, RequestId};
use crate::coordinator::{MacAction, MacTable, PortCompatProvider, PortHardware};
use crate::error::NasError;
use crate::overrides::OverrideCallbacks;
use crate::relay::RelayTransport;
use nas_types::{MacAddress, PortKey, PriorityClass, UnitId, VlanId};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

#[derive(Default)]
pub struct StandaloneHardware;

impl PortHardware for StandaloneHardware {
    fn set_authorized(&self, port: PortKey, authorized: bool) {
        info!(%port, authorized, "port forwarding state");
    }

    fn transmit_frame(&self, port: PortKey, frame: &[u8]) {
        debug!(%port, len = frame.len(), "transmit credential frame");
    }
}

#[derive(Default)]
pub struct StandaloneMacTable;

impl MacTable for StandaloneMacTable {
    fn add(
        &self,
        port: PortKey,
        mac: MacAddress,
        vid: VlanId,
        action: MacAction,
    ) -> Result<(), NasError> {
        info!(%port, %mac, %vid, ?action, "MAC table add");
        Ok(())
    }

    fn set_action(
        &self,
        port: PortKey,
        mac: MacAddress,
        vid: VlanId,
        action: MacAction,
    ) -> Result<(), NasError> {
        info!(%port, %mac, %vid, ?action, "MAC table action change");
        Ok(())
    }

    fn remove(&self, port: PortKey, mac: MacAddress, vid: VlanId) {
        info!(%port, %mac, %vid, "MAC table remove");
    }

    fn set_timers(&self, aging_secs: Option<u32>, hold_secs: Option<u32>) {
        info!(?aging_secs, ?hold_secs, "MAC table timers");
    }
}

#[derive(Default)]
pub struct StandaloneVlanQos;

impl OverrideCallbacks for StandaloneVlanQos {
    fn set_pvid(&self, port: PortKey, vid: VlanId) {
        info!(%port, %vid, "PVID override");
    }

    fn clear_pvid(&self, port: PortKey) {
        info!(%port, "PVID restored");
    }

    fn join_vlan(&self, port: PortKey, vid: VlanId) {
        info!(%port, %vid, "VLAN membership add");
    }

    fn leave_vlan(&self, port: PortKey, vid: VlanId) {
        info!(%port, %vid, "VLAN membership remove");
    }

    fn set_qos_class(&self, port: PortKey, class: PriorityClass) {
        info!(%port, %class, "QoS class override");
    }

    fn clear_qos_class(&self, port: PortKey) {
        info!(%port, "QoS class restored");
    }
}

/// A relay transport with no peers.
#[derive(Default)]
pub struct StandaloneTransport;

impl RelayTransport for StandaloneTransport {
    fn send(&self, unit: UnitId, _payload: Vec<u8>) {
        debug!(%unit, "dropping relay message, no stack peers");
    }

    fn to_primary(&self, _payload: Vec<u8>) {
        debug!("dropping relay message, no stack peers");
    }

    fn broadcast(&self, _payload: Vec<u8>) {}
}

#[derive(Default)]
pub struct StandalonePortCompat;

impl PortCompatProvider for StandalonePortCompat {
    fn is_aggregated(&self, _port: PortKey) -> bool {
        false
    }

    fn in_spanning_tree(&self, _port: PortKey) -> bool {
        false
    }
}

/// A backend client that is never ready.
///
/// Keeps the daemon honest until a real AAA client is wired in: every
/// exchange fails fast with a not-ready error instead of hanging clients in
/// the authenticating state.
#[derive(Default)]
pub struct OfflineBackend {
    next: AtomicU64,
}

impl BackendClient for OfflineBackend {
    fn allocate(&self) -> Option<RequestId> {
        Some(self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn submit(
        &self,
        _request: RequestId,
        identity: &str,
        _credentials: &[u8],
        _state: &[u8],
        _port: PortKey,
        _mac: MacAddress,
    ) -> bool {
        debug!(identity, "no backend server configured");
        false
    }

    fn release(&self, _request: RequestId) {}
}
