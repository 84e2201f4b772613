//! Collaborator seams of the coordinator.

use crate::error::NasError;
use nas_types::{MacAddress, PortKey, VlanId};

/// Forwarding decision for one admission-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacAction {
    /// Traffic from this MAC forwards.
    Forward,
    /// Traffic from this MAC is dropped; the hold timer runs.
    Block,
    /// Traffic is dropped and the entry is pinned until a decision is made.
    KeepBlocked,
}

/// Immediate verdict for a newly learned MAC address.
///
/// Returned synchronously from [`super::Coordinator::on_mac_add`]; the
/// admission table installs the entry with this action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacAddVerdict {
    Forward,
    Block,
    KeepBlocked,
}

/// Seam to the MAC admission table.
///
/// The table owns client aging and hold timers; expiries come back to the
/// coordinator as [`super::MacRemoveReason`] events.
pub trait MacTable: Send + Sync {
    /// Installs an entry for a client learned outside the admission hook
    /// (station moves, VLAN moves).
    fn add(
        &self,
        port: PortKey,
        mac: MacAddress,
        vid: VlanId,
        action: MacAction,
    ) -> Result<(), NasError>;

    /// Changes the action of an existing entry.
    fn set_action(
        &self,
        port: PortKey,
        mac: MacAddress,
        vid: VlanId,
        action: MacAction,
    ) -> Result<(), NasError>;

    /// Removes an entry.
    fn remove(&self, port: PortKey, mac: MacAddress, vid: VlanId);

    /// Reloads the table's aging and hold timers. `None` disables the
    /// respective timer.
    fn set_timers(&self, aging_secs: Option<u32>, hold_secs: Option<u32>);
}

/// Seam to the local port hardware.
pub trait PortHardware: Send + Sync {
    /// Programs the port's forwarding state.
    fn set_authorized(&self, port: PortKey, authorized: bool);

    /// Transmits a credential frame out a local port.
    fn transmit_frame(&self, port: PortKey, frame: &[u8]);
}

/// Answers whether a port can be placed under admission control.
///
/// Admission control is mutually exclusive with link aggregation and with
/// spanning-tree participation.
pub trait PortCompatProvider: Send + Sync {
    fn is_aggregated(&self, port: PortKey) -> bool;

    fn in_spanning_tree(&self, port: PortKey) -> bool;
}
