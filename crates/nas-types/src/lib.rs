//! Common value types for the NAS admission-control plane.
//!
//! These types are shared by every crate in the workspace. They are all
//! small, `Copy`, validated-on-construction newtypes, so that out-of-range
//! VLAN ids, unit numbers, or priority classes cannot travel past a module
//! boundary.

mod mac;
mod port;
mod vlan;

pub use mac::MacAddress;
pub use port::{PortKey, PortNo, PriorityClass, UnitId};
pub use vlan::VlanId;

use thiserror::Error;

/// Errors produced when parsing or validating NAS value types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid MAC address: {0}")]
    InvalidMacAddress(String),
    #[error("Invalid VLAN id: {0} (valid range 1-4094)")]
    InvalidVlanId(u16),
    #[error("Invalid unit id: {0} (valid range 1-{})", UnitId::MAX)]
    InvalidUnitId(u8),
    #[error("Invalid priority class: {0} (valid range 0-7)")]
    InvalidPriority(u8),
}
