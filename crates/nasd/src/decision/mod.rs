//! Admission decision evaluation.
//!
//! Pure functions from configuration and runtime state to the port's
//! admission outcome. The coordinator applies the results; nothing in here
//! touches hardware or sessions.

use crate::config::{AdmissionMode, GlobalConfig, PortConfig, PortRuntime, VlanOrigin};

/// Operator-visible admission status of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortStatus {
    /// Admission control not active on the port.
    Disabled,
    Authorized,
    Unauthorized,
    /// Port is sitting on the Guest VLAN.
    GuestVlan,
    /// Per-client accounting for multi-client and MAC-based ports.
    PerClient { authorized: u32, unauthorized: u32 },
}

/// The admission mode actually in force on a port.
///
/// When admission control is globally disabled every port fails open and
/// behaves as force-authorized, whatever its own configuration says. A port
/// whose own mode is disabled also fails open.
pub fn effective_mode(global: &GlobalConfig, cfg: &PortConfig) -> AdmissionMode {
    if !global.enabled || cfg.mode == AdmissionMode::Disabled {
        AdmissionMode::ForceAuthorized
    } else {
        cfg.mode
    }
}

/// The hardware forwarding state to program for a port.
///
/// MAC-table-based modes keep the port itself open; admission is enforced
/// per client MAC by the admission table. A port on the Guest VLAN forwards.
pub fn hardware_authorized(global: &GlobalConfig, cfg: &PortConfig, rt: &PortRuntime) -> bool {
    match effective_mode(global, cfg) {
        AdmissionMode::Disabled | AdmissionMode::ForceAuthorized => true,
        AdmissionMode::ForceUnauthorized => false,
        AdmissionMode::SingleClient | AdmissionMode::MultiClient | AdmissionMode::MacBased => true,
        AdmissionMode::PortBased => rt.vlan_origin == VlanOrigin::Guest || rt.auth_count > 0,
    }
}

/// The status reported to operators for a port.
pub fn port_status(global: &GlobalConfig, cfg: &PortConfig, rt: &PortRuntime) -> PortStatus {
    if !global.enabled || cfg.mode == AdmissionMode::Disabled {
        return PortStatus::Disabled;
    }
    if !rt.link_up {
        return PortStatus::Unauthorized;
    }
    match cfg.mode {
        AdmissionMode::Disabled => PortStatus::Disabled,
        AdmissionMode::ForceAuthorized => PortStatus::Authorized,
        AdmissionMode::ForceUnauthorized => PortStatus::Unauthorized,
        AdmissionMode::PortBased | AdmissionMode::SingleClient => {
            if rt.vlan_origin == VlanOrigin::Guest {
                PortStatus::GuestVlan
            } else if rt.auth_count > 0 {
                PortStatus::Authorized
            } else {
                PortStatus::Unauthorized
            }
        }
        AdmissionMode::MultiClient | AdmissionMode::MacBased => {
            if rt.vlan_origin == VlanOrigin::Guest {
                PortStatus::GuestVlan
            } else {
                PortStatus::PerClient {
                    authorized: rt.auth_count,
                    unauthorized: rt.unauth_count,
                }
            }
        }
    }
}
