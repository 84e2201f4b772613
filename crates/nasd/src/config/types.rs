//! Configuration and runtime state types.

use nas_types::{PriorityClass, VlanId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-port admission mode.
///
/// The mode decides how clients on a port gain access: not at all, always,
/// via a port-wide credential exchange, or per client MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdmissionMode {
    /// Admission control disabled on the port; traffic flows freely.
    #[default]
    Disabled,
    /// Port is always authorized, no handshake required.
    ForceAuthorized,
    /// Port is never authorized.
    ForceUnauthorized,
    /// One credential exchange authorizes the whole port.
    PortBased,
    /// Credential exchange per client, but a single client may be attached.
    SingleClient,
    /// Credential exchange per client, any number of clients.
    MultiClient,
    /// Clients are admitted by MAC address, authenticated against the
    /// backend without any supplicant interaction.
    MacBased,
}

impl AdmissionMode {
    /// Modes driven by credential-exchange frames from a supplicant.
    pub fn is_bpdu_based(&self) -> bool {
        matches!(
            self,
            AdmissionMode::PortBased | AdmissionMode::SingleClient | AdmissionMode::MultiClient
        )
    }

    /// Modes where clients are tracked per MAC address in the admission table.
    pub fn is_mac_table_based(&self) -> bool {
        matches!(
            self,
            AdmissionMode::SingleClient | AdmissionMode::MultiClient | AdmissionMode::MacBased
        )
    }

    /// Modes allowing at most one attached client.
    pub fn is_single_client(&self) -> bool {
        matches!(self, AdmissionMode::PortBased | AdmissionMode::SingleClient)
    }

    /// Modes that consult the backend server.
    pub fn uses_backend(&self) -> bool {
        matches!(
            self,
            AdmissionMode::PortBased
                | AdmissionMode::SingleClient
                | AdmissionMode::MultiClient
                | AdmissionMode::MacBased
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionMode::Disabled => "disabled",
            AdmissionMode::ForceAuthorized => "force-authorized",
            AdmissionMode::ForceUnauthorized => "force-unauthorized",
            AdmissionMode::PortBased => "port-based",
            AdmissionMode::SingleClient => "single-client",
            AdmissionMode::MultiClient => "multi-client",
            AdmissionMode::MacBased => "mac-based",
        }
    }
}

impl fmt::Display for AdmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdmissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" => Ok(AdmissionMode::Disabled),
            "force-authorized" => Ok(AdmissionMode::ForceAuthorized),
            "force-unauthorized" => Ok(AdmissionMode::ForceUnauthorized),
            "port-based" => Ok(AdmissionMode::PortBased),
            "single-client" => Ok(AdmissionMode::SingleClient),
            "multi-client" => Ok(AdmissionMode::MultiClient),
            "mac-based" => Ok(AdmissionMode::MacBased),
            _ => Err(format!("unknown admission mode: {s}")),
        }
    }
}

/// Switch-wide admission configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Master enable. When false every port behaves as force-authorized.
    pub enabled: bool,
    /// Re-authenticate authorized clients periodically.
    pub reauth_enabled: bool,
    /// Seconds between periodic re-authentications.
    pub reauth_period_secs: u16,
    /// Seconds to wait for a supplicant reply before retransmitting.
    pub eapol_timeout_secs: u16,
    /// Free idle MAC-based clients after this many seconds.
    pub aging_enabled: bool,
    pub aging_period_secs: u32,
    /// Keep a failed client blocked for this many seconds.
    pub hold_enabled: bool,
    pub hold_time_secs: u32,
    /// Accept VLAN assignments from the backend anywhere on the switch.
    pub backend_vlan_enabled: bool,
    /// Accept QoS class assignments from the backend anywhere on the switch.
    pub backend_qos_enabled: bool,
    /// Master enable for Guest-VLAN fallback.
    pub guest_vlan_enabled: bool,
    /// Allow clients on the Guest VLAN to have sent credential frames.
    pub guest_vlan_allow_eapol: bool,
    /// Maximum failed handshake rounds before Guest-VLAN fallback.
    pub max_reauth_rounds: u8,
    /// The VLAN unauthorized ports are moved to, when fallback is enabled.
    pub guest_vlan: VlanId,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        GlobalConfig {
            enabled: false,
            reauth_enabled: false,
            reauth_period_secs: 3600,
            eapol_timeout_secs: 30,
            aging_enabled: true,
            aging_period_secs: 300,
            hold_enabled: true,
            hold_time_secs: 10,
            backend_vlan_enabled: false,
            backend_qos_enabled: false,
            guest_vlan_enabled: false,
            guest_vlan_allow_eapol: false,
            max_reauth_rounds: 2,
            guest_vlan: VlanId::DEFAULT,
        }
    }
}

/// Per-port admission configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortConfig {
    pub mode: AdmissionMode,
    /// Accept a VLAN assignment from the backend on this port.
    pub backend_vlan_enabled: bool,
    /// Accept a QoS class assignment from the backend on this port.
    pub backend_qos_enabled: bool,
    /// Fall back to the Guest VLAN after repeated failures.
    pub guest_vlan_enabled: bool,
}

/// Configuration for all ports of one stack unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitConfig {
    pub ports: Vec<PortConfig>,
}

impl Default for UnitConfig {
    fn default() -> Self {
        UnitConfig {
            ports: vec![PortConfig::default(); super::PORTS_PER_UNIT],
        }
    }
}

/// Where the port's current VLAN membership came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VlanOrigin {
    /// No override is in effect.
    #[default]
    None,
    /// The backend assigned the VLAN in an acceptance.
    Backend,
    /// The port fell back to the Guest VLAN.
    Guest,
}

/// Per-port runtime state owned by the coordinator.
///
/// Everything in here is derived; it is rebuilt from scratch when the port's
/// configuration changes or its unit leaves the stack.
#[derive(Debug, Clone, Default)]
pub struct PortRuntime {
    pub link_up: bool,
    /// Current VLAN override, if any.
    pub vlan_origin: VlanOrigin,
    pub overridden_vlan: Option<VlanId>,
    /// Current QoS override, if any.
    pub overridden_qos: Option<PriorityClass>,
    /// A credential frame was seen on the port since link-up. Used to gate
    /// Guest-VLAN entry when `guest_vlan_allow_eapol` is off.
    pub frame_seen: bool,
    /// Counts of attached clients by verdict.
    pub auth_count: u32,
    pub unauth_count: u32,
}

impl PortRuntime {
    /// The single flag reported for a multi-client port: authorized when at
    /// least one client is authorized and none is unauthorized.
    pub fn multi_client_authorized(&self) -> bool {
        self.auth_count > 0 && self.unauth_count == 0
    }
}

/// How much derived state a configuration change invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReapplyScope {
    /// Nothing to redo.
    None,
    /// Re-apply admission state on one unit's ports.
    Unit,
    /// Re-apply admission state on every port of every unit.
    Global,
}
