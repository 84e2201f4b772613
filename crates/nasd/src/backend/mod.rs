//! Backend authentication server exchange.
//!
//! The backend (a RADIUS-style AAA server) is reached through the
//! [`BackendClient`] seam. The orchestrator enforces the one-outstanding-
//! request-per-session rule and routes responses back to sessions; the
//! attribute parser pulls VLAN and QoS assignments out of acceptances.

mod attrs;
mod orch;

pub use attrs::{
    extract_qos_class, extract_vlan, Attribute, ATTR_TUNNEL_MEDIUM_TYPE,
    ATTR_TUNNEL_PRIVATE_GROUP_ID, ATTR_TUNNEL_TYPE, ATTR_USER_PRIORITY_TABLE,
};
pub use orch::{BackendClient, BackendOrch, BackendOutcome, BackendStats, RequestId};
