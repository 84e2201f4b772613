//! Port VLAN and QoS overrides, including Guest-VLAN fallback.

mod controller;

pub use controller::{OverrideCallbacks, OverrideController};
