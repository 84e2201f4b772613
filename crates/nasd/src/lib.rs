//! nasd - port admission control for a stacked switch.
//!
//! The daemon coordinates network access control on switch ports: which
//! clients may send traffic, on which VLAN, and at which priority, based on
//! credential exchanges with the attached clients and on decisions from a
//! central authentication backend.
//!
//! # Architecture
//!
//! ```text
//! [frames] ──┐                         ┌──> [port hardware]
//! [relay]  ──┤                         ├──> [MAC table]
//! [backend]──┼──> event queue ──> [Coordinator] ──> [VLAN / QoS]
//! [engine] ──┤                         ├──> [relay transport]
//! [timer]  ──┘                         └──> [backend client]
//! ```
//!
//! One primary unit owns all decision state behind a single lock; replica
//! units relay frames to it and apply the port states it pushes back.
//! Collaborators never call into the coordinator while it runs, they post
//! events on the queue. The one synchronous exception is the MAC admission
//! hook, which must answer before the table installs an entry.
//!
//! # Key Components
//!
//! - [`coordinator::Coordinator`]: event handling and the admin API
//! - [`session`]: the client session table and the engine seam
//! - [`backend`]: backend exchanges and attribute extraction
//! - [`overrides`]: VLAN/QoS overrides and Guest-VLAN fallback
//! - [`relay`]: stack messages between primary and replicas
//! - [`decision`]: pure admission evaluation

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod daemon;
pub mod decision;
pub mod error;
pub mod overrides;
pub mod platform;
pub mod relay;
pub mod session;

pub use coordinator::{Collaborators, Coordinator, Event, Role};
pub use error::{NasError, StopReason};
