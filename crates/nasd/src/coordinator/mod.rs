//! The admission coordinator.
//!
//! One object owns all decision state behind a single mutex. External
//! collaborators either call the synchronous admission hook
//! ([`Coordinator::on_mac_add`]) or post events on the queue; nothing calls
//! back into the coordinator while it holds its lock.

mod events;
mod orch;
mod seams;

pub use events::{Event, MacRemoveReason};
pub use orch::{ClientStatus, Collaborators, Coordinator, CoordinatorStats, Role};
pub use seams::{MacAction, MacAddVerdict, MacTable, PortCompatProvider, PortHardware};
