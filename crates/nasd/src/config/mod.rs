//! Admission configuration model and the replicated stack state store.

mod store;
mod types;

pub use store::{StackStateStore, PORTS_PER_UNIT};
pub use types::{
    AdmissionMode, GlobalConfig, PortConfig, PortRuntime, ReapplyScope, UnitConfig, VlanOrigin,
};
