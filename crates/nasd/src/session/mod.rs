//! Client session lifecycle.
//!
//! Every attached client (or, for port-wide admission, every controlled
//! port) is tracked by a session held in a fixed-capacity generational
//! arena. Session handles carry a generation so a handle to a freed and
//! reused slot is detected instead of silently touching the wrong client.

mod arena;
mod engine;
mod mac_engine;
mod manager;
mod session;

pub use arena::{Arena, SessionId, NAS_MAX_SESSIONS};
pub use engine::{EngineSignal, SessionEngine};
pub use mac_engine::MacAuthEngine;
pub use manager::{SessionManager, SessionStats};
pub use session::{Session, SessionState};
