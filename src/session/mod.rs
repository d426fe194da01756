//! Session state and the engine that drives it

pub mod engine;
pub mod state;

pub use engine::AuthEngine;
pub use state::{SessionState, SessionStatus, StateStream};
