//! Stream session system
//!
//! This module implements the single-stream session lifecycle:
//! - Session state machine and the in-flight session record
//! - StreamSessionManager enforcing one stream at a time
//! - SessionHandle for triggering and shutting down from other tasks

pub mod manager;
pub mod state;

pub use manager::{SessionHandle, StreamSessionManager};
pub use state::{Session, SessionId, SessionState, TriggerKind};
