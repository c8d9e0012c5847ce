//! Session state management
//!
//! Defines the stream session state machine and the record of the session
//! currently in flight.

use crate::camera::traits::{Camera, StreamHandle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identifier of one stream attempt
pub type SessionId = Uuid;

/// Current state of the stream session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No stream in progress
    #[default]
    Idle,
    /// Trigger accepted, stream being set up
    Starting,
    /// External stream is live
    Active,
}

/// What caused a session to start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Doorbell,
    Motion,
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerKind::Doorbell => f.write_str("doorbell"),
            TriggerKind::Motion => f.write_str("motion"),
        }
    }
}

/// The single non-idle stream attempt
pub struct Session {
    pub id: SessionId,
    pub camera: Camera,
    pub trigger: TriggerKind,
    pub started_at: DateTime<Utc>,

    /// External stream, present once Active
    pub handle: Option<Arc<dyn StreamHandle>>,

    /// Cancels the stream length timer
    pub timeout: Option<CancellationToken>,
}

impl Session {
    /// Create a session starting now
    pub fn new(camera: Camera, trigger: TriggerKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            camera,
            trigger,
            started_at: Utc::now(),
            handle: None,
            timeout: None,
        }
    }

    /// Milliseconds since the trigger was accepted
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }

    /// Stop the stream length timer if armed
    pub fn cancel_timeout(&mut self) {
        if let Some(timeout) = self.timeout.take() {
            timeout.cancel();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("camera", &self.camera)
            .field("trigger", &self.trigger)
            .field("started_at", &self.started_at)
            .field("has_handle", &self.handle.is_some())
            .finish()
    }
}
