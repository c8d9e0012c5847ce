//! Outbound notifications to the host display

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lifecycle notifications reported to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "notification", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notification {
    /// The stream playlist is ready to play
    VideoStreamAvailable { camera: String },
    /// The active stream has terminated
    VideoStreamEnded { camera: String },
    /// Monitoring failed and needs operator attention
    DisplayError(String),
}

/// Receiver of bridge notifications
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Fans notifications out to any number of subscribers
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to notifications sent from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(64)
    }
}

impl NotificationSink for BroadcastSink {
    fn notify(&self, notification: Notification) {
        tracing::debug!("Notify host: {:?}", notification);
        // No subscribers is not an error
        let _ = self.tx.send(notification);
    }
}
