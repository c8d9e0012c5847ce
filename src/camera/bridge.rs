//! Camera event bridge
//!
//! Turns camera service events into session triggers and credential
//! rotations.

use crate::camera::traits::{Camera, CameraApi, CameraEvent};
use crate::credentials::CredentialStore;
use crate::session::manager::SessionHandle;
use crate::session::state::TriggerKind;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Routes camera events to the session manager and credential store
pub struct CameraEventBridge {
    stream_motion: bool,
    session: SessionHandle,
    credentials: Arc<CredentialStore>,
}

impl CameraEventBridge {
    pub fn new(
        stream_motion: bool,
        session: SessionHandle,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        Self {
            stream_motion,
            session,
            credentials,
        }
    }

    /// Subscribe to every camera's doorbell and motion events and to token
    /// rotations. Called once at startup.
    pub fn subscribe(
        api: &dyn CameraApi,
        cameras: &[Camera],
    ) -> mpsc::UnboundedReceiver<CameraEvent> {
        let (tx, rx) = mpsc::unbounded_channel();

        for camera in cameras {
            tracing::info!(camera = %camera.name, "Subscribing to camera events");
            api.subscribe_doorbell(camera, tx.clone());
            api.subscribe_motion(camera, tx.clone());
        }
        api.subscribe_token_rotation(tx);

        rx
    }

    /// Forward events until cancelled or every event source is gone
    pub async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<CameraEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        tracing::warn!("Camera event sources closed");
                        break;
                    }
                },
            }
        }
        tracing::debug!("Camera event bridge stopped");
    }

    pub async fn handle_event(&self, event: CameraEvent) {
        match event {
            CameraEvent::Doorbell { camera } => {
                tracing::info!(camera = %camera.name, "Doorbell pressed");
                self.session.trigger(camera, TriggerKind::Doorbell);
            }
            CameraEvent::Motion { camera, active } => {
                if !active {
                    tracing::debug!(camera = %camera.name, "Motion ended");
                } else if !self.stream_motion {
                    tracing::debug!(
                        camera = %camera.name,
                        "Motion detected, motion streaming disabled"
                    );
                } else {
                    tracing::info!(camera = %camera.name, "Motion detected");
                    self.session.trigger(camera, TriggerKind::Motion);
                }
            }
            CameraEvent::RefreshTokenRotated { old, new } => {
                // A failed rotation keeps the stale token; the live session is unaffected
                if let Err(e) = self.credentials.rotate(old.as_deref(), &new).await {
                    tracing::error!(code = e.code(), "Failed to persist refresh token: {}", e);
                }
            }
        }
    }
}
