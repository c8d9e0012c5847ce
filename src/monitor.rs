//! Monitoring root
//!
//! Owns every component of one monitoring run: the credential store, the
//! session manager task and the camera event bridge task.

use crate::camera::bridge::CameraEventBridge;
use crate::camera::traits::{ApiConnector, Camera};
use crate::config::MonitorConfig;
use crate::credentials::CredentialStore;
use crate::notification::{Notification, NotificationSink};
use crate::session::manager::{SessionHandle, StreamSessionManager};
use crate::utils::error::{BridgeError, BridgeResult};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running monitoring session
pub struct Monitor {
    cameras: Vec<Camera>,
    credentials: Arc<CredentialStore>,
    session: SessionHandle,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Monitor {
    /// Load credentials, connect, discover cameras and start listening.
    ///
    /// Failures are reported to the host as `DISPLAY_ERROR` and returned.
    /// Nothing is retried.
    pub async fn begin(
        config: MonitorConfig,
        connector: &dyn ApiConnector,
        sink: Arc<dyn NotificationSink>,
    ) -> BridgeResult<Self> {
        match Self::start(config, connector, sink.clone()).await {
            Ok(monitor) => Ok(monitor),
            Err(e) => {
                tracing::error!(code = e.code(), "Failed to begin monitoring: {}", e);
                sink.notify(Notification::DisplayError(display_message(&e)));
                Err(e)
            }
        }
    }

    async fn start(
        config: MonitorConfig,
        connector: &dyn ApiConnector,
        sink: Arc<dyn NotificationSink>,
    ) -> BridgeResult<Self> {
        config.validate()?;

        let credentials = Arc::new(CredentialStore::new(config.credential_file.clone()));
        let token = credentials.load_or_initialize(&config.refresh_token).await?;

        let client = connector.connect(&token).await?;
        let cameras = client.cameras.discover_cameras().await?;
        tracing::info!("Found {} camera(s)", cameras.len());
        if cameras.is_empty() {
            tracing::warn!("No cameras found, nothing will trigger a stream");
        }

        let (manager, session) =
            StreamSessionManager::new(config.session_config(), client.streaming.clone(), sink);
        let manager_task = manager.spawn();

        let events = CameraEventBridge::subscribe(client.cameras.as_ref(), &cameras);
        let bridge =
            CameraEventBridge::new(config.stream_motion, session.clone(), credentials.clone());
        let cancel = CancellationToken::new();
        let bridge_task = tokio::spawn(bridge.run(events, cancel.clone()));

        tracing::info!(
            motion = config.stream_motion,
            "Monitoring {} camera(s)",
            cameras.len()
        );

        Ok(Self {
            cameras,
            credentials,
            session,
            cancel,
            tasks: vec![bridge_task, manager_task],
        })
    }

    /// Cameras discovered at startup
    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Stop listening and tear down any live stream. Idempotent.
    pub async fn shutdown(&mut self) {
        if self.tasks.is_empty() {
            return;
        }

        tracing::info!("Stopping monitoring");
        self.cancel.cancel();
        self.session.shutdown().await;

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!("Monitoring task ended abnormally: {}", e);
            }
        }
    }
}

/// Message shown on the display for a startup failure
fn display_message(error: &BridgeError) -> String {
    match error {
        BridgeError::Credential(_) => format!("Unable to load Ring credentials: {}", error),
        BridgeError::Connection(_) => format!("Unable to connect to Ring: {}", error),
        _ => error.to_string(),
    }
}
