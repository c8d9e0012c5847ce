//! Camera service trait definitions
//!
//! The cloud camera client lives outside this crate. These traits are the
//! seam it plugs into: discovery and event subscriptions on one side, live
//! stream creation on the other.

use crate::utils::error::BridgeResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// A camera discovered from the cloud service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    /// Stable device identifier
    pub id: String,

    /// Display name, e.g. "Front Door"
    pub name: String,
}

impl Camera {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Events pushed by the camera service
#[derive(Debug, Clone, PartialEq)]
pub enum CameraEvent {
    /// Doorbell button pressed
    Doorbell { camera: Camera },
    /// Motion state changed; `active` is false when motion ends
    Motion { camera: Camera, active: bool },
    /// The service issued a new refresh token
    RefreshTokenRotated { old: Option<String>, new: String },
}

/// Where the transcoder should write the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutput {
    pub directory: PathBuf,
    pub playlist_name: String,
}

impl StreamOutput {
    /// Path the transcoder writes its playlist to
    pub fn playlist_path(&self) -> PathBuf {
        self.directory.join(&self.playlist_name)
    }
}

/// Handle to an externally created live stream
#[async_trait]
pub trait StreamHandle: Send + Sync {
    /// Request the stream to stop. Must be idempotent and safe after the
    /// stream has already ended.
    async fn stop(&self);
}

/// A live stream together with its end notification
pub struct LiveStream {
    pub handle: Arc<dyn StreamHandle>,

    /// Resolves once when the stream ends; a dropped sender also counts
    pub ended: oneshot::Receiver<()>,
}

/// Creates live streams for a camera
#[async_trait]
pub trait StreamingApi: Send + Sync {
    async fn create_session(&self, camera: &Camera, output: &StreamOutput)
        -> BridgeResult<LiveStream>;
}

/// Camera discovery and event subscriptions
#[async_trait]
pub trait CameraApi: Send + Sync {
    /// List cameras available to the account
    async fn discover_cameras(&self) -> BridgeResult<Vec<Camera>>;

    /// Deliver doorbell presses for `camera` as `CameraEvent::Doorbell`
    fn subscribe_doorbell(&self, camera: &Camera, events: mpsc::UnboundedSender<CameraEvent>);

    /// Deliver motion changes for `camera` as `CameraEvent::Motion`
    fn subscribe_motion(&self, camera: &Camera, events: mpsc::UnboundedSender<CameraEvent>);

    /// Deliver refresh token rotations as `CameraEvent::RefreshTokenRotated`
    fn subscribe_token_rotation(&self, events: mpsc::UnboundedSender<CameraEvent>);
}

/// A connected cloud client
#[derive(Clone)]
pub struct ApiClient {
    pub cameras: Arc<dyn CameraApi>,
    pub streaming: Arc<dyn StreamingApi>,
}

/// Establishes a client from a refresh token
#[async_trait]
pub trait ApiConnector: Send + Sync {
    async fn connect(&self, refresh_token: &str) -> BridgeResult<ApiClient>;
}
