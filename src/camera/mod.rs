//! Camera service integration
//!
//! Traits for the external camera client and the bridge that turns its
//! events into stream triggers.

pub mod bridge;
pub mod traits;

pub use bridge::CameraEventBridge;
pub use traits::{
    ApiClient, ApiConnector, Camera, CameraApi, CameraEvent, LiveStream, StreamHandle,
    StreamOutput, StreamingApi,
};
