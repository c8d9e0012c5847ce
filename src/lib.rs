//! Ring Bridge - doorbell and motion triggered live streams for dashboards.
//!
//! This is the main library crate for the bridge. It reacts to camera events
//! by starting a short-lived stream, detects when the stream's playlist is
//! ready, reports the stream lifecycle to the display host, and keeps the
//! refresh credential current across restarts.

pub mod camera;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod monitor;
pub mod notification;
pub mod output;
pub mod session;
pub mod utils;
pub mod watcher;

pub use config::MonitorConfig;
pub use monitor::Monitor;
pub use notification::{BroadcastSink, Notification, NotificationSink};
pub use utils::error::{BridgeError, BridgeResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
///
/// Honors `RUST_LOG`; defaults to debug output for this crate. Does nothing
/// if a global subscriber is already installed.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ring_bridge=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    tracing::debug!("Ring Bridge v{} logging initialized", env!("CARGO_PKG_VERSION"));
}
