//! Host command handlers
//!
//! This module contains the handlers for commands sent by the display host.

pub mod monitoring;

pub use monitoring::{serve, HostCommand, MonitoringService};
