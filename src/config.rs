//! Monitoring configuration
//!
//! The payload the host sends with its "begin monitoring" command, plus the
//! session-level settings derived from it.

use crate::utils::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a monitoring run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    /// Refresh token used when no stored credential exists yet
    #[serde(rename = "ring2faRefreshToken", default)]
    pub refresh_token: String,

    /// Whether active motion starts a stream
    #[serde(rename = "ringStreamMotion", default)]
    pub stream_motion: bool,

    /// Maximum stream length in minutes
    #[serde(rename = "ringMinutesToStreamVideo", default = "default_minutes_to_stream")]
    pub minutes_to_stream: f64,

    /// Directory the transcoder writes the playlist and segments into
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,

    /// File whose appearance marks the stream as playable
    #[serde(default = "default_playlist_name")]
    pub playlist_name: String,

    /// Durable refresh token file
    #[serde(default = "default_credential_file")]
    pub credential_file: PathBuf,

    /// How long to wait for the playlist before giving up on readiness
    #[serde(default = "default_readiness_timeout_seconds")]
    pub readiness_timeout_seconds: f64,
}

fn default_minutes_to_stream() -> f64 {
    1.5
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("public")
}

fn default_playlist_name() -> String {
    "stream.m3u8".to_string()
}

fn default_credential_file() -> PathBuf {
    PathBuf::from(".env")
}

fn default_readiness_timeout_seconds() -> f64 {
    60.0
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_token: String::new(),
            stream_motion: false,
            minutes_to_stream: default_minutes_to_stream(),
            output_directory: default_output_directory(),
            playlist_name: default_playlist_name(),
            credential_file: default_credential_file(),
            readiness_timeout_seconds: default_readiness_timeout_seconds(),
        }
    }
}

impl MonitorConfig {
    /// Reject values that would produce a zero or negative timer
    pub fn validate(&self) -> BridgeResult<()> {
        if !self.minutes_to_stream.is_finite() || self.minutes_to_stream <= 0.0 {
            return Err(BridgeError::Config(format!(
                "ringMinutesToStreamVideo must be a positive number, got {}",
                self.minutes_to_stream
            )));
        }

        if !self.readiness_timeout_seconds.is_finite() || self.readiness_timeout_seconds <= 0.0 {
            return Err(BridgeError::Config(format!(
                "readinessTimeoutSeconds must be a positive number, got {}",
                self.readiness_timeout_seconds
            )));
        }

        let name = self.playlist_name.trim();
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(BridgeError::Config(format!(
                "playlistName must be a bare file name, got {:?}",
                self.playlist_name
            )));
        }

        Ok(())
    }

    /// Stream length limit
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.minutes_to_stream * 60.0)
    }

    /// Settings consumed by the session manager
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            output_directory: self.output_directory.clone(),
            playlist_name: self.playlist_name.clone(),
            session_timeout: self.session_timeout(),
            readiness_timeout: Duration::from_secs_f64(self.readiness_timeout_seconds),
        }
    }
}

/// Settings for the stream session manager
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub output_directory: PathBuf,
    pub playlist_name: String,
    pub session_timeout: Duration,
    pub readiness_timeout: Duration,
}
