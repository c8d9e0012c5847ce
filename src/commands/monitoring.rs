//! Host monitoring commands
//!
//! The display host talks to the bridge with newline-delimited JSON. Each
//! inbound line is a command, each outbound line a notification.

use crate::camera::traits::ApiConnector;
use crate::config::MonitorConfig;
use crate::monitor::Monitor;
use crate::notification::{BroadcastSink, Notification};
use crate::utils::error::BridgeResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;

/// Commands sent by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "notification", content = "payload")]
pub enum HostCommand {
    #[serde(rename = "BEGIN_RING_MONITORING")]
    BeginMonitoring(MonitorConfig),
    #[serde(rename = "STOP_RING_MONITORING")]
    StopMonitoring,
}

/// Application state for host commands
pub struct MonitoringService {
    connector: Arc<dyn ApiConnector>,
    sink: Arc<BroadcastSink>,
    monitor: Option<Monitor>,
}

impl MonitoringService {
    pub fn new(connector: Arc<dyn ApiConnector>, sink: Arc<BroadcastSink>) -> Self {
        Self {
            connector,
            sink,
            monitor: None,
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_some()
    }

    /// Execute one host command
    pub async fn handle(&mut self, command: HostCommand) -> BridgeResult<()> {
        match command {
            HostCommand::BeginMonitoring(config) => {
                if self.monitor.is_some() {
                    tracing::info!("Monitoring already running, ignoring begin request");
                    return Ok(());
                }
                let monitor =
                    Monitor::begin(config, self.connector.as_ref(), self.sink.clone()).await?;
                self.monitor = Some(monitor);
                Ok(())
            }
            HostCommand::StopMonitoring => {
                self.stop().await;
                Ok(())
            }
        }
    }

    /// Stop monitoring if running
    pub async fn stop(&mut self) {
        if let Some(mut monitor) = self.monitor.take() {
            monitor.shutdown().await;
        }
    }
}

/// Serve host commands from `reader` and write notifications to `writer`
/// until the reader reaches end of input.
pub async fn serve<R, W>(
    reader: R,
    writer: W,
    connector: Arc<dyn ApiConnector>,
) -> BridgeResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let sink = Arc::new(BroadcastSink::default());
    let writer_task = tokio::spawn(write_notifications(sink.subscribe(), writer));

    let mut service = MonitoringService::new(connector, sink);
    let mut lines = reader.lines();
    let mut read_error = None;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!("Host input closed");
                break;
            }
            Err(e) => {
                // Still tear monitoring down below
                tracing::error!("Failed to read host input: {}", e);
                read_error = Some(e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let command: HostCommand = match serde_json::from_str(line) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!("Ignoring malformed host command: {}", e);
                continue;
            }
        };

        // Startup failures were already reported to the host
        if let Err(e) = service.handle(command).await {
            tracing::debug!(code = e.code(), "Host command failed: {}", e);
        }
    }

    service.stop().await;
    drop(service);

    let written = match writer_task.await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!("Notification writer ended abnormally: {}", e);
            Ok(())
        }
    };

    match read_error {
        Some(e) => Err(e.into()),
        None => written,
    }
}

/// Write each notification as one JSON line until every sender is gone
async fn write_notifications<W>(
    mut notifications: broadcast::Receiver<Notification>,
    mut writer: W,
) -> BridgeResult<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let notification = match notifications.recv().await {
            Ok(notification) => notification,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Notification writer lagged, dropped {} notifications", n);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let mut line = serde_json::to_string(&notification)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }

    writer.shutdown().await?;
    Ok(())
}
