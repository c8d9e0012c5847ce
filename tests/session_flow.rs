//! End-to-end monitoring flows against in-process camera fakes

mod common;

use common::{eventually, next_notification, FakeCameras, FakeConnector, FakeStreaming};
use ring_bridge::session::SessionState;
use ring_bridge::{BridgeError, BroadcastSink, Monitor, MonitorConfig, Notification};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

const WAIT: Duration = Duration::from_secs(3);
const QUIET: Duration = Duration::from_millis(300);

fn test_config(dir: &Path) -> MonitorConfig {
    MonitorConfig {
        refresh_token: "initial-token".to_string(),
        stream_motion: false,
        minutes_to_stream: 1.0,
        output_directory: dir.join("public"),
        credential_file: dir.join(".env"),
        readiness_timeout_seconds: 5.0,
        ..MonitorConfig::default()
    }
}

fn available(camera: &str) -> Notification {
    Notification::VideoStreamAvailable {
        camera: camera.to_string(),
    }
}

fn ended(camera: &str) -> Notification {
    Notification::VideoStreamEnded {
        camera: camera.to_string(),
    }
}

struct Harness {
    cameras: Arc<FakeCameras>,
    streaming: Arc<FakeStreaming>,
    connector: FakeConnector,
    sink: Arc<BroadcastSink>,
}

impl Harness {
    fn new(streaming: FakeStreaming) -> Self {
        ring_bridge::init_tracing();
        let cameras = Arc::new(FakeCameras::with_cameras(&["Front Door", "Garage"]));
        let streaming = Arc::new(streaming);
        Self {
            connector: FakeConnector::new(cameras.clone(), streaming.clone()),
            cameras,
            streaming,
            sink: Arc::new(BroadcastSink::default()),
        }
    }

    async fn begin(&self, config: MonitorConfig) -> Monitor {
        Monitor::begin(config, &self.connector, self.sink.clone())
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_doorbell_stream_lifecycle() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    fs::create_dir_all(&config.output_directory).unwrap();
    fs::write(config.output_directory.join("old.ts"), b"stale").unwrap();

    let harness = Harness::new(FakeStreaming::producing_playlist());
    let mut notifications = harness.sink.subscribe();
    let mut monitor = harness.begin(config.clone()).await;

    assert_eq!(monitor.cameras().len(), 2);
    assert_eq!(harness.cameras.subscription_count(), (2, 2, 1));
    assert_eq!(*harness.connector.tokens.lock(), vec!["initial-token".to_string()]);

    harness.cameras.press_doorbell("Front Door");

    assert_eq!(
        next_notification(&mut notifications, WAIT).await,
        Some(available("Front Door"))
    );
    assert_eq!(monitor.session().state(), SessionState::Active);
    assert!(!config.output_directory.join("old.ts").exists());
    assert!(config.output_directory.join("stream.m3u8").exists());

    // Readiness is reported once per session
    assert_eq!(next_notification(&mut notifications, QUIET).await, None);

    harness.streaming.last_stream().end();
    assert_eq!(
        next_notification(&mut notifications, WAIT).await,
        Some(ended("Front Door"))
    );
    assert_eq!(monitor.session().state(), SessionState::Idle);

    let (camera, output) = harness.streaming.requests.lock()[0].clone();
    assert_eq!(camera.name, "Front Door");
    assert_eq!(output.playlist_path(), config.output_directory.join("stream.m3u8"));

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_triggers_start_one_stream() {
    let dir = tempdir().unwrap();
    let config = MonitorConfig {
        stream_motion: true,
        ..test_config(dir.path())
    };

    let harness = Harness::new(FakeStreaming::producing_playlist());
    let mut notifications = harness.sink.subscribe();
    let mut monitor = harness.begin(config).await;

    harness.cameras.press_doorbell("Front Door");
    harness.cameras.motion("Garage", true);
    harness.cameras.press_doorbell("Garage");

    assert_eq!(
        next_notification(&mut notifications, WAIT).await,
        Some(available("Front Door"))
    );

    // Triggers while a stream is live are dropped, not queued
    harness.cameras.motion("Front Door", true);
    tokio::time::sleep(QUIET).await;
    assert_eq!(harness.streaming.request_count(), 1);

    harness.streaming.last_stream().end();
    assert_eq!(
        next_notification(&mut notifications, WAIT).await,
        Some(ended("Front Door"))
    );

    // Idle again, so the next trigger is admitted
    harness.cameras.motion("Garage", true);
    assert_eq!(
        next_notification(&mut notifications, WAIT).await,
        Some(available("Garage"))
    );
    assert_eq!(harness.streaming.request_count(), 2);

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_motion_ignored_when_disabled() {
    let dir = tempdir().unwrap();
    let harness = Harness::new(FakeStreaming::producing_playlist());
    let mut notifications = harness.sink.subscribe();
    let mut monitor = harness.begin(test_config(dir.path())).await;

    harness.cameras.motion("Front Door", true);
    harness.cameras.motion("Garage", false);

    assert_eq!(next_notification(&mut notifications, QUIET).await, None);
    assert_eq!(harness.streaming.request_count(), 0);
    assert_eq!(monitor.session().state(), SessionState::Idle);

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_stream_stopped_at_time_limit() {
    let dir = tempdir().unwrap();
    let config = MonitorConfig {
        // 300ms
        minutes_to_stream: 0.005,
        ..test_config(dir.path())
    };

    let harness = Harness::new(FakeStreaming::producing_playlist());
    let mut notifications = harness.sink.subscribe();
    let mut monitor = harness.begin(config).await;

    harness.cameras.press_doorbell("Front Door");

    assert_eq!(
        next_notification(&mut notifications, WAIT).await,
        Some(available("Front Door"))
    );
    assert_eq!(
        next_notification(&mut notifications, WAIT).await,
        Some(ended("Front Door"))
    );

    let stream = harness.streaming.last_stream();
    assert_eq!(stream.stop_count(), 1);
    assert_eq!(monitor.session().state(), SessionState::Idle);

    monitor.shutdown().await;
    assert_eq!(stream.stop_count(), 1);
}

#[tokio::test]
async fn test_stream_creation_failure_returns_to_idle() {
    let dir = tempdir().unwrap();
    let harness = Harness::new(FakeStreaming::failing());
    let mut notifications = harness.sink.subscribe();
    let mut monitor = harness.begin(test_config(dir.path())).await;

    harness.cameras.press_doorbell("Front Door");
    assert!(eventually(|| harness.streaming.request_count() == 1).await);
    assert!(eventually(|| monitor.session().state() == SessionState::Idle).await);
    assert_eq!(next_notification(&mut notifications, QUIET).await, None);

    harness.cameras.press_doorbell("Garage");
    assert!(eventually(|| harness.streaming.request_count() == 2).await);

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_live_stream_once() {
    let dir = tempdir().unwrap();
    let harness = Harness::new(FakeStreaming::producing_playlist());
    let mut notifications = harness.sink.subscribe();
    let mut monitor = harness.begin(test_config(dir.path())).await;

    harness.cameras.press_doorbell("Front Door");
    assert_eq!(
        next_notification(&mut notifications, WAIT).await,
        Some(available("Front Door"))
    );

    monitor.shutdown().await;
    monitor.shutdown().await;

    let stream = harness.streaming.last_stream();
    assert_eq!(stream.stop_count(), 1);
    assert_eq!(monitor.session().state(), SessionState::Idle);
    assert_eq!(next_notification(&mut notifications, QUIET).await, None);

    // Events after shutdown go nowhere
    harness.cameras.press_doorbell("Front Door");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.streaming.request_count(), 1);
}

#[tokio::test]
async fn test_token_rotation_persists() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let harness = Harness::new(FakeStreaming::default());
    let mut monitor = harness.begin(config.clone()).await;

    assert_eq!(
        fs::read_to_string(&config.credential_file).unwrap(),
        "RING_2FA_REFRESH_TOKEN=initial-token\n"
    );

    harness.cameras.rotate_token(Some("initial-token"), "second-token");
    assert!(
        eventually(|| fs::read_to_string(&config.credential_file).unwrap()
            == "RING_2FA_REFRESH_TOKEN=second-token\n")
        .await
    );

    // No predecessor: nothing to substitute
    harness.cameras.rotate_token(None, "third-token");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        fs::read_to_string(&config.credential_file).unwrap(),
        "RING_2FA_REFRESH_TOKEN=second-token\n"
    );
    assert_eq!(
        monitor.credentials().current().await.as_deref(),
        Some("second-token")
    );

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_stored_token_used_on_restart() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    fs::write(&config.credential_file, "RING_2FA_REFRESH_TOKEN=stored-token\n").unwrap();

    let harness = Harness::new(FakeStreaming::default());
    let mut monitor = harness.begin(config).await;

    assert_eq!(*harness.connector.tokens.lock(), vec!["stored-token".to_string()]);

    monitor.shutdown().await;
}

#[tokio::test]
async fn test_connection_failure_reported() {
    ring_bridge::init_tracing();
    let dir = tempdir().unwrap();
    let sink = Arc::new(BroadcastSink::default());
    let mut notifications = sink.subscribe();

    let result = Monitor::begin(
        test_config(dir.path()),
        &FakeConnector::refusing(),
        sink.clone(),
    )
    .await;

    assert!(matches!(result, Err(BridgeError::Connection(_))));
    match next_notification(&mut notifications, WAIT).await {
        Some(Notification::DisplayError(message)) => {
            assert!(message.contains("refresh token rejected"))
        }
        other => panic!("expected display error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_credential_reported() {
    ring_bridge::init_tracing();
    let dir = tempdir().unwrap();
    let config = MonitorConfig {
        refresh_token: String::new(),
        ..test_config(dir.path())
    };
    let harness = Harness::new(FakeStreaming::default());
    let mut notifications = harness.sink.subscribe();

    let result = Monitor::begin(config, &harness.connector, harness.sink.clone()).await;

    assert!(matches!(result, Err(BridgeError::Credential(_))));
    assert!(matches!(
        next_notification(&mut notifications, WAIT).await,
        Some(Notification::DisplayError(_))
    ));
    assert!(harness.connector.tokens.lock().is_empty());
}
