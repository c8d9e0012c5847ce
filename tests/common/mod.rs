//! In-process stand-ins for the camera service

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use ring_bridge::camera::{
    ApiClient, ApiConnector, Camera, CameraApi, CameraEvent, LiveStream, StreamHandle,
    StreamOutput, StreamingApi,
};
use ring_bridge::{BridgeError, BridgeResult, Notification};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};

/// A live stream that ends when told to, or when stopped
pub struct FakeStream {
    ended: Mutex<Option<oneshot::Sender<()>>>,
    stops: AtomicUsize,
}

impl FakeStream {
    /// Simulate the remote side hanging up
    pub fn end(&self) {
        if let Some(tx) = self.ended.lock().take() {
            let _ = tx.send(());
        }
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamHandle for FakeStream {
    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.end();
    }
}

/// Streaming service that optionally plays the transcoder's part
#[derive(Default)]
pub struct FakeStreaming {
    pub fail: AtomicBool,
    pub write_playlist: AtomicBool,
    pub requests: Mutex<Vec<(Camera, StreamOutput)>>,
    pub streams: Mutex<Vec<Arc<FakeStream>>>,
}

impl FakeStreaming {
    pub fn producing_playlist() -> Self {
        let streaming = Self::default();
        streaming.write_playlist.store(true, Ordering::SeqCst);
        streaming
    }

    pub fn failing() -> Self {
        let streaming = Self::default();
        streaming.fail.store(true, Ordering::SeqCst);
        streaming
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_stream(&self) -> Arc<FakeStream> {
        self.streams.lock().last().cloned().expect("no stream created")
    }
}

#[async_trait]
impl StreamingApi for FakeStreaming {
    async fn create_session(
        &self,
        camera: &Camera,
        output: &StreamOutput,
    ) -> BridgeResult<LiveStream> {
        self.requests.lock().push((camera.clone(), output.clone()));

        if self.fail.load(Ordering::SeqCst) {
            return Err(BridgeError::StreamStart("call rejected".to_string()));
        }

        if self.write_playlist.load(Ordering::SeqCst) {
            let playlist = output.playlist_path();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                tokio::fs::write(playlist.with_file_name("stream0.ts"), b"segment")
                    .await
                    .unwrap();
                tokio::fs::write(&playlist, b"#EXTM3U\n").await.unwrap();
            });
        }

        let (tx, rx) = oneshot::channel();
        let stream = Arc::new(FakeStream {
            ended: Mutex::new(Some(tx)),
            stops: AtomicUsize::new(0),
        });
        self.streams.lock().push(stream.clone());

        Ok(LiveStream {
            handle: stream,
            ended: rx,
        })
    }
}

/// Camera service with scripted events
#[derive(Default)]
pub struct FakeCameras {
    pub cameras: Vec<Camera>,
    pub fail_discovery: bool,
    doorbell: Mutex<Vec<(Camera, mpsc::UnboundedSender<CameraEvent>)>>,
    motion: Mutex<Vec<(Camera, mpsc::UnboundedSender<CameraEvent>)>>,
    rotation: Mutex<Vec<mpsc::UnboundedSender<CameraEvent>>>,
}

impl FakeCameras {
    pub fn with_cameras(names: &[&str]) -> Self {
        Self {
            cameras: names
                .iter()
                .enumerate()
                .map(|(i, name)| Camera::new(i.to_string(), *name))
                .collect(),
            ..Self::default()
        }
    }

    pub fn press_doorbell(&self, name: &str) {
        for (camera, tx) in self.doorbell.lock().iter() {
            if camera.name == name {
                let _ = tx.send(CameraEvent::Doorbell {
                    camera: camera.clone(),
                });
            }
        }
    }

    pub fn motion(&self, name: &str, active: bool) {
        for (camera, tx) in self.motion.lock().iter() {
            if camera.name == name {
                let _ = tx.send(CameraEvent::Motion {
                    camera: camera.clone(),
                    active,
                });
            }
        }
    }

    pub fn rotate_token(&self, old: Option<&str>, new: &str) {
        for tx in self.rotation.lock().iter() {
            let _ = tx.send(CameraEvent::RefreshTokenRotated {
                old: old.map(str::to_string),
                new: new.to_string(),
            });
        }
    }

    pub fn subscription_count(&self) -> (usize, usize, usize) {
        (
            self.doorbell.lock().len(),
            self.motion.lock().len(),
            self.rotation.lock().len(),
        )
    }
}

#[async_trait]
impl CameraApi for FakeCameras {
    async fn discover_cameras(&self) -> BridgeResult<Vec<Camera>> {
        if self.fail_discovery {
            return Err(BridgeError::Connection("location lookup failed".to_string()));
        }
        Ok(self.cameras.clone())
    }

    fn subscribe_doorbell(&self, camera: &Camera, events: mpsc::UnboundedSender<CameraEvent>) {
        self.doorbell.lock().push((camera.clone(), events));
    }

    fn subscribe_motion(&self, camera: &Camera, events: mpsc::UnboundedSender<CameraEvent>) {
        self.motion.lock().push((camera.clone(), events));
    }

    fn subscribe_token_rotation(&self, events: mpsc::UnboundedSender<CameraEvent>) {
        self.rotation.lock().push(events);
    }
}

/// Connector handing out the fakes above
pub struct FakeConnector {
    pub cameras: Arc<FakeCameras>,
    pub streaming: Arc<FakeStreaming>,
    pub refuse: bool,
    pub tokens: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new(cameras: Arc<FakeCameras>, streaming: Arc<FakeStreaming>) -> Self {
        Self {
            cameras,
            streaming,
            refuse: false,
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::new(
                Arc::new(FakeCameras::default()),
                Arc::new(FakeStreaming::default()),
            )
        }
    }
}

#[async_trait]
impl ApiConnector for FakeConnector {
    async fn connect(&self, refresh_token: &str) -> BridgeResult<ApiClient> {
        self.tokens.lock().push(refresh_token.to_string());
        if self.refuse {
            return Err(BridgeError::Connection("refresh token rejected".to_string()));
        }
        Ok(ApiClient {
            cameras: self.cameras.clone(),
            streaming: self.streaming.clone(),
        })
    }
}

/// Next notification, or None if nothing arrives within `wait`
pub async fn next_notification(
    rx: &mut broadcast::Receiver<Notification>,
    wait: Duration,
) -> Option<Notification> {
    tokio::time::timeout(wait, rx.recv()).await.ok().and_then(Result::ok)
}

/// Poll `check` until it holds or a few seconds pass
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..300 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
