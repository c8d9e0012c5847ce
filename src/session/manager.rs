//! Stream session manager
//!
//! Admission control and lifecycle of the single stream session. The manager
//! runs as one task: every trigger, completion and readiness signal is handled
//! to completion before the next is looked at, so the Idle check in
//! `handle_trigger` and the switch to Starting happen without interleaving.
//! Slow work (directory cleanup, stream creation, waiting for the end of the
//! stream, the length limit) runs in child tasks that report back tagged with
//! the session id, and reports for a session that is no longer current are
//! discarded.

use crate::camera::traits::{Camera, LiveStream, StreamHandle, StreamOutput, StreamingApi};
use crate::config::SessionConfig;
use crate::notification::{Notification, NotificationSink};
use crate::output::OutputDirectory;
use crate::session::state::{Session, SessionId, SessionState, TriggerKind};
use crate::utils::error::BridgeResult;
use crate::watcher::{ReadinessSignal, ReadinessWatcher};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Requests from outside the manager task
enum Command {
    Trigger { camera: Camera, kind: TriggerKind },
    Shutdown { done: oneshot::Sender<()> },
}

/// Results of child tasks
enum Completion {
    Prepared {
        session: SessionId,
        result: BridgeResult<()>,
    },
    Created {
        session: SessionId,
        result: BridgeResult<LiveStream>,
    },
    Ended {
        session: SessionId,
    },
    TimedOut {
        session: SessionId,
    },
}

/// Cloneable handle for driving a running manager
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: Arc<RwLock<SessionState>>,
}

impl SessionHandle {
    /// Ask for a stream; dropped if one is already in progress
    pub fn trigger(&self, camera: Camera, kind: TriggerKind) {
        if self.commands.send(Command::Trigger { camera, kind }).is_err() {
            tracing::debug!("Session manager stopped, trigger dropped");
        }
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Stop any live stream and end the manager task. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        let (done, wait) = oneshot::channel();
        if self.commands.send(Command::Shutdown { done }).is_err() {
            return;
        }
        let _ = wait.await;
    }
}

/// Owns the single stream session
pub struct StreamSessionManager {
    config: SessionConfig,
    output: OutputDirectory,
    streaming: Arc<dyn StreamingApi>,
    sink: Arc<dyn NotificationSink>,
    watcher: ReadinessWatcher,

    state: Arc<RwLock<SessionState>>,
    session: Option<Session>,

    commands: mpsc::UnboundedReceiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    readiness_rx: mpsc::UnboundedReceiver<ReadinessSignal>,
}

impl StreamSessionManager {
    /// Create a manager and the handle used to drive it
    pub fn new(
        config: SessionConfig,
        streaming: Arc<dyn StreamingApi>,
        sink: Arc<dyn NotificationSink>,
    ) -> (Self, SessionHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (readiness_tx, readiness_rx) = mpsc::unbounded_channel();
        let state = Arc::new(RwLock::new(SessionState::Idle));

        let manager = Self {
            output: OutputDirectory::new(config.output_directory.clone()),
            config,
            streaming,
            sink,
            watcher: ReadinessWatcher::new(readiness_tx),
            state: state.clone(),
            session: None,
            commands,
            completions_tx,
            completions_rx,
            readiness_rx,
        };

        let handle = SessionHandle {
            commands: commands_tx,
            state,
        };

        (manager, handle)
    }

    /// Run the manager on the current runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process events until shut down or every handle is dropped
    pub async fn run(mut self) {
        tracing::info!("Stream session manager running");

        loop {
            // Readiness before completions: an end queued behind a ready
            // signal must not swallow it
            tokio::select! {
                biased;

                Some(signal) = self.readiness_rx.recv() => self.handle_ready(signal),
                Some(completion) = self.completions_rx.recv() => self.handle_completion(completion),
                command = self.commands.recv() => match command {
                    Some(Command::Trigger { camera, kind }) => self.handle_trigger(camera, kind),
                    Some(Command::Shutdown { done }) => {
                        self.shutdown().await;
                        let _ = done.send(());
                        break;
                    }
                    None => {
                        self.shutdown().await;
                        break;
                    }
                },
            }
        }

        tracing::info!("Stream session manager stopped");
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
    }

    fn current_state(&self) -> SessionState {
        *self.state.read()
    }

    fn is_current(&self, id: SessionId) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == id)
    }

    fn stream_output(&self) -> StreamOutput {
        StreamOutput {
            directory: self.config.output_directory.clone(),
            playlist_name: self.config.playlist_name.clone(),
        }
    }

    fn handle_trigger(&mut self, camera: Camera, kind: TriggerKind) {
        if let Some(current) = &self.session {
            tracing::debug!(
                camera = %camera.name,
                trigger = %kind,
                active = %current.id,
                "Stream already in progress, ignoring trigger"
            );
            return;
        }

        let mut session = Session::new(camera, kind);
        let id = session.id;
        tracing::info!(
            session = %id,
            camera = %session.camera.name,
            trigger = %kind,
            "Starting stream"
        );

        session.timeout = Some(self.arm_timeout(id));
        self.session = Some(session);
        self.set_state(SessionState::Starting);

        let output = self.output.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = output.clean().await;
            let _ = tx.send(Completion::Prepared { session: id, result });
        });
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Prepared { session, result } => self.handle_prepared(session, result),
            Completion::Created { session, result } => self.handle_created(session, result),
            Completion::Ended { session } => self.handle_ended(session),
            Completion::TimedOut { session } => self.handle_timed_out(session),
        }
    }

    fn handle_prepared(&mut self, id: SessionId, result: BridgeResult<()>) {
        if !self.is_current(id) || self.current_state() != SessionState::Starting {
            return;
        }

        if let Err(e) = result {
            tracing::error!(session = %id, code = e.code(), "Failed to prepare output: {}", e);
            self.abort_start();
            return;
        }

        if let Err(e) = self.watcher.arm(
            id,
            &self.config.output_directory,
            &self.config.playlist_name,
            self.config.readiness_timeout,
        ) {
            tracing::error!(session = %id, code = e.code(), "Failed to watch output: {}", e);
            self.abort_start();
            return;
        }

        let camera = match &self.session {
            Some(session) => session.camera.clone(),
            None => return,
        };
        let output = self.stream_output();
        let streaming = self.streaming.clone();
        let tx = self.completions_tx.clone();

        tokio::spawn(async move {
            let result = streaming.create_session(&camera, &output).await;
            // The manager is gone; do not leave the stream running
            if let Err(mpsc::error::SendError(Completion::Created { result: Ok(live), .. })) =
                tx.send(Completion::Created { session: id, result })
            {
                live.handle.stop().await;
            }
        });
    }

    fn handle_created(&mut self, id: SessionId, result: BridgeResult<LiveStream>) {
        let starting = self.current_state() == SessionState::Starting;
        let session = match self.session.as_mut().filter(|s| s.id == id && starting) {
            Some(session) => session,
            None => {
                if let Ok(live) = result {
                    tracing::warn!(
                        session = %id,
                        "Stream created for a stale session, stopping it"
                    );
                    stop_in_background(live.handle);
                }
                return;
            }
        };

        let LiveStream { handle, ended } = match result {
            Ok(live) => live,
            Err(e) => {
                tracing::error!(session = %id, code = e.code(), "Failed to start stream: {}", e);
                self.abort_start();
                return;
            }
        };

        session.handle = Some(handle);

        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            // A dropped sender means the stream is gone as well
            let _ = ended.await;
            let _ = tx.send(Completion::Ended { session: id });
        });

        tracing::info!(
            session = %id,
            camera = %session.camera.name,
            "Stream live after {}ms",
            session.elapsed_ms()
        );
        self.set_state(SessionState::Active);
    }

    /// Start the stream length timer for a session
    fn arm_timeout(&self, id: SessionId) -> CancellationToken {
        let timeout = CancellationToken::new();
        let cancelled = timeout.clone();
        let limit = self.config.session_timeout;
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(limit) => {
                    let _ = tx.send(Completion::TimedOut { session: id });
                }
            }
        });
        timeout
    }

    fn handle_ended(&mut self, id: SessionId) {
        if !self.is_current(id) {
            tracing::debug!(session = %id, "End of a stale session ignored");
            return;
        }

        self.watcher.disarm();
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.cancel_timeout();
        session.handle = None;
        self.set_state(SessionState::Idle);

        tracing::info!(
            session = %id,
            camera = %session.camera.name,
            "Stream ended after {}ms",
            session.elapsed_ms()
        );
        self.sink.notify(Notification::VideoStreamEnded {
            camera: session.camera.name,
        });
    }

    /// Ask a live stream to stop; teardown happens when it reports its end.
    /// A start still waiting on stream creation is abandoned instead.
    fn handle_timed_out(&mut self, id: SessionId) {
        let handle = match &self.session {
            Some(session) if session.id == id => session.handle.clone(),
            _ => return,
        };

        match handle {
            Some(handle) => {
                tracing::info!(session = %id, "Stream time limit reached, stopping");
                stop_in_background(handle);
            }
            None => {
                tracing::warn!(session = %id, "Stream not created within its time limit");
                self.abort_start();
            }
        }
    }

    fn handle_ready(&mut self, signal: ReadinessSignal) {
        let Some(session) = self.session.as_ref().filter(|s| s.id == signal.session) else {
            tracing::debug!(session = %signal.session, "Readiness for a stale session ignored");
            return;
        };

        tracing::info!(
            session = %session.id,
            camera = %session.camera.name,
            "Stream available after {}ms",
            session.elapsed_ms()
        );
        self.sink.notify(Notification::VideoStreamAvailable {
            camera: session.camera.name.clone(),
        });
    }

    /// Return to Idle after a failed start
    fn abort_start(&mut self) {
        self.watcher.disarm();
        if let Some(mut session) = self.session.take() {
            session.cancel_timeout();
        }
        self.set_state(SessionState::Idle);
    }

    async fn shutdown(&mut self) {
        // Late stream creations now fail to report and stop themselves
        self.completions_rx.close();
        self.watcher.disarm();

        if let Some(mut session) = self.session.take() {
            session.cancel_timeout();
            if let Some(handle) = session.handle.take() {
                tracing::info!(session = %session.id, "Stopping stream for shutdown");
                handle.stop().await;
            }
        }

        while let Ok(completion) = self.completions_rx.try_recv() {
            if let Completion::Created { result: Ok(live), .. } = completion {
                live.handle.stop().await;
            }
        }

        self.set_state(SessionState::Idle);
    }
}

fn stop_in_background(handle: Arc<dyn StreamHandle>) {
    tokio::spawn(async move {
        handle.stop().await;
    });
}
