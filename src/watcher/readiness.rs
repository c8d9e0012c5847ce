//! Playlist readiness watcher
//!
//! Watches the output directory for the transcoder's playlist to appear.
//! Each `arm` owns one filesystem watch and one deadline; the watch task
//! reports `Ready` at most once and then tears itself down.

use crate::session::state::SessionId;
use crate::utils::error::BridgeResult;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Signal pushed when the watched file shows up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessSignal {
    /// Session the watch was armed for
    pub session: SessionId,
    /// Full path of the observed file
    pub path: PathBuf,
}

/// A bounded observation of one directory for one file name
#[derive(Debug, Clone)]
pub struct WatchTask {
    pub session: SessionId,
    pub directory: PathBuf,
    pub filename: String,
    pub deadline: Instant,
}

struct ActiveWatch {
    task: WatchTask,
    cancel: CancellationToken,
}

/// Detects the first playable output of a stream
pub struct ReadinessWatcher {
    signals: mpsc::UnboundedSender<ReadinessSignal>,
    active: Option<ActiveWatch>,
}

impl ReadinessWatcher {
    /// Create a watcher that reports on `signals`
    pub fn new(signals: mpsc::UnboundedSender<ReadinessSignal>) -> Self {
        Self {
            signals,
            active: None,
        }
    }

    /// Whether a watch is still waiting for its file
    pub fn is_armed(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.cancel.is_cancelled())
    }

    /// The watch currently waiting, if any
    pub fn current(&self) -> Option<&WatchTask> {
        self.active
            .as_ref()
            .filter(|active| !active.cancel.is_cancelled())
            .map(|active| &active.task)
    }

    /// Start watching `directory` for `filename`, replacing any previous watch
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(
        &mut self,
        session: SessionId,
        directory: &Path,
        filename: &str,
        timeout: Duration,
    ) -> BridgeResult<()> {
        self.disarm();

        let (fs_tx, fs_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = fs_tx.send(res);
        })?;
        watcher.watch(directory, RecursiveMode::NonRecursive)?;

        let task = WatchTask {
            session,
            directory: directory.to_path_buf(),
            filename: filename.to_string(),
            deadline: Instant::now() + timeout,
        };
        let cancel = CancellationToken::new();

        tracing::debug!(
            session = %session,
            "Watching {:?} for {} ({:?})",
            directory,
            filename,
            timeout
        );

        tokio::spawn(watch_for_file(
            watcher,
            fs_rx,
            task.clone(),
            cancel.clone(),
            self.signals.clone(),
        ));

        self.active = Some(ActiveWatch { task, cancel });
        Ok(())
    }

    /// Stop the current watch; safe to call at any time
    pub fn disarm(&mut self) {
        if let Some(active) = self.active.take() {
            if !active.cancel.is_cancelled() {
                tracing::debug!(session = %active.task.session, "Readiness watch disarmed");
            }
            active.cancel.cancel();
        }
    }
}

impl Drop for ReadinessWatcher {
    fn drop(&mut self) {
        self.disarm();
    }
}

async fn watch_for_file(
    watcher: RecommendedWatcher,
    mut fs_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    task: WatchTask,
    cancel: CancellationToken,
    signals: mpsc::UnboundedSender<ReadinessSignal>,
) {
    // Dropping the watcher at the end of this task ends the OS-level watch
    let _watcher = watcher;
    let _done = cancel.clone().drop_guard();

    // The file may have landed between directory cleanup and watch setup
    let target = task.directory.join(&task.filename);
    if tokio::fs::try_exists(&target).await.unwrap_or(false) {
        emit_ready(&task, target, &cancel, &signals);
        return;
    }

    let deadline = tokio::time::sleep_until(task.deadline);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = &mut deadline => {
                tracing::debug!(
                    session = %task.session,
                    "No {} within the readiness window",
                    task.filename
                );
                return;
            }
            event = fs_rx.recv() => match event {
                Some(Ok(event)) => {
                    if let Some(path) = matching_path(&event, &task.filename) {
                        emit_ready(&task, path, &cancel, &signals);
                        return;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(session = %task.session, "Filesystem watch error: {}", e);
                }
                None => return,
            },
        }
    }
}

fn emit_ready(
    task: &WatchTask,
    path: PathBuf,
    cancel: &CancellationToken,
    signals: &mpsc::UnboundedSender<ReadinessSignal>,
) {
    if cancel.is_cancelled() {
        return;
    }
    tracing::info!(session = %task.session, "Stream output ready at {:?}", path);
    let _ = signals.send(ReadinessSignal {
        session: task.session,
        path,
    });
}

/// Path of `filename` if the event reports it appearing in the directory
fn matching_path(event: &Event, filename: &str) -> Option<PathBuf> {
    let appeared = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))
    );
    if !appeared {
        return None;
    }

    event
        .paths
        .iter()
        .find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| !name.starts_with('.') && name == filename)
        })
        .cloned()
}
