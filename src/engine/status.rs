// src/engine/status.rs

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use super::state::{RunEvent, RunState, RunStatus};

/// Observable wrapper around [`RunState`].
///
/// Every mutation goes through [`StatusBoard::emit`]: the event is applied to
/// the state, broadcast to subscribers when accepted, and a fresh
/// [`RunStatus`] is published on the watch channel. Cloning is cheap; all
/// clones share the same state.
#[derive(Clone)]
pub struct StatusBoard {
    inner: Arc<BoardInner>,
}

struct BoardInner {
    state: Mutex<RunState>,
    events: broadcast::Sender<RunEvent>,
    status: watch::Sender<RunStatus>,
}

impl std::fmt::Debug for StatusBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusBoard")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(1024);
        let (status, _) = watch::channel(RunStatus::default());
        Self {
            inner: Arc::new(BoardInner {
                state: Mutex::new(RunState::new()),
                events,
                status,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe to accepted events (log lines, progress changes, ...).
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.inner.events.subscribe()
    }

    /// Watch status snapshots; the receiver always holds the latest one.
    pub fn watch_status(&self) -> watch::Receiver<RunStatus> {
        self.inner.status.subscribe()
    }

    /// Current status snapshot (polling interface).
    pub fn status(&self) -> RunStatus {
        self.lock().status()
    }

    /// Read the state under the lock.
    pub fn with_state<T>(&self, f: impl FnOnce(&RunState) -> T) -> T {
        f(&self.lock())
    }

    /// Apply an event; returns whether it was accepted.
    pub fn emit(&self, event: RunEvent) -> bool {
        let (accepted, status) = {
            let mut state = self.lock();
            let accepted = state.apply(&event);
            (accepted, accepted.then(|| state.status()))
        };

        if let Some(status) = status {
            let _ = self.inner.events.send(event);
            self.inner.status.send_replace(status);
        }
        accepted
    }

    /// Append a line to the run log.
    pub fn log(&self, msg: impl Into<String>) {
        let msg = msg.into();
        info!("{msg}");
        self.emit(RunEvent::Log(msg));
    }

    /// Append a `Warning: ...` line to the run log.
    pub fn warn(&self, msg: impl Into<String>) {
        let msg = msg.into();
        warn!("{msg}");
        self.emit(RunEvent::Log(format!("Warning: {msg}")));
    }

    /// Append an error line to the run log.
    pub fn error(&self, msg: impl Into<String>) {
        let msg = msg.into();
        error!("{msg}");
        self.emit(RunEvent::Log(msg));
    }

    pub fn set_phase(&self, label: impl Into<String>) {
        self.emit(RunEvent::Phase(label.into()));
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_running()
    }

    pub fn shutdown_after(&self) -> bool {
        self.lock().shutdown_after()
    }

    /// Snapshot of the run log (oldest first).
    pub fn logs(&self) -> Vec<String> {
        self.lock().logs().map(str::to_string).collect()
    }
}
