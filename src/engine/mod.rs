// src/engine/mod.rs

//! Backup engine.
//!
//! This module ties together:
//! - the pre-run checks and task planning
//! - the per-task transfer supervisor (retries, delta refresh, marker scanning)
//! - the run controller (lock, lifecycle, force-stop, shutdown)
//! - the post-run cleanup sweep
//!
//! The pure run-state machine lives in [`state`]; [`status`] wraps it in an
//! async-friendly board that broadcasts events and publishes snapshots.

use crate::types::TaskMode;

/// One backup task, resolved for the local host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupTask {
    pub name: String,
    /// Snapper config name on the source side.
    pub config_name: String,
    /// `None` behaves like push but passes no `--type` to the transfer tool.
    pub mode: Option<TaskMode>,
    /// Local path for push, `host:path` for pull.
    pub destination: String,
    pub all_snapshots: bool,
    pub link: bool,
    pub prune: bool,
}

/// How a call to [`BackupController::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another live process holds the lock; nothing was touched.
    AlreadyRunning,
    /// Validation, a pre-check or planning failed.
    Aborted,
    /// Every task went through (individual tasks may still have failed).
    Completed,
    /// A force-stop ended the run early.
    Stopped,
}

/// Result of [`BackupController::force_stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No transfer process was active.
    NotRunning,
    Stopped,
    /// The transfer tool was still visible when the wait ran out.
    TimedOut,
}

pub mod cleanup;
pub mod controller;
pub mod lock;
pub mod monitor;
pub mod planner;
pub mod precheck;
pub mod state;
pub mod status;
pub mod supervisor;

pub use controller::{BackupController, ControllerOptions};
pub use lock::{LockStatus, RunLock};
pub use state::{RunEvent, RunProgress, RunState, RunStatus};
pub use status::StatusBoard;
pub use supervisor::Supervisor;
