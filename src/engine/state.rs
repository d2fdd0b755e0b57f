// src/engine/state.rs

//! Pure run-state machine.
//!
//! [`RunState`] holds everything observable about a backup run and changes
//! only through [`RunState::apply`], which consumes a [`RunEvent`] and reports
//! whether the event changed anything. It has no channels, no Tokio types, and
//! performs no IO, so the bookkeeping rules (idempotent handled marking,
//! monotonic progress, reset between runs) are testable in isolation.
//!
//! The async side ([`super::status::StatusBoard`]) feeds events in, broadcasts
//! the accepted ones, and publishes [`RunStatus`] snapshots.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::Serialize;

use crate::types::SnapshotId;

/// Number of log lines kept in memory.
pub const LOG_CAPACITY: usize = 1000;

/// Number of trailing log lines included in a [`RunStatus`].
pub const STATUS_LOG_TAIL: usize = 20;

/// Live progress at task-boundary granularity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunProgress {
    /// Free-text phase label, e.g. "Validating configuration...".
    pub current_task: String,
    /// Name of the task being executed.
    pub current_disk: String,
    pub total_disks: usize,
    pub completed_disks: usize,
    /// 0..=100, derived from `completed_disks / total_disks`.
    pub percent: u8,
}

/// Everything that can happen to the run state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// A new run begins: tasks, handled snapshots, progress and logs are cleared.
    Reset,
    RunningChanged(bool),
    ShutdownAfterChanged(bool),
    /// Result of the periodic transfer-presence probe.
    ProcessActivity(bool),
    ForceStopRequested,
    Log(String),
    Phase(String),
    TotalTasks(usize),
    TaskStarted { index: usize, name: String },
    /// The pending list of a task was (re)derived; the fresh list replaces
    /// the stored one.
    PendingRefreshed { task: String, snapshots: Vec<SnapshotId> },
    /// Transfer output reported a snapshot as done. Only accepted while the
    /// snapshot is pending for that task and not yet handled.
    SnapshotTransferred { task: String, snapshot: SnapshotId },
    /// All tasks went through without a force-stop.
    Finished,
}

/// Serializable snapshot for external observers (UI, status endpoints).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    pub is_backup_running: bool,
    pub shutdown_after_backup: bool,
    pub is_checking_process: bool,
    pub force_stopped: bool,
    pub current_task: String,
    pub current_disk: String,
    pub completed_disks: usize,
    pub total_disks: usize,
    pub percent: u8,
    pub handled_snapshots: usize,
    pub total_snapshots: usize,
    pub last_logs: Vec<String>,
}

/// Mutable state of the current (or last) run.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    running: bool,
    shutdown_after: bool,
    transfer_active: bool,
    force_stopped: bool,
    progress: RunProgress,
    pending: BTreeMap<String, Vec<SnapshotId>>,
    handled: BTreeSet<(String, SnapshotId)>,
    logs: VecDeque<String>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event. Returns `true` if the event was accepted (and should
    /// be published), `false` if it was a no-op.
    pub fn apply(&mut self, event: &RunEvent) -> bool {
        match event {
            RunEvent::Reset => {
                self.force_stopped = false;
                self.progress = RunProgress {
                    current_task: "Validating configuration...".to_string(),
                    ..RunProgress::default()
                };
                self.pending.clear();
                self.handled.clear();
                self.logs.clear();
                true
            }
            RunEvent::RunningChanged(running) => replace(&mut self.running, *running),
            RunEvent::ShutdownAfterChanged(flag) => replace(&mut self.shutdown_after, *flag),
            RunEvent::ProcessActivity(active) => replace(&mut self.transfer_active, *active),
            RunEvent::ForceStopRequested => replace(&mut self.force_stopped, true),
            RunEvent::Log(line) => {
                if self.logs.len() == LOG_CAPACITY {
                    self.logs.pop_front();
                }
                self.logs.push_back(line.clone());
                true
            }
            RunEvent::Phase(label) => {
                self.progress.current_task = label.clone();
                true
            }
            RunEvent::TotalTasks(total) => {
                self.progress.total_disks = *total;
                true
            }
            RunEvent::TaskStarted { index, name } => {
                if *index < self.progress.completed_disks {
                    return false;
                }
                self.progress.current_disk = name.clone();
                self.progress.completed_disks = *index;
                self.progress.percent = percent_of(*index, self.progress.total_disks);
                true
            }
            RunEvent::PendingRefreshed { task, snapshots } => {
                self.pending.insert(task.clone(), snapshots.clone());
                true
            }
            RunEvent::SnapshotTransferred { task, snapshot } => {
                let is_pending = self
                    .pending
                    .get(task)
                    .is_some_and(|ids| ids.contains(snapshot));
                is_pending && self.handled.insert((task.clone(), snapshot.clone()))
            }
            RunEvent::Finished => {
                self.progress.completed_disks = self.progress.total_disks;
                self.progress.percent = 100;
                true
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn shutdown_after(&self) -> bool {
        self.shutdown_after
    }

    pub fn is_force_stopped(&self) -> bool {
        self.force_stopped
    }

    pub fn progress(&self) -> &RunProgress {
        &self.progress
    }

    /// Current pending list of a task (empty if unknown).
    pub fn pending_of(&self, task: &str) -> &[SnapshotId] {
        self.pending.get(task).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_handled(&self, task: &str, snapshot: &str) -> bool {
        self.handled
            .contains(&(task.to_string(), snapshot.to_string()))
    }

    pub fn handled_count(&self) -> usize {
        self.handled.len()
    }

    /// Sum of all pending list lengths.
    pub fn total_pending(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    pub fn logs(&self) -> impl Iterator<Item = &str> {
        self.logs.iter().map(String::as_str)
    }

    pub fn status(&self) -> RunStatus {
        let skip = self.logs.len().saturating_sub(STATUS_LOG_TAIL);
        RunStatus {
            is_backup_running: self.running,
            shutdown_after_backup: self.shutdown_after,
            is_checking_process: self.transfer_active,
            force_stopped: self.force_stopped,
            current_task: self.progress.current_task.clone(),
            current_disk: self.progress.current_disk.clone(),
            completed_disks: self.progress.completed_disks,
            total_disks: self.progress.total_disks,
            percent: self.progress.percent,
            handled_snapshots: self.handled.len(),
            total_snapshots: self.total_pending(),
            last_logs: self.logs.iter().skip(skip).cloned().collect(),
        }
    }
}

fn replace(slot: &mut bool, value: bool) -> bool {
    let changed = *slot != value;
    *slot = value;
    changed
}

/// `round(done / total * 100)`, 0 when there is nothing to do.
fn percent_of(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((done as f64 / total as f64) * 100.0).round().min(100.0) as u8
}
