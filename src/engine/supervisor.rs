// src/engine/supervisor.rs

//! Per-task transfer supervision: bounded retries, delta refresh between
//! attempts, and completion-marker scanning of the transfer output.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

use regex::Regex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::{RetrySection, ToolsSection};
use crate::engine::status::StatusBoard;
use crate::engine::{BackupTask, RunEvent};
use crate::exec::{CommandSpec, ProcessRunner};
use crate::inventory::{Inventory, diff_pending};

/// Transfer output line announcing a received snapshot, e.g.
/// `At subvol /.snapshots/12/snapshot`.
static COMPLETION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"At subvol .*/\.?snapshots/(\d+)/snapshot")
        .expect("completion marker regex is valid")
});

/// Snapshot id referenced by a completion marker in `line`, if any.
pub fn completion_marker(line: &str) -> Option<&str> {
    COMPLETION_MARKER
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// Argument vector of the transfer tool for `task`.
pub fn transfer_command(tools: &ToolsSection, task: &BackupTask) -> CommandSpec {
    let mut cmd = CommandSpec::privileged(&tools.privilege, &tools.transfer)
        .arg("--config")
        .arg(&task.config_name);
    if task.all_snapshots {
        cmd = cmd.arg("--all");
    }
    if task.link {
        cmd = cmd.arg("--link");
    }
    if task.prune {
        cmd = cmd.arg("--prune");
    }
    if let Some(mode) = task.mode {
        cmd = cmd.arg("--type").arg(mode.as_str());
    }
    cmd.arg(&task.destination)
}

/// Drives the attempts of one task at a time.
pub struct Supervisor<'a, R: ProcessRunner> {
    runner: &'a R,
    inventory: Inventory<'a, R>,
    tools: &'a ToolsSection,
    retry: RetrySection,
    board: &'a StatusBoard,
    force_stop: &'a AtomicBool,
}

impl<'a, R: ProcessRunner> Supervisor<'a, R> {
    pub fn new(
        runner: &'a R,
        tools: &'a ToolsSection,
        retry: RetrySection,
        board: &'a StatusBoard,
        force_stop: &'a AtomicBool,
    ) -> Self {
        Self {
            runner,
            inventory: Inventory::new(runner, tools),
            tools,
            retry,
            board,
            force_stop,
        }
    }

    fn stop_requested(&self) -> bool {
        self.force_stop.load(Ordering::SeqCst)
    }

    /// Run the transfer for `task` until it succeeds, attempts run out, or a
    /// force-stop is requested. Never fails; failures end up in the log.
    pub async fn execute(&self, task: &BackupTask) {
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if self.stop_requested() {
                break;
            }

            self.refresh_pending(task).await;

            self.board.log(format!("Attempt {attempt} for {}...", task.name));

            match self.transfer(task).await {
                Ok(()) => {
                    info!(task = %task.name, attempt, "transfer succeeded");
                    return;
                }
                Err(e) => {
                    if self.stop_requested() {
                        debug!(task = %task.name, attempt, "transfer ended by force-stop");
                        break;
                    }
                    self.board.error(format!("Attempt {attempt} failed: {e}"));
                }
            }

            if attempt < max_attempts && !self.stop_requested() {
                tokio::time::sleep(self.retry.backoff()).await;
            }
        }
    }

    /// Re-derive the delta and replace the stored pending list with it, even
    /// when nothing appeared or vanished (handled snapshots leave the delta).
    async fn refresh_pending(&self, task: &BackupTask) {
        let current = match self.inventory.task_delta(task).await {
            Ok(current) => current,
            Err(e) => {
                self.board.warn(format!("Could not update snapshots for {}: {e}", task.name));
                return;
            }
        };

        let diff = self.board.with_state(|state| {
            diff_pending(state.pending_of(&task.name), &current, |id| {
                state.is_handled(&task.name, id)
            })
        });

        if !diff.appeared.is_empty() {
            self.board.log(format!(
                "Found {} new snapshots for {}",
                diff.appeared.len(),
                task.name
            ));
        }
        if !diff.vanished.is_empty() {
            self.board.log(format!(
                "Detected {} deleted snapshots for {}",
                diff.vanished.len(),
                task.name
            ));
        }

        self.board.emit(RunEvent::PendingRefreshed {
            task: task.name.clone(),
            snapshots: current,
        });
    }

    /// One transfer attempt; output lines are logged and scanned as they arrive.
    async fn transfer(&self, task: &BackupTask) -> crate::errors::Result<()> {
        let cmd = transfer_command(self.tools, task);
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let run = self.runner.run(&cmd, tx);
        let consume = async {
            while let Some(line) = rx.recv().await {
                self.observe_line(task, line);
            }
        };

        let (result, ()) = tokio::join!(run, consume);
        result
    }

    fn observe_line(&self, task: &BackupTask, line: String) {
        debug!(task = %task.name, "output: {}", line);

        if let Some(snapshot) = completion_marker(&line) {
            let accepted = self.board.emit(RunEvent::SnapshotTransferred {
                task: task.name.clone(),
                snapshot: snapshot.to_string(),
            });
            if accepted {
                debug!(task = %task.name, snapshot, "snapshot marked handled");
            }
        }

        self.board.emit(RunEvent::Log(line));
    }
}
