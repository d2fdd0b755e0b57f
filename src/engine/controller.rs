// src/engine/controller.rs

//! Run lifecycle: lock → validate → plan → execute tasks → cleanup → release.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{BackupConfig, RawConfigFile};
use crate::engine::cleanup::run_cleanup;
use crate::engine::lock::{LockStatus, RunLock};
use crate::engine::monitor::spawn_process_monitor;
use crate::engine::planner::{prepare, seed_snapshots};
use crate::engine::precheck::run_prechecks;
use crate::engine::status::StatusBoard;
use crate::engine::supervisor::Supervisor;
use crate::engine::{RunEvent, RunOutcome, StopOutcome};
use crate::errors::Result;
use crate::exec::{CommandSpec, ProcessRunner, SystemProbe};
use crate::inventory::Inventory;

/// Knobs of the controller that are not part of the config file.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Process id written to the lock file.
    pub pid: u32,
    /// Delay between force-stop confirmation probes.
    pub stop_poll_interval: Duration,
    /// Give up waiting for a force-stop confirmation after this long.
    pub stop_timeout: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            pid: std::process::id(),
            stop_poll_interval: Duration::from_millis(500),
            stop_timeout: Duration::from_secs(300),
        }
    }
}

/// Owns one backup configuration and runs it on demand.
///
/// All operations take `&self`; share the controller through an `Arc` to call
/// [`BackupController::force_stop`] while [`BackupController::run`] is in
/// progress.
pub struct BackupController<R: ProcessRunner, P: SystemProbe> {
    config: RawConfigFile,
    runner: R,
    probe: Arc<P>,
    board: StatusBoard,
    lock: RunLock,
    force_stopped: AtomicBool,
    options: ControllerOptions,
}

impl<R: ProcessRunner, P: SystemProbe> fmt::Debug for BackupController<R, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupController")
            .field("lock", &self.lock)
            .field("board", &self.board)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<R: ProcessRunner, P: SystemProbe> BackupController<R, P> {
    pub fn new(config: RawConfigFile, runner: R, probe: P) -> Self {
        Self::with_options(config, runner, probe, ControllerOptions::default())
    }

    pub fn with_options(
        config: RawConfigFile,
        runner: R,
        probe: P,
        options: ControllerOptions,
    ) -> Self {
        let board = StatusBoard::new();
        board.emit(RunEvent::ShutdownAfterChanged(config.shutdown_after_backup));
        let lock = RunLock::new(config.lock_path());

        Self {
            config,
            runner,
            probe: Arc::new(probe),
            board,
            lock,
            force_stopped: AtomicBool::new(false),
            options,
        }
    }

    /// Observable run state.
    pub fn board(&self) -> &StatusBoard {
        &self.board
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn lock(&self) -> &RunLock {
        &self.lock
    }

    /// Power off after a completed run (takes effect for the running run too).
    pub fn set_shutdown_after(&self, enabled: bool) {
        self.board.emit(RunEvent::ShutdownAfterChanged(enabled));
    }

    pub fn is_force_stopped(&self) -> bool {
        self.force_stopped.load(Ordering::SeqCst)
    }

    /// Start the periodic transfer-presence probe for this controller's board.
    pub fn spawn_process_monitor(&self, interval: Duration) -> JoinHandle<()>
    where
        P: 'static,
    {
        spawn_process_monitor(
            Arc::clone(&self.probe),
            self.board.clone(),
            self.config.tools.transfer.clone(),
            interval,
        )
    }

    /// Perform one complete backup run.
    ///
    /// Nothing escapes as an error: failures are reported through the board's
    /// log and summarised by the returned [`RunOutcome`].
    pub async fn run(&self) -> RunOutcome {
        let stale = match self.lock.inspect(&*self.probe) {
            LockStatus::Held(pid) => {
                self.board.log(format!("Backup is already running (PID: {pid})."));
                return RunOutcome::AlreadyRunning;
            }
            LockStatus::Stale(pid) => Some(pid),
            LockStatus::Free => None,
        };

        self.force_stopped.store(false, Ordering::SeqCst);
        self.board.emit(RunEvent::Reset);
        self.board.emit(RunEvent::RunningChanged(true));

        if let Some(pid) = stale {
            let pid = pid.map_or_else(|| "unknown".to_string(), |p| p.to_string());
            self.board.log(format!(
                "Stale lock file found (PID: {pid} is not running). Overwriting..."
            ));
        }

        if let Err(e) = self.lock.write_pid(self.options.pid) {
            self.board.warn(format!("Could not create lock file: {e}"));
        }

        let outcome = match self.run_inner().await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.board.error(format!("Error during backup: {e}"));
                RunOutcome::Aborted
            }
        };

        if let Err(e) = self.lock.release() {
            self.board.warn(format!("Could not remove lock file: {e}"));
        }
        self.board.emit(RunEvent::RunningChanged(false));

        info!(?outcome, "backup run finished");
        outcome
    }

    async fn run_inner(&self) -> Result<RunOutcome> {
        let (cfg, hostname) = run_prechecks(&self.config, &*self.probe)?;
        self.board.log("All checks passed. Proceeding with backup...");

        self.board.set_phase("Planning tasks...");
        let tasks = prepare(&hostname, &cfg)?;

        let inventory = Inventory::new(&self.runner, &cfg.tools);
        seed_snapshots(&tasks, &inventory, &self.board).await;

        let total = tasks.len();
        self.board.emit(RunEvent::TotalTasks(total));

        let supervisor = Supervisor::new(
            &self.runner,
            &cfg.tools,
            cfg.retry,
            &self.board,
            &self.force_stopped,
        );

        for (index, task) in tasks.iter().enumerate() {
            if self.is_force_stopped() {
                break;
            }

            self.board.emit(RunEvent::TaskStarted {
                index,
                name: task.name.clone(),
            });
            self.board.set_phase(format!("Backing up {}...", task.name));
            self.board.log(format!("Starting task: {}", task.name));

            supervisor.execute(task).await;
        }

        // The sweep walks whole snapshot trees; keep it off the async workers.
        let paths = cfg.cleanup_paths.clone();
        let board = self.board.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || run_cleanup(&paths, &board)).await {
            self.board.warn(format!("Cleanup task failed: {e}"));
        }

        if self.is_force_stopped() {
            self.board.log("Backup was stopped by user.");
            return Ok(RunOutcome::Stopped);
        }

        self.board.emit(RunEvent::Finished);
        self.board.set_phase("Done");
        self.board.log("Backup completed successfully.");

        if self.board.shutdown_after() && !self.is_force_stopped() {
            self.shutdown(&cfg).await?;
        }

        Ok(RunOutcome::Completed)
    }

    async fn shutdown(&self, cfg: &BackupConfig) -> Result<()> {
        self.board.log("Shutting down...");
        let Some((program, args)) = cfg.tools.shutdown.split_first() else {
            self.board.warn("No shutdown command configured.");
            return Ok(());
        };
        let cmd =
            CommandSpec::privileged(&cfg.tools.privilege, program).args(args.iter().cloned());
        self.runner.output(&cmd).await?;
        Ok(())
    }

    /// Cooperatively stop the current run.
    ///
    /// No-op unless a transfer process is active. Otherwise flags the run as
    /// force-stopped (no further attempts or tasks start), kills the transfer
    /// tool by name and the tracked subprocess, and waits until the probe no
    /// longer sees the transfer tool.
    pub async fn force_stop(&self) -> StopOutcome {
        let tools = &self.config.tools;
        if !self.probe.is_process_running(&tools.transfer).unwrap_or(false) {
            debug!("force-stop requested but no transfer is active");
            return StopOutcome::NotRunning;
        }

        self.force_stopped.store(true, Ordering::SeqCst);
        self.board.emit(RunEvent::ForceStopRequested);
        self.board.log("Force stopping backup...");

        let pkill = CommandSpec::privileged(&tools.privilege, &tools.pkill)
            .arg("-f")
            .arg(&tools.transfer);
        if let Err(e) = self.runner.output(&pkill).await {
            debug!(error = %e, "pkill reported an error");
        }

        if self.runner.kill_current() {
            debug!("tracked transfer process signalled");
        }

        self.wait_for_stop().await
    }

    async fn wait_for_stop(&self) -> StopOutcome {
        let transfer = &self.config.tools.transfer;
        let deadline = Instant::now() + self.options.stop_timeout;

        loop {
            // A probe that fails counts as "stopped".
            let still_running = self.probe.is_process_running(transfer).unwrap_or(false);
            if !still_running {
                self.board.log("Backup process force stopped.");
                self.board.emit(RunEvent::RunningChanged(false));
                return StopOutcome::Stopped;
            }

            if Instant::now() >= deadline {
                self.board.warn(format!(
                    "{transfer} still running after {:?}; giving up waiting",
                    self.options.stop_timeout
                ));
                return StopOutcome::TimedOut;
            }

            tokio::time::sleep(self.options.stop_poll_interval).await;
        }
    }
}
