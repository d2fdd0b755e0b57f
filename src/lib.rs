// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod inventory;
pub mod logging;
pub mod types;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{BackupConfig, load_from_path, validate_config};
use crate::engine::monitor::MONITOR_INTERVAL;
use crate::engine::planner::HOSTNAME_PLACEHOLDER;
use crate::engine::{BackupController, RunOutcome, RunStatus, StopOutcome};
use crate::exec::{SysinfoProbe, TokioProcessRunner};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - the backup controller with the real process runner and system probe
/// - the transfer-presence monitor and the progress line on stdout
/// - Ctrl-C handling (force-stop)
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let mut raw = load_from_path(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;

    if let Some(lock_file) = &args.lock_file {
        raw.lock_file = Some(PathBuf::from(lock_file));
    }
    if args.shutdown_after {
        raw.shutdown_after_backup = true;
    }

    if args.dry_run {
        let cfg = validate_config(&raw)?;
        print_dry_run(&config_path, &cfg);
        return Ok(());
    }

    let runner = TokioProcessRunner::new(raw.tools.noise_markers.clone());
    let controller = Arc::new(BackupController::new(raw, runner, SysinfoProbe));

    let monitor = controller.spawn_process_monitor(MONITOR_INTERVAL);

    // Ctrl-C → force-stop the running transfer.
    {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl-C received; stopping backup");
            match controller.force_stop().await {
                StopOutcome::NotRunning => debug!("no transfer active at Ctrl-C"),
                outcome => debug!(?outcome, "force-stop finished"),
            }
        });
    }

    let progress = spawn_progress_printer(controller.board().watch_status());

    let outcome = controller.run().await;

    monitor.abort();
    progress.abort();
    println!();

    match outcome {
        RunOutcome::Completed | RunOutcome::Stopped => Ok(()),
        RunOutcome::AlreadyRunning => bail!("another backup run holds the lock"),
        RunOutcome::Aborted => bail!("backup aborted; see the log above"),
    }
}

/// Redraw a single progress line on stdout whenever the status changes.
fn spawn_progress_printer(
    mut status_rx: tokio::sync::watch::Receiver<RunStatus>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let line = progress_line(&status_rx.borrow_and_update());
            let mut stdout = std::io::stdout().lock();
            let _ = write!(stdout, "\r{line}");
            let _ = stdout.flush();
        }
    })
}

/// `[42%] laptop-home: Backing up laptop-home... (1/3)`
pub fn progress_line(status: &RunStatus) -> String {
    let disk = if status.current_disk.is_empty() {
        "-"
    } else {
        status.current_disk.as_str()
    };
    format!(
        "[{:>3}%] {}: {} ({}/{})",
        status.percent, disk, status.current_task, status.completed_disks, status.total_disks
    )
}

/// Simple dry-run output: print the checks and tasks that a run would use.
fn print_dry_run(config_path: &Path, cfg: &BackupConfig) {
    println!("baksnap-runner dry-run ({})", config_path.display());
    println!("  hostname_pattern = {}", cfg.hostname_pattern);
    println!(
        "  backup_mount = {} (>= {}TB {:?})",
        cfg.backup_mount, cfg.min_storage_size_tb, cfg.capacity_metric
    );
    println!("  lock_file = {}", cfg.lock_file.display());
    println!(
        "  retry = {} attempts, {:?} backoff",
        cfg.retry.max_attempts,
        cfg.retry.backoff()
    );
    if cfg.shutdown_after_backup {
        println!("  shutdown_after_backup = true");
    }
    println!();

    println!("tasks ({}):", cfg.tasks.len());
    for task in &cfg.tasks {
        println!("  - {}", task.name);
        println!("      config: {}", task.config);
        match (&task.dest, &task.dest_pattern) {
            (Some(dest), _) if !dest.is_empty() => println!("      dest: {dest}"),
            (_, Some(pattern)) => {
                println!(
                    "      dest_pattern: {pattern} ({HOSTNAME_PLACEHOLDER} resolved at run time)"
                )
            }
            _ => {}
        }
        if let Some(mode) = task.mode {
            println!("      type: {mode}");
        }
        let flags: Vec<&str> = [("all", task.all), ("link", task.link), ("prune", task.prune)]
            .into_iter()
            .filter_map(|(name, on)| on.then_some(name))
            .collect();
        if !flags.is_empty() {
            println!("      flags: {}", flags.join(", "));
        }
    }

    if !cfg.cleanup_paths.is_empty() {
        println!();
        println!("cleanup_paths:");
        for path in &cfg.cleanup_paths {
            println!("  - {}", path.display());
        }
    }

    debug!("dry-run complete (no execution)");
}
