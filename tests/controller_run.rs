// tests/controller_run.rs

mod common;
use crate::common::{
    ConfigBuilder, FakeProbe, FakeRunner, TB, TaskBuilder, TransferScript, count_logs, has_log,
    init_tracing, with_timeout,
};

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use baksnap_runner::config::RawConfigFile;
use baksnap_runner::engine::{BackupController, ControllerOptions, RunOutcome, StopOutcome};

type TestResult = Result<(), Box<dyn Error>>;

const PID: u32 = 4242;

fn options() -> ControllerOptions {
    ControllerOptions {
        pid: PID,
        stop_poll_interval: Duration::from_millis(500),
        stop_timeout: Duration::from_secs(300),
    }
}

fn lock_path(dir: &TempDir) -> PathBuf {
    dir.path().join("baksnapper.lock")
}

fn single_task_config(lock: &Path) -> RawConfigFile {
    ConfigBuilder::new()
        .with_lock_file(lock)
        .with_task(TaskBuilder::new("home", "home").dest("/mnt/backup"))
        .build()
}

/// Source 10..=12 under /home, destination holds 10.
fn listing_runner() -> FakeRunner {
    FakeRunner::new()
        .with_output("get-snapper-root home", "/home")
        .with_output("list-snapshots /home/.snapshots", "10\n11\n12")
        .with_output("list-snapshots /mnt/backup/home", "10")
}

#[tokio::test]
async fn successful_run_transfers_the_newest_snapshot() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let runner = listing_runner().with_transfer(TransferScript::succeed([
        "At subvol /.snapshots/12/snapshot",
    ]));
    let controller = BackupController::with_options(
        single_task_config(&lock_path(&dir)),
        runner,
        FakeProbe::new(),
        options(),
    );

    let outcome = with_timeout(controller.run()).await;

    assert_eq!(outcome, RunOutcome::Completed);
    let board = controller.board();
    board.with_state(|state| {
        assert_eq!(state.pending_of("home"), ["12"]);
        assert!(state.is_handled("home", "12"));
        assert_eq!(state.progress().percent, 100);
        assert_eq!(state.progress().completed_disks, 1);
        assert_eq!(state.progress().total_disks, 1);
    });

    let status = board.status();
    assert!(!status.is_backup_running);
    assert_eq!(status.handled_snapshots, 1);
    assert_eq!(status.total_snapshots, 1);

    for expected in [
        "All checks passed. Proceeding with backup...",
        "Calculating total snapshots...",
        "Found 1 snapshots to backup for home",
        "Starting task: home",
        "Attempt 1 for home...",
        "Running cleanup...",
        "Backup completed successfully.",
    ] {
        assert!(has_log(board, expected), "missing log line {expected:?}");
    }

    let transfers: Vec<String> = controller
        .runner()
        .run_calls()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(transfers, vec!["baksnapper --config home /mnt/backup"]);

    assert!(!lock_path(&dir).exists());
    Ok(())
}

#[tokio::test]
async fn run_sweeps_cleanup_paths_after_the_tasks() -> TestResult {
    let dir = TempDir::new()?;
    let backups = dir.path().join("backups");
    let interrupted = backups.join("nas").join("home").join("12");
    fs::create_dir_all(&interrupted)?;
    fs::write(interrupted.join("info.xml"), "")?;
    let kept = backups.join("nas").join("home").join("10");
    fs::create_dir_all(kept.join("snapshot"))?;
    fs::write(kept.join("info.xml"), "<snapshot/>")?;

    let raw = ConfigBuilder::new()
        .with_lock_file(lock_path(&dir))
        .with_cleanup_path(&backups)
        .with_task(TaskBuilder::new("home", "home").dest("/mnt/backup"))
        .build();
    let controller =
        BackupController::with_options(raw, listing_runner(), FakeProbe::new(), options());

    let outcome = with_timeout(controller.run()).await;

    assert_eq!(outcome, RunOutcome::Completed);
    assert!(!interrupted.exists());
    assert!(kept.join("info.xml").is_file());
    assert!(!has_log(controller.board(), "Cleanup task failed"));
    assert!(!has_log(controller.board(), "Cleanup failed"));
    Ok(())
}

#[tokio::test]
async fn insufficient_capacity_aborts_before_any_transfer() -> TestResult {
    let dir = TempDir::new()?;
    let controller = BackupController::with_options(
        single_task_config(&lock_path(&dir)),
        listing_runner(),
        FakeProbe::new().with_disk(TB, TB / 2),
        options(),
    );

    let outcome = with_timeout(controller.run()).await;

    assert_eq!(outcome, RunOutcome::Aborted);
    assert!(has_log(
        controller.board(),
        "Error during backup: /mnt/backup capacity is less than 1TB or not mounted."
    ));
    assert!(controller.runner().calls().is_empty());
    assert!(!controller.board().is_running());
    assert!(!lock_path(&dir).exists());
    Ok(())
}

#[tokio::test]
async fn invalid_config_is_reported_through_the_run_log() -> TestResult {
    let dir = TempDir::new()?;
    let raw = ConfigBuilder::new().with_lock_file(lock_path(&dir)).build();
    let controller =
        BackupController::with_options(raw, FakeRunner::new(), FakeProbe::new(), options());

    let outcome = with_timeout(controller.run()).await;

    assert_eq!(outcome, RunOutcome::Aborted);
    assert!(has_log(
        controller.board(),
        "Error during backup: Configuration error: config.task must contain at least one [[task]] entry."
    ));
    assert!(!lock_path(&dir).exists());
    Ok(())
}

#[tokio::test]
async fn failing_task_does_not_stop_the_others() -> TestResult {
    let dir = TempDir::new()?;
    let raw = ConfigBuilder::new()
        .with_lock_file(lock_path(&dir))
        .with_retry(2, 10)
        .with_task(TaskBuilder::new("a", "home").dest("/mnt/a"))
        .with_task(TaskBuilder::new("b", "home").dest("/mnt/b"))
        .with_task(TaskBuilder::new("c", "home").dest("/mnt/c"))
        .build();
    let runner = FakeRunner::new()
        .with_transfer(TransferScript::succeed(Vec::<String>::new()))
        .with_transfer(TransferScript::fail(1))
        .with_transfer(TransferScript::fail(1))
        .with_transfer(TransferScript::succeed(Vec::<String>::new()));
    let controller = BackupController::with_options(raw, runner, FakeProbe::new(), options());

    let outcome = with_timeout(controller.run()).await;

    assert_eq!(outcome, RunOutcome::Completed);
    let destinations: Vec<String> = controller
        .runner()
        .run_calls()
        .iter()
        .filter_map(|cmd| cmd.args.last().cloned())
        .collect();
    assert_eq!(destinations, vec!["/mnt/a", "/mnt/b", "/mnt/b", "/mnt/c"]);

    let board = controller.board();
    assert_eq!(count_logs(board, "failed: "), 2);
    assert!(has_log(board, "Starting task: c"));
    assert!(has_log(board, "Backup completed successfully."));
    assert_eq!(board.status().percent, 100);
    Ok(())
}

#[tokio::test]
async fn third_task_failing_every_attempt_still_completes() -> TestResult {
    let dir = TempDir::new()?;
    let raw = ConfigBuilder::new()
        .with_lock_file(lock_path(&dir))
        .with_task(TaskBuilder::new("a", "home").dest("/mnt/a"))
        .with_task(TaskBuilder::new("b", "home").dest("/mnt/b"))
        .with_task(TaskBuilder::new("c", "home").dest("/mnt/c"))
        .build();
    let runner = (0..5).fold(
        FakeRunner::new()
            .with_transfer(TransferScript::succeed(Vec::<String>::new()))
            .with_transfer(TransferScript::succeed(Vec::<String>::new())),
        |r, _| r.with_transfer(TransferScript::fail(1)),
    );
    let controller = BackupController::with_options(raw, runner, FakeProbe::new(), options());

    let outcome = with_timeout(controller.run()).await;

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(controller.runner().run_calls().len(), 7);

    let board = controller.board();
    assert_eq!(count_logs(board, "failed: "), 5);
    assert!(has_log(board, "Attempt 5 failed: Command baksnapper --config home /mnt/c"));
    assert!(has_log(board, "Running cleanup..."));
    assert!(has_log(board, "Backup completed successfully."));
    assert!(!board.status().force_stopped);
    Ok(())
}

#[tokio::test]
async fn live_lock_refuses_to_start() -> TestResult {
    let dir = TempDir::new()?;
    fs::write(lock_path(&dir), "999")?;
    let controller = BackupController::with_options(
        single_task_config(&lock_path(&dir)),
        listing_runner(),
        FakeProbe::new().with_alive_pid(999),
        options(),
    );

    let outcome = with_timeout(controller.run()).await;

    assert_eq!(outcome, RunOutcome::AlreadyRunning);
    assert!(has_log(controller.board(), "Backup is already running (PID: 999)."));
    assert!(controller.runner().calls().is_empty());
    assert_eq!(fs::read_to_string(lock_path(&dir))?, "999");
    Ok(())
}

#[tokio::test]
async fn stale_lock_is_overwritten() -> TestResult {
    let dir = TempDir::new()?;
    fs::write(lock_path(&dir), "999\n")?;
    let controller = BackupController::with_options(
        single_task_config(&lock_path(&dir)),
        listing_runner(),
        FakeProbe::new(),
        options(),
    );

    let outcome = with_timeout(controller.run()).await;

    assert_eq!(outcome, RunOutcome::Completed);
    assert!(has_log(
        controller.board(),
        "Stale lock file found (PID: 999 is not running). Overwriting..."
    ));
    assert!(!lock_path(&dir).exists());
    Ok(())
}

#[tokio::test]
async fn unreadable_lock_content_counts_as_stale() -> TestResult {
    let dir = TempDir::new()?;
    fs::write(lock_path(&dir), "not-a-pid")?;
    let controller = BackupController::with_options(
        single_task_config(&lock_path(&dir)),
        listing_runner(),
        FakeProbe::new(),
        options(),
    );

    assert_eq!(with_timeout(controller.run()).await, RunOutcome::Completed);
    assert!(has_log(controller.board(), "PID: unknown is not running"));
    Ok(())
}

#[tokio::test]
async fn force_stop_ends_the_run_without_further_attempts() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let raw = ConfigBuilder::new()
        .with_lock_file(lock_path(&dir))
        .with_task(TaskBuilder::new("a", "home").dest("/mnt/a"))
        .with_task(TaskBuilder::new("b", "home").dest("/mnt/b"))
        .build();
    let runner = FakeRunner::new().with_transfer(TransferScript::BlockUntilKilled(vec![
        "Sending snapshot".to_string(),
    ]));
    // Visible when the stop is requested, gone at the first confirmation probe.
    let probe = FakeProbe::new().with_running([true, false]);
    let controller = Arc::new(BackupController::with_options(raw, runner, probe, options()));
    controller.set_shutdown_after(true);

    let run = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.run().await })
    };

    with_timeout(controller.runner().wait_for_blocked_transfer()).await;
    assert_eq!(fs::read_to_string(lock_path(&dir))?, PID.to_string());
    assert!(controller.board().is_running());

    let stopped = with_timeout(controller.force_stop()).await;
    assert_eq!(stopped, StopOutcome::Stopped);

    let outcome = with_timeout(run).await?;
    assert_eq!(outcome, RunOutcome::Stopped);

    let board = controller.board();
    assert!(controller.is_force_stopped());
    assert!(board.status().force_stopped);
    assert!(has_log(board, "Force stopping backup..."));
    assert!(has_log(board, "Backup process force stopped."));
    assert!(has_log(board, "Backup was stopped by user."));
    assert!(!has_log(board, "Backup completed successfully."));
    assert!(!has_log(board, "Attempt 1 failed"));
    assert!(!has_log(board, "Starting task: b"));

    let calls = controller.runner().call_lines();
    assert!(calls.contains(&"pkill -f baksnapper".to_string()));
    assert!(!calls.iter().any(|c| c.contains("shutdown")));
    assert_eq!(controller.runner().run_calls().len(), 1);
    assert!(!lock_path(&dir).exists());
    Ok(())
}

#[tokio::test]
async fn force_stop_without_active_transfer_is_a_no_op() -> TestResult {
    let dir = TempDir::new()?;
    let controller = BackupController::with_options(
        single_task_config(&lock_path(&dir)),
        FakeRunner::new(),
        FakeProbe::new(),
        options(),
    );

    assert_eq!(controller.force_stop().await, StopOutcome::NotRunning);
    assert!(!controller.is_force_stopped());
    assert!(controller.runner().calls().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn force_stop_gives_up_after_the_timeout() -> TestResult {
    let dir = TempDir::new()?;
    let controller = BackupController::with_options(
        single_task_config(&lock_path(&dir)),
        FakeRunner::new(),
        FakeProbe::new().with_running_default(true),
        ControllerOptions {
            stop_timeout: Duration::from_secs(2),
            ..options()
        },
    );

    let outcome = controller.force_stop().await;

    assert_eq!(outcome, StopOutcome::TimedOut);
    assert!(controller.is_force_stopped());
    assert!(has_log(controller.board(), "still running after"));
    Ok(())
}

#[tokio::test]
async fn shutdown_follows_a_completed_run_when_requested() -> TestResult {
    let dir = TempDir::new()?;
    let raw = ConfigBuilder::new()
        .with_lock_file(lock_path(&dir))
        .with_shutdown_after(true)
        .with_task(TaskBuilder::new("home", "home").dest("/mnt/backup"))
        .build();
    let controller =
        BackupController::with_options(raw, listing_runner(), FakeProbe::new(), options());

    assert!(controller.board().status().shutdown_after_backup);
    assert_eq!(with_timeout(controller.run()).await, RunOutcome::Completed);

    assert!(has_log(controller.board(), "Shutting down..."));
    let calls = controller.runner().call_lines();
    assert_eq!(calls.last().map(String::as_str), Some("shutdown now"));
    Ok(())
}

#[tokio::test]
async fn second_run_starts_from_a_clean_state() -> TestResult {
    let dir = TempDir::new()?;
    let runner = listing_runner()
        .with_transfer(TransferScript::succeed(["At subvol /home/.snapshots/12/snapshot"]));
    let controller = BackupController::with_options(
        single_task_config(&lock_path(&dir)),
        runner,
        FakeProbe::new(),
        options(),
    );

    assert_eq!(controller.run().await, RunOutcome::Completed);
    assert_eq!(controller.board().status().handled_snapshots, 1);

    assert_eq!(controller.run().await, RunOutcome::Completed);
    let board = controller.board();
    assert_eq!(board.status().handled_snapshots, 0);
    assert_eq!(count_logs(board, "Backup completed successfully."), 1);
    Ok(())
}
