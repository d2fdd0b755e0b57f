// tests/run_state.rs

use baksnap_runner::engine::state::{LOG_CAPACITY, STATUS_LOG_TAIL};
use baksnap_runner::engine::{RunEvent, RunState, StatusBoard};

fn pending(task: &str, ids: &[&str]) -> RunEvent {
    RunEvent::PendingRefreshed {
        task: task.to_string(),
        snapshots: ids.iter().map(|s| s.to_string()).collect(),
    }
}

fn transferred(task: &str, id: &str) -> RunEvent {
    RunEvent::SnapshotTransferred {
        task: task.to_string(),
        snapshot: id.to_string(),
    }
}

fn started(index: usize, name: &str) -> RunEvent {
    RunEvent::TaskStarted {
        index,
        name: name.to_string(),
    }
}

#[test]
fn snapshot_is_handled_once() {
    let mut state = RunState::new();
    state.apply(&pending("home", &["11", "12"]));

    assert!(state.apply(&transferred("home", "12")));
    assert!(!state.apply(&transferred("home", "12")));
    assert_eq!(state.handled_count(), 1);
    assert!(state.is_handled("home", "12"));
}

#[test]
fn markers_for_unknown_snapshots_are_ignored() {
    let mut state = RunState::new();
    state.apply(&pending("home", &["12"]));

    assert!(!state.apply(&transferred("home", "99")));
    assert!(!state.apply(&transferred("root", "12")));
    assert_eq!(state.handled_count(), 0);
}

#[test]
fn refreshed_pending_list_replaces_the_old_one() {
    let mut state = RunState::new();
    state.apply(&pending("home", &["10", "11"]));
    state.apply(&pending("home", &["11", "12"]));

    assert_eq!(state.pending_of("home"), ["11", "12"]);
    assert_eq!(state.total_pending(), 2);
    assert!(!state.apply(&transferred("home", "10")));
}

#[test]
fn progress_follows_task_boundaries() {
    let mut state = RunState::new();
    state.apply(&RunEvent::TotalTasks(3));

    state.apply(&started(0, "a"));
    assert_eq!(state.progress().percent, 0);
    assert_eq!(state.progress().current_disk, "a");

    state.apply(&started(1, "b"));
    assert_eq!(state.progress().percent, 33);
    assert_eq!(state.progress().completed_disks, 1);

    state.apply(&started(2, "c"));
    assert_eq!(state.progress().percent, 67);

    state.apply(&RunEvent::Finished);
    assert_eq!(state.progress().percent, 100);
    assert_eq!(state.progress().completed_disks, 3);
}

#[test]
fn progress_never_moves_backwards() {
    let mut state = RunState::new();
    state.apply(&RunEvent::TotalTasks(4));
    state.apply(&started(2, "c"));

    assert!(!state.apply(&started(1, "b")));
    assert_eq!(state.progress().completed_disks, 2);
    assert_eq!(state.progress().current_disk, "c");
}

#[test]
fn zero_tasks_report_zero_percent() {
    let mut state = RunState::new();
    state.apply(&started(0, "a"));

    assert_eq!(state.progress().percent, 0);
}

#[test]
fn reset_clears_the_previous_run() {
    let mut state = RunState::new();
    state.apply(&RunEvent::ShutdownAfterChanged(true));
    state.apply(&RunEvent::TotalTasks(2));
    state.apply(&pending("home", &["12"]));
    state.apply(&transferred("home", "12"));
    state.apply(&RunEvent::ForceStopRequested);
    state.apply(&RunEvent::Log("old line".to_string()));

    assert!(state.apply(&RunEvent::Reset));

    assert_eq!(state.handled_count(), 0);
    assert_eq!(state.total_pending(), 0);
    assert!(!state.is_force_stopped());
    assert_eq!(state.logs().count(), 0);
    assert_eq!(state.progress().current_task, "Validating configuration...");
    assert_eq!(state.progress().total_disks, 0);
    // Operator preference survives across runs.
    assert!(state.shutdown_after());
}

#[test]
fn flag_events_only_count_when_they_change_something() {
    let mut state = RunState::new();

    assert!(state.apply(&RunEvent::RunningChanged(true)));
    assert!(!state.apply(&RunEvent::RunningChanged(true)));
    assert!(state.apply(&RunEvent::ForceStopRequested));
    assert!(!state.apply(&RunEvent::ForceStopRequested));
    assert!(!state.apply(&RunEvent::ProcessActivity(false)));
}

#[test]
fn log_is_bounded_and_status_shows_the_tail() {
    let mut state = RunState::new();
    for i in 0..LOG_CAPACITY + 5 {
        state.apply(&RunEvent::Log(format!("line {i}")));
    }

    assert_eq!(state.logs().count(), LOG_CAPACITY);
    assert_eq!(state.logs().next(), Some("line 5"));

    let status = state.status();
    assert_eq!(status.last_logs.len(), STATUS_LOG_TAIL);
    assert_eq!(
        status.last_logs.last().map(String::as_str),
        Some(format!("line {}", LOG_CAPACITY + 4).as_str())
    );
}

#[test]
fn status_reports_counters() {
    let mut state = RunState::new();
    state.apply(&RunEvent::RunningChanged(true));
    state.apply(&RunEvent::ProcessActivity(true));
    state.apply(&pending("home", &["11", "12"]));
    state.apply(&pending("root", &["3"]));
    state.apply(&transferred("home", "11"));

    let status = state.status();
    assert!(status.is_backup_running);
    assert!(status.is_checking_process);
    assert_eq!(status.total_snapshots, 3);
    assert_eq!(status.handled_snapshots, 1);
}

#[tokio::test]
async fn board_broadcasts_accepted_events_only() {
    let board = StatusBoard::new();
    let mut events = board.subscribe();
    let mut status = board.watch_status();

    board.emit(pending("home", &["12"]));
    assert!(board.emit(transferred("home", "12")));
    assert!(!board.emit(transferred("home", "12")));
    board.log("done");

    assert!(matches!(events.recv().await, Ok(RunEvent::PendingRefreshed { .. })));
    assert!(matches!(events.recv().await, Ok(RunEvent::SnapshotTransferred { .. })));
    assert_eq!(events.recv().await.ok(), Some(RunEvent::Log("done".to_string())));

    assert!(status.has_changed().unwrap_or(false));
    assert_eq!(status.borrow_and_update().handled_snapshots, 1);
}

#[tokio::test]
async fn board_prefixes_warnings() {
    let board = StatusBoard::new();
    board.warn("disk is slow");
    board.error("Attempt 1 failed: boom");

    assert_eq!(
        board.logs(),
        vec!["Warning: disk is slow", "Attempt 1 failed: boom"]
    );
}
