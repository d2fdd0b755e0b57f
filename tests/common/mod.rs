// tests/common/mod.rs

#![allow(dead_code)]

pub use baksnap_runner_test_utils::builders::{ConfigBuilder, TaskBuilder};
pub use baksnap_runner_test_utils::fakes::{FakeProbe, FakeRunner, TB, TransferScript};
pub use baksnap_runner_test_utils::{init_tracing, with_timeout};

use baksnap_runner::engine::StatusBoard;

/// True if any log line on the board contains `needle`.
pub fn has_log(board: &StatusBoard, needle: &str) -> bool {
    board.logs().iter().any(|line| line.contains(needle))
}

/// Number of log lines on the board containing `needle`.
pub fn count_logs(board: &StatusBoard, needle: &str) -> usize {
    board
        .logs()
        .iter()
        .filter(|line| line.contains(needle))
        .count()
}
