use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Snapshot identifier as printed by the listing tool (numeric, kept as text).
pub type SnapshotId = String;

/// Direction of a backup task.
///
/// - `Push`: local snapshots are sent to the destination.
/// - `Pull`: the destination is `host:path` and snapshots are fetched from the
///   remote host into the local path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    Push,
    Pull,
}

impl TaskMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskMode::Push => "push",
            TaskMode::Pull => "pull",
        }
    }
}

impl fmt::Display for TaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "push" => Ok(TaskMode::Push),
            "pull" => Ok(TaskMode::Pull),
            other => Err(format!(
                "invalid task type: {other} (expected \"push\" or \"pull\")"
            )),
        }
    }
}

/// Which figure of the backup mount is compared against `min_storage_size_tb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CapacityMetric {
    /// Free bytes left on the filesystem.
    #[default]
    Available,
    /// Total size of the filesystem (detects "disk not mounted").
    Total,
}
