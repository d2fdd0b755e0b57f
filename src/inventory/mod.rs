// src/inventory/mod.rs

//! Snapshot inventory: which snapshots exist where, and which still need to
//! be transferred.
//!
//! Listings run the local helper (`baksnapperd`) directly, or go through ssh
//! for remote hosts. Remote hosts are expected to map the `list-snapshots` and
//! `get-snapper-root` commands onto the same helper.

pub mod delta;

use tracing::debug;

use crate::config::ToolsSection;
use crate::engine::BackupTask;
use crate::errors::{BackupError, Result};
use crate::exec::{CommandSpec, ProcessRunner};
use crate::types::{SnapshotId, TaskMode};

pub use delta::{PendingDiff, compute_delta, diff_pending, parse_listing};

/// Directory below a snapper root that holds the numbered snapshots.
const SNAPSHOT_DIR: &str = ".snapshots";

/// Query front-end for the listing tool.
pub struct Inventory<'a, R: ProcessRunner> {
    runner: &'a R,
    tools: &'a ToolsSection,
}

impl<'a, R: ProcessRunner> Inventory<'a, R> {
    pub fn new(runner: &'a R, tools: &'a ToolsSection) -> Self {
        Self { runner, tools }
    }

    /// Build the argv for a listing-helper subcommand, locally or on `remote`.
    fn helper_command(&self, remote: Option<&str>, subcommand: &str, arg: &str) -> CommandSpec {
        match remote {
            Some(host) => CommandSpec::privileged(&self.tools.privilege, &self.tools.ssh)
                .arg("-o")
                .arg(format!("ConnectTimeout={}", self.tools.connect_timeout_secs))
                .arg(host)
                .arg(subcommand)
                .arg(arg),
            None => CommandSpec::privileged(&self.tools.privilege, &self.tools.listing)
                .arg(subcommand)
                .arg(arg),
        }
    }

    /// Snapshot IDs stored under `path`.
    pub async fn list_snapshots(
        &self,
        path: &str,
        remote: Option<&str>,
    ) -> Result<Vec<SnapshotId>> {
        let cmd = self.helper_command(remote, "list-snapshots", path);
        let output = self.runner.output(&cmd).await?;
        let ids = parse_listing(&output);
        debug!(path, remote = ?remote, count = ids.len(), "listed snapshots");
        Ok(ids)
    }

    /// Root directory of the snapper config `config_name`.
    pub async fn snapshot_root(&self, config_name: &str, remote: Option<&str>) -> Result<String> {
        let cmd = self.helper_command(remote, "get-snapper-root", config_name);
        let output = self.runner.output(&cmd).await?;
        Ok(output.trim().to_string())
    }

    /// Snapshots present at the task's source but missing at its destination.
    pub async fn task_delta(&self, task: &BackupTask) -> Result<Vec<SnapshotId>> {
        let (source, destination) = match task.mode {
            Some(TaskMode::Pull) => {
                let (host, path) = split_remote(&task.destination).ok_or_else(|| {
                    BackupError::Inventory(format!(
                        "Invalid pull destination: {}",
                        task.destination
                    ))
                })?;
                let root = self.snapshot_root(&task.config_name, Some(host)).await?;
                let source = self
                    .list_snapshots(&snapshot_dir(&root), Some(host))
                    .await?;
                let destination = self
                    .list_snapshots(&format!("{path}/{}", task.config_name), None)
                    .await?;
                (source, destination)
            }
            _ => {
                let root = self.snapshot_root(&task.config_name, None).await?;
                let source = self.list_snapshots(&snapshot_dir(&root), None).await?;
                let destination = self
                    .list_snapshots(&format!("{}/{}", task.destination, task.config_name), None)
                    .await?;
                (source, destination)
            }
        };

        Ok(compute_delta(&source, &destination, task.all_snapshots))
    }
}

fn snapshot_dir(root: &str) -> String {
    format!("{}/{SNAPSHOT_DIR}", root.trim_end_matches('/'))
}

/// Split `host:path` at the first colon; both halves must be non-empty.
fn split_remote(destination: &str) -> Option<(&str, &str)> {
    let (host, path) = destination.split_once(':')?;
    if host.is_empty() || path.is_empty() {
        return None;
    }
    Some((host, path))
}
