// src/engine/planner.rs

use tracing::debug;

use crate::config::{BackupConfig, TaskConfig};
use crate::engine::status::StatusBoard;
use crate::engine::{BackupTask, RunEvent};
use crate::errors::{BackupError, Result};
use crate::exec::ProcessRunner;
use crate::inventory::Inventory;

/// Placeholder substituted in `dest_pattern`.
pub const HOSTNAME_PLACEHOLDER: &str = "{hostname}";

/// Turn the configured tasks into concrete [`BackupTask`]s for this host.
///
/// A literal `dest` wins; otherwise `dest_pattern` is resolved against
/// `hostname`. Tasks that end up without a destination are dropped.
pub fn prepare(hostname: &str, cfg: &BackupConfig) -> Result<Vec<BackupTask>> {
    let tasks: Vec<BackupTask> = cfg
        .tasks
        .iter()
        .filter_map(|tc| {
            let destination = resolve_destination(tc, hostname);
            if destination.trim().is_empty() {
                debug!(task = %tc.name, "no destination after resolution; dropping task");
                return None;
            }
            Some(BackupTask {
                name: tc.name.clone(),
                config_name: tc.config.clone(),
                mode: tc.mode,
                destination,
                all_snapshots: tc.all,
                link: tc.link,
                prune: tc.prune,
            })
        })
        .collect();

    if tasks.is_empty() {
        return Err(BackupError::NoValidTasks);
    }
    Ok(tasks)
}

fn resolve_destination(tc: &TaskConfig, hostname: &str) -> String {
    match (&tc.dest, &tc.dest_pattern) {
        (Some(dest), _) if !dest.is_empty() => dest.clone(),
        (_, Some(pattern)) => pattern.replace(HOSTNAME_PLACEHOLDER, hostname),
        _ => String::new(),
    }
}

/// Record the initial pending list of every task.
///
/// A task whose inventory cannot be read starts with an empty list; the run
/// carries on with partial information.
pub async fn seed_snapshots<R: ProcessRunner>(
    tasks: &[BackupTask],
    inventory: &Inventory<'_, R>,
    board: &StatusBoard,
) {
    board.log("Calculating total snapshots...");

    for task in tasks {
        let snapshots = match inventory.task_delta(task).await {
            Ok(snapshots) => {
                board.log(format!(
                    "Found {} snapshots to backup for {}",
                    snapshots.len(),
                    task.name
                ));
                snapshots
            }
            Err(e) => {
                board.warn(format!("Could not count snapshots for {}: {e}", task.name));
                Vec::new()
            }
        };

        board.emit(RunEvent::PendingRefreshed {
            task: task.name.clone(),
            snapshots,
        });
    }
}
