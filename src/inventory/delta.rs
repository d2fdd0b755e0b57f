// src/inventory/delta.rs

//! Pure set arithmetic over snapshot ID lists.

use std::collections::HashSet;

use crate::types::SnapshotId;

/// Snapshot IDs present in `source` but not in `destination`, in source order.
///
/// With `all = false` only the newest (last) of those is kept, so a task
/// advances by one snapshot per run instead of catching up fully.
pub fn compute_delta(
    source: &[SnapshotId],
    destination: &[SnapshotId],
    all: bool,
) -> Vec<SnapshotId> {
    let present: HashSet<&str> = destination.iter().map(String::as_str).collect();
    let mut only_in_source: Vec<SnapshotId> = source
        .iter()
        .filter(|id| !present.contains(id.as_str()))
        .cloned()
        .collect();

    if all {
        only_in_source
    } else {
        only_in_source.pop().into_iter().collect()
    }
}

/// How a freshly derived delta differs from the previously known pending list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingDiff {
    /// In the fresh delta but not previously known.
    pub appeared: Vec<SnapshotId>,
    /// Previously pending, gone from the fresh delta, and never seen handled.
    pub vanished: Vec<SnapshotId>,
}

impl PendingDiff {
    pub fn is_empty(&self) -> bool {
        self.appeared.is_empty() && self.vanished.is_empty()
    }
}

/// Compare the known pending list with the current delta.
///
/// `is_handled` tells whether a snapshot was already confirmed transferred; such
/// snapshots are expected to leave the delta and are not reported as vanished.
pub fn diff_pending<F>(
    known: &[SnapshotId],
    current: &[SnapshotId],
    is_handled: F,
) -> PendingDiff
where
    F: Fn(&str) -> bool,
{
    let appeared = current
        .iter()
        .filter(|id| !known.contains(id))
        .cloned()
        .collect();
    let vanished = known
        .iter()
        .filter(|id| !current.contains(id) && !is_handled(id))
        .cloned()
        .collect();

    PendingDiff { appeared, vanished }
}

/// Parse listing-tool output: one ID per line, blank lines ignored.
pub fn parse_listing(output: &str) -> Vec<SnapshotId> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
