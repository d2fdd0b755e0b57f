// src/engine/cleanup.rs

//! Post-run sweep of backup directories.
//!
//! Interrupted transfers leave snapshot metadata behind: empty `info.xml`
//! files, `info.xml` files whose `snapshot` subvolume never arrived, and
//! empty per-snapshot directories.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::engine::status::StatusBoard;

/// Metadata file written next to each snapshot.
pub const MARKER_FILE: &str = "info.xml";
/// Subvolume directory the marker describes.
pub const SNAPSHOT_SUBDIR: &str = "snapshot";
/// Deepest level (relative to the cleanup path) searched for markers.
pub const MARKER_MAX_DEPTH: usize = 4;
/// Level of the per-snapshot directories (`<host>/<config>/<id>`).
pub const SNAPSHOT_DIR_DEPTH: usize = 3;

/// What a sweep of one path removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub empty_markers: usize,
    pub orphaned_markers: usize,
    pub empty_dirs: usize,
}

/// Sweep every configured path. Failures are logged as warnings; the sweep
/// always continues with the next path. Blocking; async callers should run it
/// on the blocking pool.
pub fn run_cleanup(paths: &[PathBuf], board: &StatusBoard) {
    board.log("Running cleanup...");
    board.set_phase("Cleaning up...");

    for path in paths {
        let shown = path.display().to_string();
        if shown.trim().is_empty() || path == Path::new("/") {
            debug!(path = %shown, "skipping unsafe cleanup path");
            continue;
        }

        match cleanup_path(path) {
            Ok(report) => debug!(path = %shown, ?report, "cleanup finished"),
            Err(e) => board.warn(format!("Cleanup failed for {shown}: {e}")),
        }
    }
}

/// Sweep a single directory tree.
pub fn cleanup_path(root: &Path) -> io::Result<CleanupReport> {
    let mut report = CleanupReport::default();

    // Pass 1: zero-byte markers.
    for marker in markers_under(root)? {
        if fs::metadata(&marker)?.len() == 0 {
            fs::remove_file(&marker)?;
            report.empty_markers += 1;
        }
    }

    // Pass 2: markers whose snapshot subvolume is missing.
    for marker in markers_under(root)? {
        let has_snapshot = marker
            .parent()
            .is_some_and(|dir| dir.join(SNAPSHOT_SUBDIR).is_dir());
        if !has_snapshot {
            fs::remove_file(&marker)?;
            report.orphaned_markers += 1;
        }
    }

    // Pass 3: per-snapshot directories left empty. Non-empty ones stay.
    for entry in WalkDir::new(root)
        .min_depth(SNAPSHOT_DIR_DEPTH)
        .max_depth(SNAPSHOT_DIR_DEPTH)
    {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_dir() && fs::remove_dir(entry.path()).is_ok() {
            report.empty_dirs += 1;
        }
    }

    Ok(report)
}

fn markers_under(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut markers = Vec::new();
    for entry in WalkDir::new(root).max_depth(MARKER_MAX_DEPTH) {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_file() && entry.file_name() == MARKER_FILE {
            markers.push(entry.into_path());
        }
    }
    Ok(markers)
}
