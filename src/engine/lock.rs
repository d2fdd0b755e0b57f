// src/engine/lock.rs

//! Advisory single-instance lock: a file holding the owner's process id.
//!
//! The lock is guarded by a liveness check of the recorded process, not by a
//! kernel-level lock. A lock whose process is gone (or whose content is not a
//! process id) is stale and may be overwritten. Between reading a stale lock
//! and overwriting it another process could do the same; that race is
//! accepted.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::exec::SystemProbe;

/// What the lock file says about other runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    /// No lock file.
    Free,
    /// A lock file exists but its process is not alive. `None` if the file
    /// did not hold a process id.
    Stale(Option<u32>),
    /// A live process holds the lock.
    Held(u32),
}

#[derive(Debug, Clone)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inspect the lock file without modifying it.
    pub fn inspect(&self, probe: &dyn SystemProbe) -> LockStatus {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return LockStatus::Free,
            // Unreadable lock: treat like garbage content and let the write decide.
            Err(_) => return LockStatus::Stale(None),
        };

        match contents.trim().parse::<u32>() {
            Ok(pid) if probe.is_pid_alive(pid) => LockStatus::Held(pid),
            Ok(pid) => LockStatus::Stale(Some(pid)),
            Err(_) => LockStatus::Stale(None),
        }
    }

    /// Record `pid` as the owner, overwriting any previous content.
    pub fn write_pid(&self, pid: u32) -> io::Result<()> {
        fs::write(&self.path, pid.to_string())
    }

    /// Remove the lock file. Returns `false` if there was none.
    pub fn release(&self) -> io::Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
