// src/exec/probe.rs

//! System queries the engine needs besides running commands: host identity,
//! disk space, and process liveness.

use std::path::Path;

use sysinfo::{Disks, Pid, System};
use tracing::debug;

use crate::errors::{BackupError, Result};

/// Size figures of the filesystem holding a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSpace {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

/// Trait abstracting the system probes.
///
/// Production code uses [`SysinfoProbe`]; tests use a scripted fake.
pub trait SystemProbe: Send + Sync {
    fn hostname(&self) -> Result<String>;

    /// Space of the filesystem `path` lives on.
    fn disk_space(&self, path: &Path) -> Result<DiskSpace>;

    /// Whether a process with this id currently exists.
    fn is_pid_alive(&self, pid: u32) -> bool;

    /// Whether any process other than ourselves runs `name`, matched against
    /// the process name and the file name of every command-line word.
    fn is_process_running(&self, name: &str) -> Result<bool>;
}

/// [`SystemProbe`] backed by the `sysinfo` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoProbe;

impl SystemProbe for SysinfoProbe {
    fn hostname(&self) -> Result<String> {
        System::host_name()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| BackupError::Precheck("Could not determine the local hostname.".into()))
    }

    fn disk_space(&self, path: &Path) -> Result<DiskSpace> {
        let target = std::fs::canonicalize(path)?;
        let disks = Disks::new_with_refreshed_list();

        // The filesystem holding `target` is the one with the longest
        // mount point that is a prefix of it.
        let disk = disks
            .list()
            .iter()
            .filter(|d| target.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .ok_or_else(|| {
                BackupError::Precheck(format!("No mounted filesystem holds {}", path.display()))
            })?;

        debug!(
            path = %path.display(),
            mount = %disk.mount_point().display(),
            total = disk.total_space(),
            available = disk.available_space(),
            "disk space probed"
        );

        Ok(DiskSpace {
            total_bytes: disk.total_space(),
            available_bytes: disk.available_space(),
        })
    }

    fn is_pid_alive(&self, pid: u32) -> bool {
        let mut sys = System::new();
        sys.refresh_process(Pid::from_u32(pid))
    }

    fn is_process_running(&self, name: &str) -> Result<bool> {
        let own = std::process::id();
        let mut sys = System::new();
        sys.refresh_processes();

        let found = sys.processes().iter().any(|(pid, process)| {
            pid.as_u32() != own
                && (process.name() == name
                    || process.cmd().iter().any(|word| {
                        Path::new(word)
                            .file_name()
                            .is_some_and(|f| f == name)
                    }))
        });

        Ok(found)
    }
}
