use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{CapacityMetric, TaskMode};

/// Default location of the single-instance lock file.
pub const DEFAULT_LOCK_FILE: &str = "/tmp/baksnapper.lock";

/// Top-level configuration exactly as read from the TOML file.
///
/// ```toml
/// hostname_pattern = "nas"
/// backup_mount = "/mnt/backup"
/// min_storage_size_tb = 2
/// cleanup_paths = ["/mnt/backup/laptop"]
///
/// [[task]]
/// name = "laptop-home"
/// config = "home"
/// dest_pattern = "/mnt/backup/{hostname}"
/// ```
///
/// Required fields are `Option`s here so that a missing field surfaces as a
/// descriptive validation error at run time instead of a parse failure. Use
/// [`crate::config::validate_config`] to obtain a [`BackupConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Substring the local hostname must contain.
    #[serde(default)]
    pub hostname_pattern: Option<String>,

    /// Mount point of the backup disk; its size is checked before a run.
    #[serde(default)]
    pub backup_mount: Option<String>,

    /// Minimum size of the backup mount in TB (integer or float).
    #[serde(default)]
    pub min_storage_size_tb: Option<toml::Value>,

    /// Whether free or total space is compared against the minimum.
    #[serde(default)]
    pub capacity_metric: CapacityMetric,

    /// `[[task]]` entries, in run order.
    #[serde(default, rename = "task")]
    pub tasks: Option<Vec<RawTaskConfig>>,

    /// Directories swept for stale snapshot metadata after the run.
    #[serde(default)]
    pub cleanup_paths: Option<toml::Value>,

    #[serde(default)]
    pub lock_file: Option<PathBuf>,

    #[serde(default)]
    pub shutdown_after_backup: bool,

    #[serde(default)]
    pub tools: ToolsSection,

    #[serde(default)]
    pub retry: RetrySection,
}

impl RawConfigFile {
    /// True when the file carried nothing at all (e.g. an empty document).
    pub fn is_empty(&self) -> bool {
        self.hostname_pattern.is_none()
            && self.backup_mount.is_none()
            && self.min_storage_size_tb.is_none()
            && self.tasks.is_none()
            && self.cleanup_paths.is_none()
    }

    /// Lock file location, usable before validation.
    pub fn lock_path(&self) -> PathBuf {
        self.lock_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCK_FILE))
    }
}

/// One `[[task]]` entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTaskConfig {
    #[serde(default)]
    pub name: Option<String>,

    /// Snapper config name (e.g. `"home"`, `"root"`).
    #[serde(default)]
    pub config: Option<String>,

    /// `"push"` or `"pull"`; forwarded as `--type` when set.
    #[serde(default, rename = "type")]
    pub mode: Option<TaskMode>,

    /// Literal destination; wins over `dest_pattern`.
    #[serde(default)]
    pub dest: Option<String>,

    /// Destination template; `{hostname}` is replaced by the local hostname.
    #[serde(default)]
    pub dest_pattern: Option<String>,

    /// Transfer every pending snapshot instead of only the newest.
    #[serde(default)]
    pub all: bool,

    #[serde(default)]
    pub link: bool,

    #[serde(default)]
    pub prune: bool,
}

/// `[tools]` section: external programs and how they are invoked.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// Program used to elevate privileges; empty disables the prefix.
    pub privilege: String,
    /// Snapshot-transfer tool.
    pub transfer: String,
    /// Local snapshot-listing helper.
    pub listing: String,
    pub ssh: String,
    pub connect_timeout_secs: u64,
    pub pkill: String,
    /// Full argv of the power-off command.
    pub shutdown: Vec<String>,
    /// Output lines containing any of these substrings are dropped.
    pub noise_markers: Vec<String>,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            privilege: "sudo".to_string(),
            transfer: "baksnapper".to_string(),
            listing: "baksnapperd".to_string(),
            ssh: "ssh".to_string(),
            connect_timeout_secs: 5,
            pkill: "pkill".to_string(),
            shutdown: vec!["shutdown".to_string(), "now".to_string()],
            noise_markers: vec!["dbus-launch".to_string()],
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_ms: 2000,
        }
    }
}

impl RetrySection {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Validated configuration consumed by the engine.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub hostname_pattern: String,
    pub backup_mount: String,
    pub min_storage_size_tb: f64,
    pub capacity_metric: CapacityMetric,
    pub tasks: Vec<TaskConfig>,
    pub cleanup_paths: Vec<PathBuf>,
    pub lock_file: PathBuf,
    pub shutdown_after_backup: bool,
    pub tools: ToolsSection,
    pub retry: RetrySection,
}

impl BackupConfig {
    /// Minimum capacity in bytes (1 TB = 1024^4 bytes).
    pub fn min_storage_bytes(&self) -> u64 {
        (self.min_storage_size_tb * 1024f64.powi(4)) as u64
    }
}

/// Validated `[[task]]` entry; the destination is still unresolved.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskConfig {
    pub name: String,
    pub config: String,
    pub mode: Option<TaskMode>,
    pub dest: Option<String>,
    pub dest_pattern: Option<String>,
    pub all: bool,
    pub link: bool,
    pub prune: bool,
}
