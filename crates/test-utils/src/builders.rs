#![allow(dead_code)]

use std::path::PathBuf;

use baksnap_runner::config::{RawConfigFile, RawTaskConfig, RetrySection, ToolsSection};
use baksnap_runner::types::{CapacityMetric, TaskMode};

/// Builder for `RawConfigFile` to simplify test setup.
///
/// Defaults describe a host `nas-01` backing up to `/mnt/backup` with a
/// 1 TB minimum, plain tool names (no `sudo`), and a short retry backoff.
pub struct ConfigBuilder {
    config: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                hostname_pattern: Some("nas".to_string()),
                backup_mount: Some("/mnt/backup".to_string()),
                min_storage_size_tb: Some(toml::Value::Integer(1)),
                capacity_metric: CapacityMetric::Available,
                tasks: Some(Vec::new()),
                cleanup_paths: None,
                lock_file: None,
                shutdown_after_backup: false,
                tools: ToolsSection {
                    privilege: String::new(),
                    ..ToolsSection::default()
                },
                retry: RetrySection {
                    max_attempts: 5,
                    backoff_ms: 10,
                },
            },
        }
    }

    pub fn with_task(mut self, task: TaskBuilder) -> Self {
        self.config
            .tasks
            .get_or_insert_with(Vec::new)
            .push(task.build());
        self
    }

    pub fn with_hostname_pattern(mut self, pattern: &str) -> Self {
        self.config.hostname_pattern = Some(pattern.to_string());
        self
    }

    pub fn with_backup_mount(mut self, mount: &str) -> Self {
        self.config.backup_mount = Some(mount.to_string());
        self
    }

    pub fn with_min_storage_tb(mut self, tb: f64) -> Self {
        self.config.min_storage_size_tb = Some(toml::Value::Float(tb));
        self
    }

    pub fn with_capacity_metric(mut self, metric: CapacityMetric) -> Self {
        self.config.capacity_metric = metric;
        self
    }

    pub fn with_lock_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.lock_file = Some(path.into());
        self
    }

    pub fn with_cleanup_path(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into().display().to_string();
        let mut paths = match self.config.cleanup_paths.take() {
            Some(toml::Value::Array(items)) => items,
            _ => Vec::new(),
        };
        paths.push(toml::Value::String(path));
        self.config.cleanup_paths = Some(toml::Value::Array(paths));
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, backoff_ms: u64) -> Self {
        self.config.retry = RetrySection {
            max_attempts,
            backoff_ms,
        };
        self
    }

    pub fn with_privilege(mut self, program: &str) -> Self {
        self.config.tools.privilege = program.to_string();
        self
    }

    pub fn with_shutdown_after(mut self, enabled: bool) -> Self {
        self.config.shutdown_after_backup = enabled;
        self
    }

    pub fn build(self) -> RawConfigFile {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `RawTaskConfig`.
pub struct TaskBuilder {
    task: RawTaskConfig,
}

impl TaskBuilder {
    pub fn new(name: &str, config: &str) -> Self {
        Self {
            task: RawTaskConfig {
                name: Some(name.to_string()),
                config: Some(config.to_string()),
                ..RawTaskConfig::default()
            },
        }
    }

    pub fn dest(mut self, dest: &str) -> Self {
        self.task.dest = Some(dest.to_string());
        self
    }

    pub fn dest_pattern(mut self, pattern: &str) -> Self {
        self.task.dest_pattern = Some(pattern.to_string());
        self
    }

    pub fn mode(mut self, mode: TaskMode) -> Self {
        self.task.mode = Some(mode);
        self
    }

    pub fn all(mut self) -> Self {
        self.task.all = true;
        self
    }

    pub fn link(mut self) -> Self {
        self.task.link = true;
        self
    }

    pub fn prune(mut self) -> Self {
        self.task.prune = true;
        self
    }

    pub fn build(self) -> RawTaskConfig {
        self.task
    }
}
