// src/config/validate.rs

use std::collections::HashSet;
use std::path::PathBuf;

use crate::config::model::{BackupConfig, RawConfigFile, RawTaskConfig, TaskConfig};
use crate::errors::{BackupError, Result};

impl TryFrom<&RawConfigFile> for BackupConfig {
    type Error = BackupError;

    fn try_from(raw: &RawConfigFile) -> std::result::Result<Self, Self::Error> {
        if raw.is_empty() {
            return Err(config_error("Configuration is missing."));
        }

        let hostname_pattern = required_string(&raw.hostname_pattern, "hostname_pattern")?;
        let backup_mount = required_string(&raw.backup_mount, "backup_mount")?;
        let min_storage_size_tb = storage_threshold(raw)?;
        let tasks = validate_tasks(raw.tasks.as_deref())?;
        let cleanup_paths = cleanup_paths(raw)?;
        validate_retry(raw)?;

        Ok(BackupConfig {
            hostname_pattern,
            backup_mount,
            min_storage_size_tb,
            capacity_metric: raw.capacity_metric,
            tasks,
            cleanup_paths,
            lock_file: raw.lock_path(),
            shutdown_after_backup: raw.shutdown_after_backup,
            tools: raw.tools.clone(),
            retry: raw.retry,
        })
    }
}

/// Check the shape of a raw config and produce the validated form.
///
/// Every failure is descriptive and names the offending field or task.
pub fn validate_config(raw: &RawConfigFile) -> Result<BackupConfig> {
    BackupConfig::try_from(raw)
}

fn config_error(msg: impl Into<String>) -> BackupError {
    BackupError::Config(msg.into())
}

fn required_string(value: &Option<String>, field: &str) -> Result<String> {
    match value {
        Some(s) if !s.trim().is_empty() => Ok(s.clone()),
        _ => Err(config_error(format!("config.{field} is required."))),
    }
}

fn storage_threshold(raw: &RawConfigFile) -> Result<f64> {
    let tb = match &raw.min_storage_size_tb {
        Some(toml::Value::Integer(i)) => *i as f64,
        Some(toml::Value::Float(f)) => *f,
        _ => {
            return Err(config_error(
                "config.min_storage_size_tb must be a number.",
            ));
        }
    };

    if !tb.is_finite() || tb < 0.0 {
        return Err(config_error(format!(
            "config.min_storage_size_tb must be a non-negative number (got {tb})."
        )));
    }

    Ok(tb)
}

fn validate_tasks(tasks: Option<&[RawTaskConfig]>) -> Result<Vec<TaskConfig>> {
    let tasks = match tasks {
        Some(tasks) if !tasks.is_empty() => tasks,
        Some(_) => {
            return Err(config_error(
                "config.task must contain at least one [[task]] entry.",
            ));
        }
        None => return Err(config_error("config.task must be an array.")),
    };

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(tasks.len());

    for (i, task) in tasks.iter().enumerate() {
        let name = match non_blank(&task.name) {
            Some(name) => name,
            None => {
                return Err(config_error(format!(
                    "Task at index {i} is missing a name."
                )));
            }
        };

        let config = non_blank(&task.config).ok_or_else(|| {
            config_error(format!("Task '{name}' is missing a config."))
        })?;

        let dest = non_blank(&task.dest);
        let dest_pattern = non_blank(&task.dest_pattern);
        if dest.is_none() && dest_pattern.is_none() {
            return Err(config_error(format!(
                "Task '{name}' is missing a destination."
            )));
        }

        if !seen.insert(name.clone()) {
            return Err(config_error(format!(
                "Task name '{name}' is used more than once."
            )));
        }

        out.push(TaskConfig {
            name,
            config,
            mode: task.mode,
            dest,
            dest_pattern,
            all: task.all,
            link: task.link,
            prune: task.prune,
        });
    }

    Ok(out)
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .filter(|s| !s.trim().is_empty())
        .cloned()
}

fn cleanup_paths(raw: &RawConfigFile) -> Result<Vec<PathBuf>> {
    let items = match &raw.cleanup_paths {
        None => return Ok(Vec::new()),
        Some(toml::Value::Array(items)) => items,
        Some(_) => return Err(config_error("config.cleanup_paths must be an array.")),
    };

    items
        .iter()
        .map(|item| match item {
            toml::Value::String(s) => Ok(PathBuf::from(s)),
            other => Err(config_error(format!(
                "config.cleanup_paths entries must be strings (got {other})."
            ))),
        })
        .collect()
}

fn validate_retry(raw: &RawConfigFile) -> Result<()> {
    if raw.retry.max_attempts == 0 {
        return Err(config_error(
            "[retry].max_attempts must be >= 1 (got 0)",
        ));
    }
    Ok(())
}
