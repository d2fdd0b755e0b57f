// src/engine/precheck.rs

//! Checks that must pass before any transfer starts.

use std::path::Path;

use tracing::debug;

use crate::config::{BackupConfig, RawConfigFile, validate_config};
use crate::errors::{BackupError, Result};
use crate::exec::SystemProbe;
use crate::types::CapacityMetric;

/// Host gate, mount sanity and capacity. Returns the local hostname.
pub fn perform_checks(cfg: &BackupConfig, probe: &dyn SystemProbe) -> Result<String> {
    let hostname = probe.hostname()?;
    if !hostname.contains(&cfg.hostname_pattern) {
        return Err(BackupError::Precheck(format!(
            "This script can only be run on a host with '{}' in its name.",
            cfg.hostname_pattern
        )));
    }

    let mount = cfg.backup_mount.trim();
    if mount.is_empty() || mount == "/" {
        return Err(BackupError::Precheck("Invalid backup_mount path.".to_string()));
    }

    let insufficient = || {
        BackupError::Precheck(format!(
            "{} capacity is less than {}TB or not mounted.",
            cfg.backup_mount, cfg.min_storage_size_tb
        ))
    };

    let space = probe.disk_space(Path::new(mount)).map_err(|e| {
        debug!(mount, error = %e, "disk space probe failed");
        insufficient()
    })?;

    let measured = match cfg.capacity_metric {
        CapacityMetric::Available => space.available_bytes,
        CapacityMetric::Total => space.total_bytes,
    };
    let required = cfg.min_storage_bytes();
    debug!(mount, measured, required, metric = ?cfg.capacity_metric, "capacity check");

    if measured < required {
        return Err(insufficient());
    }

    Ok(hostname)
}

/// Validate the raw config, then run [`perform_checks`].
pub fn run_prechecks(
    raw: &RawConfigFile,
    probe: &dyn SystemProbe,
) -> Result<(BackupConfig, String)> {
    let cfg = validate_config(raw)?;
    let hostname = perform_checks(&cfg, probe)?;
    Ok((cfg, hostname))
}
