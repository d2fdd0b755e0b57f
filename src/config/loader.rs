// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{BackupConfig, RawConfigFile};
use crate::config::validate::validate_config;
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. The controller validates at the start of every run so that a
/// broken config is reported through the run log. Use [`load_and_validate`]
/// when a checked config is needed up front (e.g. `--dry-run`).
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<BackupConfig> {
    let raw_config = load_from_path(&path)?;
    validate_config(&raw_config)
}

/// Default config path: `baksnap.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("baksnap.toml")
}
