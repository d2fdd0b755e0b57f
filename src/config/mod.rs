// src/config/mod.rs

//! Configuration loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate the shape of the config before a run (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    BackupConfig, DEFAULT_LOCK_FILE, RawConfigFile, RawTaskConfig, RetrySection, TaskConfig,
    ToolsSection,
};
pub use validate::validate_config;
