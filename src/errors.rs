// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Precheck(String),

    #[error("No valid backup tasks found after processing configuration.")]
    NoValidTasks,

    #[error("Attempted to run an empty command.")]
    EmptyCommand,

    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command {command} {} exited with {}", .args.join(" "), exit_label(.code))]
    Exit {
        command: String,
        args: Vec<String>,
        code: Option<i32>,
    },

    #[error("{0}")]
    Inventory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
