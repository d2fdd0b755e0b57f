// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the external tools, using
//! `tokio::process::Command` with argument vectors (never a shell), and for
//! querying the system.
//!
//! - [`backend`] provides the `ProcessRunner` trait and `CommandSpec`.
//! - [`process`] contains `TokioProcessRunner`, the production runner that
//!   streams output lines and can kill the current transfer.
//! - [`probe`] provides the `SystemProbe` trait and its `sysinfo` backed
//!   implementation.

pub mod backend;
pub mod probe;
pub mod process;

pub use backend::{BoxFuture, CommandSpec, LineSink, ProcessRunner};
pub use probe::{DiskSpace, SysinfoProbe, SystemProbe};
pub use process::TokioProcessRunner;
