// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The engine talks to a `ProcessRunner` instead of `tokio::process` directly.
//! This makes it easy to swap in a scripted runner in tests while keeping the
//! production implementation in [`super::process`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::errors::Result;

/// Boxed future returned by the object-safe runner methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Receives every output line of a streaming command as it is produced.
pub type LineSink = mpsc::UnboundedSender<String>;

/// A program plus its argument vector. Never interpreted by a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Build a command that runs `program` through `privilege` (e.g. `sudo`).
    ///
    /// An empty `privilege` runs `program` directly.
    pub fn privileged(privilege: &str, program: impl Into<String>) -> Self {
        let program = program.into();
        if privilege.trim().is_empty() {
            Self::new(program)
        } else {
            Self::new(privilege).arg(program)
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn is_blank(&self) -> bool {
        self.program.trim().is_empty()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Trait abstracting how external commands are executed.
///
/// Production code uses [`super::TokioProcessRunner`]; tests provide their own
/// implementation that doesn't spawn real processes.
pub trait ProcessRunner: Send + Sync {
    /// Run a long command, forwarding each output line (stdout and stderr) to
    /// `lines` while it runs. Resolves once the process has exited and every
    /// line has been forwarded.
    fn run<'a>(&'a self, cmd: &'a CommandSpec, lines: LineSink) -> BoxFuture<'a, Result<()>>;

    /// Run a short query command and return its stdout.
    fn output<'a>(&'a self, cmd: &'a CommandSpec) -> BoxFuture<'a, Result<String>>;

    /// Kill the process currently started by [`ProcessRunner::run`], if any.
    ///
    /// Returns `true` when a running process was signalled.
    fn kill_current(&self) -> bool;
}
