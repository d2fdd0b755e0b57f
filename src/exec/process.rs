// src/exec/process.rs

//! `tokio::process` implementation of [`ProcessRunner`].

use std::process::Stdio;
use std::sync::Mutex;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::errors::{BackupError, Result};
use crate::exec::backend::{BoxFuture, CommandSpec, LineSink, ProcessRunner};

/// Real process runner used in production.
///
/// At most one streaming process is tracked at a time (the engine runs
/// transfers sequentially); [`ProcessRunner::kill_current`] signals it through
/// a oneshot channel, the same way a rerun cancels a task instance.
#[derive(Debug, Default)]
pub struct TokioProcessRunner {
    noise_markers: Vec<String>,
    current: Mutex<Option<oneshot::Sender<()>>>,
}

impl TokioProcessRunner {
    /// Lines containing any of `noise_markers` are dropped from streamed output.
    pub fn new(noise_markers: Vec<String>) -> Self {
        Self {
            noise_markers,
            current: Mutex::new(None),
        }
    }

    fn set_current(&self, cancel: Option<oneshot::Sender<()>>) {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *guard = cancel;
    }

    async fn run_inner(&self, cmd: &CommandSpec, lines: LineSink) -> Result<()> {
        if cmd.is_blank() {
            return Err(BackupError::EmptyCommand);
        }

        info!(cmd = %cmd, "starting process");

        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BackupError::Spawn {
                program: cmd.program.clone(),
                source,
            })?;

        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        self.set_current(Some(cancel_tx));

        let stdout_pump = child
            .stdout
            .take()
            .map(|out| tokio::spawn(pump_lines(out, lines.clone(), self.noise_markers.clone())));
        let stderr_pump = child
            .stderr
            .take()
            .map(|err| tokio::spawn(pump_lines(err, lines.clone(), self.noise_markers.clone())));
        drop(lines);

        // Either the process exits on its own, or someone asks us to kill it.
        let waited = tokio::select! {
            status = child.wait() => status,
            Ok(()) = &mut cancel_rx => {
                info!(cmd = %cmd, "kill requested; terminating process");
                if let Err(e) = child.kill().await {
                    warn!(cmd = %cmd, error = %e, "failed to kill process");
                }
                child.wait().await
            }
        };

        self.set_current(None);

        // Deliver every remaining line before reporting the exit status.
        for pump in [stdout_pump, stderr_pump].into_iter().flatten() {
            if let Err(e) = pump.await {
                debug!(cmd = %cmd, error = %e, "output pump ended abnormally");
            }
        }

        let status = waited?;
        info!(cmd = %cmd, exit_code = ?status.code(), success = status.success(), "process exited");

        if status.success() {
            Ok(())
        } else {
            Err(BackupError::Exit {
                command: cmd.program.clone(),
                args: cmd.args.clone(),
                code: status.code(),
            })
        }
    }

    async fn output_inner(&self, cmd: &CommandSpec) -> Result<String> {
        if cmd.is_blank() {
            return Err(BackupError::EmptyCommand);
        }

        debug!(cmd = %cmd, "running query command");

        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| BackupError::Spawn {
                program: cmd.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(cmd = %cmd, stderr = %stderr.trim(), "query command failed");
            return Err(BackupError::Exit {
                command: cmd.program.clone(),
                args: cmd.args.clone(),
                code: output.status.code(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ProcessRunner for TokioProcessRunner {
    fn run<'a>(&'a self, cmd: &'a CommandSpec, lines: LineSink) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.run_inner(cmd, lines))
    }

    fn output<'a>(&'a self, cmd: &'a CommandSpec) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.output_inner(cmd))
    }

    fn kill_current(&self) -> bool {
        let cancel = {
            let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
            guard.take()
        };
        match cancel {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

/// Forward non-empty, non-noise lines from a pipe to the sink.
async fn pump_lines<R>(pipe: R, sink: LineSink, noise_markers: Vec<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "output pipe read failed");
                break;
            }
        }

        // Transfer tools may print non-UTF-8 bytes; decode lossily and keep going.
        let decoded = String::from_utf8_lossy(&buf);
        let line = decoded.trim_end();
        if line.trim().is_empty() || is_noise(line, &noise_markers) {
            continue;
        }
        // Keep draining even if nobody listens any more so the child never blocks.
        let _ = sink.send(line.to_string());
    }
}

/// Returns `true` when the line contains one of the noise markers.
pub fn is_noise(line: &str, noise_markers: &[String]) -> bool {
    noise_markers
        .iter()
        .any(|marker| !marker.is_empty() && line.contains(marker.as_str()))
}
