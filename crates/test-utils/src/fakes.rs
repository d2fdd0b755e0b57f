#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

use baksnap_runner::errors::{BackupError, Result};
use baksnap_runner::exec::{BoxFuture, CommandSpec, DiskSpace, LineSink, ProcessRunner, SystemProbe};

/// One tebibyte, the unit behind `min_storage_size_tb`.
pub const TB: u64 = 1024 * 1024 * 1024 * 1024;

/// What the next streaming (`run`) call does.
#[derive(Debug, Clone)]
pub enum TransferScript {
    /// Emit the lines, then exit 0.
    Succeed(Vec<String>),
    /// Emit the lines, then exit with the code.
    Fail(i32, Vec<String>),
    /// Emit the lines, then block until `kill_current` is called.
    BlockUntilKilled(Vec<String>),
}

impl TransferScript {
    pub fn succeed<S: Into<String>>(lines: impl IntoIterator<Item = S>) -> Self {
        Self::Succeed(lines.into_iter().map(Into::into).collect())
    }

    pub fn fail(code: i32) -> Self {
        Self::Fail(code, Vec::new())
    }
}

enum Canned {
    Stdout(String),
    /// Answers handed out one per call; the last one repeats.
    Sequence(VecDeque<String>),
    Exit(i32),
}

/// A scripted [`ProcessRunner`] that:
/// - answers `output` calls from canned responses matched by substring
///   against the rendered command (first match wins, default: empty stdout)
/// - plays `run` calls from a queue of [`TransferScript`]s (default: success)
/// - records every command it was asked to run
pub struct FakeRunner {
    outputs: Mutex<Vec<(String, Canned)>>,
    transfers: Mutex<VecDeque<TransferScript>>,
    calls: Mutex<Vec<CommandSpec>>,
    run_calls: Mutex<Vec<CommandSpec>>,
    blocked: AtomicBool,
    killed: Notify,
    started: Notify,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            outputs: Mutex::new(Vec::new()),
            transfers: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            run_calls: Mutex::new(Vec::new()),
            blocked: AtomicBool::new(false),
            killed: Notify::new(),
            started: Notify::new(),
        }
    }

    /// Answer `output` calls whose command line contains `pattern`.
    pub fn with_output(self, pattern: &str, stdout: &str) -> Self {
        self.outputs
            .lock()
            .unwrap()
            .push((pattern.to_string(), Canned::Stdout(stdout.to_string())));
        self
    }

    /// Answer successive `output` calls matching `pattern` with successive
    /// entries of `answers`; the last answer repeats once the rest are used.
    pub fn with_output_sequence<S: Into<String>>(
        self,
        pattern: &str,
        answers: impl IntoIterator<Item = S>,
    ) -> Self {
        let answers: VecDeque<String> = answers.into_iter().map(Into::into).collect();
        self.outputs
            .lock()
            .unwrap()
            .push((pattern.to_string(), Canned::Sequence(answers)));
        self
    }

    /// Fail `output` calls whose command line contains `pattern`.
    pub fn with_failing_output(self, pattern: &str, code: i32) -> Self {
        self.outputs
            .lock()
            .unwrap()
            .push((pattern.to_string(), Canned::Exit(code)));
        self
    }

    /// Queue the behaviour of the next `run` call.
    pub fn with_transfer(self, script: TransferScript) -> Self {
        self.transfers.lock().unwrap().push_back(script);
        self
    }

    /// Every command seen, `output` and `run` alike, in call order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Commands passed to `run` (the transfers).
    pub fn run_calls(&self) -> Vec<CommandSpec> {
        self.run_calls.lock().unwrap().clone()
    }

    /// Rendered command lines of every call.
    pub fn call_lines(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }

    /// Resolves once a `run` call is blocked in [`TransferScript::BlockUntilKilled`].
    pub async fn wait_for_blocked_transfer(&self) {
        self.started.notified().await;
    }

    fn exit_error(cmd: &CommandSpec, code: Option<i32>) -> BackupError {
        BackupError::Exit {
            command: cmd.program.clone(),
            args: cmd.args.clone(),
            code,
        }
    }
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner for FakeRunner {
    fn run<'a>(&'a self, cmd: &'a CommandSpec, lines: LineSink) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(cmd.clone());
            self.run_calls.lock().unwrap().push(cmd.clone());

            let script = self
                .transfers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| TransferScript::Succeed(Vec::new()));

            match script {
                TransferScript::Succeed(out) => {
                    for line in out {
                        let _ = lines.send(line);
                    }
                    Ok(())
                }
                TransferScript::Fail(code, out) => {
                    for line in out {
                        let _ = lines.send(line);
                    }
                    Err(Self::exit_error(cmd, Some(code)))
                }
                TransferScript::BlockUntilKilled(out) => {
                    for line in out {
                        let _ = lines.send(line);
                    }
                    self.blocked.store(true, Ordering::SeqCst);
                    self.started.notify_one();
                    self.killed.notified().await;
                    self.blocked.store(false, Ordering::SeqCst);
                    Err(Self::exit_error(cmd, None))
                }
            }
        })
    }

    fn output<'a>(&'a self, cmd: &'a CommandSpec) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(cmd.clone());
            let rendered = cmd.to_string();

            let mut outputs = self.outputs.lock().unwrap();
            match outputs
                .iter_mut()
                .find(|(pattern, _)| rendered.contains(pattern.as_str()))
            {
                Some((_, Canned::Stdout(stdout))) => Ok(stdout.clone()),
                Some((_, Canned::Sequence(answers))) => {
                    let answer = if answers.len() > 1 {
                        answers.pop_front().unwrap_or_default()
                    } else {
                        answers.front().cloned().unwrap_or_default()
                    };
                    Ok(answer)
                }
                Some((_, Canned::Exit(code))) => Err(Self::exit_error(cmd, Some(*code))),
                None => Ok(String::new()),
            }
        })
    }

    fn kill_current(&self) -> bool {
        if self.blocked.load(Ordering::SeqCst) {
            self.killed.notify_one();
            true
        } else {
            false
        }
    }
}

/// A scripted [`SystemProbe`].
///
/// `is_process_running` pops answers from a queue and falls back to a fixed
/// default once it is drained.
pub struct FakeProbe {
    hostname: Option<String>,
    disk: Option<DiskSpace>,
    alive: Mutex<HashSet<u32>>,
    running: Mutex<VecDeque<bool>>,
    running_default: AtomicBool,
    disk_queries: Mutex<Vec<String>>,
}

impl FakeProbe {
    /// Host `nas-01` with a 4 TB disk, 2 TB of it free.
    pub fn new() -> Self {
        Self {
            hostname: Some("nas-01".to_string()),
            disk: Some(DiskSpace {
                total_bytes: 4 * TB,
                available_bytes: 2 * TB,
            }),
            alive: Mutex::new(HashSet::new()),
            running: Mutex::new(VecDeque::new()),
            running_default: AtomicBool::new(false),
            disk_queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.hostname = Some(hostname.to_string());
        self
    }

    pub fn without_hostname(mut self) -> Self {
        self.hostname = None;
        self
    }

    pub fn with_disk(mut self, total_bytes: u64, available_bytes: u64) -> Self {
        self.disk = Some(DiskSpace {
            total_bytes,
            available_bytes,
        });
        self
    }

    /// Pretend nothing is mounted at the queried path.
    pub fn without_disk(mut self) -> Self {
        self.disk = None;
        self
    }

    pub fn with_alive_pid(self, pid: u32) -> Self {
        self.alive.lock().unwrap().insert(pid);
        self
    }

    /// Queue answers for `is_process_running`.
    pub fn with_running(self, answers: impl IntoIterator<Item = bool>) -> Self {
        self.running.lock().unwrap().extend(answers);
        self
    }

    pub fn with_running_default(self, running: bool) -> Self {
        self.running_default.store(running, Ordering::SeqCst);
        self
    }

    /// Paths passed to `disk_space`.
    pub fn disk_queries(&self) -> Vec<String> {
        self.disk_queries.lock().unwrap().clone()
    }
}

impl Default for FakeProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProbe for FakeProbe {
    fn hostname(&self) -> Result<String> {
        self.hostname
            .clone()
            .ok_or_else(|| BackupError::Precheck("Could not determine the local hostname.".into()))
    }

    fn disk_space(&self, path: &Path) -> Result<DiskSpace> {
        self.disk_queries
            .lock()
            .unwrap()
            .push(path.display().to_string());
        self.disk.ok_or_else(|| {
            BackupError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not mounted", path.display()),
            ))
        })
    }

    fn is_pid_alive(&self, pid: u32) -> bool {
        self.alive.lock().unwrap().contains(&pid)
    }

    fn is_process_running(&self, _name: &str) -> Result<bool> {
        let next = self.running.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.running_default.load(Ordering::SeqCst)))
    }
}
