//! Subprocess execution for external collaborators.
//!
//! Every child runs with stdin attached to the null device so that tools
//! cannot block on interactive prompts, and is killed if shutdown is
//! requested while it is running.

use std::ffi::OsStr;
use std::io::Read as _;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};

use crate::shutdown::Shutdown;

/// How often a running child is polled for exit and shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of a command execution.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Exit code, if the process was not terminated by a signal.
    pub code: Option<i32>,
}

/// Abstraction over subprocess execution, injectable for tests.
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Run `program` and fail if it exits non-zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be started, is interrupted by
    /// shutdown, or exits with a non-zero status (the message includes stderr).
    fn run(&self, program: &str, args: &[&OsStr]) -> Result<ExecResult> {
        let result = self.run_unchecked(program, args)?;
        if !result.success {
            bail!(
                "{program} failed (exit {}): {}",
                result.code.unwrap_or(-1),
                result.stderr.trim()
            );
        }
        Ok(result)
    }

    /// Run `program` and return its result regardless of exit status.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be started or is interrupted
    /// by shutdown.
    fn run_unchecked(&self, program: &str, args: &[&OsStr]) -> Result<ExecResult>;

    /// Whether `program` is available on `PATH`.
    fn which(&self, program: &str) -> bool;
}

/// Production [`Executor`] backed by [`std::process::Command`].
#[derive(Debug, Clone, Default)]
pub struct SystemExecutor {
    shutdown: Shutdown,
}

impl SystemExecutor {
    /// Create an executor that kills children when `shutdown` is requested.
    #[must_use]
    pub const fn new(shutdown: Shutdown) -> Self {
        Self { shutdown }
    }

    /// Poll `child` until it exits, killing it if shutdown is requested.
    fn wait(&self, program: &str, mut child: Child) -> Result<ExecResult> {
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let status = loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("failed to wait for {program}"))?
            {
                break status;
            }
            if self.shutdown.is_requested() {
                child.kill().ok();
                child.wait().ok();
                bail!("{program} was killed: shutdown requested");
            }
            thread::sleep(POLL_INTERVAL);
        };
        Ok(ExecResult {
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
            success: status.success(),
            code: status.code(),
        })
    }
}

/// Read a pipe to the end on a helper thread so the child never blocks on
/// a full pipe buffer.
fn drain<R: std::io::Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf).ok();
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

impl Executor for SystemExecutor {
    fn run_unchecked(&self, program: &str, args: &[&OsStr]) -> Result<ExecResult> {
        if self.shutdown.is_requested() {
            bail!("not starting {program}: shutdown requested");
        }
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to execute: {program}"))?;
        self.wait(program, child)
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Test doubles for [`Executor`].
#[cfg(test)]
pub mod test_helpers {
    use super::{ExecResult, Executor};
    use std::collections::VecDeque;
    use std::ffi::OsStr;
    use std::sync::Mutex;

    /// Mock executor that records invocations and replays queued responses.
    ///
    /// Each response is `(success, stderr)`. An empty queue yields a failed
    /// result. An optional hook runs on every call, e.g. to create the output
    /// file a real tool would have written.
    #[derive(Default)]
    pub struct MockExecutor {
        responses: Mutex<VecDeque<(bool, String)>>,
        calls: Mutex<Vec<(String, Vec<String>)>>,
        which_result: bool,
        #[allow(clippy::type_complexity)]
        on_call: Option<Box<dyn Fn(&[String]) + Send + Sync>>,
    }

    impl std::fmt::Debug for MockExecutor {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MockExecutor")
                .field("which_result", &self.which_result)
                .finish_non_exhaustive()
        }
    }

    impl MockExecutor {
        /// Create a mock from an ordered list of `(success, stderr)` pairs.
        #[must_use]
        pub fn with_responses(responses: Vec<(bool, &str)>) -> Self {
            Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .map(|(ok, err)| (ok, err.to_string()))
                        .collect(),
                ),
                which_result: true,
                ..Self::default()
            }
        }

        /// Set the value returned by every [`Executor::which`] call.
        #[must_use]
        pub const fn with_which(mut self, result: bool) -> Self {
            self.which_result = result;
            self
        }

        /// Run `hook` with the argument list on every call.
        #[must_use]
        pub fn on_call(mut self, hook: impl Fn(&[String]) + Send + Sync + 'static) -> Self {
            self.on_call = Some(Box::new(hook));
            self
        }

        /// Return every `(program, args)` pair seen so far.
        #[must_use]
        pub fn calls(&self) -> Vec<(String, Vec<String>)> {
            self.calls
                .lock()
                .map_or_else(|_| vec![], |guard| guard.clone())
        }
    }

    impl Executor for MockExecutor {
        fn run_unchecked(&self, program: &str, args: &[&OsStr]) -> anyhow::Result<ExecResult> {
            let args: Vec<String> = args
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect();
            if let Some(hook) = &self.on_call {
                hook(&args);
            }
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((program.to_string(), args));
            }
            let (success, stderr) = self
                .responses
                .lock()
                .ok()
                .and_then(|mut q| q.pop_front())
                .unwrap_or((false, "unexpected call".to_string()));
            Ok(ExecResult {
                stdout: String::new(),
                stderr,
                success,
                code: Some(i32::from(!success)),
            })
        }

        fn which(&self, _: &str) -> bool {
            self.which_result
        }
    }
}
