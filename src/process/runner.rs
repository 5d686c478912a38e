//! One-shot command execution with a timeout.

use super::{ProcessError, ProcessResult, ProcessTracker};
use async_trait::async_trait;
use camino::Utf8PathBuf;
use std::fmt;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Grace period for output readers after a process ends.
const READER_GRACE: Duration = Duration::from_millis(200);

/// Message reported for a command killed at its deadline.
pub const TIMED_OUT_MESSAGE: &str = "Command timed out";

/// Program, arguments and optional working directory of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    program: String,
    args: Vec<String>,
    working_directory: Option<Utf8PathBuf>,
}

impl CommandInvocation {
    /// Creates an invocation of `program` with `args`.
    #[must_use]
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_directory: None,
        }
    }

    /// Runs the command inside `directory`.
    #[must_use]
    pub fn in_directory(mut self, directory: impl Into<Utf8PathBuf>) -> Self {
        self.working_directory = Some(directory.into());
        self
    }

    /// Returns the program.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the working directory, if any.
    #[must_use]
    pub const fn working_directory(&self) -> Option<&Utf8PathBuf> {
        self.working_directory.as_ref()
    }

    pub(crate) fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(directory) = &self.working_directory {
            command.current_dir(directory);
        }
        command
    }
}

impl fmt::Display for CommandInvocation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.program)?;
        for arg in &self.args {
            write!(formatter, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the command exited with code 0.
    pub success: bool,
    /// Exit code, when the process exited normally.
    pub exit_code: Option<i32>,
    /// Whether the command was killed at its deadline.
    pub timed_out: bool,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Builds a successful output, mostly for scripted runners.
    #[must_use]
    pub fn succeeded(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            timed_out: false,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Builds a failed output with exit code `code`.
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(code),
            timed_out: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Builds the output of a command killed at its deadline.
    #[must_use]
    pub fn timed_out(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: None,
            timed_out: true,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Returns stdout when it has content, else stderr.
    #[must_use]
    pub fn output(&self) -> &str {
        if self.stdout.trim().is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }

    /// Returns a one-line failure summary suitable for diagnostics.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.timed_out {
            return TIMED_OUT_MESSAGE.to_owned();
        }
        let detail = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        match (self.exit_code, detail.is_empty()) {
            (Some(code), true) => format!("exited with code {code}"),
            (Some(code), false) => format!("exited with code {code}: {detail}"),
            (None, true) => "terminated by signal".to_owned(),
            (None, false) => format!("terminated by signal: {detail}"),
        }
    }
}

/// Port for running one external command to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `invocation`, killing it when `timeout` elapses.
    ///
    /// The child is registered with `tracker` while it runs. A non-zero exit
    /// or a timeout is reported through [`CommandOutput`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Spawn`] naming the program when it cannot be
    /// started.
    async fn run(
        &self,
        invocation: &CommandInvocation,
        timeout: Duration,
        tracker: &ProcessTracker,
    ) -> ProcessResult<CommandOutput>;
}

/// Runs commands as tokio child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    /// Creates a runner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        invocation: &CommandInvocation,
        timeout: Duration,
        tracker: &ProcessTracker,
    ) -> ProcessResult<CommandOutput> {
        let mut child = invocation
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| ProcessError::spawn(invocation.program(), err))?;
        let pid = child.id();
        if let Some(id) = pid {
            tracker.track(id, invocation.to_string());
        }

        let stdout = OutputBuffer::default();
        let stderr = OutputBuffer::default();
        let readers = [
            child.stdout.take().map(|pipe| stdout.capture(pipe)),
            child.stderr.take().map(|pipe| stderr.capture(pipe)),
        ];

        let waited = tokio::select! {
            waited = child.wait() => waited.map(Some),
            () = tokio::time::sleep(timeout) => {
                warn!(command = %invocation, ?timeout, "command timed out; killing it");
                if let Err(err) = child.kill().await {
                    warn!(command = %invocation, error = %err, "failed to kill timed-out command");
                }
                Ok(None)
            }
        };
        if let Some(id) = pid {
            tracker.release(id);
        }
        let status = waited.map_err(|err| ProcessError::supervise(invocation.program(), err))?;

        for reader in readers.into_iter().flatten() {
            finish_reader(reader).await;
        }

        let output = match status {
            Some(exit) => CommandOutput {
                success: exit.success(),
                exit_code: exit.code(),
                timed_out: false,
                stdout: stdout.contents(),
                stderr: stderr.contents(),
            },
            None => CommandOutput::timed_out(stdout.contents(), stderr.contents()),
        };
        debug!(
            command = %invocation,
            success = output.success,
            exit_code = ?output.exit_code,
            "command finished"
        );
        Ok(output)
    }
}

/// Output collected incrementally while a child runs.
#[derive(Debug, Clone, Default)]
pub(crate) struct OutputBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

/// Marker a reader looks for while capturing.
#[derive(Debug, Clone)]
pub(crate) struct MarkerWatch {
    pub(crate) marker: String,
    pub(crate) found: watch::Sender<bool>,
}

impl OutputBuffer {
    /// Streams `pipe` into the buffer on a background task.
    pub(crate) fn capture<P>(&self, pipe: P) -> JoinHandle<()>
    where
        P: AsyncRead + Unpin + Send + 'static,
    {
        self.capture_watching(pipe, None)
    }

    /// Streams `pipe` into the buffer, flagging `marker_watch` once its marker has
    /// appeared in the captured text.
    pub(crate) fn capture_watching<P>(
        &self,
        mut pipe: P,
        marker_watch: Option<MarkerWatch>,
    ) -> JoinHandle<()>
    where
        P: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = self.clone();
        let mut pending_watch = marker_watch;
        tokio::spawn(async move {
            let mut chunk = [0_u8; 4096];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(read) => {
                        buffer.append(chunk.get(..read).unwrap_or_default());
                        let seen = pending_watch
                            .as_ref()
                            .is_some_and(|marker| buffer.contents().contains(&marker.marker));
                        if seen && let Some(marker) = pending_watch.take() {
                            marker.found.send_replace(true);
                        }
                    }
                }
            }
        })
    }

    fn append(&self, received: &[u8]) {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(received);
    }

    /// Returns the collected bytes as lossy UTF-8.
    pub(crate) fn contents(&self) -> String {
        let bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Waits briefly for a reader to reach end of stream, then abandons it.
///
/// Grandchildren that inherited the pipe can keep it open after the direct
/// child is gone.
pub(crate) async fn finish_reader(mut reader: JoinHandle<()>) {
    if tokio::time::timeout(READER_GRACE, &mut reader).await.is_err() {
        reader.abort();
    }
}
