//! Readiness probing of long-running server processes.
//!
//! Readiness is inferred, not proven: a marker line, an early clean exit, or
//! silence until the deadline all count as "started".

use super::runner::{MarkerWatch, OutputBuffer, finish_reader};
use super::{CommandInvocation, ProcessError, ProcessResult, ProcessTracker};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Line a generated server prints once it is serving.
pub const DEFAULT_READINESS_MARKER: &str = "MCP server running";

/// Number of stderr lines kept in startup diagnostics.
const STDERR_TAIL_LINES: usize = 20;

/// What ended a startup probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupSignal {
    /// The readiness marker appeared on stdout or stderr.
    Marker,
    /// The deadline passed without a marker or exit.
    Timeout,
    /// The process exited on its own.
    Exited(Option<i32>),
}

/// Captured outcome of one startup probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupReport {
    /// What ended the probe.
    pub signal: StartupSignal,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl StartupReport {
    /// Creates a report.
    #[must_use]
    pub fn new(signal: StartupSignal, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            signal,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Applies the readiness rules to this report.
    ///
    /// # Errors
    ///
    /// Returns the failure message when the process is judged not started.
    pub fn verdict(&self) -> Result<(), String> {
        evaluate(self.signal, &self.stderr)
    }

    /// Returns the last lines of stderr for diagnostics.
    #[must_use]
    pub fn stderr_tail(&self) -> String {
        let lines: Vec<&str> = self.stderr.lines().collect();
        let skip = lines.len().saturating_sub(STDERR_TAIL_LINES);
        lines.into_iter().skip(skip).collect::<Vec<_>>().join("\n")
    }
}

/// Readiness rules.
///
/// - marker seen: started;
/// - deadline passed: started unless stderr mentions "error" in any case;
/// - exited: started when the exit code is 0 or stderr is empty.
///
/// # Errors
///
/// Returns the failure message for a process judged not started.
pub fn evaluate(signal: StartupSignal, stderr: &str) -> Result<(), String> {
    match signal {
        StartupSignal::Marker => Ok(()),
        StartupSignal::Timeout => {
            if stderr.to_lowercase().contains("error") {
                Err("Server startup errors detected".to_owned())
            } else {
                Ok(())
            }
        }
        StartupSignal::Exited(code) => {
            if code == Some(0) || stderr.trim().is_empty() {
                Ok(())
            } else {
                Err(code.map_or_else(
                    || "Server was terminated by a signal".to_owned(),
                    |exit| format!("Server exited with code {exit}"),
                ))
            }
        }
    }
}

/// Port for launching a server and judging whether it started.
#[async_trait]
pub trait StartupProbe: Send + Sync {
    /// Launches `invocation` and watches it for at most `timeout`.
    ///
    /// The process is registered with `tracker` while it runs and released
    /// once it has been killed or reaped.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError`] when the process cannot be spawned or
    /// supervised; readiness failures are reported through the
    /// [`StartupReport`].
    async fn probe(
        &self,
        invocation: &CommandInvocation,
        timeout: Duration,
        tracker: &ProcessTracker,
    ) -> ProcessResult<StartupReport>;
}

/// Probes real child processes.
#[derive(Debug, Clone)]
pub struct ProcessStartupProber {
    readiness_marker: String,
}

impl ProcessStartupProber {
    /// Creates a prober looking for `readiness_marker`.
    #[must_use]
    pub fn new(readiness_marker: impl Into<String>) -> Self {
        Self {
            readiness_marker: readiness_marker.into(),
        }
    }

    /// Returns the readiness marker.
    #[must_use]
    pub fn readiness_marker(&self) -> &str {
        &self.readiness_marker
    }
}

impl Default for ProcessStartupProber {
    fn default() -> Self {
        Self::new(DEFAULT_READINESS_MARKER)
    }
}

#[async_trait]
impl StartupProbe for ProcessStartupProber {
    async fn probe(
        &self,
        invocation: &CommandInvocation,
        timeout: Duration,
        tracker: &ProcessTracker,
    ) -> ProcessResult<StartupReport> {
        let mut child = invocation
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| ProcessError::spawn(invocation.program(), err))?;
        let pid = child.id();
        if let Some(id) = pid {
            tracker.track(id, format!("startup probe: {invocation}"));
        }

        // Held open so stdio servers do not see end of input.
        let stdin = child.stdin.take();
        let stdout = OutputBuffer::default();
        let stderr = OutputBuffer::default();
        let (found_tx, mut found_rx) = watch::channel(false);
        let watch_for = |found: &watch::Sender<bool>| {
            Some(MarkerWatch {
                marker: self.readiness_marker.clone(),
                found: found.clone(),
            })
        };
        let readers = [
            child
                .stdout
                .take()
                .map(|pipe| stdout.capture_watching(pipe, watch_for(&found_tx))),
            child
                .stderr
                .take()
                .map(|pipe| stderr.capture_watching(pipe, watch_for(&found_tx))),
        ];
        drop(found_tx);

        let outcome = tokio::select! {
            Ok(_) = found_rx.wait_for(|found| *found) => Ok(StartupSignal::Marker),
            waited = child.wait() => waited.map(|status| StartupSignal::Exited(status.code())),
            () = tokio::time::sleep(timeout) => Ok(StartupSignal::Timeout),
        };

        if !matches!(outcome, Ok(StartupSignal::Exited(_))) {
            if let Err(err) = child.kill().await {
                warn!(command = %invocation, error = %err, "failed to stop probed server");
            }
        }
        drop(stdin);
        let raced = settle(tracker, pid, outcome)
            .map_err(|err| ProcessError::supervise(invocation.program(), err))?;
        for reader in readers.into_iter().flatten() {
            finish_reader(reader).await;
        }

        let stdout_text = stdout.contents();
        let stderr_text = stderr.contents();
        let marker_seen = stdout_text.contains(&self.readiness_marker)
            || stderr_text.contains(&self.readiness_marker);
        let signal = if marker_seen {
            StartupSignal::Marker
        } else {
            raced
        };
        debug!(command = %invocation, ?signal, "startup probe finished");
        Ok(StartupReport::new(signal, stdout_text, stderr_text))
    }
}

/// Releases `pid` from `tracker` whatever the probe's outcome.
fn settle(
    tracker: &ProcessTracker,
    pid: Option<u32>,
    outcome: std::io::Result<StartupSignal>,
) -> std::io::Result<StartupSignal> {
    if let Some(id) = pid {
        tracker.release(id);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::marker(StartupSignal::Marker, "Traceback: error", true)]
    #[case::quiet_timeout(StartupSignal::Timeout, "listening", true)]
    #[case::noisy_timeout(StartupSignal::Timeout, "RuntimeError: bad", false)]
    #[case::clean_exit(StartupSignal::Exited(Some(0)), "warning", true)]
    #[case::silent_failure(StartupSignal::Exited(Some(1)), "", true)]
    #[case::loud_failure(StartupSignal::Exited(Some(1)), "ModuleNotFoundError", false)]
    fn readiness_rules(#[case] signal: StartupSignal, #[case] stderr: &str, #[case] ready: bool) {
        assert_eq!(evaluate(signal, stderr).is_ok(), ready);
    }

    #[rstest]
    fn failed_exit_names_code() {
        assert_eq!(
            evaluate(StartupSignal::Exited(Some(2)), "boom"),
            Err("Server exited with code 2".to_owned())
        );
    }

    #[rstest]
    fn failed_wait_still_releases_the_process() {
        let tracker = ProcessTracker::new();
        tracker.track(4_000_010, "startup probe: python3 weather.py");

        let outcome = settle(
            &tracker,
            Some(4_000_010),
            Err(std::io::Error::other("wait interrupted")),
        );

        assert!(outcome.is_err());
        assert!(tracker.is_empty());
    }

    #[rstest]
    fn stderr_tail_keeps_last_lines() {
        let stderr: String = (1..=30).map(|line| format!("line {line}\n")).collect();
        let report = StartupReport::new(StartupSignal::Timeout, "", stderr);

        let tail = report.stderr_tail();

        assert!(tail.starts_with("line 11"));
        assert!(tail.ends_with("line 30"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn marker_on_stderr_counts_as_ready() {
        let prober = ProcessStartupProber::default();
        let tracker = ProcessTracker::new();
        let invocation =
            CommandInvocation::new("sh", ["-c", "echo 'MCP server running on stdio' >&2; exec sleep 10"]);

        let report = prober
            .probe(&invocation, Duration::from_secs(5), &tracker)
            .await
            .expect("probe should run");

        assert_eq!(report.signal, StartupSignal::Marker);
        assert!(report.verdict().is_ok());
        assert!(tracker.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn crash_with_stderr_fails() {
        let prober = ProcessStartupProber::default();
        let tracker = ProcessTracker::new();
        let invocation = CommandInvocation::new("sh", ["-c", "echo 'ImportError: mcp' >&2; exit 1"]);

        let report = prober
            .probe(&invocation, Duration::from_secs(5), &tracker)
            .await
            .expect("probe should run");

        assert_eq!(report.signal, StartupSignal::Exited(Some(1)));
        assert_eq!(report.verdict(), Err("Server exited with code 1".to_owned()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn silent_server_is_ready_at_deadline() {
        let prober = ProcessStartupProber::default();
        let tracker = ProcessTracker::new();
        let invocation = CommandInvocation::new("sh", ["-c", "exec sleep 10"]);

        let report = prober
            .probe(&invocation, Duration::from_millis(300), &tracker)
            .await
            .expect("probe should run");

        assert_eq!(report.signal, StartupSignal::Timeout);
        assert!(report.verdict().is_ok());
        assert!(tracker.is_empty());
    }
}
