//! Per-deployment set of spawned, not yet reaped processes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// A process registered with a [`ProcessTracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedProcess {
    /// Operating-system process id.
    pub pid: u32,
    /// What the process was spawned for.
    pub label: String,
}

/// Outcome of [`ProcessTracker::kill_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KillReport {
    /// Processes that were signalled or had already exited.
    pub killed: Vec<TrackedProcess>,
    /// Processes that could not be signalled, with the reason.
    pub failed: Vec<(TrackedProcess, String)>,
}

impl KillReport {
    /// Returns whether every tracked process was handled.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for KillReport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "killed {} process(es)", self.killed.len())?;
        for (process, reason) in &self.failed {
            write!(
                formatter,
                "; failed to kill {} (pid {}): {reason}",
                process.label, process.pid
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct TrackerInner {
    processes: Mutex<BTreeMap<u32, TrackedProcess>>,
}

impl Drop for TrackerInner {
    fn drop(&mut self) {
        let processes = self
            .processes
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for process in std::mem::take(processes).into_values() {
            if let Err(reason) = force_kill(process.pid) {
                warn!(pid = process.pid, label = %process.label, %reason, "failed to kill leftover process");
            }
        }
    }
}

/// Shared handle to the processes a deployment has spawned.
///
/// Clones share one set. Anything still tracked when the last handle is
/// dropped is force-killed.
#[derive(Debug, Clone, Default)]
pub struct ProcessTracker {
    inner: Arc<TrackerInner>,
}

impl ProcessTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a running process.
    pub fn track(&self, pid: u32, label: impl Into<String>) {
        let process = TrackedProcess {
            pid,
            label: label.into(),
        };
        debug!(pid, label = %process.label, "tracking process");
        self.lock().insert(pid, process);
    }

    /// Forgets a process that has been reaped.
    pub fn release(&self, pid: u32) -> Option<TrackedProcess> {
        self.lock().remove(&pid)
    }

    /// Returns the number of tracked processes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns whether no process is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Force-kills and forgets every tracked process.
    pub fn kill_all(&self) -> KillReport {
        let processes = std::mem::take(&mut *self.lock());
        let mut report = KillReport::default();
        for process in processes.into_values() {
            match force_kill(process.pid) {
                Ok(()) => report.killed.push(process),
                Err(reason) => report.failed.push((process, reason)),
            }
        }
        if !report.killed.is_empty() || !report.failed.is_empty() {
            debug!(%report, "killed tracked processes");
        }
        report
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<u32, TrackedProcess>> {
        self.inner
            .processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(unix)]
fn force_kill(pid: u32) -> Result<(), String> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|err| err.to_string())?;
    match kill(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(errno.to_string()),
    }
}

#[cfg(not(unix))]
fn force_kill(pid: u32) -> Result<(), String> {
    let status = std::process::Command::new("taskkill")
        .args(["/F", "/PID", &pid.to_string()])
        .status()
        .map_err(|err| err.to_string())?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("taskkill exited with {status}"))
    }
}
