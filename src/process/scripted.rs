//! Scripted process adapters for tests and dry runs.

use super::{
    CommandInvocation, CommandOutput, CommandRunner, ProcessError, ProcessResult, ProcessTracker,
    StartupProbe, StartupReport, StartupSignal,
};
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Scripted {
    Output(CommandOutput),
    SpawnFailure,
}

#[derive(Debug, Default)]
struct ScriptedRunnerState {
    rules: Vec<(String, Scripted)>,
    invocations: Vec<CommandInvocation>,
}

/// Command runner answering from a script instead of spawning processes.
///
/// Rules match on the rendered command line prefix (`"pip3 install"`); the
/// most recently added matching rule wins. Unmatched commands succeed with
/// empty output.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCommandRunner {
    state: Arc<RwLock<ScriptedRunnerState>>,
}

impl ScriptedCommandRunner {
    /// Creates a runner where every command succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers commands starting with `prefix` with `output`.
    pub fn respond(&self, prefix: impl Into<String>, output: CommandOutput) {
        self.push(prefix.into(), Scripted::Output(output));
    }

    /// Makes commands starting with `prefix` fail to spawn.
    pub fn fail_spawn(&self, prefix: impl Into<String>) {
        self.push(prefix.into(), Scripted::SpawnFailure);
    }

    /// Returns every invocation received, in order.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .invocations
            .clone()
    }

    fn push(&self, prefix: String, scripted: Scripted) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .rules
            .push((prefix, scripted));
    }
}

#[async_trait]
impl CommandRunner for ScriptedCommandRunner {
    async fn run(
        &self,
        invocation: &CommandInvocation,
        _timeout: Duration,
        _tracker: &ProcessTracker,
    ) -> ProcessResult<CommandOutput> {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        state.invocations.push(invocation.clone());

        let line = invocation.to_string();
        let scripted = state
            .rules
            .iter()
            .rev()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, scripted)| scripted.clone());

        match scripted {
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::SpawnFailure) => Err(ProcessError::spawn(
                invocation.program(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
            )),
            None => Ok(CommandOutput::succeeded("")),
        }
    }
}

#[derive(Debug)]
struct ScriptedProbeState {
    outcome: Result<StartupReport, ProcessError>,
    invocations: Vec<CommandInvocation>,
}

/// Startup probe returning a fixed report.
#[derive(Debug, Clone)]
pub struct ScriptedStartupProbe {
    state: Arc<RwLock<ScriptedProbeState>>,
}

impl Default for ScriptedStartupProbe {
    fn default() -> Self {
        Self::reporting(StartupReport::new(
            StartupSignal::Marker,
            "",
            super::DEFAULT_READINESS_MARKER,
        ))
    }
}

impl ScriptedStartupProbe {
    /// Creates a probe whose servers print the readiness marker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a probe answering with `report`.
    #[must_use]
    pub fn reporting(report: StartupReport) -> Self {
        Self {
            state: Arc::new(RwLock::new(ScriptedProbeState {
                outcome: Ok(report),
                invocations: Vec::new(),
            })),
        }
    }

    /// Replaces the report returned by later probes.
    pub fn set_report(&self, report: StartupReport) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .outcome = Ok(report);
    }

    /// Makes later probes fail with `error`.
    pub fn set_error(&self, error: ProcessError) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .outcome = Err(error);
    }

    /// Returns every probed invocation, in order.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .invocations
            .clone()
    }
}

#[async_trait]
impl StartupProbe for ScriptedStartupProbe {
    async fn probe(
        &self,
        invocation: &CommandInvocation,
        _timeout: Duration,
        _tracker: &ProcessTracker,
    ) -> ProcessResult<StartupReport> {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        state.invocations.push(invocation.clone());
        state.outcome.clone()
    }
}
