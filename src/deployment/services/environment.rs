//! Pre-flight checks for required command-line tools.

use super::{DeploymentError, DeploymentResult};
use crate::config::ToolProbe;
use crate::process::{CommandInvocation, CommandRunner, ProcessTracker};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Runs a version probe for each required tool.
#[derive(Clone)]
pub struct EnvironmentValidator {
    runner: Arc<dyn CommandRunner>,
    probes: Vec<ToolProbe>,
    timeout: Duration,
}

impl EnvironmentValidator {
    /// Creates a validator running `probes` with `timeout` each.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, probes: Vec<ToolProbe>, timeout: Duration) -> Self {
        Self {
            runner,
            probes,
            timeout,
        }
    }

    /// Probes every tool in order and returns their version lines.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentError::MissingTool`] for the first probe that
    /// cannot start or fails, and [`DeploymentError::ToolCheckTimedOut`] for
    /// one that hangs; later probes are skipped.
    pub async fn check_tools(&self) -> DeploymentResult<Vec<String>> {
        let mut versions = Vec::with_capacity(self.probes.len());
        let tracker = ProcessTracker::new();
        for probe in &self.probes {
            let invocation = CommandInvocation::new(probe.program.as_str(), probe.args.iter());
            let output = self
                .runner
                .run(&invocation, self.timeout, &tracker)
                .await
                .map_err(|err| DeploymentError::MissingTool {
                    program: probe.program.clone(),
                    detail: err.to_string(),
                })?;
            if output.timed_out {
                return Err(DeploymentError::ToolCheckTimedOut {
                    program: probe.program.clone(),
                });
            }
            if !output.success {
                return Err(DeploymentError::MissingTool {
                    program: probe.program.clone(),
                    detail: output.summary(),
                });
            }
            let version = output.output().lines().next().unwrap_or_default().trim().to_owned();
            debug!(program = %probe.program, version = %version, "required tool present");
            versions.push(version);
        }
        Ok(versions)
    }
}
