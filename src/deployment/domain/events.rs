//! Progress events and terminal outcomes streamed to the requester.

use super::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of steps in the deployment pipeline.
pub const TOTAL_STEPS: u8 = 7;

/// Status of one pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// The step is about to start.
    Pending,
    /// The step is running.
    Running,
    /// The step finished successfully.
    Success,
    /// The step failed; the pipeline stops.
    Error,
}

/// The seven ordered pipeline steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineStep {
    /// Validate the request and check required tools.
    Environment,
    /// Generate and write the server source.
    Materialize,
    /// Install language dependencies.
    Install,
    /// Start the server and wait for its readiness marker.
    StartupProbe,
    /// Connect over MCP and list tools.
    ProtocolValidation,
    /// Record the server in the catalog.
    CatalogRegistration,
    /// Open the permanent session.
    Activation,
}

impl PipelineStep {
    /// Every step in execution order.
    pub const ALL: [Self; 7] = [
        Self::Environment,
        Self::Materialize,
        Self::Install,
        Self::StartupProbe,
        Self::ProtocolValidation,
        Self::CatalogRegistration,
        Self::Activation,
    ];

    /// Returns the 1-based step number.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Environment => 1,
            Self::Materialize => 2,
            Self::Install => 3,
            Self::StartupProbe => 4,
            Self::ProtocolValidation => 5,
            Self::CatalogRegistration => 6,
            Self::Activation => 7,
        }
    }

    /// Returns a short label for progress messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Environment => "Validating environment",
            Self::Materialize => "Generating server source",
            Self::Install => "Installing dependencies",
            Self::StartupProbe => "Testing server startup",
            Self::ProtocolValidation => "Validating MCP protocol",
            Self::CatalogRegistration => "Registering in catalog",
            Self::Activation => "Activating server",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "step {}/{TOTAL_STEPS} ({})", self.number(), self.label())
    }
}

/// One progress event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStep {
    /// 1-based step number.
    pub step: u8,
    /// Total number of steps.
    pub total: u8,
    /// Human-readable progress message.
    pub message: String,
    /// Step status.
    pub status: StepStatus,
    /// Captured output, when relevant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}

impl DeploymentStep {
    /// Creates an event for `step` with its default label.
    #[must_use]
    pub fn new(step: PipelineStep, status: StepStatus) -> Self {
        Self::with_message(step, status, step.label())
    }

    /// Creates an event with a custom message.
    #[must_use]
    pub fn with_message(step: PipelineStep, status: StepStatus, message: impl Into<String>) -> Self {
        Self {
            step: step.number(),
            total: TOTAL_STEPS,
            message: message.into(),
            status,
            logs: None,
        }
    }

    /// Attaches captured output.
    #[must_use]
    pub fn with_logs(mut self, logs: impl Into<String>) -> Self {
        let captured = logs.into();
        self.logs = (!captured.trim().is_empty()).then_some(captured);
        self
    }
}

/// Terminal success payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSuccess {
    /// Always `true`.
    pub success: bool,
    /// Final registered server name.
    pub server_name: String,
    /// Path of the generated source file.
    pub file_path: String,
    /// Human-readable summary.
    pub message: String,
}

impl DeploymentSuccess {
    /// Creates a success payload.
    #[must_use]
    pub fn new(server_name: impl Into<String>, file_path: impl Into<String>) -> Self {
        let name = server_name.into();
        Self {
            success: true,
            message: format!("MCP server '{name}' deployed and connected"),
            server_name: name,
            file_path: file_path.into(),
        }
    }
}

/// Terminal failure payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentFailure {
    /// Always `false`.
    pub success: bool,
    /// Error message.
    pub error: String,
    /// Classified category.
    pub error_category: ErrorCategory,
    /// Remediation hints.
    pub troubleshooting: Vec<String>,
    /// Suggested shell command, when one applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_command: Option<String>,
    /// Failures encountered while undoing side effects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_report: Option<String>,
    /// Number of the step that failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<u8>,
}

/// Terminal result of one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeploymentOutcome {
    /// The server is deployed, registered and connected.
    Success(DeploymentSuccess),
    /// The deployment failed and was rolled back.
    Failure(DeploymentFailure),
}

impl DeploymentOutcome {
    /// Returns `true` for a successful deployment.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// One line of the deployment stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeploymentMessage {
    /// Intermediate progress.
    Step(DeploymentStep),
    /// Final outcome; always the last message.
    Finished(DeploymentOutcome),
}

impl DeploymentMessage {
    /// Serializes the message as one newline-terminated JSON line.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] when serialization fails.
    pub fn to_ndjson_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Returns the outcome, if this is the final message.
    #[must_use]
    pub const fn as_outcome(&self) -> Option<&DeploymentOutcome> {
        match self {
            Self::Finished(outcome) => Some(outcome),
            Self::Step(_) => None,
        }
    }
}
