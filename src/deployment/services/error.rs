//! Service-level errors for the deployment pipeline.

use crate::catalog::ports::{CatalogError, OwnershipError};
use crate::catalog::services::CatalogServiceError;
use crate::connection::services::ConnectionServiceError;
use crate::deployment::adapters::WorkspaceError;
use crate::deployment::domain::DeploymentDomainError;
use crate::deployment::ports::GeneratorError;
use crate::process::ProcessError;
use thiserror::Error;

/// Result type for deployment operations.
pub type DeploymentResult<T> = Result<T, DeploymentError>;

/// Errors that stop a deployment.
///
/// Messages are written to be classified by
/// [`classify_error`](crate::deployment::domain::classify_error).
#[derive(Debug, Error)]
pub enum DeploymentError {
    /// The request failed validation.
    #[error(transparent)]
    InvalidRequest(#[from] DeploymentDomainError),

    /// A required command-line tool is unavailable.
    #[error("required tool `{program}` is not installed or not on PATH: {detail}")]
    MissingTool {
        /// Probed program.
        program: String,
        /// Probe failure detail.
        detail: String,
    },

    /// A required tool's version check ran past its deadline.
    #[error("required tool `{program}` timed out answering its version check")]
    ToolCheckTimedOut {
        /// Probed program.
        program: String,
    },

    /// The output directory cannot be used.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// The companion server is not in the catalog.
    #[error("companion server '{0}' is not registered in the catalog")]
    CompanionNotRegistered(String),

    /// The companion server is registered but disabled.
    #[error("companion server '{0}' is disabled")]
    CompanionDisabled(String),

    /// The companion server has no live session.
    #[error("companion server '{0}' is not connected")]
    CompanionNotConnected(String),

    /// Source generation failed.
    #[error(transparent)]
    Generation(#[from] GeneratorError),

    /// Dependency installation failed.
    #[error("dependency installation failed: {summary}")]
    Install {
        /// Exit summary.
        summary: String,
        /// Captured output.
        output: String,
    },

    /// Supervising a process failed.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// The startup probe judged the server unhealthy.
    #[error("server startup failed: {reason}")]
    Startup {
        /// Verdict explanation.
        reason: String,
        /// Tail of the server's stderr.
        stderr: String,
    },

    /// The server answered but exposes no tools.
    #[error("protocol validation failed: no tools found")]
    NoToolsFound,

    /// A connection manager operation failed.
    #[error(transparent)]
    Connection(#[from] ConnectionServiceError),

    /// A catalog operation failed.
    #[error(transparent)]
    Catalog(#[from] CatalogServiceError),

    /// Catalog repository access failed outside the catalog service.
    #[error(transparent)]
    Repository(#[from] CatalogError),

    /// Linking the server to its owner failed.
    #[error(transparent)]
    Ownership(#[from] OwnershipError),
}

impl DeploymentError {
    /// Returns captured process output worth showing next to the error.
    #[must_use]
    pub fn logs(&self) -> Option<&str> {
        match self {
            Self::Install { output, .. } => Some(output),
            Self::Startup { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}
