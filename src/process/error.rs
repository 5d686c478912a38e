//! Errors raised while supervising external processes.

use std::sync::Arc;
use thiserror::Error;

/// Result type for process supervision.
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Errors raised while spawning or waiting on external processes.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    /// The program could not be started.
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        source: Arc<std::io::Error>,
    },

    /// Waiting on or killing a running process failed.
    #[error("failed to supervise `{program}`: {source}")]
    Supervise {
        /// Program being supervised.
        program: String,
        /// Underlying I/O error.
        source: Arc<std::io::Error>,
    },
}

impl ProcessError {
    /// Wraps a spawn failure for `program`.
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source: Arc::new(source),
        }
    }

    /// Wraps a wait or kill failure for `program`.
    pub fn supervise(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Supervise {
            program: program.into(),
            source: Arc::new(source),
        }
    }
}
