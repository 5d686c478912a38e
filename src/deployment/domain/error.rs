//! Error types for deployment request validation.

use crate::catalog::domain::CatalogDomainError;
use crate::connection::domain::ConnectionDomainError;
use thiserror::Error;

/// Errors returned while validating a deployment request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeploymentDomainError {
    /// The resource descriptor declares no tools.
    #[error("invalid resource descriptor: at least one tool is required")]
    NoTools,

    /// A tool name is not usable as an MCP tool identifier.
    #[error("invalid tool name '{0}': use letters, digits, '_' or '-', starting with a letter or '_'")]
    InvalidToolName(String),

    /// Two tools share a name.
    #[error("invalid resource descriptor: duplicate tool name '{0}'")]
    DuplicateToolName(String),

    /// A parameter name is not a usable identifier.
    #[error("invalid parameter name '{parameter}' on tool '{tool}'")]
    InvalidParameterName {
        /// Tool declaring the parameter.
        tool: String,
        /// Rejected parameter name.
        parameter: String,
    },

    /// Two parameters of one tool share a name.
    #[error("invalid parameter list on tool '{tool}': duplicate parameter '{parameter}'")]
    DuplicateParameterName {
        /// Tool declaring the parameters.
        tool: String,
        /// Repeated parameter name.
        parameter: String,
    },

    /// No server name can be derived from the resource name.
    #[error("invalid resource name: {0}")]
    ServerName(#[from] ConnectionDomainError),

    /// The owner identifier is invalid.
    #[error("invalid owner: {0}")]
    Owner(#[from] CatalogDomainError),
}
