//! Error classification with remediation guidance.
//!
//! Classification is case-insensitive substring matching over the error
//! text. Categories are tried in a fixed order and unmatched text always
//! lands in [`ErrorCategory::Unknown`], so classifying never fails.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad cause of a deployment failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    /// Filesystem or process permissions.
    Permission,
    /// A required program or package is missing.
    Dependency,
    /// A port is already taken.
    PortConflict,
    /// An operation ran out of time.
    Timeout,
    /// The request or the server's behaviour is invalid.
    Validation,
    /// Anything else.
    Unknown,
}

impl ErrorCategory {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Permission => "permission",
            Self::Dependency => "dependency",
            Self::PortConflict => "port-conflict",
            Self::Timeout => "timeout",
            Self::Validation => "validation",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Which dependency a [`ErrorCategory::Dependency`] error is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// The Python interpreter.
    Python,
    /// The pip installer.
    Pip,
    /// Node.js or npm.
    Node,
    /// A Python package such as `mcp` or `fastmcp`.
    PythonPackage,
    /// An npm package such as `@modelcontextprotocol/sdk`.
    NodePackage,
    /// The missing piece could not be identified.
    Unspecified,
}

impl DependencyKind {
    fn detect(lowered: &str) -> Self {
        if contains_any(lowered, &["no module named", "modulenotfounderror"]) {
            Self::PythonPackage
        } else if contains_any(lowered, &["cannot find module", "err_module_not_found", "cannot find package"]) {
            Self::NodePackage
        } else if lowered.contains("pip") {
            Self::Pip
        } else if lowered.contains("python") {
            Self::Python
        } else if contains_any(lowered, &["node", "npm"]) {
            Self::Node
        } else {
            Self::Unspecified
        }
    }

    const fn fix_command(self) -> Option<&'static str> {
        match self {
            Self::Python => Some("sudo apt-get install -y python3"),
            Self::Pip => Some("python3 -m ensurepip --upgrade"),
            Self::Node => Some("sudo apt-get install -y nodejs npm"),
            Self::PythonPackage => Some("pip3 install mcp fastmcp"),
            Self::NodePackage => Some("npm install @modelcontextprotocol/sdk fastmcp zod"),
            Self::Unspecified => None,
        }
    }

    const fn hint(self) -> &'static str {
        match self {
            Self::Python => "Install Python 3 and make sure `python3` is on PATH",
            Self::Pip => "Install pip for the Python interpreter used by the server",
            Self::Node => "Install Node.js (which ships npm) and make sure `node` is on PATH",
            Self::PythonPackage => "Install the MCP Python packages for the interpreter in use",
            Self::NodePackage => "Install the MCP npm packages in the output directory",
            Self::Unspecified => "Install the missing program and make sure it is on PATH",
        }
    }
}

/// A classified error with remediation guidance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedError {
    /// Classified category.
    pub category: ErrorCategory,
    /// Original error message.
    pub message: String,
    /// Remediation bullets.
    pub troubleshooting: Vec<String>,
    /// One copy-paste remediation command, when meaningful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_command: Option<String>,
    /// Missing dependency, for [`ErrorCategory::Dependency`].
    #[serde(skip)]
    pub dependency: Option<DependencyKind>,
}

impl CategorizedError {
    fn new(
        category: ErrorCategory,
        message: &str,
        troubleshooting: &[&str],
        fix_command: Option<&str>,
    ) -> Self {
        Self {
            category,
            message: message.to_owned(),
            troubleshooting: troubleshooting.iter().map(|line| (*line).to_owned()).collect(),
            fix_command: fix_command.map(str::to_owned),
            dependency: None,
        }
    }
}

const PERMISSION_MARKERS: &[&str] = &[
    "eacces",
    "eperm",
    "permission denied",
    "operation not permitted",
    "not writable",
];

const DEPENDENCY_MARKERS: &[&str] = &[
    "not found",
    "no such file or directory",
    "enoent",
    "command not found",
    "no module named",
    "modulenotfounderror",
    "cannot find module",
    "err_module_not_found",
    "is not installed",
];

const PORT_MARKERS: &[&str] = &["eaddrinuse", "address already in use", "port already in use"];

const TIMEOUT_MARKERS: &[&str] = &["timed out", "timeout", "etimedout"];

const VALIDATION_MARKERS: &[&str] = &[
    "no tools found",
    "not registered",
    "disabled",
    "not connected",
    "invalid",
    "validation",
    "protocol",
    "must not be empty",
    "already connected",
    "unknown tool",
];

/// Classifies an error message.
#[must_use]
pub fn classify_error(message: &str) -> CategorizedError {
    let lowered = message.to_lowercase();

    if contains_any(&lowered, PERMISSION_MARKERS) {
        return CategorizedError::new(
            ErrorCategory::Permission,
            message,
            &[
                "Check that the output directory is writable by the current user",
                "Avoid running the deployment from a read-only or system directory",
                "Fix ownership of generated files if they were created by another user",
            ],
            Some("chmod -R u+rwX ."),
        );
    }

    if contains_any(&lowered, DEPENDENCY_MARKERS) {
        let kind = DependencyKind::detect(&lowered);
        let mut classified = CategorizedError::new(
            ErrorCategory::Dependency,
            message,
            &[
                kind.hint(),
                "Re-run the deployment once the dependency is installed",
            ],
            kind.fix_command(),
        );
        classified.dependency = Some(kind);
        return classified;
    }

    if contains_any(&lowered, PORT_MARKERS) {
        return CategorizedError::new(
            ErrorCategory::PortConflict,
            message,
            &[
                "Another process is listening on the port the server needs",
                "Stop the conflicting process or configure a different port",
            ],
            Some("lsof -nP -iTCP -sTCP:LISTEN"),
        );
    }

    if contains_any(&lowered, TIMEOUT_MARKERS) {
        return CategorizedError::new(
            ErrorCategory::Timeout,
            message,
            &[
                "The operation did not finish in time; the machine may be slow or offline",
                "Check network access for package installation",
                "Increase the configured timeout and retry",
            ],
            None,
        );
    }

    if contains_any(&lowered, VALIDATION_MARKERS) {
        return CategorizedError::new(
            ErrorCategory::Validation,
            message,
            &[
                "Review the resource descriptor: tool and parameter names must be valid identifiers",
                "Make sure the generated server exposes at least one tool",
                "Check that any companion server is registered, enabled and connected",
            ],
            None,
        );
    }

    CategorizedError::new(
        ErrorCategory::Unknown,
        message,
        &[
            "Inspect the step logs above for details",
            "Retry the deployment; transient failures are rolled back automatically",
        ],
        None,
    )
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
