//! Deployment configuration.
//!
//! Values come from built-in defaults, an optional TOML file and then
//! `SLIPWAY_*` environment variables, in that order.

use crate::deployment::domain::{LanguageVariant, PackagingFormat};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: Arc<std::io::Error>,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override holds an unusable value.
    #[error("invalid value '{value}' for {key}")]
    InvalidOverride {
        /// Environment variable name.
        key: String,
        /// Rejected value.
        value: String,
    },
}

/// A version probe for a required command-line tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolProbe {
    /// Program to run.
    pub program: String,
    /// Arguments; defaults to `--version`.
    #[serde(default = "default_probe_args")]
    pub args: Vec<String>,
}

impl ToolProbe {
    /// Creates a `--version` probe for `program`.
    #[must_use]
    pub fn version_of(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: default_probe_args(),
        }
    }
}

fn default_probe_args() -> Vec<String> {
    vec!["--version".to_owned()]
}

/// Dependency installation command per packaging format and language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstallCommands {
    /// Standalone Python servers.
    pub standalone_python: Vec<String>,
    /// `FastMCP` Python servers.
    pub fastmcp_python: Vec<String>,
    /// Standalone Node servers.
    pub standalone_node: Vec<String>,
    /// `FastMCP` Node servers.
    pub fastmcp_node: Vec<String>,
}

impl InstallCommands {
    /// Returns the command vector for a format and language.
    #[must_use]
    pub fn for_variant(&self, format: PackagingFormat, language: LanguageVariant) -> &[String] {
        match (format, language) {
            (PackagingFormat::Standalone, LanguageVariant::Python) => &self.standalone_python,
            (PackagingFormat::Fastmcp, LanguageVariant::Python) => &self.fastmcp_python,
            (PackagingFormat::Standalone, LanguageVariant::Node) => &self.standalone_node,
            (PackagingFormat::Fastmcp, LanguageVariant::Node) => &self.fastmcp_node,
        }
    }
}

impl Default for InstallCommands {
    fn default() -> Self {
        let words = |line: &str| line.split_whitespace().map(str::to_owned).collect();
        Self {
            standalone_python: words("pip3 install mcp"),
            fastmcp_python: words("pip3 install fastmcp"),
            standalone_node: words("npm install @modelcontextprotocol/sdk zod"),
            fastmcp_node: words("npm install fastmcp zod"),
        }
    }
}

/// Settings for the deployment pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeploymentConfig {
    /// Directory receiving generated sources.
    pub output_dir: Utf8PathBuf,
    /// Tools that must answer a version probe before deploying.
    pub required_tools: Vec<ToolProbe>,
    /// Timeout for each version probe, in seconds.
    pub probe_timeout_secs: u64,
    /// Timeout for dependency installation, in seconds.
    pub install_timeout_secs: u64,
    /// Timeout for the startup probe, in seconds.
    pub startup_timeout_secs: u64,
    /// Timeout for one MCP request, in seconds.
    pub request_timeout_secs: u64,
    /// Line generated servers print once ready.
    pub readiness_marker: String,
    /// Interpreter for Python servers.
    pub python_interpreter: String,
    /// Interpreter for Node servers.
    pub node_interpreter: String,
    /// Dependency installation commands.
    pub install: InstallCommands,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            output_dir: Utf8PathBuf::from("generated_servers"),
            required_tools: vec![
                ToolProbe::version_of("python3"),
                ToolProbe::version_of("pip3"),
                ToolProbe::version_of("node"),
            ],
            probe_timeout_secs: 5,
            install_timeout_secs: 300,
            startup_timeout_secs: 10,
            request_timeout_secs: 30,
            readiness_marker: crate::process::DEFAULT_READINESS_MARKER.to_owned(),
            python_interpreter: "python3".to_owned(),
            node_interpreter: "node".to_owned(),
            install: InstallCommands::default(),
        }
    }
}

impl DeploymentConfig {
    /// Parses a TOML document; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read and
    /// [`ConfigError::Parse`] when it is malformed.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let read_error = |source| ConfigError::Read {
            path: path.to_owned(),
            source: Arc::new(source),
        };
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let file_name = path.file_name().ok_or_else(|| {
            read_error(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "config path has no file name",
            ))
        })?;

        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(read_error)?;
        let content = dir.read_to_string(file_name).map_err(read_error)?;
        Self::from_toml_str(&content)
    }

    /// Applies `SLIPWAY_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] when a timeout override is
    /// not a whole number of seconds.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup("SLIPWAY_OUTPUT_DIR") {
            self.output_dir = Utf8PathBuf::from(value);
        }
        if let Some(value) = lookup("SLIPWAY_READINESS_MARKER") {
            self.readiness_marker = value;
        }
        if let Some(value) = lookup("SLIPWAY_PYTHON") {
            self.python_interpreter = value;
        }
        if let Some(value) = lookup("SLIPWAY_NODE") {
            self.node_interpreter = value;
        }

        for (key, slot) in [
            ("SLIPWAY_PROBE_TIMEOUT_SECS", &mut self.probe_timeout_secs),
            ("SLIPWAY_INSTALL_TIMEOUT_SECS", &mut self.install_timeout_secs),
            ("SLIPWAY_STARTUP_TIMEOUT_SECS", &mut self.startup_timeout_secs),
            ("SLIPWAY_REQUEST_TIMEOUT_SECS", &mut self.request_timeout_secs),
        ] {
            if let Some(value) = lookup(key) {
                *slot = value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidOverride {
                        key: key.to_owned(),
                        value: value.clone(),
                    })?;
            }
        }
        Ok(())
    }

    /// Returns the interpreter that runs sources in `language`.
    #[must_use]
    pub fn interpreter(&self, language: LanguageVariant) -> &str {
        match language {
            LanguageVariant::Python => &self.python_interpreter,
            LanguageVariant::Node => &self.node_interpreter,
        }
    }

    /// Returns the version probe timeout.
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Returns the dependency installation timeout.
    #[must_use]
    pub const fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    /// Returns the startup probe timeout.
    #[must_use]
    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    /// Returns the MCP request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
