//! Deployment requests and the resource descriptors they carry.

use super::DeploymentDomainError;
use crate::catalog::domain::OwnerId;
use crate::connection::domain::{MAX_SERVER_NAME_LENGTH, ServerName};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Python keywords that cannot name a generated function parameter.
const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Packaging style of the generated server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackagingFormat {
    /// Plain MCP SDK server.
    Standalone,
    /// Server built on the `FastMCP` framework.
    Fastmcp,
}

impl PackagingFormat {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standalone => "standalone",
            Self::Fastmcp => "fastmcp",
        }
    }
}

impl fmt::Display for PackagingFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Source language of the generated server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageVariant {
    /// Python 3, run with the Python interpreter.
    #[default]
    Python,
    /// JavaScript ES module, run with Node.js.
    Node,
}

impl LanguageVariant {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Node => "node",
        }
    }

    /// Returns the extension of generated source files.
    #[must_use]
    pub const fn file_extension(self) -> &'static str {
        match self {
            Self::Python => "py",
            Self::Node => "mjs",
        }
    }
}

impl fmt::Display for LanguageVariant {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// UTF-8 text.
    String,
    /// Floating-point number.
    Number,
    /// Whole number.
    Integer,
    /// True or false.
    Boolean,
}

impl ParameterType {
    /// Returns the JSON Schema type name.
    #[must_use]
    pub const fn json_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }
}

/// One parameter of a declared tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    /// Parameter name.
    pub name: String,
    /// JSON type.
    #[serde(rename = "type")]
    pub kind: ParameterType,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether callers must supply the parameter.
    #[serde(default)]
    pub required: bool,
}

/// One tool the generated server exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    /// Tool name as advertised over MCP.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Declared parameters.
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

/// Declarative description of the server to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    /// Resource name; the server name is derived from it.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared tools.
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    /// Name of a peer server the new server depends on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_server: Option<String>,
}

impl ResourceDescriptor {
    /// Derives the server name from the resource name.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentDomainError::ServerName`] when the name has no
    /// usable characters.
    pub fn server_name(&self) -> Result<ServerName, DeploymentDomainError> {
        Ok(ServerName::derive(&self.name, MAX_SERVER_NAME_LENGTH)?)
    }

    /// Checks tool and parameter names.
    ///
    /// # Errors
    ///
    /// Returns the first [`DeploymentDomainError`] found.
    pub fn validate(&self) -> Result<(), DeploymentDomainError> {
        if self.tools.is_empty() {
            return Err(DeploymentDomainError::NoTools);
        }

        let mut tool_names = HashSet::new();
        for tool in &self.tools {
            if !is_tool_name(&tool.name) {
                return Err(DeploymentDomainError::InvalidToolName(tool.name.clone()));
            }
            if !tool_names.insert(tool.name.as_str()) {
                return Err(DeploymentDomainError::DuplicateToolName(tool.name.clone()));
            }
            validate_parameters(tool)?;
        }
        Ok(())
    }
}

fn validate_parameters(tool: &ToolSpec) -> Result<(), DeploymentDomainError> {
    let mut parameter_names = HashSet::new();
    for parameter in &tool.parameters {
        if !is_identifier(&parameter.name) || PYTHON_KEYWORDS.contains(&parameter.name.as_str()) {
            return Err(DeploymentDomainError::InvalidParameterName {
                tool: tool.name.clone(),
                parameter: parameter.name.clone(),
            });
        }
        if !parameter_names.insert(parameter.name.as_str()) {
            return Err(DeploymentDomainError::DuplicateParameterName {
                tool: tool.name.clone(),
                parameter: parameter.name.clone(),
            });
        }
    }
    Ok(())
}

fn is_identifier(value: &str) -> bool {
    let mut characters = value.chars();
    characters
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && characters.all(|character| character.is_ascii_alphanumeric() || character == '_')
}

fn is_tool_name(value: &str) -> bool {
    let mut characters = value.chars();
    characters
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && characters.all(|character| {
            character.is_ascii_alphanumeric() || character == '_' || character == '-'
        })
}

/// Request to deploy one generated tool-server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRequest {
    /// What to build.
    pub resource_descriptor: ResourceDescriptor,
    /// Packaging format.
    pub format: PackagingFormat,
    /// Source language.
    #[serde(default)]
    pub language_variant: LanguageVariant,
    /// Requesting user.
    pub owner: String,
}

impl DeploymentRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(
        resource_descriptor: ResourceDescriptor,
        format: PackagingFormat,
        language_variant: LanguageVariant,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            resource_descriptor,
            format,
            language_variant,
            owner: owner.into(),
        }
    }

    /// Returns the validated owner identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentDomainError::Owner`] for an empty owner.
    pub fn owner_id(&self) -> Result<OwnerId, DeploymentDomainError> {
        Ok(OwnerId::new(self.owner.as_str())?)
    }
}
