//! Tool descriptors returned by fan-out listing.

use super::ServerName;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool exposed by a connected server, tagged with its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input_schema: Option<Value>,
    server_name: ServerName,
}

impl ToolDescriptor {
    /// Creates a tool descriptor owned by `server_name`.
    #[must_use]
    pub fn new(name: impl Into<String>, server_name: ServerName) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: None,
            server_name,
        }
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the JSON schema describing tool arguments.
    #[must_use]
    pub fn with_input_schema(mut self, input_schema: Value) -> Self {
        self.input_schema = Some(input_schema);
        self
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the optional input schema.
    #[must_use]
    pub const fn input_schema(&self) -> Option<&Value> {
        self.input_schema.as_ref()
    }

    /// Returns the name of the server that owns the tool.
    #[must_use]
    pub const fn server_name(&self) -> &ServerName {
        &self.server_name
    }
}
