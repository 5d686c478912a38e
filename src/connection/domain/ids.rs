//! Validated server names used as registry keys.

use super::ConnectionDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for an MCP server name, matching `VARCHAR(100)`.
pub const MAX_SERVER_NAME_LENGTH: usize = 100;

/// Validated MCP server name.
///
/// Names key both the live session registry and the persistent catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerName(String);

impl ServerName {
    /// Creates a validated server name.
    ///
    /// The input is trimmed and lowercased. Only characters in `[a-z0-9_]`
    /// are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionDomainError`] when validation fails.
    pub fn new(value: impl Into<String>) -> Result<Self, ConnectionDomainError> {
        let normalized = value.into().trim().to_ascii_lowercase();

        if normalized.is_empty() {
            return Err(ConnectionDomainError::EmptyServerName);
        }

        let is_valid = normalized.chars().all(|character| {
            character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_'
        });
        if !is_valid {
            return Err(ConnectionDomainError::InvalidServerName(normalized));
        }

        if normalized.len() > MAX_SERVER_NAME_LENGTH {
            return Err(ConnectionDomainError::ServerNameTooLong(normalized));
        }

        Ok(Self(normalized))
    }

    /// Derives a server name from free-form text such as a resource title.
    ///
    /// Every run of characters outside `[a-z0-9]` becomes a single `_`,
    /// leading and trailing separators are dropped, and the result is cut to
    /// `max_len` characters.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionDomainError::EmptyServerName`] when nothing usable
    /// remains.
    pub fn derive(source: &str, max_len: usize) -> Result<Self, ConnectionDomainError> {
        let mut derived = String::with_capacity(source.len());
        let mut pending_separator = false;
        for character in source.trim().chars().map(|c| c.to_ascii_lowercase()) {
            if character.is_ascii_lowercase() || character.is_ascii_digit() {
                if pending_separator && !derived.is_empty() {
                    derived.push('_');
                }
                pending_separator = false;
                derived.push(character);
            } else {
                pending_separator = true;
            }
        }

        let limit = max_len.min(MAX_SERVER_NAME_LENGTH);
        let truncated: String = derived.chars().take(limit).collect();
        Self::new(truncated.trim_end_matches('_'))
    }

    /// Returns a new name made of this name and a suffix joined by `_`.
    ///
    /// The base is shortened when needed so the result stays within the
    /// length limit.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionDomainError`] when the suffix itself is invalid.
    pub fn with_suffix(&self, suffix: &str) -> Result<Self, ConnectionDomainError> {
        let budget = MAX_SERVER_NAME_LENGTH.saturating_sub(suffix.len() + 1);
        let base: String = self.0.chars().take(budget).collect();
        Self::new(format!("{}_{suffix}", base.trim_end_matches('_')))
    }

    /// Returns the server name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ServerName {
    type Error = ConnectionDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ServerName> for String {
    fn from(value: ServerName) -> Self {
        value.0
    }
}

impl AsRef<str> for ServerName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
