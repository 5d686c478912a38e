//! Generated server source and its deterministic file name.

use super::LanguageVariant;
use crate::connection::domain::ServerName;
use sha2::{Digest, Sha256};

/// Bytes of the SHA-256 digest kept in file names.
const FINGERPRINT_BYTES: usize = 8;

/// Source text of a generated tool-server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSource {
    contents: String,
}

impl GeneratedSource {
    /// Wraps generated source text.
    #[must_use]
    pub fn new(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
        }
    }

    /// Returns the source text.
    #[must_use]
    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Returns a short hex fingerprint of the contents.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.contents.as_bytes());
        let mut hex = String::with_capacity(FINGERPRINT_BYTES * 2);
        for byte in digest.iter().take(FINGERPRINT_BYTES) {
            for nibble in [byte >> 4, byte & 0x0f] {
                if let Some(digit) = char::from_digit(u32::from(nibble), 16) {
                    hex.push(digit);
                }
            }
        }
        hex
    }

    /// Returns the deterministic file name `{server}_{fingerprint}.{ext}`.
    #[must_use]
    pub fn file_name(&self, server_name: &ServerName, language: LanguageVariant) -> String {
        format!(
            "{server_name}_{}.{}",
            self.fingerprint(),
            language.file_extension()
        )
    }
}
