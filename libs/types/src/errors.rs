//! Error types for identity parsing

use thiserror::Error;

/// Failure to parse a textual identity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityParseError {
    #[error("Missing 0x prefix: {input}")]
    MissingPrefix { input: String },

    #[error("Invalid hex in identity: {input}")]
    InvalidHex { input: String },

    #[error("Invalid identity length: expected 20 bytes, got {actual}")]
    InvalidLength { actual: usize },
}
