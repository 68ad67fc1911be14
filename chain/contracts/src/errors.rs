//! Contract-specific error types
//!
//! Every entry point returns `VaultError`. The per-concern enums nest into it
//! with `#[from]` so guards can use `?` directly. A returned error always means
//! the attempted state transition did not happen.

use custody_types::{Address, Amount, AssetId, Timestamp};
use thiserror::Error;

/// Malformed input to an entry point.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Asset identity is null")]
    NullAsset,

    #[error("Recipient identity is null")]
    NullRecipient,

    #[error("Owner identity is null")]
    NullOwner,

    #[error("Amount must be positive, got {amount}")]
    NonPositiveAmount { amount: Amount },

    #[error("Limit must not be negative, got {value}")]
    NegativeLimit { value: Amount },

    #[error("Arithmetic overflow in balance calculation")]
    Overflow,
}

/// Operation forbidden in the current circuit breaker state.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    #[error("Vault is paused")]
    Paused,

    #[error("Vault is not paused")]
    NotPaused,
}

/// Withdrawal throttled by the rate limiter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateLimitError {
    #[error("Too soon: {asset} is available again at {available_at}")]
    TooSoon {
        asset: AssetId,
        available_at: Timestamp,
    },

    #[error("Amount {requested} exceeds per-operation cap {cap}")]
    ExceedsCap { cap: Amount, requested: Amount },
}

/// Schema version mismatch or broken migration contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    #[error("Layout already initialized at schema version {current}")]
    AlreadyInitialized { current: u32 },

    #[error("Layout not initialized")]
    NotInitialized,

    #[error("Migration to v{target} does not follow schema v{current}")]
    VersionMismatch { current: u32, target: u32 },

    #[error("Migration to v{target} altered the owner")]
    OwnerChanged { target: u32 },

    #[error("Logic v{logic_version} requires schema v{required}, layout is at v{found}")]
    LogicSchemaMismatch {
        logic_version: u32,
        required: u32,
        found: u32,
    },

    #[error("Layout segment {segment} missing at schema v{schema_version}")]
    MissingSegment { segment: u32, schema_version: u32 },

    #[error("No logic available for schema v{schema_version}")]
    UnknownSchema { schema_version: u32 },
}

/// External transfer step failed or returned something other than an exact
/// success.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    #[error("Transfer rejected: {reason}")]
    Rejected { reason: String },

    #[error("Transfer moved {moved} instead of {expected}")]
    AmountMismatch { expected: Amount, moved: Amount },

    #[error("Transfer receipt names asset {actual}, expected {expected}")]
    AssetMismatch { expected: AssetId, actual: AssetId },
}

/// Failure reading or writing the persisted layout.
///
/// I/O errors are kept as messages so the whole taxonomy stays `Clone`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Corrupt layout record: {reason}")]
    Corrupt { reason: String },

    #[error("Integrity check failed: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Unsupported layout format: {0}")]
    UnsupportedFormat(u16),

    #[error("Invalid layout id: {0:?}")]
    InvalidLayoutId(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Encoding(err.to_string())
    }
}

/// Failure loading a `VaultConfig`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(String),

    #[error("Invalid config: {0}")]
    Parse(String),
}

/// Top-level error returned by every vault entry point.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VaultError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unauthorized: {caller} is not the owner")]
    Authorization { caller: Address },

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Rate limit: {0}")]
    RateLimit(#[from] RateLimitError),

    #[error("Insufficient balance for {asset}: required {required}, available {available}")]
    InsufficientResource {
        asset: AssetId,
        required: Amount,
        available: Amount,
    },

    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    #[error("Transfer adapter error: {0}")]
    TransferAdapter(#[from] TransferError),

    #[error("Operation `{operation}` is not provided by logic v{logic_version}")]
    Unsupported {
        operation: &'static str,
        logic_version: u32,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_mismatch_display() {
        let err = MigrationError::VersionMismatch {
            current: 2,
            target: 2,
        };
        assert_eq!(
            err.to_string(),
            "Migration to v2 does not follow schema v2"
        );
    }

    #[test]
    fn test_rate_limit_display() {
        let err = RateLimitError::TooSoon {
            asset: AssetId::derive("USDC"),
            available_at: 86_400,
        };
        assert!(err.to_string().contains("86400"));
    }

    #[test]
    fn test_vault_error_from_state() {
        let err: VaultError = StateError::Paused.into();
        assert_eq!(err, VaultError::State(StateError::Paused));
    }

    #[test]
    fn test_store_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StoreError = io.into();
        assert!(matches!(err, StoreError::Io(msg) if msg.contains("gone")));
    }
}
