//! Amount and time primitives
//!
//! Amounts use rust_decimal for deterministic arithmetic. The contract layer
//! treats any amount `<= 0` as invalid input, so the sign bit never reaches
//! a persisted balance.

use rust_decimal::Decimal;

/// Quantity of a fungible asset.
pub type Amount = Decimal;

/// Unix timestamp in seconds. `0` means "never".
pub type Timestamp = i64;

/// Convert a duration in seconds into a timestamp offset, saturating at
/// `i64::MAX` for durations that do not fit.
pub fn duration_to_offset(seconds: u64) -> Timestamp {
    Timestamp::try_from(seconds).unwrap_or(Timestamp::MAX)
}
