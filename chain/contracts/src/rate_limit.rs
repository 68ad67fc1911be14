//! Withdrawal rate limiting
//!
//! Two independent rules, both configured in the limits segment:
//! - interval: at most one withdrawal per asset every `min_interval` seconds
//! - magnitude: no single withdrawal above `max_per_operation`
//!
//! Zero disables either rule. An asset that has never been withdrawn is
//! exempt from the interval rule.

use custody_types::numeric::duration_to_offset;
use custody_types::{Amount, AssetId, Timestamp};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::errors::RateLimitError;
use crate::layout::LimitsSegment;

/// Which rules a withdrawal is subject to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawMode {
    /// Interval and magnitude.
    Standard,
    /// Magnitude only.
    Emergency,
}

impl WithdrawMode {
    pub fn is_emergency(&self) -> bool {
        matches!(self, WithdrawMode::Emergency)
    }
}

/// Read-only view of the limiter parameters and per-asset history.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter<'a> {
    max_per_operation: Amount,
    min_interval: u64,
    last_operation_at: &'a BTreeMap<AssetId, Timestamp>,
}

impl<'a> RateLimiter<'a> {
    pub fn new(segment: &'a LimitsSegment) -> Self {
        Self {
            max_per_operation: segment.max_per_operation,
            min_interval: segment.min_interval,
            last_operation_at: &segment.last_operation_at,
        }
    }

    /// Last withdrawal time for `asset`, `None` if never operated on.
    pub fn last_operation_at(&self, asset: &AssetId) -> Option<Timestamp> {
        self.last_operation_at
            .get(asset)
            .copied()
            .filter(|at| *at != 0)
    }

    /// Earliest time at which the interval rule admits a withdrawal.
    pub fn next_available_at(&self, asset: &AssetId, now: Timestamp) -> Timestamp {
        match self.last_operation_at(asset) {
            Some(last) => now.max(last.saturating_add(duration_to_offset(self.min_interval))),
            None => now,
        }
    }

    pub fn check_interval(&self, asset: &AssetId, now: Timestamp) -> Result<(), RateLimitError> {
        if self.last_operation_at(asset).is_none() {
            return Ok(());
        }
        let available_at = self.next_available_at(asset, now);
        if now < available_at {
            return Err(RateLimitError::TooSoon {
                asset: *asset,
                available_at,
            });
        }
        Ok(())
    }

    pub fn check_magnitude(&self, amount: Amount) -> Result<(), RateLimitError> {
        if self.max_per_operation != Decimal::ZERO && amount > self.max_per_operation {
            return Err(RateLimitError::ExceedsCap {
                cap: self.max_per_operation,
                requested: amount,
            });
        }
        Ok(())
    }

    /// Apply the rules for `mode`: interval first, then magnitude.
    pub fn check(
        &self,
        asset: &AssetId,
        amount: Amount,
        now: Timestamp,
        mode: WithdrawMode,
    ) -> Result<(), RateLimitError> {
        if !mode.is_emergency() {
            self.check_interval(asset, now)?;
        }
        self.check_magnitude(amount)
    }
}

/// Stamp a withdrawal on `asset`.
///
/// The stamp never moves backwards, so a caller-supplied `now` older than the
/// last withdrawal cannot shorten the interval.
pub fn record_operation(segment: &mut LimitsSegment, asset: &AssetId, now: Timestamp) {
    let stamp = segment.last_operation_at.entry(*asset).or_insert(now);
    *stamp = (*stamp).max(now);
}

/// Put back the stamp a refunded withdrawal replaced.
pub fn restore_operation(
    segment: &mut LimitsSegment,
    asset: &AssetId,
    previous: Option<Timestamp>,
) {
    match previous {
        Some(at) => {
            segment.last_operation_at.insert(*asset, at);
        }
        None => {
            segment.last_operation_at.remove(asset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> AssetId {
        AssetId::derive("WETH")
    }

    fn segment(max: i64, interval: u64) -> LimitsSegment {
        LimitsSegment::new(Decimal::from(max), interval)
    }

    #[test]
    fn test_never_operated_is_exempt() {
        let seg = segment(0, 86_400);
        let limiter = RateLimiter::new(&seg);
        assert!(limiter.check_interval(&asset(), 10).is_ok());
        assert_eq!(limiter.next_available_at(&asset(), 10), 10);
    }

    #[test]
    fn test_zero_timestamp_reads_as_never() {
        let mut seg = segment(0, 86_400);
        record_operation(&mut seg, &asset(), 0);
        let limiter = RateLimiter::new(&seg);
        assert_eq!(limiter.last_operation_at(&asset()), None);
        assert!(limiter.check_interval(&asset(), 1).is_ok());
    }

    #[test]
    fn test_stamp_never_moves_backwards() {
        let mut seg = segment(0, 100);
        record_operation(&mut seg, &asset(), 1_000);
        record_operation(&mut seg, &asset(), 900);
        let limiter = RateLimiter::new(&seg);
        assert_eq!(limiter.last_operation_at(&asset()), Some(1_000));
        assert_eq!(limiter.next_available_at(&asset(), 950), 1_100);

        record_operation(&mut seg, &asset(), 1_200);
        assert_eq!(seg.last_operation_at.get(&asset()), Some(&1_200));
    }

    #[test]
    fn test_restore_operation() {
        let mut seg = segment(0, 100);
        record_operation(&mut seg, &asset(), 1_000);
        restore_operation(&mut seg, &asset(), None);
        assert!(seg.last_operation_at.is_empty());

        record_operation(&mut seg, &asset(), 2_000);
        restore_operation(&mut seg, &asset(), Some(1_500));
        assert_eq!(seg.last_operation_at.get(&asset()), Some(&1_500));
    }

    #[test]
    fn test_interval_boundary() {
        let mut seg = segment(0, 100);
        record_operation(&mut seg, &asset(), 1_000);
        let limiter = RateLimiter::new(&seg);
        assert_eq!(
            limiter.check_interval(&asset(), 1_099),
            Err(RateLimitError::TooSoon {
                asset: asset(),
                available_at: 1_100,
            })
        );
        assert!(limiter.check_interval(&asset(), 1_100).is_ok());
    }

    #[test]
    fn test_next_available_never_before_now() {
        let mut seg = segment(0, 100);
        record_operation(&mut seg, &asset(), 1_000);
        let limiter = RateLimiter::new(&seg);
        assert_eq!(limiter.next_available_at(&asset(), 1_050), 1_100);
        assert_eq!(limiter.next_available_at(&asset(), 5_000), 5_000);
    }

    #[test]
    fn test_huge_interval_saturates() {
        let mut seg = segment(0, u64::MAX);
        record_operation(&mut seg, &asset(), 1_000);
        let limiter = RateLimiter::new(&seg);
        assert_eq!(limiter.next_available_at(&asset(), 2_000), i64::MAX);
    }

    #[test]
    fn test_magnitude_cap() {
        let seg = segment(50, 0);
        let limiter = RateLimiter::new(&seg);
        assert!(limiter.check_magnitude(Decimal::from(50)).is_ok());
        assert_eq!(
            limiter.check_magnitude(Decimal::from(51)),
            Err(RateLimitError::ExceedsCap {
                cap: Decimal::from(50),
                requested: Decimal::from(51),
            })
        );
    }

    #[test]
    fn test_zero_cap_is_unlimited() {
        let seg = segment(0, 0);
        let limiter = RateLimiter::new(&seg);
        assert!(limiter.check_magnitude(Decimal::MAX).is_ok());
    }

    #[test]
    fn test_emergency_skips_interval_only() {
        let mut seg = segment(50, 100);
        record_operation(&mut seg, &asset(), 1_000);
        let limiter = RateLimiter::new(&seg);
        assert!(limiter
            .check(&asset(), Decimal::from(10), 1_001, WithdrawMode::Emergency)
            .is_ok());
        assert!(matches!(
            limiter.check(&asset(), Decimal::from(10), 1_001, WithdrawMode::Standard),
            Err(RateLimitError::TooSoon { .. })
        ));
        assert!(matches!(
            limiter.check(&asset(), Decimal::from(51), 1_001, WithdrawMode::Emergency),
            Err(RateLimitError::ExceedsCap { .. })
        ));
    }
}
