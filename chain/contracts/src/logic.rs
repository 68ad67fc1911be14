//! Replaceable vault logic
//!
//! The vault delegates every custody rule to the active `VaultLogic`. Logic
//! holds no state of its own; it reads and mutates the `StateLayout` it is
//! handed, so replacing it leaves the persisted record untouched.
//!
//! - `LogicV1` (schema 1): deposit, owner withdraw, balance query
//! - `LogicV2` (schema 2): adds the circuit breaker, rate limits and
//!   emergency withdraw

use custody_types::{Address, Amount, AssetId, Timestamp};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

use crate::errors::{MigrationError, ValidationError, VaultError};
use crate::layout::StateLayout;
use crate::ledger::{validate_amount, validate_asset, validate_recipient};
use crate::rate_limit::{record_operation, RateLimiter, WithdrawMode};

/// Parameters of an outbound transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawRequest {
    pub asset: AssetId,
    pub to: Address,
    pub amount: Amount,
}

/// Custody rules for one logic version.
///
/// Authorization is enforced by the vault before any of these run. Every
/// mutating method performs all of its checks before its first mutation.
pub trait VaultLogic: fmt::Debug + Send + Sync {
    fn version(&self) -> u32;

    /// Schema version this logic reads and writes.
    fn required_schema(&self) -> u32;

    /// Checks run before value is pulled into custody.
    fn check_deposit(
        &self,
        layout: &StateLayout,
        asset: &AssetId,
        amount: Amount,
    ) -> Result<(), VaultError>;

    /// Credit value already pulled into custody. Returns the new balance.
    ///
    /// `check_deposit` ran before the pull; the value has moved by now, so
    /// only the ledger's own overflow check applies.
    fn apply_deposit(
        &self,
        layout: &mut StateLayout,
        asset: &AssetId,
        amount: Amount,
    ) -> Result<Amount, VaultError> {
        layout.ledger_mut().credit(asset, amount)
    }

    /// Check and debit a withdrawal. Returns the new balance.
    fn withdraw(
        &self,
        layout: &mut StateLayout,
        request: &WithdrawRequest,
        now: Timestamp,
        mode: WithdrawMode,
    ) -> Result<Amount, VaultError>;

    fn pause(&self, _layout: &mut StateLayout) -> Result<(), VaultError> {
        Err(self.unsupported("pause"))
    }

    fn unpause(&self, _layout: &mut StateLayout) -> Result<(), VaultError> {
        Err(self.unsupported("unpause"))
    }

    /// Returns the previous value.
    fn set_max_per_operation(
        &self,
        _layout: &mut StateLayout,
        _value: Amount,
    ) -> Result<Amount, VaultError> {
        Err(self.unsupported("set_max_per_operation"))
    }

    /// Returns the previous value.
    fn set_min_interval(&self, _layout: &mut StateLayout, _value: u64) -> Result<u64, VaultError> {
        Err(self.unsupported("set_min_interval"))
    }

    fn is_paused(&self, _layout: &StateLayout) -> Result<bool, VaultError> {
        Err(self.unsupported("is_paused"))
    }

    fn max_per_operation(&self, _layout: &StateLayout) -> Result<Amount, VaultError> {
        Err(self.unsupported("get_max_per_operation"))
    }

    fn min_interval(&self, _layout: &StateLayout) -> Result<u64, VaultError> {
        Err(self.unsupported("get_min_interval"))
    }

    fn next_available_at(
        &self,
        _layout: &StateLayout,
        _asset: &AssetId,
        _now: Timestamp,
    ) -> Result<Timestamp, VaultError> {
        Err(self.unsupported("next_available_at"))
    }

    fn unsupported(&self, operation: &'static str) -> VaultError {
        VaultError::Unsupported {
            operation,
            logic_version: self.version(),
        }
    }
}

/// Logic able to drive a layout at `schema_version`.
///
/// Schema 0 runs v1 logic so genesis can be called.
pub fn logic_for_schema(schema_version: u32) -> Result<Arc<dyn VaultLogic>, MigrationError> {
    match schema_version {
        0 | 1 => Ok(Arc::new(LogicV1)),
        2 => Ok(Arc::new(LogicV2)),
        _ => Err(MigrationError::UnknownSchema { schema_version }),
    }
}

/// Fails unless `logic` reads the schema the layout is at.
pub fn ensure_compatible(logic: &dyn VaultLogic, schema_version: u32) -> Result<(), MigrationError> {
    let required = logic.required_schema();
    let pending_genesis = schema_version == 0 && required == 1;
    if schema_version != required && !pending_genesis {
        return Err(MigrationError::LogicSchemaMismatch {
            logic_version: logic.version(),
            required,
            found: schema_version,
        });
    }
    Ok(())
}

fn validate_withdraw(request: &WithdrawRequest) -> Result<(), ValidationError> {
    validate_asset(&request.asset)?;
    validate_recipient(&request.to)?;
    validate_amount(request.amount)
}

// ───────────────────────── v1 ─────────────────────────

/// Genesis logic: an owner-controlled collection point with no limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogicV1;

impl VaultLogic for LogicV1 {
    fn version(&self) -> u32 {
        1
    }

    fn required_schema(&self) -> u32 {
        1
    }

    fn check_deposit(
        &self,
        layout: &StateLayout,
        asset: &AssetId,
        amount: Amount,
    ) -> Result<(), VaultError> {
        validate_asset(asset)?;
        validate_amount(amount)?;
        layout.ledger().credited_balance(asset, amount)?;
        Ok(())
    }

    fn withdraw(
        &self,
        layout: &mut StateLayout,
        request: &WithdrawRequest,
        _now: Timestamp,
        mode: WithdrawMode,
    ) -> Result<Amount, VaultError> {
        if mode.is_emergency() {
            return Err(self.unsupported("emergency_withdraw"));
        }
        validate_withdraw(request)?;
        layout.ledger_mut().debit(&request.asset, request.amount)
    }
}

// ───────────────────────── v2 ─────────────────────────

/// Rate-limited logic with a circuit breaker.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogicV2;

impl VaultLogic for LogicV2 {
    fn version(&self) -> u32 {
        2
    }

    fn required_schema(&self) -> u32 {
        2
    }

    fn check_deposit(
        &self,
        layout: &StateLayout,
        asset: &AssetId,
        amount: Amount,
    ) -> Result<(), VaultError> {
        validate_asset(asset)?;
        validate_amount(amount)?;
        layout.limits()?.breaker.ensure_active()?;
        layout.ledger().credited_balance(asset, amount)?;
        Ok(())
    }

    fn withdraw(
        &self,
        layout: &mut StateLayout,
        request: &WithdrawRequest,
        now: Timestamp,
        mode: WithdrawMode,
    ) -> Result<Amount, VaultError> {
        // Checks
        validate_withdraw(request)?;
        let limits = layout.limits()?;
        limits.breaker.ensure_active()?;
        RateLimiter::new(limits).check(&request.asset, request.amount, now, mode)?;
        layout.ledger().ensure_available(&request.asset, request.amount)?;

        // Effects
        let balance_after = layout.ledger_mut().debit(&request.asset, request.amount)?;
        record_operation(layout.limits_mut()?, &request.asset, now);
        Ok(balance_after)
    }

    fn pause(&self, layout: &mut StateLayout) -> Result<(), VaultError> {
        layout.limits_mut()?.breaker.pause()?;
        Ok(())
    }

    fn unpause(&self, layout: &mut StateLayout) -> Result<(), VaultError> {
        layout.limits_mut()?.breaker.unpause()?;
        Ok(())
    }

    fn set_max_per_operation(
        &self,
        layout: &mut StateLayout,
        value: Amount,
    ) -> Result<Amount, VaultError> {
        if value < Decimal::ZERO {
            return Err(ValidationError::NegativeLimit { value }.into());
        }
        let limits = layout.limits_mut()?;
        Ok(std::mem::replace(&mut limits.max_per_operation, value))
    }

    fn set_min_interval(&self, layout: &mut StateLayout, value: u64) -> Result<u64, VaultError> {
        let limits = layout.limits_mut()?;
        Ok(std::mem::replace(&mut limits.min_interval, value))
    }

    fn is_paused(&self, layout: &StateLayout) -> Result<bool, VaultError> {
        Ok(layout.limits()?.breaker.is_paused())
    }

    fn max_per_operation(&self, layout: &StateLayout) -> Result<Amount, VaultError> {
        Ok(layout.limits()?.max_per_operation)
    }

    fn min_interval(&self, layout: &StateLayout) -> Result<u64, VaultError> {
        Ok(layout.limits()?.min_interval)
    }

    fn next_available_at(
        &self,
        layout: &StateLayout,
        asset: &AssetId,
        now: Timestamp,
    ) -> Result<Timestamp, VaultError> {
        Ok(RateLimiter::new(layout.limits()?).next_available_at(asset, now))
    }
}
