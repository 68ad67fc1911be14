//! Custody ledger: per-asset balances held by the vault
//!
//! Balances live inside the core layout segment. Credits and debits use
//! checked arithmetic; a debit that would go negative fails before the
//! balance is touched.

use custody_types::{Address, Amount, AssetId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{ValidationError, VaultError};

/// Balances keyed by asset. Missing entries read as zero.
///
/// `BTreeMap` keeps the encoded layout deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustodyLedger {
    balances: BTreeMap<AssetId, Amount>,
}

impl CustodyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance held for `asset`.
    pub fn balance_of(&self, asset: &AssetId) -> Amount {
        self.balances.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    /// Assets with a recorded balance, in key order.
    pub fn assets(&self) -> impl Iterator<Item = (&AssetId, &Amount)> {
        self.balances.iter()
    }

    /// Sum of `amount` onto the current balance, without applying it.
    pub fn credited_balance(&self, asset: &AssetId, amount: Amount) -> Result<Amount, VaultError> {
        self.balance_of(asset)
            .checked_add(amount)
            .ok_or_else(|| ValidationError::Overflow.into())
    }

    /// Add `amount` to the balance of `asset`. Returns the new balance.
    pub fn credit(&mut self, asset: &AssetId, amount: Amount) -> Result<Amount, VaultError> {
        let new_balance = self.credited_balance(asset, amount)?;
        self.balances.insert(*asset, new_balance);
        Ok(new_balance)
    }

    /// Fails with `InsufficientResource` if the balance is below `amount`.
    pub fn ensure_available(&self, asset: &AssetId, amount: Amount) -> Result<(), VaultError> {
        let available = self.balance_of(asset);
        if available < amount {
            return Err(VaultError::InsufficientResource {
                asset: *asset,
                required: amount,
                available,
            });
        }
        Ok(())
    }

    /// Subtract `amount` from the balance of `asset`. Returns the new balance.
    pub fn debit(&mut self, asset: &AssetId, amount: Amount) -> Result<Amount, VaultError> {
        self.ensure_available(asset, amount)?;
        let new_balance = self
            .balance_of(asset)
            .checked_sub(amount)
            .ok_or(ValidationError::Overflow)?;
        self.balances.insert(*asset, new_balance);
        Ok(new_balance)
    }
}

/// Shared input validation for custody entry points.
pub fn validate_amount(amount: Amount) -> Result<(), ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount { amount });
    }
    Ok(())
}

pub fn validate_asset(asset: &AssetId) -> Result<(), ValidationError> {
    if asset.is_null() {
        return Err(ValidationError::NullAsset);
    }
    Ok(())
}

pub fn validate_recipient(to: &Address) -> Result<(), ValidationError> {
    if to.is_null() {
        return Err(ValidationError::NullRecipient);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usdc() -> AssetId {
        AssetId::derive("USDC")
    }

    #[test]
    fn test_empty_balance_is_zero() {
        let ledger = CustodyLedger::new();
        assert_eq!(ledger.balance_of(&usdc()), Decimal::ZERO);
    }

    #[test]
    fn test_credit_accumulates() {
        let mut ledger = CustodyLedger::new();
        ledger.credit(&usdc(), Decimal::from(1000)).unwrap();
        let after = ledger.credit(&usdc(), Decimal::from(500)).unwrap();
        assert_eq!(after, Decimal::from(1500));
        assert_eq!(ledger.balance_of(&usdc()), Decimal::from(1500));
    }

    #[test]
    fn test_credit_overflow_leaves_balance() {
        let mut ledger = CustodyLedger::new();
        ledger.credit(&usdc(), Decimal::MAX).unwrap();
        let result = ledger.credit(&usdc(), Decimal::ONE);
        assert_eq!(result, Err(VaultError::Validation(ValidationError::Overflow)));
        assert_eq!(ledger.balance_of(&usdc()), Decimal::MAX);
    }

    #[test]
    fn test_debit_success() {
        let mut ledger = CustodyLedger::new();
        ledger.credit(&usdc(), Decimal::from(10)).unwrap();
        assert_eq!(ledger.debit(&usdc(), Decimal::from(3)).unwrap(), Decimal::from(7));
    }

    #[test]
    fn test_debit_insufficient_is_untouched() {
        let mut ledger = CustodyLedger::new();
        ledger.credit(&usdc(), Decimal::from(1)).unwrap();
        let result = ledger.debit(&usdc(), Decimal::from(5));
        assert_eq!(
            result,
            Err(VaultError::InsufficientResource {
                asset: usdc(),
                required: Decimal::from(5),
                available: Decimal::from(1),
            })
        );
        assert_eq!(ledger.balance_of(&usdc()), Decimal::from(1));
    }

    #[test]
    fn test_debit_to_zero() {
        let mut ledger = CustodyLedger::new();
        ledger.credit(&usdc(), Decimal::from(4)).unwrap();
        assert_eq!(ledger.debit(&usdc(), Decimal::from(4)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(Decimal::ONE).is_ok());
        assert_eq!(
            validate_amount(Decimal::ZERO),
            Err(ValidationError::NonPositiveAmount {
                amount: Decimal::ZERO
            })
        );
        assert!(validate_amount(Decimal::from(-1)).is_err());
    }

    #[test]
    fn test_validate_identities() {
        assert_eq!(validate_asset(&AssetId::NULL), Err(ValidationError::NullAsset));
        assert_eq!(
            validate_recipient(&Address::ZERO),
            Err(ValidationError::NullRecipient)
        );
        assert!(validate_asset(&usdc()).is_ok());
    }
}
