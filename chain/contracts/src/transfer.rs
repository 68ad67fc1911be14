//! Transfer adapter interface
//!
//! The adapter moves value between external token contracts and the vault.
//! It is supplied by the surrounding environment and may run arbitrary code,
//! including calls back into the vault it is handed.
//!
//! The vault accepts only an explicit receipt for exactly the requested asset
//! and amount. Anything else is a failed transfer and aborts the operation.

use custody_types::{Address, Amount, AssetId};

use crate::errors::{TransferError, VaultError};
use crate::vault::CustodyVault;

/// Proof that a transfer completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReceipt {
    pub asset: AssetId,
    pub amount: Amount,
}

impl TransferReceipt {
    pub fn new(asset: AssetId, amount: Amount) -> Self {
        Self { asset, amount }
    }
}

/// External collaborator that moves asset value in and out of custody.
///
/// Both calls are all-or-nothing. `vault` is the vault that issued the call;
/// an adapter may re-enter it.
pub trait TransferAdapter {
    /// Move `amount` of `asset` from `from` into custody.
    fn pull(
        &mut self,
        vault: &mut CustodyVault,
        asset: &AssetId,
        from: &Address,
        amount: Amount,
    ) -> Result<TransferReceipt, TransferError>;

    /// Move `amount` of `asset` out of custody to `to`.
    fn push(
        &mut self,
        vault: &mut CustodyVault,
        asset: &AssetId,
        to: &Address,
        amount: Amount,
    ) -> Result<TransferReceipt, TransferError>;
}

/// Accept `receipt` only if it matches the request exactly.
pub fn verify_receipt(
    receipt: &TransferReceipt,
    asset: &AssetId,
    amount: Amount,
) -> Result<(), TransferError> {
    if receipt.asset != *asset {
        return Err(TransferError::AssetMismatch {
            expected: *asset,
            actual: receipt.asset,
        });
    }
    if receipt.amount != amount {
        return Err(TransferError::AmountMismatch {
            expected: amount,
            moved: receipt.amount,
        });
    }
    Ok(())
}

pub(crate) fn pull_exact(
    adapter: &mut dyn TransferAdapter,
    vault: &mut CustodyVault,
    asset: &AssetId,
    from: &Address,
    amount: Amount,
) -> Result<(), VaultError> {
    let receipt = adapter.pull(vault, asset, from, amount)?;
    verify_receipt(&receipt, asset, amount)?;
    Ok(())
}

pub(crate) fn push_exact(
    adapter: &mut dyn TransferAdapter,
    vault: &mut CustodyVault,
    asset: &AssetId,
    to: &Address,
    amount: Amount,
) -> Result<(), VaultError> {
    let receipt = adapter.push(vault, asset, to, amount)?;
    verify_receipt(&receipt, asset, amount)?;
    Ok(())
}
