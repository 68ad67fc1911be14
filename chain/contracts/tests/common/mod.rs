//! Shared fixtures for the custody vault integration tests.

#![allow(dead_code)]

use custody_contracts::errors::{TransferError, VaultError};
use custody_contracts::store::{LayoutId, MemoryStore};
use custody_contracts::transfer::{TransferAdapter, TransferReceipt};
use custody_contracts::CustodyVault;
use custody_types::{Address, Amount, AssetId};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

pub const DAY: u64 = 86_400;

pub fn owner() -> Address {
    Address::derive("owner")
}

pub fn user() -> Address {
    Address::derive("user")
}

pub fn attacker() -> Address {
    Address::derive("attacker")
}

pub fn asset() -> AssetId {
    AssetId::derive("USDC")
}

pub fn dec(value: i64) -> Decimal {
    Decimal::from(value)
}

/// Route vault logs to the test harness. Set `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Uninitialized vault over a fresh in-memory store.
pub fn fresh_vault() -> CustodyVault {
    init_tracing();
    let id = LayoutId::new("integration-vault").unwrap();
    CustodyVault::open(Box::new(MemoryStore::new()), id).unwrap()
}

/// Initialized v1 vault holding `amount` of `asset()`.
pub fn funded_vault(amount: i64) -> CustodyVault {
    let mut vault = fresh_vault();
    vault.genesis_init(owner()).unwrap();
    vault
        .deposit(&mut MockToken::new(), &user(), &asset(), dec(amount))
        .unwrap();
    vault
}

/// v2 vault holding `amount` of `asset()`.
pub fn v2_vault(amount: i64, max_per_operation: i64, min_interval: u64) -> CustodyVault {
    let mut vault = funded_vault(amount);
    vault
        .upgrade_to_v2(&owner(), dec(max_per_operation), min_interval)
        .unwrap();
    vault.drain_events();
    vault
}

/// How the mock token answers a transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenBehavior {
    /// Moves exactly the requested amount.
    Exact,
    /// Moves less than requested (fee-on-transfer token).
    ShortChange(Amount),
    /// Refuses the transfer.
    Refuse,
}

type Reentry = Box<dyn FnOnce(&mut CustodyVault, &mut MockToken) -> Result<Amount, VaultError>>;

/// Scriptable token simulating the external transfer step.
pub struct MockToken {
    pub behavior: TokenBehavior,
    /// Totals actually moved, by successful transfers only.
    pub pulled: Amount,
    pub pushed: Amount,
    /// Balance observed by the token at each push.
    pub balances_seen_on_push: Vec<Amount>,
    /// One-shot callback run inside the next push, before it completes.
    on_push: Option<Reentry>,
    /// Outcome of each re-entrant call.
    pub reentry_outcomes: Vec<Result<Amount, VaultError>>,
}

impl MockToken {
    pub fn new() -> Self {
        Self::with_behavior(TokenBehavior::Exact)
    }

    pub fn with_behavior(behavior: TokenBehavior) -> Self {
        Self {
            behavior,
            pulled: Decimal::ZERO,
            pushed: Decimal::ZERO,
            balances_seen_on_push: Vec::new(),
            on_push: None,
            reentry_outcomes: Vec::new(),
        }
    }

    /// Re-enter the vault from inside the next push.
    pub fn reenter_on_push(
        mut self,
        call: impl FnOnce(&mut CustodyVault, &mut MockToken) -> Result<Amount, VaultError> + 'static,
    ) -> Self {
        self.on_push = Some(Box::new(call));
        self
    }

    fn settle(&self, asset: &AssetId, amount: Amount) -> Result<TransferReceipt, TransferError> {
        match self.behavior {
            TokenBehavior::Exact => Ok(TransferReceipt::new(*asset, amount)),
            TokenBehavior::ShortChange(fee) => Ok(TransferReceipt::new(*asset, amount - fee)),
            TokenBehavior::Refuse => Err(TransferError::Rejected {
                reason: "transfer refused by token".to_string(),
            }),
        }
    }
}

impl Default for MockToken {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferAdapter for MockToken {
    fn pull(
        &mut self,
        _vault: &mut CustodyVault,
        asset: &AssetId,
        _from: &Address,
        amount: Amount,
    ) -> Result<TransferReceipt, TransferError> {
        let receipt = self.settle(asset, amount)?;
        self.pulled += receipt.amount;
        Ok(receipt)
    }

    fn push(
        &mut self,
        vault: &mut CustodyVault,
        asset: &AssetId,
        _to: &Address,
        amount: Amount,
    ) -> Result<TransferReceipt, TransferError> {
        if let Ok(balance) = vault.get_balance(asset) {
            self.balances_seen_on_push.push(balance);
        }
        if let Some(call) = self.on_push.take() {
            let outcome = call(vault, self);
            self.reentry_outcomes.push(outcome);
        }
        let receipt = self.settle(asset, amount)?;
        self.pushed += receipt.amount;
        Ok(receipt)
    }
}
