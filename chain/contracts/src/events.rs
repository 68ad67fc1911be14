//! Contract events
//!
//! Events are immutable records emitted by successful entry points. A failed
//! entry point emits nothing, and an operation rolled back after a failed
//! transfer also discards the events emitted during it.

use custody_types::{Address, Amount, AssetId, OperationId, Timestamp};
use serde::{Deserialize, Serialize};

/// Genesis initialization completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initialized {
    pub owner: Address,
    pub schema_version: u32,
}

/// Schema migration applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migrated {
    pub from_version: u32,
    pub to_version: u32,
}

/// Active logic replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicUpgraded {
    pub from_logic: u32,
    pub to_logic: u32,
    pub upgraded_by: Address,
}

/// Value pulled into custody.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposited {
    pub operation_id: OperationId,
    pub asset: AssetId,
    pub from: Address,
    pub amount: Amount,
    pub balance_after: Amount,
}

/// Value pushed out of custody.
///
/// `emergency` is set for withdrawals that bypassed the interval rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawn {
    pub operation_id: OperationId,
    pub asset: AssetId,
    pub to: Address,
    pub amount: Amount,
    pub balance_after: Amount,
    pub at: Timestamp,
    pub emergency: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paused {
    pub by: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unpaused {
    pub by: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxPerOperationUpdated {
    pub old: Amount,
    pub new: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinIntervalUpdated {
    pub old: u64,
    pub new: u64,
}

/// Enum wrapper for all contract events, enabling uniform handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractEvent {
    Initialized(Initialized),
    Migrated(Migrated),
    LogicUpgraded(LogicUpgraded),
    Deposited(Deposited),
    Withdrawn(Withdrawn),
    Paused(Paused),
    Unpaused(Unpaused),
    MaxPerOperationUpdated(MaxPerOperationUpdated),
    MinIntervalUpdated(MinIntervalUpdated),
}
