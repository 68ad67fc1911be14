//! Upgradeable custody vault
//!
//! A vault that holds fungible assets on behalf of a single owner, with its
//! persisted state layout decoupled from the logic that drives it. The logic
//! can be replaced in place; the record and the address callers use stay
//! put.
//!
//! # Modules
//! - `vault`: `CustodyVault`, the stable entry point (proxy)
//! - `logic`: Replaceable custody rules (`LogicV1`, `LogicV2`)
//! - `layout`: Segmented, append-only persisted state layout
//! - `migration`: Genesis and one-time schema migrations
//! - `store`: Layout record stores (memory, file)
//! - `ledger`: Per-asset balances and input validation
//! - `rate_limit`: Per-asset withdrawal interval and per-operation cap
//! - `security`: Owner gate and circuit breaker
//! - `transfer`: External transfer adapter interface
//! - `config`: JSON vault configuration
//! - `events`: Contract events
//! - `errors`: Contract-specific error types

pub mod config;
pub mod errors;
pub mod events;
pub mod layout;
pub mod ledger;
pub mod logic;
pub mod migration;
pub mod rate_limit;
pub mod security;
pub mod store;
pub mod transfer;
pub mod vault;

pub use config::{V2Defaults, VaultConfig};
pub use errors::VaultError;
pub use events::ContractEvent;
pub use layout::StateLayout;
pub use logic::{LogicV1, LogicV2, VaultLogic};
pub use migration::{MigrateToV2, Migration};
pub use store::{FileStore, LayoutId, LayoutStore, MemoryStore};
pub use transfer::{TransferAdapter, TransferReceipt};
pub use vault::CustodyVault;

/// Contract ABI version, frozen after release
pub const CONTRACT_ABI_VERSION: &str = "1.0.0";
