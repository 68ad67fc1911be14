//! Custody vault: the stable entry point
//!
//! `CustodyVault` is the proxy that callers hold across upgrades. It owns the
//! pointer to the persisted layout record and a replaceable `VaultLogic`, and
//! routes every operation to the active logic against that record.
//!
//! Every state-changing entry point runs:
//! 1. Authorization (owner-gated operations)
//! 2. Validation, breaker and rate limits (inside the logic)
//! 3. Effects, committed to the store
//! 4. External transfer through the `TransferAdapter`
//! 5. Event emission
//!
//! The adapter may re-enter the vault. A re-entrant call that succeeds stays
//! in effect even if the outer transfer then fails: a failed withdrawal only
//! refunds its own debit on top of the current record, and a failed deposit
//! never credited anything.

use custody_types::{Address, Amount, AssetId, OperationId, Timestamp};
use std::sync::Arc;

use crate::config::VaultConfig;
use crate::errors::{MigrationError, VaultError};
use crate::events::{
    ContractEvent, Deposited, Initialized, LogicUpgraded, MaxPerOperationUpdated, Migrated,
    MinIntervalUpdated, Paused, Unpaused, Withdrawn,
};
use crate::layout::StateLayout;
use crate::logic::{ensure_compatible, logic_for_schema, LogicV2, VaultLogic, WithdrawRequest};
use crate::migration::{MigrateToV2, Migration, MigrationController};
use crate::rate_limit::{restore_operation, WithdrawMode};
use crate::security::AuthorizationGate;
use crate::store::{LayoutId, LayoutStore};
use crate::transfer::{self, TransferAdapter};

/// Upgradeable custody vault.
#[derive(Debug)]
pub struct CustodyVault {
    store: Box<dyn LayoutStore>,
    layout_id: LayoutId,
    logic: Arc<dyn VaultLogic>,
    /// Emitted events log (append-only between drains)
    events: Vec<ContractEvent>,
    /// Withdrawals whose transfer completed, in this process
    completed_withdrawals: u64,
}

/// What a withdrawal changed before its transfer, for the refund path.
struct PendingWithdrawal {
    request: WithdrawRequest,
    previous_stamp: Option<Timestamp>,
    completed_before: u64,
}

impl CustodyVault {
    /// Attach to `layout_id`, selecting the logic for the record's schema.
    pub fn open(store: Box<dyn LayoutStore>, layout_id: LayoutId) -> Result<Self, VaultError> {
        let schema_version = read_layout(store.as_ref(), &layout_id)?.schema_version();
        let logic = logic_for_schema(schema_version)?;
        tracing::info!(
            layout_id = %layout_id,
            schema_version,
            logic_version = logic.version(),
            "Opened custody vault"
        );
        Ok(Self {
            store,
            layout_id,
            logic,
            events: Vec::new(),
            completed_withdrawals: 0,
        })
    }

    /// Attach to `layout_id` with an explicit logic.
    pub fn with_logic(
        store: Box<dyn LayoutStore>,
        layout_id: LayoutId,
        logic: Arc<dyn VaultLogic>,
    ) -> Result<Self, VaultError> {
        let schema_version = read_layout(store.as_ref(), &layout_id)?.schema_version();
        ensure_compatible(logic.as_ref(), schema_version)?;
        Ok(Self {
            store,
            layout_id,
            logic,
            events: Vec::new(),
            completed_withdrawals: 0,
        })
    }

    pub fn from_config(config: &VaultConfig) -> Result<Self, VaultError> {
        let store = config.open_store()?;
        Self::open(store, config.layout_id()?)
    }

    /// Detach, handing back the store.
    pub fn into_store(self) -> Box<dyn LayoutStore> {
        self.store
    }

    // ───────────────────────── Lifecycle ─────────────────────────

    /// Genesis: set the owner and move the schema from 0 to 1.
    ///
    /// Callable by anyone, exactly once per layout.
    pub fn genesis_init(&mut self, owner: Address) -> Result<(), VaultError> {
        let layout = self.load()?;
        let staged = MigrationController::genesis(&layout, owner)?;
        ensure_compatible(self.logic.as_ref(), staged.schema_version())?;
        self.commit(&staged)?;

        tracing::info!(layout_id = %self.layout_id, owner = %owner, "Vault initialized");
        self.emit(ContractEvent::Initialized(Initialized {
            owner,
            schema_version: staged.schema_version(),
        }));
        Ok(())
    }

    /// Run `migration` and replace the active logic with `logic`. Owner-only.
    ///
    /// Both happen together or not at all.
    pub fn upgrade_to(
        &mut self,
        caller: &Address,
        logic: Arc<dyn VaultLogic>,
        migration: &dyn Migration,
    ) -> Result<(), VaultError> {
        let layout = self.load()?;
        AuthorizationGate::for_layout(&layout)?.require_owner(caller)?;

        let staged = MigrationController::migrate(&layout, migration)?;
        ensure_compatible(logic.as_ref(), staged.schema_version())?;
        self.commit(&staged)?;
        let previous = std::mem::replace(&mut self.logic, logic);

        tracing::info!(
            layout_id = %self.layout_id,
            from_schema = layout.schema_version(),
            to_schema = staged.schema_version(),
            from_logic = previous.version(),
            to_logic = self.logic.version(),
            "Vault upgraded"
        );
        self.emit(ContractEvent::Migrated(Migrated {
            from_version: layout.schema_version(),
            to_version: staged.schema_version(),
        }));
        self.emit(ContractEvent::LogicUpgraded(LogicUpgraded {
            from_logic: previous.version(),
            to_logic: self.logic.version(),
            upgraded_by: *caller,
        }));
        Ok(())
    }

    /// Upgrade to v2 logic, seeding the rate limiter and an unpaused breaker.
    pub fn upgrade_to_v2(
        &mut self,
        caller: &Address,
        max_per_operation: Amount,
        min_interval: u64,
    ) -> Result<(), VaultError> {
        self.upgrade_to(
            caller,
            Arc::new(LogicV2),
            &MigrateToV2::new(max_per_operation, min_interval),
        )
    }

    // ───────────────────────── Custody ─────────────────────────

    /// Pull `amount` of `asset` from `caller` into custody and credit it.
    ///
    /// Callable by anyone. Returns the new balance.
    pub fn deposit(
        &mut self,
        adapter: &mut dyn TransferAdapter,
        caller: &Address,
        asset: &AssetId,
        amount: Amount,
    ) -> Result<Amount, VaultError> {
        let layout = self.load()?;
        require_initialized(&layout)?;
        if let Err(err) = self.logic.check_deposit(&layout, asset, amount) {
            return Err(reject("deposit", err));
        }

        // Nothing is committed before the pull, so a failed pull has nothing
        // to undo.
        if let Err(err) = transfer::pull_exact(adapter, self, asset, caller, amount) {
            tracing::error!(asset = %asset, from = %caller, error = %err, "Deposit transfer failed");
            return Err(err);
        }
        let balance_after = match self.credit_pulled(asset, amount) {
            Ok(balance) => balance,
            Err(err) => {
                tracing::error!(
                    asset = %asset,
                    amount = %amount,
                    error = %err,
                    "Pulled value could not be credited"
                );
                return Err(err);
            }
        };

        tracing::debug!(asset = %asset, from = %caller, amount = %amount, "Deposit credited");
        self.emit(ContractEvent::Deposited(Deposited {
            operation_id: OperationId::new(),
            asset: *asset,
            from: *caller,
            amount,
            balance_after,
        }));
        Ok(balance_after)
    }

    /// Withdraw `amount` of `asset` to `to`. Owner-only.
    ///
    /// Returns the new balance.
    pub fn withdraw(
        &mut self,
        adapter: &mut dyn TransferAdapter,
        caller: &Address,
        asset: &AssetId,
        to: &Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<Amount, VaultError> {
        let request = WithdrawRequest {
            asset: *asset,
            to: *to,
            amount,
        };
        self.withdraw_with_mode(adapter, caller, request, now, WithdrawMode::Standard)
    }

    /// Withdraw bypassing the interval rule. Owner-only; requires v2 logic.
    ///
    /// The cap and the breaker still apply.
    pub fn emergency_withdraw(
        &mut self,
        adapter: &mut dyn TransferAdapter,
        caller: &Address,
        asset: &AssetId,
        to: &Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<Amount, VaultError> {
        let request = WithdrawRequest {
            asset: *asset,
            to: *to,
            amount,
        };
        self.withdraw_with_mode(adapter, caller, request, now, WithdrawMode::Emergency)
    }

    fn withdraw_with_mode(
        &mut self,
        adapter: &mut dyn TransferAdapter,
        caller: &Address,
        request: WithdrawRequest,
        now: Timestamp,
        mode: WithdrawMode,
    ) -> Result<Amount, VaultError> {
        let operation = if mode.is_emergency() {
            "emergency_withdraw"
        } else {
            "withdraw"
        };

        // Checks
        let mut layout = self.load()?;
        AuthorizationGate::for_layout(&layout)?.require_owner(caller)?;
        let previous_stamp = last_operation_at(&layout, &request.asset);
        let balance_after = match self.logic.withdraw(&mut layout, &request, now, mode) {
            Ok(balance) => balance,
            Err(err) => return Err(reject(operation, err)),
        };

        // Effects
        self.commit(&layout)?;

        // Interaction
        let pending = PendingWithdrawal {
            request,
            previous_stamp,
            completed_before: self.completed_withdrawals,
        };
        let pushed = transfer::push_exact(
            adapter,
            self,
            &request.asset,
            &request.to,
            request.amount,
        );
        if let Err(err) = pushed {
            self.refund_withdrawal(&pending, &err);
            return Err(err);
        }
        self.completed_withdrawals += 1;

        tracing::debug!(
            asset = %request.asset,
            to = %request.to,
            amount = %request.amount,
            emergency = mode.is_emergency(),
            "Withdrawal completed"
        );
        self.emit(ContractEvent::Withdrawn(Withdrawn {
            operation_id: OperationId::new(),
            asset: request.asset,
            to: request.to,
            amount: request.amount,
            balance_after,
            at: now,
            emergency: mode.is_emergency(),
        }));
        Ok(balance_after)
    }

    // ───────────────────────── Breaker & Limits ─────────────────────────

    /// Pause custody operations. Owner-only; requires v2 logic.
    pub fn pause(&mut self, caller: &Address) -> Result<(), VaultError> {
        self.owner_update(caller, |logic, layout| logic.pause(layout))?;
        tracing::info!(by = %caller, "Vault paused");
        self.emit(ContractEvent::Paused(Paused { by: *caller }));
        Ok(())
    }

    /// Resume custody operations. Owner-only; requires v2 logic.
    pub fn unpause(&mut self, caller: &Address) -> Result<(), VaultError> {
        self.owner_update(caller, |logic, layout| logic.unpause(layout))?;
        tracing::info!(by = %caller, "Vault unpaused");
        self.emit(ContractEvent::Unpaused(Unpaused { by: *caller }));
        Ok(())
    }

    /// Set the per-operation cap. `0` disables it.
    pub fn set_max_per_operation(
        &mut self,
        caller: &Address,
        value: Amount,
    ) -> Result<(), VaultError> {
        let old = self.owner_update(caller, |logic, layout| {
            logic.set_max_per_operation(layout, value)
        })?;
        tracing::info!(old = %old, new = %value, "Per-operation cap updated");
        self.emit(ContractEvent::MaxPerOperationUpdated(MaxPerOperationUpdated {
            old,
            new: value,
        }));
        Ok(())
    }

    /// Set the minimum interval in seconds. `0` disables it.
    pub fn set_min_interval(&mut self, caller: &Address, value: u64) -> Result<(), VaultError> {
        let old = self.owner_update(caller, |logic, layout| logic.set_min_interval(layout, value))?;
        tracing::info!(old, new = value, "Minimum interval updated");
        self.emit(ContractEvent::MinIntervalUpdated(MinIntervalUpdated {
            old,
            new: value,
        }));
        Ok(())
    }

    // ───────────────────────── Queries ─────────────────────────

    /// Held balance of `asset`. Zero for assets never deposited.
    pub fn get_balance(&self, asset: &AssetId) -> Result<Amount, VaultError> {
        Ok(self.load()?.ledger().balance_of(asset))
    }

    pub fn get_max_per_operation(&self) -> Result<Amount, VaultError> {
        self.logic.max_per_operation(&self.load()?)
    }

    pub fn get_min_interval(&self) -> Result<u64, VaultError> {
        self.logic.min_interval(&self.load()?)
    }

    pub fn is_paused(&self) -> Result<bool, VaultError> {
        self.logic.is_paused(&self.load()?)
    }

    /// Earliest time a standard withdrawal of `asset` passes the interval rule.
    pub fn next_available_at(
        &self,
        asset: &AssetId,
        now: Timestamp,
    ) -> Result<Timestamp, VaultError> {
        self.logic.next_available_at(&self.load()?, asset, now)
    }

    pub fn owner(&self) -> Result<Address, VaultError> {
        Ok(*AuthorizationGate::for_layout(&self.load()?)?.owner())
    }

    pub fn schema_version(&self) -> Result<u32, VaultError> {
        Ok(self.load()?.schema_version())
    }

    pub fn logic_version(&self) -> u32 {
        self.logic.version()
    }

    /// Decoded copy of the persisted layout.
    pub fn layout(&self) -> Result<StateLayout, VaultError> {
        self.load()
    }

    pub fn layout_id(&self) -> &LayoutId {
        &self.layout_id
    }

    // ───────────────────────── Events ─────────────────────────

    /// Get all emitted events.
    pub fn events(&self) -> &[ContractEvent] {
        &self.events
    }

    /// Drain all events (for indexer consumption).
    pub fn drain_events(&mut self) -> Vec<ContractEvent> {
        std::mem::take(&mut self.events)
    }

    // ───────────────────────── Internal ─────────────────────────

    fn load(&self) -> Result<StateLayout, VaultError> {
        read_layout(self.store.as_ref(), &self.layout_id)
    }

    fn commit(&mut self, layout: &StateLayout) -> Result<(), VaultError> {
        let record = layout.encode()?;
        self.store.commit(&self.layout_id, &record)?;
        Ok(())
    }

    fn emit(&mut self, event: ContractEvent) {
        self.events.push(event);
    }

    /// Load, gate on the owner, apply `update` and commit.
    fn owner_update<T>(
        &mut self,
        caller: &Address,
        update: impl FnOnce(&dyn VaultLogic, &mut StateLayout) -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        let mut layout = self.load()?;
        AuthorizationGate::for_layout(&layout)?.require_owner(caller)?;
        let value = update(self.logic.as_ref(), &mut layout)?;
        self.commit(&layout)?;
        Ok(value)
    }

    /// Re-read the layout after a pull and credit it.
    ///
    /// The adapter may have re-entered, so the layout and logic seen before
    /// the pull are stale. The checks already passed; the value is in
    /// custody now and is credited even if a re-entrant call paused the vault.
    fn credit_pulled(&mut self, asset: &AssetId, amount: Amount) -> Result<Amount, VaultError> {
        let mut layout = self.load()?;
        let balance_after = self.logic.apply_deposit(&mut layout, asset, amount)?;
        self.commit(&layout)?;
        Ok(balance_after)
    }

    /// Undo a withdrawal whose transfer failed.
    ///
    /// Re-credits the amount on top of the current record, keeping whatever
    /// re-entrant calls committed meanwhile. The interval stamp is put back
    /// only if no other withdrawal completed during the transfer; otherwise it
    /// may belong to that withdrawal and stays. A refund that cannot be
    /// committed is logged; `err` is still what the caller gets.
    fn refund_withdrawal(&mut self, pending: &PendingWithdrawal, err: &VaultError) {
        tracing::error!(
            layout_id = %self.layout_id,
            asset = %pending.request.asset,
            amount = %pending.request.amount,
            error = %err,
            "Withdrawal transfer failed, refunding"
        );
        if let Err(refund_err) = self.try_refund(pending) {
            tracing::error!(
                layout_id = %self.layout_id,
                asset = %pending.request.asset,
                error = %refund_err,
                "Refund could not be committed"
            );
        }
    }

    fn try_refund(&mut self, pending: &PendingWithdrawal) -> Result<(), VaultError> {
        let request = &pending.request;
        let mut layout = self.load()?;
        layout.ledger_mut().credit(&request.asset, request.amount)?;
        if self.completed_withdrawals == pending.completed_before {
            if let Ok(limits) = layout.limits_mut() {
                restore_operation(limits, &request.asset, pending.previous_stamp);
            }
        }
        self.commit(&layout)
    }
}

fn read_layout(store: &dyn LayoutStore, layout_id: &LayoutId) -> Result<StateLayout, VaultError> {
    match store.load(layout_id)? {
        Some(record) => Ok(StateLayout::decode(&record)?),
        None => Ok(StateLayout::uninitialized()),
    }
}

fn last_operation_at(layout: &StateLayout, asset: &AssetId) -> Option<Timestamp> {
    layout
        .limits()
        .ok()
        .and_then(|limits| limits.last_operation_at.get(asset).copied())
}

fn require_initialized(layout: &StateLayout) -> Result<(), VaultError> {
    if !layout.is_initialized() {
        return Err(MigrationError::NotInitialized.into());
    }
    Ok(())
}

fn reject(operation: &'static str, err: VaultError) -> VaultError {
    tracing::warn!(operation, error = %err, "Rejected custody operation");
    err
}
