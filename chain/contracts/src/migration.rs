//! Migration controller
//!
//! `schema_version` walks `0 → 1 (genesis) → 2 → …` one step at a time. Each
//! step runs exactly once: a migration is accepted only when the layout sits
//! at its immediate predecessor version. Migrations run on a staged copy, so
//! a rejected one leaves the stored layout untouched.

use custody_types::{Address, Amount};
use rust_decimal::Decimal;
use std::fmt;

use crate::errors::{MigrationError, ValidationError, VaultError};
use crate::layout::{LimitsSegment, StateLayout};

/// A one-time transformation that seeds the fields introduced by
/// `target_version`.
///
/// `apply` only seeds fields. The controller owns the version bump and
/// verifies that the owner survived.
pub trait Migration: fmt::Debug {
    fn target_version(&self) -> u32;

    fn apply(&self, layout: &mut StateLayout) -> Result<(), VaultError>;
}

/// Schema v2: rate limiter parameters and the circuit breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrateToV2 {
    pub max_per_operation: Amount,
    pub min_interval: u64,
}

impl MigrateToV2 {
    pub fn new(max_per_operation: Amount, min_interval: u64) -> Self {
        Self {
            max_per_operation,
            min_interval,
        }
    }
}

impl Migration for MigrateToV2 {
    fn target_version(&self) -> u32 {
        2
    }

    fn apply(&self, layout: &mut StateLayout) -> Result<(), VaultError> {
        if self.max_per_operation < Decimal::ZERO {
            return Err(ValidationError::NegativeLimit {
                value: self.max_per_operation,
            }
            .into());
        }
        layout.install_limits(LimitsSegment::new(
            self.max_per_operation,
            self.min_interval,
        ));
        Ok(())
    }
}

/// Validates and stages schema transitions.
pub struct MigrationController;

impl MigrationController {
    /// Stage genesis: `0 → 1`, setting the owner.
    pub fn genesis(layout: &StateLayout, owner: Address) -> Result<StateLayout, VaultError> {
        if layout.is_initialized() {
            return Err(MigrationError::AlreadyInitialized {
                current: layout.schema_version(),
            }
            .into());
        }
        if owner.is_null() {
            return Err(ValidationError::NullOwner.into());
        }
        let mut staged = layout.clone();
        staged.initialize(owner);
        Ok(staged)
    }

    /// Stage `migration`: `N-1 → N`.
    pub fn migrate(
        layout: &StateLayout,
        migration: &dyn Migration,
    ) -> Result<StateLayout, VaultError> {
        if !layout.is_initialized() {
            return Err(MigrationError::NotInitialized.into());
        }
        let current = layout.schema_version();
        let target = migration.target_version();
        if target.checked_sub(1) != Some(current) {
            return Err(MigrationError::VersionMismatch { current, target }.into());
        }

        let owner = *layout.owner();
        let mut staged = layout.clone();
        migration.apply(&mut staged)?;

        if *staged.owner() != owner {
            return Err(MigrationError::OwnerChanged { target }.into());
        }
        staged.set_schema_version(target);
        if staged.segment_count() < target as usize {
            return Err(MigrationError::MissingSegment {
                segment: target,
                schema_version: target,
            }
            .into());
        }

        tracing::info!(from = current, to = target, "Staged schema migration");
        Ok(staged)
    }
}
