//! Shared security primitives for the vault
//!
//! - `AuthorizationGate`: single-owner access control
//! - `CircuitBreaker`: global pause switch, persisted inside the layout
//!
//! There is no reentrancy lock. Entry points order their work as
//! checks → committed effects → external transfer, so a reentrant call always
//! observes the already-updated layout.

use custody_types::Address;
use serde::{Deserialize, Serialize};

use crate::errors::{MigrationError, StateError, VaultError};
use crate::layout::StateLayout;

/// Owner check composed into every gated entry point.
///
/// Built from the layout on each call; the owner itself lives only in the
/// persisted record and never changes after genesis.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationGate {
    owner: Address,
}

impl AuthorizationGate {
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }

    /// Gate for an initialized layout.
    pub fn for_layout(layout: &StateLayout) -> Result<Self, VaultError> {
        if !layout.is_initialized() {
            return Err(MigrationError::NotInitialized.into());
        }
        Ok(Self::new(*layout.owner()))
    }

    pub fn is_owner(&self, caller: &Address) -> bool {
        !caller.is_null() && *caller == self.owner
    }

    /// Fails with `Authorization` unless `caller` is the owner.
    pub fn require_owner(&self, caller: &Address) -> Result<(), VaultError> {
        if !self.is_owner(caller) {
            tracing::warn!(%caller, "Rejected non-owner caller");
            return Err(VaultError::Authorization { caller: *caller });
        }
        Ok(())
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }
}

/// Global pause switch gating deposit and the withdraw family.
///
/// Serialized as a bare `bool` so it occupies the `paused` slot of the
/// persisted layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CircuitBreaker {
    paused: bool,
}

impl CircuitBreaker {
    /// Create a new active breaker.
    pub fn new() -> Self {
        Self { paused: false }
    }

    /// Transition to `Paused`. Fails if already paused.
    pub fn pause(&mut self) -> Result<(), StateError> {
        if self.paused {
            return Err(StateError::Paused);
        }
        self.paused = true;
        Ok(())
    }

    /// Transition to `Active`. Fails if not paused.
    pub fn unpause(&mut self) -> Result<(), StateError> {
        if !self.paused {
            return Err(StateError::NotPaused);
        }
        self.paused = false;
        Ok(())
    }

    /// Fails with `StateError::Paused` while paused.
    pub fn ensure_active(&self) -> Result<(), StateError> {
        if self.paused {
            return Err(StateError::Paused);
        }
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- AuthorizationGate tests ---

    #[test]
    fn test_gate_accepts_owner() {
        let owner = Address::derive("owner");
        let gate = AuthorizationGate::new(owner);
        assert!(gate.require_owner(&owner).is_ok());
    }

    #[test]
    fn test_gate_rejects_other_caller() {
        let gate = AuthorizationGate::new(Address::derive("owner"));
        let eve = Address::derive("eve");
        assert_eq!(
            gate.require_owner(&eve),
            Err(VaultError::Authorization { caller: eve })
        );
    }

    #[test]
    fn test_gate_rejects_null_caller() {
        let gate = AuthorizationGate::new(Address::ZERO);
        assert!(!gate.is_owner(&Address::ZERO));
    }

    #[test]
    fn test_gate_requires_initialized_layout() {
        let layout = StateLayout::uninitialized();
        assert_eq!(
            AuthorizationGate::for_layout(&layout).unwrap_err(),
            VaultError::Migration(MigrationError::NotInitialized)
        );
    }

    // --- CircuitBreaker tests ---

    #[test]
    fn test_breaker_cycle() {
        let mut breaker = CircuitBreaker::new();
        assert!(!breaker.is_paused());
        breaker.pause().unwrap();
        assert!(breaker.is_paused());
        assert_eq!(breaker.ensure_active(), Err(StateError::Paused));
        breaker.unpause().unwrap();
        assert!(breaker.ensure_active().is_ok());
    }

    #[test]
    fn test_double_pause_fails() {
        let mut breaker = CircuitBreaker::new();
        breaker.pause().unwrap();
        assert_eq!(breaker.pause(), Err(StateError::Paused));
    }

    #[test]
    fn test_unpause_when_active_fails() {
        let mut breaker = CircuitBreaker::new();
        assert_eq!(breaker.unpause(), Err(StateError::NotPaused));
    }
}
