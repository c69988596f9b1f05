// src/probe/ledger.rs

use std::collections::BTreeMap;

use crate::core::{QuantumError, QuantumResult};

/// The economy collaborator POP credits resources to.
pub trait ResourceLedger {
    /// Adds `amount` units of `resource`. An `Err` means nothing was credited.
    fn credit(&mut self, resource: &str, amount: u64) -> QuantumResult<()>;
}

/// Ledger kept in memory, with an optional per-resource cap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryLedger {
    balances: BTreeMap<String, u64>,
    limit: Option<u64>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger that refuses any credit taking a balance above `limit`.
    pub fn with_limit(limit: u64) -> Self {
        Self { balances: BTreeMap::new(), limit: Some(limit) }
    }

    pub fn balance(&self, resource: &str) -> u64 {
        self.balances.get(resource).copied().unwrap_or(0)
    }

    pub fn balances(&self) -> &BTreeMap<String, u64> {
        &self.balances
    }

    pub fn total(&self) -> u64 {
        self.balances.values().sum()
    }
}

impl ResourceLedger for InMemoryLedger {
    fn credit(&mut self, resource: &str, amount: u64) -> QuantumResult<()> {
        let next = self.balance(resource).checked_add(amount).ok_or_else(|| QuantumError::LedgerRejected {
            message: format!("{} balance overflow", resource),
        })?;
        if let Some(limit) = self.limit {
            if next > limit {
                return Err(QuantumError::LedgerRejected {
                    message: format!("{} balance {} would exceed limit {}", resource, next, limit),
                });
            }
        }
        self.balances.insert(resource.to_string(), next);
        Ok(())
    }
}
