// src/probe/pool.rs

use log::trace;
use std::collections::BTreeSet;
use std::fmt;

use crate::core::{BiomeId, Outcome, QuantumError, QuantumResult, RegisterId, TerminalId};

/// Where a terminal is in the probe cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalState {
    Unbound,
    Bound { biome: BiomeId, register: RegisterId },
    Measured { biome: BiomeId, register: RegisterId, outcome: Outcome },
}

/// A player-facing handle. Never destroyed, only released.
#[derive(Debug, Clone, PartialEq)]
pub struct Terminal {
    id: TerminalId,
    state: TerminalState,
}

impl Terminal {
    pub fn id(&self) -> TerminalId {
        self.id
    }

    pub fn state(&self) -> &TerminalState {
        &self.state
    }

    pub fn is_bound(&self) -> bool {
        !matches!(self.state, TerminalState::Unbound)
    }

    pub fn is_measured(&self) -> bool {
        matches!(self.state, TerminalState::Measured { .. })
    }

    /// `(biome, register)` while bound or measured.
    pub fn binding(&self) -> Option<(BiomeId, RegisterId)> {
        match &self.state {
            TerminalState::Unbound => None,
            TerminalState::Bound { biome, register } | TerminalState::Measured { biome, register, .. } => {
                Some((*biome, *register))
            }
        }
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        match &self.state {
            TerminalState::Measured { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            TerminalState::Unbound => write!(f, "{} [unbound]", self.id),
            TerminalState::Bound { biome, register } => write!(f, "{} [bound {} {}]", self.id, biome, register),
            TerminalState::Measured { biome, register, outcome } => {
                write!(f, "{} [measured {} {}: {}]", self.id, biome, register, outcome)
            }
        }
    }
}

/// Fixed-size set of terminals.
///
/// `bound_count() + unbound_count() == capacity()` holds after every call.
#[derive(Debug, Clone)]
pub struct TerminalPool {
    terminals: Vec<Terminal>,
    unbound: BTreeSet<TerminalId>,
}

impl TerminalPool {
    pub fn new(capacity: usize) -> Self {
        let terminals = (0..capacity)
            .map(|i| Terminal { id: TerminalId(i), state: TerminalState::Unbound })
            .collect();
        Self { terminals, unbound: (0..capacity).map(TerminalId).collect() }
    }

    pub fn capacity(&self) -> usize {
        self.terminals.len()
    }

    pub fn unbound_count(&self) -> usize {
        self.unbound.len()
    }

    pub fn bound_count(&self) -> usize {
        self.capacity() - self.unbound.len()
    }

    pub fn terminals(&self) -> &[Terminal] {
        &self.terminals
    }

    pub fn terminal(&self, id: TerminalId) -> QuantumResult<&Terminal> {
        self.terminals.get(id.0).ok_or(QuantumError::UnknownTerminal { terminal: id })
    }

    fn terminal_mut(&mut self, id: TerminalId) -> QuantumResult<&mut Terminal> {
        self.terminals.get_mut(id.0).ok_or(QuantumError::UnknownTerminal { terminal: id })
    }

    /// Lowest unbound terminal, without binding it.
    pub fn first_unbound(&self) -> Option<TerminalId> {
        self.unbound.first().copied()
    }

    pub(crate) fn bind(&mut self, id: TerminalId, biome: BiomeId, register: RegisterId) -> QuantumResult<()> {
        let terminal = self.terminal_mut(id)?;
        if terminal.is_bound() {
            return Err(QuantumError::InvalidTransition { terminal: id, message: "terminal is already bound".to_string() });
        }
        terminal.state = TerminalState::Bound { biome, register };
        self.unbound.remove(&id);
        trace!("{} bound to {} {}", id, biome, register);
        Ok(())
    }

    pub(crate) fn record_outcome(&mut self, id: TerminalId, outcome: Outcome) -> QuantumResult<()> {
        let terminal = self.terminal_mut(id)?;
        match terminal.state {
            TerminalState::Bound { biome, register } => {
                terminal.state = TerminalState::Measured { biome, register, outcome };
                Ok(())
            }
            _ => Err(QuantumError::InvalidTransition { terminal: id, message: "outcome recorded on a terminal that is not bound".to_string() }),
        }
    }

    /// Returns a terminal to the unbound set.
    ///
    /// # Errors
    /// `InvalidTransition` if the terminal is already unbound.
    pub fn release_terminal(&mut self, id: TerminalId) -> QuantumResult<()> {
        let terminal = self.terminal_mut(id)?;
        if !terminal.is_bound() {
            return Err(QuantumError::InvalidTransition { terminal: id, message: "terminal released twice".to_string() });
        }
        terminal.state = TerminalState::Unbound;
        self.unbound.insert(id);
        trace!("{} released", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Pole;

    #[test]
    fn test_bind_record_release_cycle() -> QuantumResult<()> {
        let mut pool = TerminalPool::new(3);
        let t = pool.first_unbound().ok_or(QuantumError::ExhaustedPool { message: "empty".to_string() })?;
        pool.bind(t, BiomeId(0), RegisterId(2))?;
        assert_eq!(pool.bound_count() + pool.unbound_count(), pool.capacity());
        assert_eq!(pool.terminal(t)?.binding(), Some((BiomeId(0), RegisterId(2))));

        let outcome = Outcome { register: RegisterId(2), pole: Pole::South, label: "🍄".to_string(), probability: 0.4 };
        pool.record_outcome(t, outcome.clone())?;
        assert_eq!(pool.terminal(t)?.outcome(), Some(&outcome));
        assert!(pool.record_outcome(t, outcome).is_err());

        pool.release_terminal(t)?;
        assert_eq!(pool.unbound_count(), 3);
        assert!(matches!(pool.release_terminal(t), Err(QuantumError::InvalidTransition { .. })));
        Ok(())
    }

    #[test]
    fn test_unknown_terminal() {
        let pool = TerminalPool::new(1);
        assert_eq!(pool.terminal(TerminalId(5)).err(), Some(QuantumError::UnknownTerminal { terminal: TerminalId(5) }));
    }
}
