// src/probe/mod.rs

//! Terminal pool and the EXPLORE → MEASURE → POP probe protocol.
//!
//! A terminal moves `Unbound → Bound → Measured → Unbound`. EXPLORE binds the
//! lowest free terminal to the lowest free register of one biome, MEASURE
//! samples that register, and POP converts the recorded probability into
//! resource units and releases both handles.

mod ledger;
mod pool;

pub use ledger::{InMemoryLedger, ResourceLedger};
pub use pool::{Terminal, TerminalPool, TerminalState};

use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::biome::BiomeRegistry;
use crate::core::{BiomeId, EngineConfig, MeasureMode, Outcome, QuantumError, QuantumResult, RegisterId, TerminalId};

/// A successful EXPLORE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExploreResult {
    pub terminal: TerminalId,
    pub biome: BiomeId,
    pub register: RegisterId,
    pub north_label: String,
    pub south_label: String,
    /// `P(north)` of the register at bind time.
    pub initial_probability: f64,
}

/// A successful MEASURE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureResult {
    pub terminal: TerminalId,
    pub biome: BiomeId,
    pub outcome: Outcome,
}

/// A successful POP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopResult {
    pub terminal: TerminalId,
    pub biome: BiomeId,
    pub register: RegisterId,
    /// The observed label, credited as the resource name.
    pub resource: String,
    /// Probability recorded at MEASURE time.
    pub probability: f64,
    pub credits: u64,
}

/// Drives terminals through the probe state machine.
///
/// Owns the terminal pool and the RNG used for Born-rule sampling. Biomes are
/// passed in per call, so the protocol never holds a reference into the
/// registry between calls.
#[derive(Debug, Clone)]
pub struct ProbeProtocol {
    pool: TerminalPool,
    rng: StdRng,
    mode: MeasureMode,
    conversion_rate: f64,
}

impl ProbeProtocol {
    /// Creates the protocol with a fresh pool of `config.terminal_capacity`
    /// terminals. A configured seed makes every measurement reproducible.
    pub fn new(config: &EngineConfig) -> QuantumResult<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            pool: TerminalPool::new(config.terminal_capacity),
            rng,
            mode: config.measure_mode,
            conversion_rate: config.conversion_rate,
        })
    }

    pub fn pool(&self) -> &TerminalPool {
        &self.pool
    }

    pub fn measure_mode(&self) -> MeasureMode {
        self.mode
    }

    pub fn set_measure_mode(&mut self, mode: MeasureMode) {
        self.mode = mode;
    }

    /// Binds a free terminal to a free register of `biome_id`.
    ///
    /// # Errors
    /// * `UnknownBiome` for an id the registry does not hold.
    /// * `ExhaustedPool` when no terminal or no register of this biome is free.
    ///
    /// Nothing changes on error.
    pub fn explore(&mut self, registry: &mut BiomeRegistry, biome_id: BiomeId) -> QuantumResult<ExploreResult> {
        let biome = registry.get_mut(biome_id)?;
        let terminal = self.pool.first_unbound().ok_or_else(|| QuantumError::ExhaustedPool {
            message: format!("all {} terminals are bound", self.pool.capacity()),
        })?;
        let register = biome.unbound_registers().first().copied().ok_or_else(|| QuantumError::ExhaustedPool {
            message: format!("{} '{}' has no unbound register", biome_id, biome.name()),
        })?;
        let initial_probability = biome.computer().get_marginal_probability(register, 0)?;
        let (north_label, south_label) = biome.computer().get_register_emoji_pair(register)?;

        let bound = biome.bind_register()?;
        debug_assert_eq!(bound, register);
        self.pool.bind(terminal, biome_id, register)?;
        info!("EXPLORE {} -> {} {} (p_north={:.4})", terminal, biome_id, register, initial_probability);
        Ok(ExploreResult { terminal, biome: biome_id, register, north_label, south_label, initial_probability })
    }

    /// Measures the register bound to `terminal` and records the outcome.
    ///
    /// # Errors
    /// * `InvalidTransition` if the terminal is unbound or already measured.
    /// * `InvalidOperation` if `biome_id` is not the biome the terminal is bound to.
    pub fn measure(&mut self, registry: &mut BiomeRegistry, terminal: TerminalId, biome_id: BiomeId) -> QuantumResult<MeasureResult> {
        let (bound_biome, register) = match self.pool.terminal(terminal)?.state() {
            TerminalState::Bound { biome, register } => (*biome, *register),
            TerminalState::Unbound => {
                return Err(QuantumError::InvalidTransition { terminal, message: "MEASURE on an unbound terminal".to_string() });
            }
            TerminalState::Measured { .. } => {
                return Err(QuantumError::InvalidTransition { terminal, message: "terminal is already measured".to_string() });
            }
        };
        if bound_biome != biome_id {
            return Err(QuantumError::InvalidOperation {
                message: format!("{} is bound to {}, not {}", terminal, bound_biome, biome_id),
            });
        }
        let biome = registry.get_mut(biome_id)?;
        let outcome = biome.computer_mut().measure(register, self.mode, &mut self.rng)?;
        self.pool.record_outcome(terminal, outcome.clone())?;
        info!("MEASURE {} on {}: {}", terminal, biome_id, outcome);
        Ok(MeasureResult { terminal, biome: biome_id, outcome })
    }

    /// Credits the recorded outcome and releases the register and terminal.
    ///
    /// Credits are `round(probability × conversion_rate)` of the observed
    /// label. The register and terminal are released even when the ledger
    /// refuses the credit; that failure is then reported as `LedgerRejected`.
    ///
    /// # Errors
    /// * `InvalidTransition` if the terminal has not been measured.
    /// * `UnknownBiome` if the terminal's biome was removed from the registry;
    ///   `abandon` then frees the terminal.
    ///
    /// Nothing is credited or released when either check fails.
    pub fn pop(&mut self, registry: &mut BiomeRegistry, terminal: TerminalId, ledger: &mut dyn ResourceLedger) -> QuantumResult<PopResult> {
        let (biome_id, register, outcome) = match self.pool.terminal(terminal)?.state() {
            TerminalState::Measured { biome, register, outcome } => (*biome, *register, outcome.clone()),
            TerminalState::Unbound => {
                return Err(QuantumError::InvalidTransition { terminal, message: "POP on an unbound terminal".to_string() });
            }
            TerminalState::Bound { .. } => {
                return Err(QuantumError::InvalidTransition { terminal, message: "POP before MEASURE".to_string() });
            }
        };
        if !registry.get(biome_id)?.is_bound(register) {
            return Err(QuantumError::InvalidOperation {
                message: format!("{} is not bound in {}", register, biome_id),
            });
        }
        let credits = (outcome.probability * self.conversion_rate).round().max(0.0) as u64;
        let credited = ledger.credit(&outcome.label, credits);

        let released = self.release_handles(registry, terminal, biome_id, register);

        if let Err(err) = credited {
            warn!("POP {}: ledger refused {} x{}: {}", terminal, outcome.label, credits, err);
            released?;
            return Err(match err {
                QuantumError::LedgerRejected { .. } => err,
                other => QuantumError::LedgerRejected { message: other.to_string() },
            });
        }
        released?;
        info!("POP {}: credited {} x{} from {}", terminal, outcome.label, credits, register);
        Ok(PopResult {
            terminal,
            biome: biome_id,
            register,
            resource: outcome.label,
            probability: outcome.probability,
            credits,
        })
    }

    /// Releases a bound or measured terminal without crediting anything.
    pub fn abandon(&mut self, registry: &mut BiomeRegistry, terminal: TerminalId) -> QuantumResult<()> {
        let (biome_id, register) = match self.pool.terminal(terminal)?.state() {
            TerminalState::Bound { biome, register } | TerminalState::Measured { biome, register, .. } => (*biome, *register),
            TerminalState::Unbound => {
                return Err(QuantumError::InvalidTransition { terminal, message: "terminal is not bound".to_string() });
            }
        };
        self.release_handles(registry, terminal, biome_id, register)
    }

    /// Returns the register to its biome and the terminal to the pool. The
    /// terminal is released even if the biome is gone.
    fn release_handles(&mut self, registry: &mut BiomeRegistry, terminal: TerminalId, biome_id: BiomeId, register: RegisterId) -> QuantumResult<()> {
        let register_release = registry.get_mut(biome_id).and_then(|b| b.release_register(register));
        self.pool.release_terminal(terminal)?;
        debug!("released {} and {} of {}", terminal, register, biome_id);
        register_release
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biome::{BiomeConfig, BiomeKind};
    use crate::core::AxisConfig;

    fn setup(capacity: usize) -> (BiomeRegistry, ProbeProtocol, BiomeId) {
        let config = EngineConfig { terminal_capacity: capacity, seed: Some(3), ..EngineConfig::default() };
        let mut registry = BiomeRegistry::new(&config);
        let biome = registry
            .register(BiomeConfig {
                name: "pond".to_string(),
                kind: BiomeKind::Passive,
                axes: vec![AxisConfig { north: "💧".to_string(), south: "🐸".to_string() }],
                rates: Default::default(),
                hamiltonian: Default::default(),
            })
            .expect("valid biome");
        (registry, ProbeProtocol::new(&config).expect("valid config"), biome)
    }

    #[test]
    fn test_measure_requires_bound_terminal() -> QuantumResult<()> {
        let (mut registry, mut probe, biome) = setup(2);
        let err = probe.measure(&mut registry, TerminalId(0), biome).unwrap_err();
        assert!(matches!(err, QuantumError::InvalidTransition { .. }));
        let explored = probe.explore(&mut registry, biome)?;
        probe.measure(&mut registry, explored.terminal, biome)?;
        let again = probe.measure(&mut registry, explored.terminal, biome);
        assert!(matches!(again, Err(QuantumError::InvalidTransition { .. })));
        Ok(())
    }

    #[test]
    fn test_pop_requires_measure() -> QuantumResult<()> {
        let (mut registry, mut probe, biome) = setup(2);
        let mut ledger = InMemoryLedger::new();
        let explored = probe.explore(&mut registry, biome)?;
        let err = probe.pop(&mut registry, explored.terminal, &mut ledger);
        assert!(matches!(err, Err(QuantumError::InvalidTransition { .. })));
        assert_eq!(probe.pool().bound_count(), 1);
        assert!(registry.get(biome)?.is_bound(explored.register));
        Ok(())
    }

    #[test]
    fn test_pop_credits_rounded_probability() -> QuantumResult<()> {
        let (mut registry, mut probe, biome) = setup(1);
        let mut ledger = InMemoryLedger::new();
        let explored = probe.explore(&mut registry, biome)?;
        assert!((explored.initial_probability - 1.0).abs() < 1e-12);
        assert_eq!(explored.north_label, "💧");
        let measured = probe.measure(&mut registry, explored.terminal, biome)?;
        assert_eq!(measured.outcome.label, "💧");
        let popped = probe.pop(&mut registry, explored.terminal, &mut ledger)?;
        assert_eq!(popped.credits, 10);
        assert_eq!(ledger.balance("💧"), 10);
        assert_eq!(probe.pool().unbound_count(), 1);
        Ok(())
    }

    #[test]
    fn test_rejected_credit_still_releases() -> QuantumResult<()> {
        let (mut registry, mut probe, biome) = setup(1);
        let mut ledger = InMemoryLedger::with_limit(5);
        let explored = probe.explore(&mut registry, biome)?;
        probe.measure(&mut registry, explored.terminal, biome)?;
        let err = probe.pop(&mut registry, explored.terminal, &mut ledger);
        assert!(matches!(err, Err(QuantumError::LedgerRejected { .. })));
        assert_eq!(probe.pool().unbound_count(), 1);
        assert_eq!(registry.get(biome)?.unbound_registers(), vec![explored.register]);
        assert_eq!(ledger.balance("💧"), 0);
        // Both handles are reusable straight away.
        probe.explore(&mut registry, biome)?;
        Ok(())
    }

    #[test]
    fn test_measure_on_wrong_biome_rejected() -> QuantumResult<()> {
        let (mut registry, mut probe, biome) = setup(2);
        let explored = probe.explore(&mut registry, biome)?;
        let other = BiomeId(biome.0 + 100);
        assert!(matches!(
            probe.measure(&mut registry, explored.terminal, other),
            Err(QuantumError::InvalidOperation { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_pop_into_removed_biome_credits_nothing() -> QuantumResult<()> {
        let (mut registry, mut probe, biome) = setup(1);
        let mut ledger = InMemoryLedger::new();
        let explored = probe.explore(&mut registry, biome)?;
        probe.measure(&mut registry, explored.terminal, biome)?;
        registry.remove(biome)?;
        assert_eq!(
            probe.pop(&mut registry, explored.terminal, &mut ledger),
            Err(QuantumError::UnknownBiome { biome })
        );
        assert_eq!(ledger.total(), 0);
        assert!(probe.pool().terminal(explored.terminal)?.is_measured());
        // The stranded terminal can still be freed.
        assert!(probe.abandon(&mut registry, explored.terminal).is_err());
        assert_eq!(probe.pool().unbound_count(), 1);
        Ok(())
    }

    #[test]
    fn test_measure_mode_can_be_switched() -> QuantumResult<()> {
        let (mut registry, mut probe, biome) = setup(1);
        assert_eq!(probe.measure_mode(), MeasureMode::Collapse);
        probe.set_measure_mode(MeasureMode::Drain { fraction: 0.5 });
        assert_eq!(probe.measure_mode(), MeasureMode::Drain { fraction: 0.5 });
        let explored = probe.explore(&mut registry, biome)?;
        let measured = probe.measure(&mut registry, explored.terminal, biome)?;
        // Draining a certain outcome leaves it certain after renormalization.
        assert!((measured.outcome.probability - 1.0).abs() < 1e-12);
        let (north, _) = registry.get(biome)?.computer().get_register_probabilities(explored.register)?;
        assert!((north - 1.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_abandon_releases_without_credit() -> QuantumResult<()> {
        let (mut registry, mut probe, biome) = setup(1);
        let explored = probe.explore(&mut registry, biome)?;
        probe.abandon(&mut registry, explored.terminal)?;
        assert_eq!(probe.pool().unbound_count(), 1);
        assert!(probe.abandon(&mut registry, explored.terminal).is_err());
        Ok(())
    }
}
