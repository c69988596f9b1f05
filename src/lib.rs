// src/lib.rs

//! `qfarm` - an open-quantum-system engine for biome simulation
//!
//! Biomes hold small groups of two-level subsystems ("qubits") named by pairs
//! of symbolic labels. Each group is a density matrix that evolves under a
//! Hamiltonian and Lindblad jump operators, merges with other groups when they
//! interact, and is sampled by the Born rule when a terminal probes it.

pub mod biome;
pub mod core;
pub mod observables;
pub mod operations;
pub mod probe;
pub mod simulation;
pub mod validation;

// Re-export the most common types for easier top-level use
pub use biome::{Biome, BiomeConfig, BiomeKind, BiomeRegistry, EnergyTap, EntanglementCapable};
pub use core::{
    AxisConfig, BiomeId, ComplexMatrix, ComponentId, EngineConfig, MeasureMode, Outcome, Pole, QuantumError,
    QuantumResult, RegisterId, RegisterMap, TerminalId,
};
pub use operations::{Gate, TwoQubitGate};
pub use probe::{
    ExploreResult, InMemoryLedger, MeasureResult, PopResult, ProbeProtocol, ResourceLedger, Terminal, TerminalPool,
    TerminalState,
};
pub use simulation::{
    EvolutionEngine, HamiltonianBuilder, HamiltonianConfig, LindbladBuilder, LindbladRates, Lookahead,
    QuantumComponent, QuantumComputer,
};
pub use validation::validate_density_matrix;

// Example 1: Driving a single register
// A register starts in its north pole; a Lindblad drive pumps population
// toward south while the trace stays exactly one.
/// ```
/// use qfarm::{ComponentId, QuantumComponent, QuantumError, RegisterId};
///
/// let mut wheat = QuantumComponent::new(ComponentId(0), vec![RegisterId(0)])?;
/// wheat.initialize_to_basis_state(0)?;
/// for _ in 0..20 {
///     wheat.apply_lindblad_drive(RegisterId(0), 1, 0.5, 0.016)?;
/// }
/// assert!((wheat.get_trace() - 1.0).abs() < 1e-12);
/// assert!(wheat.get_basis_probability(1) > 0.0);
/// # Ok::<(), QuantumError>(())
/// ```
#[doc(hidden)]
const _: () = ();

// Example 2: One probe cycle
// EXPLORE binds a terminal to a register, MEASURE samples it, POP credits the
// observed label and frees both handles.
/// ```
/// use qfarm::{BiomeRegistry, EngineConfig, InMemoryLedger, ProbeProtocol, QuantumError};
///
/// let config = EngineConfig { seed: Some(11), ..EngineConfig::default() };
/// let mut registry = BiomeRegistry::new(&config);
/// let pond = registry.load_json(r#"{
///     "name": "pond",
///     "axes": [ { "north": "💧", "south": "🐸" } ],
///     "rates": { "lindblad_outgoing": { "💧": { "🐸": 0.3 } } }
/// }"#)?;
///
/// let mut probe = ProbeProtocol::new(&config)?;
/// let mut ledger = InMemoryLedger::new();
/// for _ in 0..30 {
///     registry.evolve_all(0.016)?;
/// }
/// let explored = probe.explore(&mut registry, pond)?;
/// let measured = probe.measure(&mut registry, explored.terminal, pond)?;
/// let popped = probe.pop(&mut registry, explored.terminal, &mut ledger)?;
/// assert_eq!(popped.resource, measured.outcome.label);
/// assert_eq!(ledger.balance(&popped.resource), popped.credits);
/// assert_eq!(probe.pool().bound_count(), 0);
/// # Ok::<(), QuantumError>(())
/// ```
#[doc(hidden)]
const _: () = ();
