//! Numeric constants shared by the simulation and probe layers.

/// Tolerances and defaults for the engine.
pub mod engine_constants {
    /// Allowed deviation of `Tr(ρ)` from 1 before a state counts as drifted.
    pub const TRACE_TOLERANCE: f64 = 1e-6;
    /// Allowed deviation when checking `ρ = ρ†`.
    pub const HERMITIAN_TOLERANCE: f64 = 1e-9;
    /// Eigenvalues above `-POSITIVITY_TOLERANCE` count as non-negative.
    pub const POSITIVITY_TOLERANCE: f64 = 1e-9;
    /// Probabilities at or below this are treated as zero.
    pub const PROBABILITY_EPSILON: f64 = 1e-12;
    /// Largest substep used when a caller hands `evolve` a long frame.
    pub const DEFAULT_MAX_DT: f64 = 0.02;
    /// Credits granted per unit of recorded probability at POP.
    pub const DEFAULT_CONVERSION_RATE: f64 = 10.0;
    /// Terminals in a freshly constructed pool.
    pub const DEFAULT_TERMINAL_CAPACITY: usize = 12;
    /// Upper bound on qubits per component; 2^12 = 4096 rows is already slow dense work.
    pub const MAX_COMPONENT_QUBITS: usize = 12;
    /// Upper bound on qubits in one register map, keeping `2^n` inside `usize`.
    pub const MAX_MAP_QUBITS: usize = 32;
    /// Most substeps a single `evolve` call may take.
    pub const MAX_SUBSTEPS: usize = 100_000;
}
