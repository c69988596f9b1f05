// src/simulation/mod.rs

//! Density-matrix simulation of one biome's qubits.
//!
//! `QuantumComputer` owns the components of a biome and merges them when
//! subsystems interact. `LindbladBuilder` and `HamiltonianBuilder` turn label
//! keyed configuration into operators for a component, and `EvolutionEngine`
//! steps a component under those operators.

pub mod component;
pub mod computer;
pub mod evolution;
pub mod hamiltonian;
pub mod lindblad;

pub use component::{QuantumComponent, embed_operator};
pub use computer::QuantumComputer;
pub use evolution::{EvolutionEngine, Lookahead};
pub use hamiltonian::{CouplingSpec, HamiltonianBuilder, HamiltonianConfig};
pub use lindblad::{DecaySpec, GatedTransfer, JumpOperator, LindbladBuilder, LindbladRates, LindbladTerms};
