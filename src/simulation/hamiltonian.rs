// src/simulation/hamiltonian.rs

//! Coherent part of a biome's dynamics.

use log::debug;
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::{ComplexMatrix, QuantumError, QuantumResult, RegisterId, RegisterMap};
use crate::operations::Gate;
use crate::simulation::component::embed_operator;

/// Exchange coupling between the qubits carrying labels `a` and `b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingSpec {
    pub a: String,
    pub b: String,
    pub strength: f64,
}

/// Hamiltonian constants for one biome, keyed by label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HamiltonianConfig {
    /// `E·|p⟩⟨p|` on the label's qubit and pole.
    #[serde(default)]
    pub self_energies: BTreeMap<String, f64>,
    /// `Ω·σx` on the label's qubit (Rabi mixing of its two poles).
    #[serde(default)]
    pub drives: BTreeMap<String, f64>,
    /// `g(σ⁺ᵢσ⁻ⱼ + σ⁻ᵢσ⁺ⱼ)` between two qubits.
    #[serde(default)]
    pub couplings: Vec<CouplingSpec>,
}

impl HamiltonianConfig {
    pub fn is_empty(&self) -> bool {
        self.self_energies.is_empty() && self.drives.is_empty() && self.couplings.is_empty()
    }
}

/// Builds the Hermitian matrix of a `HamiltonianConfig` on a component.
#[derive(Debug, Clone, Copy)]
pub struct HamiltonianBuilder<'a> {
    map: &'a RegisterMap,
    config: &'a HamiltonianConfig,
}

impl<'a> HamiltonianBuilder<'a> {
    pub fn new(map: &'a RegisterMap, config: &'a HamiltonianConfig) -> Self {
        Self { map, config }
    }

    /// # Errors
    /// * `UnknownLabel` for a label the map does not define.
    /// * `InvalidConfig` for a coupling whose two labels share a qubit, or a
    ///   non-finite constant.
    pub fn validate(&self) -> QuantumResult<()> {
        for (label, value) in self.config.self_energies.iter().chain(&self.config.drives) {
            self.map.resolve(label)?;
            check_finite(label, *value)?;
        }
        for c in &self.config.couplings {
            let (qa, _) = self.map.resolve(&c.a)?;
            let (qb, _) = self.map.resolve(&c.b)?;
            if qa == qb {
                return Err(QuantumError::InvalidConfig {
                    message: format!("coupling {} <-> {} names a single qubit", c.a, c.b),
                });
            }
            check_finite(&c.a, c.strength)?;
        }
        Ok(())
    }

    /// The Hamiltonian restricted to `qubits`; terms on other qubits are dropped.
    pub fn build_for(&self, qubits: &[RegisterId]) -> QuantumResult<ComplexMatrix> {
        self.validate()?;
        let k = qubits.len();
        let position = |label: &str| -> QuantumResult<Option<(usize, usize)>> {
            let (qubit, pole) = self.map.resolve(label)?;
            Ok(qubits.iter().position(|q| q.0 == qubit).map(|pos| (pos, pole.value())))
        };

        let mut h = ComplexMatrix::zeros(1 << k);
        let mut terms = 0usize;
        for (label, energy) in &self.config.self_energies {
            if let Some((pos, pole)) = position(label)? {
                h.add_assign(&embed_operator(k, &[pos], &ComplexMatrix::ket_bra(2, pole, pole).scale_real(*energy)));
                terms += 1;
            }
        }
        for (label, omega) in &self.config.drives {
            if let Some((pos, _)) = position(label)? {
                h.add_assign(&embed_operator(k, &[pos], &Gate::PauliX.to_matrix().scale_real(*omega)));
                terms += 1;
            }
        }
        for c in &self.config.couplings {
            if let (Some((i, _)), Some((j, _))) = (position(&c.a)?, position(&c.b)?) {
                let mut exchange = ComplexMatrix::zeros(4);
                exchange.set(1, 2, Complex::new(c.strength, 0.0));
                exchange.set(2, 1, Complex::new(c.strength, 0.0));
                h.add_assign(&embed_operator(k, &[i, j], &exchange));
                terms += 1;
            }
        }
        debug!("built Hamiltonian with {} terms on {} qubits", terms, k);
        Ok(h)
    }
}

fn check_finite(label: &str, value: f64) -> QuantumResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(QuantumError::InvalidConfig { message: format!("constant for {} is not finite", label) })
    }
}
