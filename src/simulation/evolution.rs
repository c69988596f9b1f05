// src/simulation/evolution.rs

//! Lindblad master-equation stepper for one component.
//!
//! `dρ/dt = −i[H, ρ] + Σ_k (L_k ρ L_k† − ½{L_k†L_k, ρ})`
//!
//! Each substep applies the exact unitary `exp(−iH·dt)` and then the
//! first-order Kraus map `K₀ = I − dt/2·ΣL†L`, `K_k = √dt·L_k`. The Kraus form
//! keeps `ρ` positive for any `dt`; the `O(dt²)` trace error it leaves is
//! removed by renormalizing after every substep.

use log::trace;
use num_complex::Complex;

use crate::core::engine_constants::{MAX_SUBSTEPS, PROBABILITY_EPSILON};
use crate::core::{ComplexMatrix, QuantumError, QuantumResult};
use crate::observables;
use crate::simulation::component::QuantumComponent;
use crate::simulation::lindblad::LindbladTerms;

/// Precomputed generator for one Hilbert-space dimension.
#[derive(Debug, Clone)]
pub struct EvolutionEngine {
    dim: usize,
    hamiltonian: Option<ComplexMatrix>,
    jumps: Vec<ComplexMatrix>,
    /// `Σ L†L`, filled by `finalize`.
    decay_sum: Option<ComplexMatrix>,
}

/// Predicted frames of one component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lookahead {
    /// Packed density matrices, one per step.
    pub frames: Vec<Vec<f64>>,
    /// Mutual information of every qubit pair in the final frame, in
    /// `all_mutual_information` order. Empty for single-qubit components.
    pub mutual_information: Vec<f64>,
}

impl EvolutionEngine {
    /// An engine with no Hamiltonian and no jump operators.
    pub fn new(dim: usize) -> Self {
        Self { dim, hamiltonian: None, jumps: Vec::new(), decay_sum: None }
    }

    /// Builds and finalizes an engine from a Hamiltonian and built jump terms.
    pub fn from_terms(dim: usize, hamiltonian: Option<ComplexMatrix>, terms: &LindbladTerms) -> QuantumResult<Self> {
        let mut engine = Self::new(dim);
        if let Some(h) = hamiltonian {
            engine.set_hamiltonian(h)?;
        }
        for op in &terms.operators {
            engine.add_jump_operator(op.matrix.clone())?;
        }
        engine.finalize();
        Ok(engine)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_jump_operators(&self) -> usize {
        self.jumps.len()
    }

    pub fn is_finalized(&self) -> bool {
        self.decay_sum.is_some()
    }

    /// Sets the Hermitian generator. Un-finalizes the engine.
    pub fn set_hamiltonian(&mut self, hamiltonian: ComplexMatrix) -> QuantumResult<()> {
        self.check_dim(&hamiltonian)?;
        if !hamiltonian.is_hermitian(1e-9) {
            return Err(QuantumError::InvalidOperation { message: "Hamiltonian must be Hermitian".to_string() });
        }
        self.hamiltonian = Some(hamiltonian);
        self.decay_sum = None;
        Ok(())
    }

    /// Adds one jump operator `L` (rate already folded in). Un-finalizes the engine.
    pub fn add_jump_operator(&mut self, operator: ComplexMatrix) -> QuantumResult<()> {
        self.check_dim(&operator)?;
        self.jumps.push(operator);
        self.decay_sum = None;
        Ok(())
    }

    /// Drops the Hamiltonian and every jump operator. Un-finalizes the engine.
    pub fn clear_operators(&mut self) {
        self.hamiltonian = None;
        self.jumps.clear();
        self.decay_sum = None;
    }

    /// Precomputes `Σ L†L`. Must be called before stepping.
    pub fn finalize(&mut self) {
        let mut sum = ComplexMatrix::zeros(self.dim);
        for l in &self.jumps {
            sum.add_assign(&l.dagger().matmul(l));
        }
        self.decay_sum = Some(sum);
    }

    /// Unitary and Kraus operators for one substep of length `dt`.
    fn step_operators(&self, dt: f64) -> QuantumResult<(Option<ComplexMatrix>, Vec<ComplexMatrix>)> {
        let decay_sum = self.decay_sum.as_ref().ok_or_else(|| QuantumError::InvalidOperation {
            message: "EvolutionEngine stepped before finalize()".to_string(),
        })?;
        let unitary = self.hamiltonian.as_ref().map(|h| ComplexMatrix::evolution_operator(h, dt));
        if self.jumps.is_empty() {
            return Ok((unitary, Vec::new()));
        }
        let mut kraus = Vec::with_capacity(self.jumps.len() + 1);
        kraus.push(ComplexMatrix::identity(self.dim).sub(&decay_sum.scale_real(0.5 * dt)));
        let root = Complex::new(dt.sqrt(), 0.0);
        kraus.extend(self.jumps.iter().map(|l| l.scale(root)));
        Ok((unitary, kraus))
    }

    /// Advances `rho` by one step of length `dt`.
    pub fn evolve_step(&self, rho: &ComplexMatrix, dt: f64) -> QuantumResult<ComplexMatrix> {
        self.check_dim(rho)?;
        check_dt(dt)?;
        let (unitary, kraus) = self.step_operators(dt)?;
        apply_step(rho, unitary.as_ref(), &kraus)
    }

    /// Advances `rho` by `dt`, split into `ceil(dt / max_dt)` equal substeps.
    pub fn evolve(&self, rho: &ComplexMatrix, dt: f64, max_dt: f64) -> QuantumResult<ComplexMatrix> {
        self.check_dim(rho)?;
        let (substeps, sub_dt) = subdivide(dt, max_dt)?;
        let (unitary, kraus) = self.step_operators(sub_dt)?;
        let mut state = rho.clone();
        for _ in 0..substeps {
            state = apply_step(&state, unitary.as_ref(), &kraus)?;
        }
        trace!("evolved dim {} by {} in {} substeps", self.dim, dt, substeps);
        Ok(state)
    }

    /// Same as `evolve`, applied in place to a component.
    pub fn evolve_component(&self, component: &mut QuantumComponent, dt: f64, max_dt: f64) -> QuantumResult<()> {
        if component.hilbert_dimension() != self.dim {
            return Err(QuantumError::DimensionMismatch { expected: self.dim, actual: component.hilbert_dimension() });
        }
        let (substeps, sub_dt) = subdivide(dt, max_dt)?;
        let (unitary, kraus) = self.step_operators(sub_dt)?;
        for _ in 0..substeps {
            if let Some(u) = &unitary {
                component.apply_unitary(u)?;
            }
            if !kraus.is_empty() {
                component.apply_kraus(&kraus)?;
                component.renormalize()?;
            }
        }
        Ok(())
    }

    /// Predicts `steps` frames ahead without touching the input.
    ///
    /// # Returns
    /// One packed snapshot (`ComplexMatrix::to_packed`) per frame, in order,
    /// plus the pairwise mutual information of the last frame when the
    /// component has at least two qubits.
    pub fn lookahead(&self, rho: &ComplexMatrix, steps: usize, dt: f64, max_dt: f64) -> QuantumResult<Lookahead> {
        let num_qubits = self.dim.trailing_zeros() as usize;
        let mut state = rho.clone();
        let mut frames = Vec::with_capacity(steps);
        let mut mutual_information = Vec::new();
        for step in 0..steps {
            if step + 1 == steps && num_qubits >= 2 {
                let (next, mi) = self.evolve_with_mutual_information(&state, dt, max_dt, num_qubits)?;
                state = next;
                mutual_information = mi;
            } else {
                state = self.evolve(&state, dt, max_dt)?;
            }
            frames.push(state.to_packed());
        }
        Ok(Lookahead { frames, mutual_information })
    }

    /// `evolve` followed by the pairwise mutual information of the result.
    pub fn evolve_with_mutual_information(
        &self,
        rho: &ComplexMatrix,
        dt: f64,
        max_dt: f64,
        num_qubits: usize,
    ) -> QuantumResult<(ComplexMatrix, Vec<f64>)> {
        let state = self.evolve(rho, dt, max_dt)?;
        let mi = observables::all_mutual_information(&state, num_qubits);
        Ok((state, mi))
    }

    fn check_dim(&self, m: &ComplexMatrix) -> QuantumResult<()> {
        if m.dim() != self.dim {
            return Err(QuantumError::DimensionMismatch { expected: self.dim, actual: m.dim() });
        }
        Ok(())
    }
}

fn check_dt(dt: f64) -> QuantumResult<()> {
    if dt < 0.0 || !dt.is_finite() {
        return Err(QuantumError::InvalidOperation { message: format!("time step must be finite and non-negative, got {}", dt) });
    }
    Ok(())
}

/// Number of substeps and their length for a frame of `dt`.
fn subdivide(dt: f64, max_dt: f64) -> QuantumResult<(usize, f64)> {
    check_dt(dt)?;
    if max_dt <= 0.0 || !max_dt.is_finite() {
        return Err(QuantumError::InvalidOperation { message: format!("max_dt must be positive, got {}", max_dt) });
    }
    if dt == 0.0 {
        return Ok((0, 0.0));
    }
    // Ratios like 0.1 / 0.01 land a hair above an integer.
    let ratio = (dt / max_dt - 1e-9).ceil().max(1.0);
    if !ratio.is_finite() || ratio > MAX_SUBSTEPS as f64 {
        return Err(QuantumError::InvalidOperation {
            message: format!("dt {} needs more than {} substeps of {}", dt, MAX_SUBSTEPS, max_dt),
        });
    }
    let substeps = ratio as usize;
    Ok((substeps, dt / substeps as f64))
}

fn apply_step(rho: &ComplexMatrix, unitary: Option<&ComplexMatrix>, kraus: &[ComplexMatrix]) -> QuantumResult<ComplexMatrix> {
    let mut state = match unitary {
        Some(u) => u.matmul(rho).matmul(&u.dagger()),
        None => rho.clone(),
    };
    if !kraus.is_empty() {
        let mut next = ComplexMatrix::zeros(state.dim());
        for k in kraus {
            next.add_assign(&k.matmul(&state).matmul(&k.dagger()));
        }
        let trace = next.trace().re;
        if trace <= PROBABILITY_EPSILON || !trace.is_finite() {
            return Err(QuantumError::NormalizationDrift { message: format!("trace fell to {} during evolution", trace) });
        }
        state = next.scale_real(1.0 / trace);
    }
    state.hermitize();
    Ok(state)
}
