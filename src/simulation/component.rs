// src/simulation/component.rs

use log::{debug, trace};
use num_complex::Complex;
use num_traits::Zero;
use rand::Rng;

use crate::core::engine_constants::{MAX_COMPONENT_QUBITS, PROBABILITY_EPSILON, TRACE_TOLERANCE};
use crate::core::{ComplexMatrix, ComponentId, MeasureMode, Pole, QuantumError, QuantumResult, RegisterId};
use crate::observables;
use crate::operations::{Gate, TwoQubitGate};
use crate::validation;

/// One maximal entangled group of qubits and its shared density matrix.
///
/// The component owns an ordered list of global qubit ids. Local position 0 is
/// the most significant bit of a matrix index, so for qubits `[a, b]` the basis
/// index `2·bit_a + bit_b` addresses `|bit_a, bit_b⟩`.
///
/// Invariant: `ρ` is Hermitian, positive semidefinite, has dimension
/// `2^qubits.len()` and trace 1 (within tolerance) whenever control returns to
/// the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantumComponent {
    id: ComponentId,
    qubits: Vec<RegisterId>,
    rho: ComplexMatrix,
}

impl QuantumComponent {
    /// Creates a component over `qubits`, initialized to |0…0⟩.
    ///
    /// # Errors
    /// `InvalidOperation` for an empty qubit list, a repeated qubit, or more
    /// than `MAX_COMPONENT_QUBITS` qubits.
    pub fn new(id: ComponentId, qubits: Vec<RegisterId>) -> QuantumResult<Self> {
        if qubits.is_empty() {
            return Err(QuantumError::InvalidOperation { message: "A component needs at least one qubit".to_string() });
        }
        if qubits.len() > MAX_COMPONENT_QUBITS {
            return Err(QuantumError::InvalidOperation {
                message: format!("{} qubits exceeds the {}-qubit component limit", qubits.len(), MAX_COMPONENT_QUBITS),
            });
        }
        let mut sorted = qubits.clone();
        sorted.sort();
        sorted.dedup();
        if sorted.len() != qubits.len() {
            return Err(QuantumError::InvalidOperation { message: format!("Repeated qubit in {:?}", qubits) });
        }
        let dim = 1usize << qubits.len();
        let rho = ComplexMatrix::ket_bra(dim, 0, 0);
        Ok(Self { id, qubits, rho })
    }

    /// Forms `a ⊗ b` as a new component with qubit order `a.qubits ++ b.qubits`.
    ///
    /// # Errors
    /// `InvalidOperation` if the inputs share a qubit or the result would
    /// exceed the component size limit.
    pub fn tensor(id: ComponentId, a: &Self, b: &Self) -> QuantumResult<Self> {
        let mut qubits = a.qubits.clone();
        qubits.extend_from_slice(&b.qubits);
        let mut merged = Self::new(id, qubits)?;
        merged.rho = a.rho.kron(&b.rho);
        debug!("{} = {} ⊗ {} (dim {})", id, a.id, b.id, merged.hilbert_dimension());
        Ok(merged)
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Global qubit ids in local order.
    pub fn qubits(&self) -> &[RegisterId] {
        &self.qubits
    }

    pub fn num_qubits(&self) -> usize {
        self.qubits.len()
    }

    /// `2^num_qubits`.
    pub fn hilbert_dimension(&self) -> usize {
        self.rho.dim()
    }

    pub fn contains(&self, qubit: RegisterId) -> bool {
        self.qubits.contains(&qubit)
    }

    /// Local position (0 = most significant) of a global qubit.
    pub fn local_position(&self, qubit: RegisterId) -> QuantumResult<usize> {
        self.qubits
            .iter()
            .position(|q| *q == qubit)
            .ok_or(QuantumError::UnknownRegister { register: qubit })
    }

    /// Bit shift for a local position.
    fn shift_of(&self, position: usize) -> usize {
        self.num_qubits() - 1 - position
    }

    /// Read-only access to `ρ`.
    pub fn get_density_matrix(&self) -> &ComplexMatrix {
        &self.rho
    }

    /// Replaces `ρ` after checking dimension, Hermiticity, trace and positivity.
    pub fn set_density_matrix(&mut self, rho: ComplexMatrix) -> QuantumResult<()> {
        if rho.dim() != self.hilbert_dimension() {
            return Err(QuantumError::DimensionMismatch { expected: self.hilbert_dimension(), actual: rho.dim() });
        }
        validation::validate_density_matrix(&rho, None)?;
        self.rho = rho;
        Ok(())
    }

    /// Sets `ρ = |index⟩⟨index|`.
    pub fn initialize_to_basis_state(&mut self, index: usize) -> QuantumResult<()> {
        let dim = self.hilbert_dimension();
        if index >= dim {
            return Err(QuantumError::InvalidOperation {
                message: format!("Basis state {} outside dimension {}", index, dim),
            });
        }
        self.rho = ComplexMatrix::ket_bra(dim, index, index);
        Ok(())
    }

    /// `ρ[index][index].re`; zero for indices outside the space.
    pub fn get_basis_probability(&self, index: usize) -> f64 {
        if index >= self.hilbert_dimension() {
            return 0.0;
        }
        self.rho.get(index, index).re
    }

    /// All diagonal probabilities in basis order.
    pub fn get_basis_probabilities(&self) -> Vec<f64> {
        self.rho.diagonal_real()
    }

    /// `P(qubit = value)`, tracing out every other qubit of the component.
    pub fn get_marginal_probability(&self, qubit: RegisterId, value: usize) -> QuantumResult<f64> {
        if value > 1 {
            return Err(QuantumError::InvalidOperation { message: format!("Qubit value must be 0 or 1, got {}", value) });
        }
        let shift = self.shift_of(self.local_position(qubit)?);
        Ok(self
            .rho
            .diagonal_real()
            .iter()
            .enumerate()
            .filter(|(i, _)| (i >> shift) & 1 == value)
            .map(|(_, p)| p)
            .sum())
    }

    /// Real part of `Tr(ρ)`.
    pub fn get_trace(&self) -> f64 {
        self.rho.trace().re
    }

    /// Divides `ρ` by its trace.
    ///
    /// # Errors
    /// `NormalizationDrift` if the trace has collapsed to (near) zero.
    pub fn renormalize(&mut self) -> QuantumResult<()> {
        let trace = self.get_trace();
        if trace.abs() <= PROBABILITY_EPSILON || !trace.is_finite() {
            return Err(QuantumError::NormalizationDrift {
                message: format!("{} trace {} cannot be renormalized", self.id, trace),
            });
        }
        self.rho = self.rho.scale_real(1.0 / trace);
        Ok(())
    }

    /// Lifts an operator on the listed local positions to the full component
    /// space (identity on every other qubit).
    pub fn embed(&self, positions: &[usize], local: &ComplexMatrix) -> ComplexMatrix {
        embed_operator(self.num_qubits(), positions, local)
    }

    /// `ρ ← UρU†`.
    pub fn apply_unitary(&mut self, unitary: &ComplexMatrix) -> QuantumResult<()> {
        self.check_dim(unitary)?;
        let mut next = unitary.matmul(&self.rho).matmul(&unitary.dagger());
        next.hermitize();
        self.rho = next;
        Ok(())
    }

    /// `ρ ← Σ_k K_k ρ K_k†`. Trace is preserved when `Σ K†K = I`.
    pub fn apply_kraus(&mut self, operators: &[ComplexMatrix]) -> QuantumResult<()> {
        let mut next = ComplexMatrix::zeros(self.hilbert_dimension());
        for k in operators {
            self.check_dim(k)?;
            next.add_assign(&k.matmul(&self.rho).matmul(&k.dagger()));
        }
        next.hermitize();
        self.rho = next;
        Ok(())
    }

    /// Advances `ρ` by one step of `dρ/dt = −i[H, ρ]`.
    ///
    /// Uses the exact propagator `U = exp(−iH·dt)` and `ρ ← UρU†`, which keeps
    /// `ρ` Hermitian, positive and trace one. Callers still step with small
    /// `dt` so that time-dependent Hamiltonians are sampled finely.
    pub fn apply_hamiltonian_evolution(&mut self, hamiltonian: &ComplexMatrix, dt: f64) -> QuantumResult<()> {
        self.check_dim(hamiltonian)?;
        if !hamiltonian.is_hermitian(1e-9) {
            return Err(QuantumError::InvalidOperation { message: "Hamiltonian must be Hermitian".to_string() });
        }
        let u = ComplexMatrix::evolution_operator(hamiltonian, dt);
        self.apply_unitary(&u)
    }

    /// One step of amplitude damping on `qubit` toward `target_state`.
    ///
    /// With `γ = 1 − e^{−rate·dt}` the Kraus pair
    /// `K₀ = |t⟩⟨t| + √(1−γ)|o⟩⟨o|`, `K₁ = √γ|t⟩⟨o|` satisfies `K₀†K₀ + K₁†K₁ = I`
    /// exactly, so trace does not drift however many steps are applied.
    pub fn apply_lindblad_drive(&mut self, qubit: RegisterId, target_state: usize, rate: f64, dt: f64) -> QuantumResult<()> {
        if target_state > 1 {
            return Err(QuantumError::InvalidOperation { message: format!("Target state must be 0 or 1, got {}", target_state) });
        }
        if rate < 0.0 || dt < 0.0 || !rate.is_finite() || !dt.is_finite() {
            return Err(QuantumError::InvalidOperation {
                message: format!("Drive needs finite non-negative rate and dt (rate={}, dt={})", rate, dt),
            });
        }
        let position = self.local_position(qubit)?;
        let gamma = 1.0 - (-rate * dt).exp();
        let t = target_state;
        let o = 1 - target_state;

        let mut k0 = ComplexMatrix::zeros(2);
        k0.set(t, t, Complex::new(1.0, 0.0));
        k0.set(o, o, Complex::new((1.0 - gamma).sqrt(), 0.0));
        let mut k1 = ComplexMatrix::zeros(2);
        k1.set(t, o, Complex::new(gamma.sqrt(), 0.0));

        let kraus = [self.embed(&[position], &k0), self.embed(&[position], &k1)];
        self.apply_kraus(&kraus)?;
        trace!("{} drive {} -> {} gamma={:.6} trace={:.12}", self.id, qubit, target_state, gamma, self.get_trace());
        Ok(())
    }

    /// Conjugates `ρ` by a single-qubit gate on `qubit`.
    pub fn apply_gate(&mut self, qubit: RegisterId, gate: Gate) -> QuantumResult<()> {
        self.apply_single_qubit_gate(qubit, &gate.to_matrix())
    }

    /// Conjugates `ρ` by an arbitrary 2×2 unitary acting on `qubit`.
    ///
    /// # Errors
    /// `DimensionMismatch` unless `unitary` is 2×2, `UnknownRegister` if the
    /// qubit is not part of this component.
    pub fn apply_single_qubit_gate(&mut self, qubit: RegisterId, unitary: &ComplexMatrix) -> QuantumResult<()> {
        if unitary.dim() != 2 {
            return Err(QuantumError::DimensionMismatch { expected: 2, actual: unitary.dim() });
        }
        let position = self.local_position(qubit)?;
        let u = self.embed(&[position], unitary);
        self.apply_unitary(&u)
    }

    /// Conjugates `ρ` by a two-qubit gate on `(first, second)`.
    pub fn apply_two_qubit_gate(&mut self, first: RegisterId, second: RegisterId, gate: TwoQubitGate) -> QuantumResult<()> {
        self.apply_two_qubit_unitary(first, second, &ComplexMatrix::from_array(gate.matrix()))
    }

    /// Conjugates `ρ` by a 4×4 unitary in the basis |first, second⟩.
    pub fn apply_two_qubit_unitary(&mut self, first: RegisterId, second: RegisterId, unitary: &ComplexMatrix) -> QuantumResult<()> {
        if first == second {
            return Err(QuantumError::InvalidOperation {
                message: "Target qubits for a two-qubit gate cannot be the same".to_string(),
            });
        }
        if unitary.dim() != 4 {
            return Err(QuantumError::DimensionMismatch { expected: 4, actual: unitary.dim() });
        }
        let positions = [self.local_position(first)?, self.local_position(second)?];
        let u = self.embed(&positions, unitary);
        self.apply_unitary(&u)
    }

    /// Samples `qubit` by the Born rule and updates the state per `mode`.
    ///
    /// Returns the observed pole and the probability it had before the update.
    /// An outcome whose probability is (numerically) zero is never chosen.
    pub fn measure<R: Rng + ?Sized>(&mut self, qubit: RegisterId, mode: MeasureMode, rng: &mut R) -> QuantumResult<(Pole, f64)> {
        let p_north = self.get_marginal_probability(qubit, 0)?.max(0.0);
        let p_south = self.get_marginal_probability(qubit, 1)?.max(0.0);
        let total = p_north + p_south;
        if total <= PROBABILITY_EPSILON {
            return Err(QuantumError::NormalizationDrift {
                message: format!("{} has no probability mass on {}", self.id, qubit),
            });
        }
        let pole = if p_north <= PROBABILITY_EPSILON {
            Pole::South
        } else if p_south <= PROBABILITY_EPSILON {
            Pole::North
        } else if rng.random::<f64>() * total < p_north {
            Pole::North
        } else {
            Pole::South
        };
        let probability = match pole {
            Pole::North => p_north,
            Pole::South => p_south,
        } / total;

        match mode {
            MeasureMode::Collapse => {
                self.collapse(qubit, pole.value())?;
            }
            MeasureMode::Drain { fraction } => {
                self.drain(qubit, pole.value(), fraction)?;
            }
        }
        debug!("{} measured {} -> {:?} (p={:.4})", self.id, qubit, pole, probability);
        Ok((pole, probability))
    }

    /// Projects onto `qubit = value` and renormalizes. Returns the pre-collapse
    /// probability of that outcome.
    pub fn collapse(&mut self, qubit: RegisterId, value: usize) -> QuantumResult<f64> {
        let probability = self.get_marginal_probability(qubit, value)?;
        if probability <= PROBABILITY_EPSILON {
            return Err(QuantumError::InvalidOperation {
                message: format!("Cannot collapse {} onto {} with probability {}", qubit, value, probability),
            });
        }
        let shift = self.shift_of(self.local_position(qubit)?);
        self.scale_by_bit(shift, 1 - value, 0.0);
        self.renormalize()?;
        Ok(probability)
    }

    /// Removes `fraction` of the probability mass of `qubit = value`, then
    /// renormalizes. Returns the mass removed (before renormalization).
    ///
    /// Applied as the diagonal Kraus operator `√(1−f)·P_value + P_other`, so the
    /// state stays positive and the other outcome keeps its relative share.
    pub fn drain(&mut self, qubit: RegisterId, value: usize, fraction: f64) -> QuantumResult<f64> {
        if !(0.0..1.0).contains(&fraction) {
            return Err(QuantumError::InvalidOperation {
                message: format!("Drain fraction must be in [0, 1), got {}", fraction),
            });
        }
        let probability = self.get_marginal_probability(qubit, value)?;
        let shift = self.shift_of(self.local_position(qubit)?);
        self.scale_by_bit(shift, value, (1.0 - fraction).sqrt());
        self.renormalize()?;
        Ok(probability * fraction)
    }

    /// Multiplies amplitude rows and columns whose bit at `shift` equals
    /// `value` by `factor`, i.e. `ρ ← KρK†` for diagonal `K`.
    fn scale_by_bit(&mut self, shift: usize, value: usize, factor: f64) {
        let dim = self.hilbert_dimension();
        let weight = |i: usize| if (i >> shift) & 1 == value { factor } else { 1.0 };
        let mut next = ComplexMatrix::zeros(dim);
        for r in 0..dim {
            for c in 0..dim {
                let w = weight(r) * weight(c);
                if w != 0.0 {
                    next.set(r, c, self.rho.get(r, c) * w);
                }
            }
        }
        self.rho = next;
    }

    /// Replaces `ρ` by the tensor product of its single-qubit reduced states.
    ///
    /// Marginals are unchanged; every correlation between the qubits is gone.
    pub fn decorrelate(&mut self) -> QuantumResult<()> {
        let k = self.num_qubits();
        let mut product: Option<ComplexMatrix> = None;
        for position in 0..k {
            let reduced = observables::reduced_single(&self.rho, position, k);
            product = Some(match product {
                None => reduced,
                Some(acc) => acc.kron(&reduced),
            });
        }
        if let Some(rho) = product {
            self.rho = rho;
        }
        self.renormalize()
    }

    /// Checks trace, Hermiticity and positivity of the current state.
    pub fn validate(&self) -> QuantumResult<()> {
        validation::validate_density_matrix(&self.rho, Some(TRACE_TOLERANCE))
    }

    fn check_dim(&self, operator: &ComplexMatrix) -> QuantumResult<()> {
        if operator.dim() != self.hilbert_dimension() {
            return Err(QuantumError::DimensionMismatch { expected: self.hilbert_dimension(), actual: operator.dim() });
        }
        Ok(())
    }
}

/// Lifts `local` (acting on `positions.len()` qubits, first position most
/// significant) into a `num_qubits`-qubit space as `local ⊗ I`.
///
/// Entry `(r, c)` of the result is `local[sub(r)][sub(c)]` when `r` and `c`
/// agree on every bit outside `positions`, and zero otherwise.
pub fn embed_operator(num_qubits: usize, positions: &[usize], local: &ComplexMatrix) -> ComplexMatrix {
    assert_eq!(local.dim(), 1 << positions.len(), "local operator does not match {} positions", positions.len());
    let dim = 1usize << num_qubits;
    let shifts: Vec<usize> = positions.iter().map(|p| num_qubits - 1 - p).collect();
    let mask = shifts.iter().fold(0usize, |acc, s| acc | (1 << s));
    let sub = |index: usize| shifts.iter().fold(0usize, |acc, s| (acc << 1) | ((index >> s) & 1));

    let mut out = ComplexMatrix::zeros(dim);
    for r in 0..dim {
        for c in 0..dim {
            if r & !mask != c & !mask {
                continue;
            }
            let value = local.get(sub(r), sub(c));
            if !value.is_zero() {
                out.set(r, c, value);
            }
        }
    }
    out
}
