// src/observables/mod.rs

//! Read-only quantities derived from a density matrix.
//!
//! Visualization and quest logic read these; nothing here mutates state.
//! Functions that take `num_qubits` use the component's local ordering, where
//! position 0 is the most significant bit.

use num_complex::Complex;
use num_traits::Zero;

use crate::core::ComplexMatrix;
use crate::core::engine_constants::PROBABILITY_EPSILON;

/// `Tr(ρ²)`: 1 for a pure state, `1/d` for the maximally mixed state.
pub fn purity(rho: &ComplexMatrix) -> f64 {
    let n = rho.dim();
    let mut total = 0.0;
    for i in 0..n {
        for j in 0..n {
            // Tr(ρρ) = Σ ρ_ij ρ_ji = Σ |ρ_ij|² for Hermitian ρ
            total += (rho.get(i, j) * rho.get(j, i)).re;
        }
    }
    total
}

/// `Tr(Oρ)` for an observable `O` of matching dimension.
pub fn expectation_value(observable: &ComplexMatrix, rho: &ComplexMatrix) -> f64 {
    assert_eq!(observable.dim(), rho.dim(), "dimension mismatch in expectation_value");
    let n = rho.dim();
    let mut total = Complex::<f64>::zero();
    for i in 0..n {
        for j in 0..n {
            total += observable.get(i, j) * rho.get(j, i);
        }
    }
    total.re
}

/// Traces out every qubit except `keep`, in the order given.
///
/// The first kept position becomes the most significant bit of the result.
pub fn partial_trace(rho: &ComplexMatrix, keep: &[usize], num_qubits: usize) -> ComplexMatrix {
    assert_eq!(rho.dim(), 1 << num_qubits, "dimension mismatch in partial_trace");
    let shifts: Vec<usize> = keep.iter().map(|p| num_qubits - 1 - p).collect();
    let mask = shifts.iter().fold(0usize, |acc, s| acc | (1 << s));
    let sub = |index: usize| shifts.iter().fold(0usize, |acc, s| (acc << 1) | ((index >> s) & 1));

    let n = rho.dim();
    let mut out = ComplexMatrix::zeros(1 << keep.len());
    for r in 0..n {
        for c in 0..n {
            if r & !mask != c & !mask {
                continue;
            }
            let (i, j) = (sub(r), sub(c));
            out.set(i, j, out.get(i, j) + rho.get(r, c));
        }
    }
    out
}

/// 2×2 reduced state of the qubit at `position`.
pub fn reduced_single(rho: &ComplexMatrix, position: usize, num_qubits: usize) -> ComplexMatrix {
    partial_trace(rho, &[position], num_qubits)
}

/// 4×4 reduced state of the pair `(a, b)`, with `a` as the high bit.
pub fn reduced_pair(rho: &ComplexMatrix, a: usize, b: usize, num_qubits: usize) -> ComplexMatrix {
    assert_ne!(a, b, "reduced_pair needs two distinct qubits");
    partial_trace(rho, &[a, b], num_qubits)
}

/// `S(ρ) = −Σ λ log₂ λ` in bits.
pub fn von_neumann_entropy(rho: &ComplexMatrix) -> f64 {
    rho.hermitian_eigenvalues()
        .into_iter()
        .filter(|l| *l > PROBABILITY_EPSILON)
        .map(|l| -l * l.log2())
        .sum()
}

/// `I(a:b) = S(a) + S(b) − S(ab)`, clamped at zero against rounding.
pub fn mutual_information(rho: &ComplexMatrix, a: usize, b: usize, num_qubits: usize) -> f64 {
    let s_a = von_neumann_entropy(&reduced_single(rho, a, num_qubits));
    let s_b = von_neumann_entropy(&reduced_single(rho, b, num_qubits));
    let s_ab = von_neumann_entropy(&reduced_pair(rho, a, b, num_qubits));
    (s_a + s_b - s_ab).max(0.0)
}

/// Mutual information of every pair `i < j`, row by row:
/// `(0,1), (0,2), …, (1,2), …`.
pub fn all_mutual_information(rho: &ComplexMatrix, num_qubits: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(num_qubits * num_qubits.saturating_sub(1) / 2);
    for i in 0..num_qubits {
        for j in (i + 1)..num_qubits {
            out.push(mutual_information(rho, i, j, num_qubits));
        }
    }
    out
}

/// Bloch vector `(x, y, z)` of a single-qubit state, so that
/// `ρ = (I + xX + yY + zZ) / 2`. North is `z = +1`.
pub fn bloch_vector(rho: &ComplexMatrix) -> [f64; 3] {
    assert_eq!(rho.dim(), 2, "bloch_vector needs a 2x2 density matrix");
    let coherence = rho.get(0, 1);
    [2.0 * coherence.re, -2.0 * coherence.im, rho.get(0, 0).re - rho.get(1, 1).re]
}
