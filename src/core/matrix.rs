// src/core/matrix.rs

//! Dense square complex matrices.
//!
//! `ComplexMatrix` backs both density matrices and operators (Hamiltonians,
//! jump operators, gates). It stores its entries row-major in a flat `Vec`.
//!
//! The type enforces squareness and nothing else. Physical invariants of a
//! density matrix (Hermitian, trace one, positive semidefinite) belong to the
//! owning `QuantumComponent`. Arithmetic between matrices of different
//! dimension is a programming-contract violation and panics.

use num_complex::Complex;
use num_traits::{One, Zero};
use std::fmt;

use super::error::{QuantumError, QuantumResult};

/// Taylor terms tried before giving up on further convergence in `exp`.
const EXP_MAX_TERMS: usize = 24;
/// Scaling target for the scaling-and-squaring exponential.
const EXP_SCALE_TARGET: f64 = 0.5;
/// Jacobi sweeps before the eigenvalue solver returns what it has.
const JACOBI_MAX_SWEEPS: usize = 64;

/// A dense `dim × dim` matrix over `Complex<f64>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexMatrix {
    dim: usize,
    data: Vec<Complex<f64>>,
}

impl ComplexMatrix {
    /// All-zero matrix.
    pub fn zeros(dim: usize) -> Self {
        Self { dim, data: vec![Complex::zero(); dim * dim] }
    }

    /// Identity matrix.
    pub fn identity(dim: usize) -> Self {
        let mut m = Self::zeros(dim);
        for i in 0..dim {
            m.data[i * dim + i] = Complex::one();
        }
        m
    }

    /// Diagonal matrix from the given entries.
    pub fn from_diagonal(diag: &[Complex<f64>]) -> Self {
        let mut m = Self::zeros(diag.len());
        for (i, value) in diag.iter().enumerate() {
            m.set(i, i, *value);
        }
        m
    }

    /// The outer product `|row⟩⟨col|` in a space of dimension `dim`.
    pub fn ket_bra(dim: usize, row: usize, col: usize) -> Self {
        let mut m = Self::zeros(dim);
        m.set(row, col, Complex::one());
        m
    }

    /// Builds a matrix from nested rows.
    ///
    /// # Errors
    /// `DimensionMismatch` if any row length differs from the row count.
    pub fn from_rows(rows: Vec<Vec<Complex<f64>>>) -> QuantumResult<Self> {
        let dim = rows.len();
        let mut data = Vec::with_capacity(dim * dim);
        for row in rows {
            if row.len() != dim {
                return Err(QuantumError::DimensionMismatch { expected: dim, actual: row.len() });
            }
            data.extend(row);
        }
        Ok(Self { dim, data })
    }

    /// Builds a matrix from a fixed-size array, as used for gate tables.
    pub fn from_array<const N: usize>(rows: [[Complex<f64>; N]; N]) -> Self {
        let mut data = Vec::with_capacity(N * N);
        for row in rows.iter() {
            data.extend_from_slice(row);
        }
        Self { dim: N, data }
    }

    /// Rebuilds a matrix from the flat `[re, im, re, im, …]` row-major dump
    /// produced by [`ComplexMatrix::to_packed`].
    ///
    /// # Errors
    /// `DimensionMismatch` if `packed` does not hold exactly `2·dim²` values.
    pub fn from_packed(dim: usize, packed: &[f64]) -> QuantumResult<Self> {
        if packed.len() != 2 * dim * dim {
            return Err(QuantumError::DimensionMismatch { expected: 2 * dim * dim, actual: packed.len() });
        }
        let data = packed.chunks_exact(2).map(|pair| Complex::new(pair[0], pair[1])).collect();
        Ok(Self { dim, data })
    }

    /// Flat numeric dump: row-major, real and imaginary parts interleaved.
    pub fn to_packed(&self) -> Vec<f64> {
        let mut packed = Vec::with_capacity(2 * self.data.len());
        for c in &self.data {
            packed.push(c.re);
            packed.push(c.im);
        }
        packed
    }

    /// Number of rows (equivalently, columns).
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Element at `(row, col)`. Panics when out of range.
    pub fn get(&self, row: usize, col: usize) -> Complex<f64> {
        assert!(row < self.dim && col < self.dim, "index ({row}, {col}) outside {0}x{0} matrix", self.dim);
        self.data[row * self.dim + col]
    }

    /// Overwrites the element at `(row, col)`. Panics when out of range.
    pub fn set(&mut self, row: usize, col: usize, value: Complex<f64>) {
        assert!(row < self.dim && col < self.dim, "index ({row}, {col}) outside {0}x{0} matrix", self.dim);
        self.data[row * self.dim + col] = value;
    }

    /// Row-major view of the entries.
    pub fn as_slice(&self) -> &[Complex<f64>] {
        &self.data
    }

    fn assert_same_dim(&self, other: &Self, op: &str) {
        assert_eq!(self.dim, other.dim, "{op}: dimension mismatch ({} vs {})", self.dim, other.dim);
    }

    /// Matrix product `self · other`.
    pub fn matmul(&self, other: &Self) -> Self {
        self.assert_same_dim(other, "matmul");
        let n = self.dim;
        let mut out = Self::zeros(n);
        for i in 0..n {
            for k in 0..n {
                let a = self.data[i * n + k];
                if a.is_zero() {
                    continue;
                }
                let row_out = &mut out.data[i * n..(i + 1) * n];
                let row_other = &other.data[k * n..(k + 1) * n];
                for (o, b) in row_out.iter_mut().zip(row_other) {
                    *o += a * *b;
                }
            }
        }
        out
    }

    /// Element-wise sum.
    pub fn add(&self, other: &Self) -> Self {
        self.assert_same_dim(other, "add");
        let data = self.data.iter().zip(&other.data).map(|(a, b)| *a + *b).collect();
        Self { dim: self.dim, data }
    }

    /// Element-wise difference.
    pub fn sub(&self, other: &Self) -> Self {
        self.assert_same_dim(other, "sub");
        let data = self.data.iter().zip(&other.data).map(|(a, b)| *a - *b).collect();
        Self { dim: self.dim, data }
    }

    /// In-place `self += other`.
    pub fn add_assign(&mut self, other: &Self) {
        self.assert_same_dim(other, "add_assign");
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += *b;
        }
    }

    /// Multiplies every entry by `factor`.
    pub fn scale(&self, factor: Complex<f64>) -> Self {
        Self { dim: self.dim, data: self.data.iter().map(|a| *a * factor).collect() }
    }

    /// Multiplies every entry by a real `factor`.
    pub fn scale_real(&self, factor: f64) -> Self {
        Self { dim: self.dim, data: self.data.iter().map(|a| *a * factor).collect() }
    }

    /// Hermitian adjoint (conjugate transpose).
    pub fn dagger(&self) -> Self {
        let n = self.dim;
        let mut out = Self::zeros(n);
        for i in 0..n {
            for j in 0..n {
                out.data[j * n + i] = self.data[i * n + j].conj();
            }
        }
        out
    }

    /// Kronecker (tensor) product `self ⊗ other`.
    ///
    /// `self` occupies the high-order index bits of the result, so the qubits of
    /// `self` come first in the combined ordering.
    pub fn kron(&self, other: &Self) -> Self {
        let (n1, n2) = (self.dim, other.dim);
        let n = n1 * n2;
        let mut out = Self::zeros(n);
        for i1 in 0..n1 {
            for j1 in 0..n1 {
                let a = self.data[i1 * n1 + j1];
                if a.is_zero() {
                    continue;
                }
                for i2 in 0..n2 {
                    for j2 in 0..n2 {
                        let row = i1 * n2 + i2;
                        let col = j1 * n2 + j2;
                        out.data[row * n + col] = a * other.data[i2 * n2 + j2];
                    }
                }
            }
        }
        out
    }

    /// Commutator `[self, other] = self·other − other·self`.
    pub fn commutator(&self, other: &Self) -> Self {
        self.matmul(other).sub(&other.matmul(self))
    }

    /// Anticommutator `{self, other} = self·other + other·self`.
    pub fn anticommutator(&self, other: &Self) -> Self {
        self.matmul(other).add(&other.matmul(self))
    }

    /// Sum of the diagonal.
    pub fn trace(&self) -> Complex<f64> {
        (0..self.dim).map(|i| self.data[i * self.dim + i]).sum()
    }

    /// Real parts of the diagonal.
    pub fn diagonal_real(&self) -> Vec<f64> {
        (0..self.dim).map(|i| self.data[i * self.dim + i].re).collect()
    }

    /// True when `|a_ij − conj(a_ji)| ≤ tolerance` for every pair.
    pub fn is_hermitian(&self, tolerance: f64) -> bool {
        let n = self.dim;
        for i in 0..n {
            for j in i..n {
                if (self.data[i * n + j] - self.data[j * n + i].conj()).norm() > tolerance {
                    return false;
                }
            }
        }
        true
    }

    /// Replaces the matrix with `(A + A†)/2`, removing rounding asymmetry.
    pub fn hermitize(&mut self) {
        let n = self.dim;
        for i in 0..n {
            for j in i..n {
                let upper = self.data[i * n + j];
                let lower = self.data[j * n + i];
                let avg = (upper + lower.conj()) * 0.5;
                self.data[i * n + j] = avg;
                self.data[j * n + i] = avg.conj();
            }
        }
    }

    /// Induced infinity norm (largest absolute row sum).
    pub fn norm_inf(&self) -> f64 {
        let n = self.dim;
        (0..n)
            .map(|i| self.data[i * n..(i + 1) * n].iter().map(|c| c.norm()).sum::<f64>())
            .fold(0.0, f64::max)
    }

    /// Matrix exponential by scaling and squaring a truncated Taylor series.
    ///
    /// The argument is halved until its norm is below 0.5, where the series
    /// converges to machine precision in well under `EXP_MAX_TERMS` terms, then
    /// the result is squared back up.
    pub fn exp(&self) -> Self {
        let n = self.dim;
        let norm = self.norm_inf();
        if norm < 1e-15 {
            return Self::identity(n);
        }
        let mut squarings = 0u32;
        let mut scaled_norm = norm;
        while scaled_norm > EXP_SCALE_TARGET {
            scaled_norm *= 0.5;
            squarings += 1;
        }
        let a = self.scale_real(0.5f64.powi(squarings as i32));

        let mut result = Self::identity(n);
        let mut term = Self::identity(n);
        for k in 1..=EXP_MAX_TERMS {
            term = term.matmul(&a).scale_real(1.0 / k as f64);
            result.add_assign(&term);
            if term.norm_inf() < 1e-17 {
                break;
            }
        }
        for _ in 0..squarings {
            result = result.matmul(&result);
        }
        result
    }

    /// The small-step propagator `U = exp(−i·H·dt)` for a Hermitian `hamiltonian`.
    ///
    /// `U` is unitary to within the series truncation, so `UρU†` preserves
    /// trace, Hermiticity and positivity of `ρ`.
    pub fn evolution_operator(hamiltonian: &Self, dt: f64) -> Self {
        hamiltonian.scale(Complex::new(0.0, -dt)).exp()
    }

    /// Eigenvalues of a Hermitian matrix, ascending.
    ///
    /// Writing `H = A + iB`, the real symmetric matrix `[[A, −B], [B, A]]`
    /// carries every eigenvalue of `H` exactly twice. Cyclic Jacobi rotations
    /// diagonalize it and every second sorted value is returned.
    pub fn hermitian_eigenvalues(&self) -> Vec<f64> {
        let n = self.dim;
        let m = 2 * n;
        let mut real = vec![0.0; m * m];
        for i in 0..n {
            for j in 0..n {
                let c = self.data[i * n + j];
                real[i * m + j] = c.re;
                real[(i + n) * m + (j + n)] = c.re;
                real[i * m + (j + n)] = -c.im;
                real[(i + n) * m + j] = c.im;
            }
        }
        let mut values = jacobi_eigenvalues(real, m);
        values.sort_by(|a, b| a.total_cmp(b));
        values.into_iter().step_by(2).collect()
    }
}

/// Cyclic Jacobi eigenvalue iteration for a real symmetric `n × n` matrix.
fn jacobi_eigenvalues(mut a: Vec<f64>, n: usize) -> Vec<f64> {
    for _ in 0..JACOBI_MAX_SWEEPS {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a[p * n + q] * a[p * n + q];
            }
        }
        if off < 1e-24 {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p * n + q];
                if apq.abs() < 1e-300 {
                    continue;
                }
                let theta = (a[q * n + q] - a[p * n + p]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                for k in 0..n {
                    let akp = a[k * n + p];
                    let akq = a[k * n + q];
                    a[k * n + p] = c * akp - s * akq;
                    a[k * n + q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[p * n + k];
                    let aqk = a[q * n + k];
                    a[p * n + k] = c * apk - s * aqk;
                    a[q * n + k] = s * apk + c * aqk;
                }
            }
        }
    }
    (0..n).map(|i| a[i * n + i]).collect()
}

impl fmt::Display for ComplexMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.dim {
            write!(f, "[")?;
            for j in 0..self.dim {
                write!(f, "{}{:.4}", if j > 0 { ", " } else { "" }, self.data[i * self.dim + j])?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}
