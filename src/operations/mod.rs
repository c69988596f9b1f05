// src/operations/mod.rs

//! Fixed unitaries applied to components.
//!
//! Entanglement operations need a handful of standard gates: Hadamard and
//! Pauli flips on one qubit, controlled-NOT and controlled-Z on two. Gates are
//! plain data; `QuantumComponent` conjugates its density matrix with them.

use num_complex::Complex;
use num_traits::Zero;
use std::f64::consts::FRAC_1_SQRT_2;

use crate::core::ComplexMatrix;

/// A single-qubit gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gate {
    Identity,
    /// Bit flip (`X`).
    PauliX,
    PauliY,
    /// Phase flip (`Z`).
    PauliZ,
    /// Equal-weight mixing of north and south.
    Hadamard,
    /// `diag(1, e^{iθ})`.
    PhaseShift(f64),
    /// Rotation about X by `θ`: `exp(−iθX/2)`.
    RotateX(f64),
    /// Rotation about Y by `θ`: `exp(−iθY/2)`.
    RotateY(f64),
}

impl Gate {
    /// The 2×2 matrix in the {north, south} basis.
    pub fn matrix(&self) -> [[Complex<f64>; 2]; 2] {
        let one = Complex::new(1.0, 0.0);
        let zero = Complex::zero();
        let i = Complex::i();
        match *self {
            Gate::Identity => [[one, zero], [zero, one]],
            Gate::PauliX => [[zero, one], [one, zero]],
            Gate::PauliY => [[zero, -i], [i, zero]],
            Gate::PauliZ => [[one, zero], [zero, -one]],
            Gate::Hadamard => {
                let h = Complex::new(FRAC_1_SQRT_2, 0.0);
                [[h, h], [h, -h]]
            }
            Gate::PhaseShift(theta) => [[one, zero], [zero, Complex::new(theta.cos(), theta.sin())]],
            Gate::RotateX(theta) => {
                let (s, c) = (theta / 2.0).sin_cos();
                [[Complex::new(c, 0.0), -i * s], [-i * s, Complex::new(c, 0.0)]]
            }
            Gate::RotateY(theta) => {
                let (s, c) = (theta / 2.0).sin_cos();
                [[Complex::new(c, 0.0), Complex::new(-s, 0.0)], [Complex::new(s, 0.0), Complex::new(c, 0.0)]]
            }
        }
    }

    pub fn to_matrix(&self) -> ComplexMatrix {
        ComplexMatrix::from_array(self.matrix())
    }
}

/// A two-qubit gate acting on an ordered `(first, second)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TwoQubitGate {
    /// Flips `second` when `first` is south.
    ControlledNot,
    /// Negates the amplitude of |south, south⟩.
    ControlledZ,
    Swap,
}

impl TwoQubitGate {
    /// The 4×4 matrix in the basis |first, second⟩ = |00⟩, |01⟩, |10⟩, |11⟩.
    pub fn matrix(&self) -> [[Complex<f64>; 4]; 4] {
        let one = Complex::new(1.0, 0.0);
        let o = Complex::zero();
        match self {
            TwoQubitGate::ControlledNot => [
                [one, o, o, o],
                [o, one, o, o],
                [o, o, o, one],
                [o, o, one, o],
            ],
            TwoQubitGate::ControlledZ => [
                [one, o, o, o],
                [o, one, o, o],
                [o, o, one, o],
                [o, o, o, -one],
            ],
            TwoQubitGate::Swap => [
                [one, o, o, o],
                [o, o, one, o],
                [o, one, o, o],
                [o, o, o, one],
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_unitary(m: &ComplexMatrix, context: &str) {
        let product = m.matmul(&m.dagger());
        let id = ComplexMatrix::identity(m.dim());
        for (a, e) in product.as_slice().iter().zip(id.as_slice()) {
            assert!((*a - *e).norm() < 1e-12, "{} is not unitary", context);
        }
    }

    #[test]
    fn test_single_qubit_gates_are_unitary() {
        for gate in [
            Gate::Identity,
            Gate::PauliX,
            Gate::PauliY,
            Gate::PauliZ,
            Gate::Hadamard,
            Gate::PhaseShift(0.3),
            Gate::RotateX(1.1),
            Gate::RotateY(-0.4),
        ] {
            assert_unitary(&gate.to_matrix(), &format!("{:?}", gate));
        }
    }

    #[test]
    fn test_two_qubit_gates_are_unitary() {
        for gate in [TwoQubitGate::ControlledNot, TwoQubitGate::ControlledZ, TwoQubitGate::Swap] {
            assert_unitary(&ComplexMatrix::from_array(gate.matrix()), &format!("{:?}", gate));
        }
    }

    #[test]
    fn test_rotate_y_pi_is_flip_up_to_sign() {
        let m = Gate::RotateY(std::f64::consts::PI).matrix();
        assert!(m[0][0].norm() < 1e-12);
        assert!((m[1][0].re - 1.0).abs() < 1e-12);
    }
}
