// src/validation/mod.rs

//! Checks that a matrix is a physical density matrix.

use crate::core::engine_constants::{HERMITIAN_TOLERANCE, POSITIVITY_TOLERANCE, TRACE_TOLERANCE};
use crate::core::{ComplexMatrix, QuantumError, QuantumResult};

/// Checks that `Tr(ρ)` is real and within `tolerance` of 1.
///
/// # Arguments
/// * `rho` - The density matrix to check.
/// * `tolerance` - Optional allowed deviation (defaults to `TRACE_TOLERANCE`).
///
/// # Returns
/// * `Ok(())` if the trace is 1 within tolerance.
/// * `Err(QuantumError::NormalizationDrift)` otherwise.
pub fn check_trace(rho: &ComplexMatrix, tolerance: Option<f64>) -> QuantumResult<()> {
    let tolerance = tolerance.unwrap_or(TRACE_TOLERANCE);
    let trace = rho.trace();
    if (trace.re - 1.0).abs() > tolerance || trace.im.abs() > tolerance || !trace.re.is_finite() {
        Err(QuantumError::NormalizationDrift {
            message: format!("Tr(ρ) = {} (deviation > {})", trace, tolerance),
        })
    } else {
        Ok(())
    }
}

/// Checks `ρ = ρ†` entry by entry.
///
/// # Returns
/// * `Err(QuantumError::InvalidOperation)` naming the tolerance if any pair
///   `ρ[i][j]`, `conj(ρ[j][i])` differs by more than `HERMITIAN_TOLERANCE`.
pub fn check_hermitian(rho: &ComplexMatrix) -> QuantumResult<()> {
    if rho.is_hermitian(HERMITIAN_TOLERANCE) {
        Ok(())
    } else {
        Err(QuantumError::InvalidOperation {
            message: format!("Density matrix is not Hermitian within {}", HERMITIAN_TOLERANCE),
        })
    }
}

/// Checks that every eigenvalue of a Hermitian `ρ` is non-negative.
///
/// Negative populations on the diagonal are rejected first, since they are
/// cheap to find and already rule out positivity.
pub fn check_positivity(rho: &ComplexMatrix) -> QuantumResult<()> {
    if let Some((i, p)) = rho
        .diagonal_real()
        .into_iter()
        .enumerate()
        .find(|(_, p)| *p < -POSITIVITY_TOLERANCE)
    {
        return Err(QuantumError::NormalizationDrift {
            message: format!("Negative probability {} at basis state {}", p, i),
        });
    }
    let smallest = rho
        .hermitian_eigenvalues()
        .into_iter()
        .fold(f64::INFINITY, f64::min);
    if smallest < -POSITIVITY_TOLERANCE {
        Err(QuantumError::NormalizationDrift {
            message: format!("Density matrix has negative eigenvalue {}", smallest),
        })
    } else {
        Ok(())
    }
}

/// Runs every density-matrix check: Hermiticity, trace, positivity.
///
/// # Arguments
/// * `rho` - The matrix to validate.
/// * `trace_tolerance` - Optional allowed trace deviation.
pub fn validate_density_matrix(rho: &ComplexMatrix, trace_tolerance: Option<f64>) -> QuantumResult<()> {
    check_hermitian(rho)?;
    check_trace(rho, trace_tolerance)?;
    check_positivity(rho)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex;

    #[test]
    fn test_pure_state_passes() -> QuantumResult<()> {
        validate_density_matrix(&ComplexMatrix::ket_bra(4, 2, 2), None)
    }

    #[test]
    fn test_trace_drift_detected() {
        let rho = ComplexMatrix::identity(2).scale_real(0.6);
        assert!(matches!(check_trace(&rho, None), Err(QuantumError::NormalizationDrift { .. })));
        assert!(check_trace(&rho, Some(0.5)).is_ok());
    }

    #[test]
    fn test_non_hermitian_detected() {
        let rho = ComplexMatrix::ket_bra(2, 0, 1);
        assert!(check_hermitian(&rho).is_err());
    }

    #[test]
    fn test_negative_eigenvalue_detected() {
        // Unit trace, non-negative diagonal, but coherence too large: eigenvalues 1.5 and -0.5.
        let h = Complex::new(0.5, 0.0);
        let rho = ComplexMatrix::from_array([[h, Complex::new(1.0, 0.0)], [Complex::new(1.0, 0.0), h]]);
        assert!(check_hermitian(&rho).is_ok());
        assert!(check_trace(&rho, None).is_ok());
        assert!(matches!(check_positivity(&rho), Err(QuantumError::NormalizationDrift { .. })));
    }
}
