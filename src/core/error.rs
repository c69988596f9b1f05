//! Error handling logic

use thiserror::Error;

use super::ids::{BiomeId, RegisterId, TerminalId};

/// Convenience alias used across the engine.
pub type QuantumResult<T> = Result<T, QuantumError>;

/// Failures reported by the engine.
///
/// Every variant is recoverable: the engine never aborts the process for a
/// user-facing failure. Gameplay callers branch on the `Err` arm and surface
/// `message` to the player or the log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantumError {
    /// EXPLORE attempted with no unbound terminal or no unbound register.
    #[error("Exhausted pool: {message}")]
    ExhaustedPool {
        /// Which pool ran dry.
        message: String,
    },

    /// A terminal was asked to move along an edge its state machine lacks
    /// (measure while unbound, pop before measure, double release).
    #[error("Invalid transition for {terminal}: {message}")]
    InvalidTransition {
        /// The terminal whose state rejected the action.
        terminal: TerminalId,
        /// InvalidTransition failure message
        message: String,
    },

    /// Two operators (or an operator and a state) disagree on dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the receiver works in.
        expected: usize,
        /// Dimension that was supplied.
        actual: usize,
    },

    /// Trace or marginal sums left the tolerance band.
    #[error("Normalization drift: {message}")]
    NormalizationDrift {
        /// NormalizationDrift failure message
        message: String,
    },

    /// A label was registered twice in one register map.
    #[error("Duplicate label '{label}' in register map")]
    DuplicateLabel {
        /// The offending label.
        label: String,
    },

    /// Configuration referenced a label no axis defines.
    #[error("Unknown label '{label}'")]
    UnknownLabel {
        /// The missing label.
        label: String,
    },

    #[error("Unknown register {register}")]
    UnknownRegister { register: RegisterId },

    #[error("Unknown terminal {terminal}")]
    UnknownTerminal { terminal: TerminalId },

    #[error("Unknown biome {biome}")]
    UnknownBiome { biome: BiomeId },

    /// Every qubit slot of the backing register map is already allocated.
    #[error("No free qubit slot: all {capacity} qubits allocated")]
    NoFreeQubit {
        /// Number of qubits the register map defines.
        capacity: usize,
    },

    /// The biome kind does not provide the requested capability.
    #[error("Unsupported: {message}")]
    Unsupported {
        /// Unsupported failure message
        message: String,
    },

    /// An operation is inconsistent with the current engine state.
    #[error("Invalid operation: {message}")]
    InvalidOperation {
        /// InvalidOperation failure message
        message: String,
    },

    /// Static configuration could not be parsed or is inconsistent.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// InvalidConfig failure message
        message: String,
    },

    /// The external ledger refused a credit. Registers are released regardless.
    #[error("Ledger rejected credit: {message}")]
    LedgerRejected {
        /// LedgerRejected failure message
        message: String,
    },
}

impl From<serde_json::Error> for QuantumError {
    fn from(err: serde_json::Error) -> Self {
        QuantumError::InvalidConfig { message: err.to_string() }
    }
}
