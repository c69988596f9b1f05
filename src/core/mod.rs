// src/core/mod.rs

//! Core data structures and types

pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod matrix;
pub mod register_map;
pub mod state;

// Re-export public types for convenient access via `qfarm::core::TypeName`
pub use config::EngineConfig;
pub use constants::engine_constants;
pub use error::{QuantumError, QuantumResult};
pub use ids::{BiomeId, ComponentId, RegisterId, TerminalId};
pub use matrix::ComplexMatrix;
pub use register_map::{AxisConfig, Pole, RegisterMap};
pub use state::{MeasureMode, Outcome};

/// Complex scalar used throughout the engine.
pub type Complex = num_complex::Complex<f64>;
