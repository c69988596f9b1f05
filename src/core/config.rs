// src/core/config.rs

use serde::{Deserialize, Serialize};

use super::constants::engine_constants::{
    DEFAULT_CONVERSION_RATE, DEFAULT_MAX_DT, DEFAULT_TERMINAL_CAPACITY, TRACE_TOLERANCE,
};
use super::error::{QuantumError, QuantumResult};
use super::state::MeasureMode;

/// Session-wide engine settings.
///
/// Every field has a default, so a partial JSON object such as
/// `{"terminal_capacity": 4, "seed": 7}` is a complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Trace deviation tolerated by validation.
    pub trace_tolerance: f64,
    /// Largest evolution substep.
    pub max_dt: f64,
    /// Resource units credited per unit of recorded probability at POP.
    pub conversion_rate: f64,
    /// Number of terminals in the pool.
    pub terminal_capacity: usize,
    /// What MEASURE does to the state.
    pub measure_mode: MeasureMode,
    /// Seeds Born-rule sampling; `None` draws a seed from the OS.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trace_tolerance: TRACE_TOLERANCE,
            max_dt: DEFAULT_MAX_DT,
            conversion_rate: DEFAULT_CONVERSION_RATE,
            terminal_capacity: DEFAULT_TERMINAL_CAPACITY,
            measure_mode: MeasureMode::Collapse,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> QuantumResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks ranges that serde cannot express.
    pub fn validate(&self) -> QuantumResult<()> {
        let invalid = |message: String| Err(QuantumError::InvalidConfig { message });
        if self.trace_tolerance.is_nan() || self.trace_tolerance <= 0.0 {
            return invalid(format!("trace_tolerance must be positive, got {}", self.trace_tolerance));
        }
        if !self.max_dt.is_finite() || self.max_dt <= 0.0 {
            return invalid(format!("max_dt must be positive, got {}", self.max_dt));
        }
        if !self.conversion_rate.is_finite() || self.conversion_rate < 0.0 {
            return invalid(format!("conversion_rate must be non-negative, got {}", self.conversion_rate));
        }
        if self.terminal_capacity == 0 {
            return invalid("terminal_capacity must be at least 1".to_string());
        }
        if let MeasureMode::Drain { fraction } = self.measure_mode {
            if !(0.0..1.0).contains(&fraction) {
                return invalid(format!("drain fraction must be in [0, 1), got {}", fraction));
            }
        }
        Ok(())
    }
}
