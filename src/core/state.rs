// src/core/state.rs

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::RegisterId;
use super::register_map::Pole;

/// How a measurement acts on the state after sampling an outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MeasureMode {
    /// Project onto the observed outcome and renormalize.
    #[default]
    Collapse,
    /// Remove `fraction` of the observed outcome's probability mass, then
    /// renormalize. Models harvesting part of the yield without collapsing.
    Drain {
        /// In `[0, 1)`. The outcome is reduced, never zeroed.
        fraction: f64,
    },
}

/// A resolved measurement of one register.
///
/// `probability` is the Born probability the sampled outcome had *before* the
/// state was touched. This value, not a re-sample, is what POP converts into
/// resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub register: RegisterId,
    pub pole: Pole,
    /// The label of the observed pole.
    pub label: String,
    pub probability: f64,
}

impl Outcome {
    /// Basis value of the observed pole (0 for north, 1 for south).
    pub fn value(&self) -> usize {
        self.pole.value()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} (p={:.4})", self.register, self.label, self.probability)
    }
}
