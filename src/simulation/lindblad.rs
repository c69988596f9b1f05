// src/simulation/lindblad.rs

//! Declarative Lindblad rate tables and the jump operators built from them.
//!
//! A rate table names transfers between labels: "population leaves `source`
//! and arrives at `target` at `rate`". The builder resolves labels through a
//! `RegisterMap` and emits operators on one component's local qubit order.

use log::{debug, warn};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::{ComplexMatrix, Pole, QuantumError, QuantumResult, RegisterId, RegisterMap};
use crate::simulation::component::embed_operator;

/// `{rate, target}` entry of a decay table. A missing rate reads as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecaySpec {
    #[serde(default)]
    pub rate: f64,
    pub target: String,
}

/// A transfer that only fires while `gate` is observed (or, with `inverse`,
/// while it is not).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatedTransfer {
    pub source: String,
    pub target: String,
    pub rate: f64,
    pub gate: String,
    #[serde(default)]
    pub inverse: bool,
}

/// Rate configuration for one biome.
///
/// Matches the JSON shape biome tables are authored in:
///
/// ```json
/// {
///   "lindblad_outgoing": { "🌾": { "🍄": 0.05 } },
///   "lindblad_incoming": { "☀": { "🌙": 0.02 } },
///   "decay": { "🍄": { "rate": 0.01, "target": "🌾" } },
///   "gated": [ { "source": "🌾", "target": "🍄", "rate": 0.1, "gate": "🌙" } ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LindbladRates {
    /// `source → {target → rate}`.
    #[serde(default, rename = "lindblad_outgoing")]
    pub outgoing: BTreeMap<String, BTreeMap<String, f64>>,
    /// `target → {source → rate}`.
    #[serde(default, rename = "lindblad_incoming")]
    pub incoming: BTreeMap<String, BTreeMap<String, f64>>,
    /// `source → {rate, target}`.
    #[serde(default)]
    pub decay: BTreeMap<String, DecaySpec>,
    #[serde(default)]
    pub gated: Vec<GatedTransfer>,
}

impl LindbladRates {
    /// Adds `source → target` at `rate` to the outgoing table.
    pub fn with_transfer(mut self, source: &str, target: &str, rate: f64) -> Self {
        self.outgoing
            .entry(source.to_string())
            .or_default()
            .insert(target.to_string(), rate);
        self
    }

    /// Flattens every table into `(source, target, rate, gate, inverse)` rows.
    fn transfers(&self) -> Vec<(&str, &str, f64, Option<(&str, bool)>)> {
        let mut rows = Vec::new();
        for (source, targets) in &self.outgoing {
            for (target, rate) in targets {
                rows.push((source.as_str(), target.as_str(), *rate, None));
            }
        }
        for (target, sources) in &self.incoming {
            for (source, rate) in sources {
                rows.push((source.as_str(), target.as_str(), *rate, None));
            }
        }
        for (source, spec) in &self.decay {
            rows.push((source.as_str(), spec.target.as_str(), spec.rate, None));
        }
        for g in &self.gated {
            rows.push((g.source.as_str(), g.target.as_str(), g.rate, Some((g.gate.as_str(), g.inverse))));
        }
        rows
    }
}

/// One Lindblad operator `L` (already scaled by `√rate`) on a component.
#[derive(Debug, Clone, PartialEq)]
pub struct JumpOperator {
    pub matrix: ComplexMatrix,
    pub rate: f64,
    pub source: String,
    pub target: String,
    pub gate: Option<String>,
}

/// Jump operators for one component plus the number of table rows that could
/// not be applied because they touch qubits outside it.
#[derive(Debug, Clone, Default)]
pub struct LindbladTerms {
    pub operators: Vec<JumpOperator>,
    pub skipped: usize,
}

/// Resolves a `LindbladRates` table against a `RegisterMap`.
#[derive(Debug, Clone, Copy)]
pub struct LindbladBuilder<'a> {
    map: &'a RegisterMap,
    rates: &'a LindbladRates,
}

impl<'a> LindbladBuilder<'a> {
    pub fn new(map: &'a RegisterMap, rates: &'a LindbladRates) -> Self {
        Self { map, rates }
    }

    /// Checks every label and rate once, at configuration time.
    ///
    /// # Errors
    /// * `UnknownLabel` for a label the map does not define.
    /// * `InvalidConfig` for a negative or non-finite rate.
    pub fn validate(&self) -> QuantumResult<()> {
        for (source, target, rate, gate) in self.rates.transfers() {
            self.map.resolve(source)?;
            self.map.resolve(target)?;
            if let Some((gate, _)) = gate {
                self.map.resolve(gate)?;
            }
            if rate < 0.0 || !rate.is_finite() {
                return Err(QuantumError::InvalidConfig {
                    message: format!("rate {} for {} -> {} must be finite and non-negative", rate, source, target),
                });
            }
        }
        Ok(())
    }

    /// Builds every jump operator that acts entirely inside `qubits`.
    ///
    /// # Arguments
    /// * `qubits` - The component's qubits in local order.
    ///
    /// # Returns
    /// * `Ok(LindbladTerms)` with operators of dimension `2^qubits.len()`.
    /// * `Err` if the table fails `validate`.
    pub fn build_for(&self, qubits: &[RegisterId]) -> QuantumResult<LindbladTerms> {
        self.validate()?;
        let k = qubits.len();
        let local = |label: &str| -> QuantumResult<Option<(usize, Pole)>> {
            let (qubit, pole) = self.map.resolve(label)?;
            Ok(qubits.iter().position(|q| q.0 == qubit).map(|pos| (pos, pole)))
        };

        let mut terms = LindbladTerms::default();
        for (source, target, rate, gate) in self.rates.transfers() {
            if rate == 0.0 {
                continue;
            }
            let (Some(s), Some(t)) = (local(source)?, local(target)?) else {
                terms.skipped += 1;
                continue;
            };
            let Some(mut matrix) = transfer_operator(k, s, t) else {
                warn!("transfer {} -> {} maps a pole onto itself; ignored", source, target);
                continue;
            };
            if let Some((gate_label, inverse)) = gate {
                let Some((g_pos, g_pole)) = local(gate_label)? else {
                    terms.skipped += 1;
                    continue;
                };
                let pole = if inverse { g_pole.opposite() } else { g_pole };
                let projector = embed_operator(k, &[g_pos], &ComplexMatrix::ket_bra(2, pole.value(), pole.value()));
                matrix = matrix.matmul(&projector);
            }
            terms.operators.push(JumpOperator {
                matrix: matrix.scale(Complex::new(rate.sqrt(), 0.0)),
                rate,
                source: source.to_string(),
                target: target.to_string(),
                gate: gate.map(|(g, _)| g.to_string()),
            });
        }
        debug!(
            "built {} jump operators on {} qubits ({} rows outside component)",
            terms.operators.len(),
            k,
            terms.skipped
        );
        Ok(terms)
    }
}

/// Unscaled transfer operator from `(source position, pole)` to
/// `(target position, pole)` on a `num_qubits` component.
///
/// On one qubit this is `|t⟩⟨s|`. Across two qubits it lowers the source out of
/// its pole and raises the target into its pole:
/// `(|¬s⟩⟨s|)_i ⊗ (|t⟩⟨¬t|)_j`. Returns `None` for a pole mapped to itself.
fn transfer_operator(num_qubits: usize, source: (usize, Pole), target: (usize, Pole)) -> Option<ComplexMatrix> {
    let (i, s) = source;
    let (j, t) = target;
    if i == j {
        if s == t {
            return None;
        }
        return Some(embed_operator(num_qubits, &[i], &ComplexMatrix::ket_bra(2, t.value(), s.value())));
    }
    let leave = ComplexMatrix::ket_bra(2, s.opposite().value(), s.value());
    let arrive = ComplexMatrix::ket_bra(2, t.value(), t.opposite().value());
    Some(embed_operator(num_qubits, &[i, j], &leave.kron(&arrive)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AxisConfig;

    fn map() -> RegisterMap {
        let axes = [("🌾", "🍄"), ("☀", "🌙")]
            .iter()
            .map(|(n, s)| AxisConfig { north: n.to_string(), south: s.to_string() })
            .collect::<Vec<_>>();
        RegisterMap::from_axes(&axes).expect("valid axes")
    }

    #[test]
    fn test_rates_parse_from_json() -> Result<(), QuantumError> {
        let json = r#"{
            "lindblad_outgoing": { "🌾": { "🍄": 0.05 } },
            "decay": { "🌙": { "rate": 0.01, "target": "☀" } },
            "gated": [ { "source": "🌾", "target": "🍄", "rate": 0.1, "gate": "🌙" } ]
        }"#;
        let rates: LindbladRates = serde_json::from_str(json)?;
        assert_eq!(rates.outgoing["🌾"]["🍄"], 0.05);
        assert_eq!(rates.decay["🌙"].target, "☀");
        assert!(!rates.gated[0].inverse);
        assert!(rates.incoming.is_empty());
        Ok(())
    }

    #[test]
    fn test_decay_without_rate_is_inert() -> QuantumResult<()> {
        let rates: LindbladRates = serde_json::from_str(r#"{ "decay": { "🍄": { "target": "🌾" } } }"#)?;
        assert_eq!(rates.decay["🍄"].rate, 0.0);
        let map = map();
        let terms = LindbladBuilder::new(&map, &rates).build_for(&[RegisterId(0)])?;
        assert!(terms.operators.is_empty());
        assert_eq!(terms.skipped, 0);
        Ok(())
    }

    #[test]
    fn test_same_qubit_transfer_is_scaled_lowering() -> QuantumResult<()> {
        let map = map();
        let rates = LindbladRates::default().with_transfer("🌾", "🍄", 0.25);
        let terms = LindbladBuilder::new(&map, &rates).build_for(&[RegisterId(0)])?;
        assert_eq!(terms.operators.len(), 1);
        let l = &terms.operators[0].matrix;
        // √0.25 |1⟩⟨0|
        assert!((l.get(1, 0).re - 0.5).abs() < 1e-12);
        assert!(l.get(0, 1).norm() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_rows_outside_component_are_skipped() -> QuantumResult<()> {
        let map = map();
        let rates = LindbladRates::default()
            .with_transfer("🌾", "🍄", 0.1)
            .with_transfer("☀", "🌙", 0.1)
            .with_transfer("🌾", "☀", 0.1);
        let terms = LindbladBuilder::new(&map, &rates).build_for(&[RegisterId(0)])?;
        assert_eq!(terms.operators.len(), 1);
        assert_eq!(terms.skipped, 2);

        let joint = LindbladBuilder::new(&map, &rates).build_for(&[RegisterId(0), RegisterId(1)])?;
        assert_eq!(joint.operators.len(), 3);
        assert_eq!(joint.operators[0].matrix.dim(), 4);
        Ok(())
    }

    #[test]
    fn test_cross_qubit_transfer_moves_population() -> QuantumResult<()> {
        let map = map();
        // 🌾 (q0 north) -> 🌙 (q1 south)
        let rates = LindbladRates::default().with_transfer("🌾", "🌙", 1.0);
        let terms = LindbladBuilder::new(&map, &rates).build_for(&[RegisterId(0), RegisterId(1)])?;
        let l = &terms.operators[0].matrix;
        // |00⟩ -> |11⟩ and nothing else.
        assert!((l.get(3, 0).re - 1.0).abs() < 1e-12);
        let nonzero = l.as_slice().iter().filter(|c| c.norm() > 1e-12).count();
        assert_eq!(nonzero, 1);
        Ok(())
    }

    #[test]
    fn test_gated_operator_acts_only_in_gate_subspace() -> QuantumResult<()> {
        let map = map();
        let rates = LindbladRates {
            gated: vec![GatedTransfer {
                source: "🌾".to_string(),
                target: "🍄".to_string(),
                rate: 1.0,
                gate: "🌙".to_string(),
                inverse: false,
            }],
            ..LindbladRates::default()
        };
        let terms = LindbladBuilder::new(&map, &rates).build_for(&[RegisterId(0), RegisterId(1)])?;
        let l = &terms.operators[0].matrix;
        // Fires from |0,🌙⟩ = index 1 to |1,🌙⟩ = index 3; silent when q1 is ☀.
        assert!((l.get(3, 1).re - 1.0).abs() < 1e-12);
        assert!(l.get(2, 0).norm() < 1e-12);
        assert_eq!(terms.operators[0].gate.as_deref(), Some("🌙"));
        Ok(())
    }

    #[test]
    fn test_unknown_label_and_negative_rate_rejected() {
        let map = map();
        let unknown = LindbladRates::default().with_transfer("🌾", "🐺", 0.1);
        assert_eq!(
            LindbladBuilder::new(&map, &unknown).validate(),
            Err(QuantumError::UnknownLabel { label: "🐺".to_string() })
        );
        let negative = LindbladRates::default().with_transfer("🌾", "🍄", -0.1);
        assert!(matches!(
            LindbladBuilder::new(&map, &negative).validate(),
            Err(QuantumError::InvalidConfig { .. })
        ));
    }
}
