// src/core/register_map.rs

//! Symbolic label ↔ qubit/pole dictionary.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::constants::engine_constants::MAX_MAP_QUBITS;
use super::error::{QuantumError, QuantumResult};

/// Which side of a qubit axis a label names.
///
/// `North` is computational basis value 0, `South` is value 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pole {
    North,
    South,
}

impl Pole {
    /// Basis value of this pole (0 or 1).
    pub fn value(self) -> usize {
        match self {
            Pole::North => 0,
            Pole::South => 1,
        }
    }

    /// The pole for basis value `value`; anything non-zero is `South`.
    pub fn from_value(value: usize) -> Self {
        if value == 0 { Pole::North } else { Pole::South }
    }

    /// The other pole of the same axis.
    pub fn opposite(self) -> Self {
        match self {
            Pole::North => Pole::South,
            Pole::South => Pole::North,
        }
    }
}

/// One `{north, south}` label pair as written in biome configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisConfig {
    pub north: String,
    pub south: String,
}

/// Assigns each symbolic two-outcome label a qubit index and pole.
///
/// Built once from static configuration and read-only afterwards. Every
/// registered qubit carries exactly one north and one south label, and a label
/// belongs to at most one (qubit, pole).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterMap {
    /// `axes[q] = (north, south)` for every registered qubit `q`.
    axes: Vec<Option<(String, String)>>,
    labels: HashMap<String, (usize, Pole)>,
}

impl RegisterMap {
    /// Creates an empty map with zero qubits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from an ordered axis list; axis `i` becomes qubit `i`.
    ///
    /// # Errors
    /// `DuplicateLabel` if any label appears twice.
    pub fn from_axes(axes: &[AxisConfig]) -> QuantumResult<Self> {
        let mut map = Self::new();
        for (qubit, axis) in axes.iter().enumerate() {
            map.register_axis(qubit, &axis.north, &axis.south)?;
        }
        Ok(map)
    }

    /// Assigns `north_label` to `(qubit_index, North)` and `south_label` to
    /// `(qubit_index, South)`.
    ///
    /// # Errors
    /// * `DuplicateLabel` if either label is already present (or both are equal).
    /// * `InvalidConfig` if the qubit already carries an axis or
    ///   `qubit_index` is not below `MAX_MAP_QUBITS`.
    pub fn register_axis(&mut self, qubit_index: usize, north_label: &str, south_label: &str) -> QuantumResult<()> {
        if qubit_index >= MAX_MAP_QUBITS {
            return Err(QuantumError::InvalidConfig {
                message: format!("qubit index {} exceeds the {}-qubit map limit", qubit_index, MAX_MAP_QUBITS),
            });
        }
        if north_label == south_label {
            return Err(QuantumError::DuplicateLabel { label: north_label.to_string() });
        }
        for label in [north_label, south_label] {
            if self.labels.contains_key(label) {
                return Err(QuantumError::DuplicateLabel { label: label.to_string() });
            }
        }
        if matches!(self.axes.get(qubit_index), Some(Some(_))) {
            return Err(QuantumError::InvalidConfig {
                message: format!("qubit {} already has an axis registered", qubit_index),
            });
        }
        if self.axes.len() <= qubit_index {
            self.axes.resize(qubit_index + 1, None);
        }
        self.axes[qubit_index] = Some((north_label.to_string(), south_label.to_string()));
        self.labels.insert(north_label.to_string(), (qubit_index, Pole::North));
        self.labels.insert(south_label.to_string(), (qubit_index, Pole::South));
        debug!("register axis q{}: {} / {}", qubit_index, north_label, south_label);
        Ok(())
    }

    /// Checks that qubits `0..num_qubits` are all registered with no gaps.
    pub fn validate(&self) -> QuantumResult<()> {
        match self.axes.iter().position(Option::is_none) {
            Some(gap) => Err(QuantumError::InvalidConfig {
                message: format!("qubit {} has no axis; register qubits contiguously from 0", gap),
            }),
            None => Ok(()),
        }
    }

    /// Number of qubits the map spans.
    pub fn num_qubits(&self) -> usize {
        self.axes.len()
    }

    /// Total Hilbert dimension, `2^num_qubits`.
    pub fn dim(&self) -> usize {
        1usize << self.num_qubits()
    }

    /// `(qubit, pole)` of a label.
    pub fn lookup(&self, label: &str) -> Option<(usize, Pole)> {
        self.labels.get(label).copied()
    }

    /// `(qubit, pole)` of a label, or `UnknownLabel`.
    pub fn resolve(&self, label: &str) -> QuantumResult<(usize, Pole)> {
        self.lookup(label).ok_or_else(|| QuantumError::UnknownLabel { label: label.to_string() })
    }

    pub fn qubit_of(&self, label: &str) -> Option<usize> {
        self.lookup(label).map(|(qubit, _)| qubit)
    }

    pub fn pole_of(&self, label: &str) -> Option<Pole> {
        self.lookup(label).map(|(_, pole)| pole)
    }

    /// `(north, south)` labels of a qubit.
    pub fn axis(&self, qubit: usize) -> Option<(&str, &str)> {
        self.axes
            .get(qubit)
            .and_then(|axis| axis.as_ref())
            .map(|(n, s)| (n.as_str(), s.as_str()))
    }

    /// The label of one pole of a qubit.
    pub fn label(&self, qubit: usize, pole: Pole) -> Option<&str> {
        self.axis(qubit).map(|(n, s)| match pole {
            Pole::North => n,
            Pole::South => s,
        })
    }

    /// All labels, ordered by qubit then pole.
    pub fn labels(&self) -> Vec<&str> {
        self.axes
            .iter()
            .flatten()
            .flat_map(|(n, s)| [n.as_str(), s.as_str()])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axes(pairs: &[(&str, &str)]) -> Vec<AxisConfig> {
        pairs
            .iter()
            .map(|(n, s)| AxisConfig { north: n.to_string(), south: s.to_string() })
            .collect()
    }

    #[test]
    fn test_register_and_lookup() -> QuantumResult<()> {
        let map = RegisterMap::from_axes(&axes(&[("🌾", "🍄"), ("☀", "🌙")]))?;
        assert_eq!(map.num_qubits(), 2);
        assert_eq!(map.dim(), 4);
        assert_eq!(map.lookup("🍄"), Some((0, Pole::South)));
        assert_eq!(map.lookup("☀"), Some((1, Pole::North)));
        assert_eq!(map.axis(1), Some(("☀", "🌙")));
        assert_eq!(map.label(0, Pole::South), Some("🍄"));
        assert_eq!(map.labels(), vec!["🌾", "🍄", "☀", "🌙"]);
        map.validate()
    }

    #[test]
    fn test_duplicate_label_rejected_at_build() {
        let err = RegisterMap::from_axes(&axes(&[("🌾", "🍄"), ("🍄", "🌙")])).unwrap_err();
        assert_eq!(err, QuantumError::DuplicateLabel { label: "🍄".to_string() });

        let mut map = RegisterMap::new();
        assert!(map.register_axis(0, "x", "x").is_err());
    }

    #[test]
    fn test_qubit_registered_twice_rejected() -> QuantumResult<()> {
        let mut map = RegisterMap::new();
        map.register_axis(0, "a", "b")?;
        assert!(matches!(map.register_axis(0, "c", "d"), Err(QuantumError::InvalidConfig { .. })));
        Ok(())
    }

    #[test]
    fn test_gap_detected_by_validate() -> QuantumResult<()> {
        let mut map = RegisterMap::new();
        map.register_axis(1, "a", "b")?;
        assert_eq!(map.num_qubits(), 2);
        assert!(map.validate().is_err());
        assert_eq!(map.resolve("zzz"), Err(QuantumError::UnknownLabel { label: "zzz".to_string() }));
        Ok(())
    }

    #[test]
    fn test_out_of_range_qubit_index_rejected() {
        let mut map = RegisterMap::new();
        for index in [MAX_MAP_QUBITS, usize::MAX] {
            assert!(matches!(map.register_axis(index, "a", "b"), Err(QuantumError::InvalidConfig { .. })));
        }
        assert_eq!(map.num_qubits(), 0);
        assert!(map.lookup("a").is_none());
    }

    #[test]
    fn test_label_side_lookups() -> QuantumResult<()> {
        let map = RegisterMap::from_axes(&axes(&[("🌾", "🍄"), ("☀", "🌙")]))?;
        assert_eq!(map.qubit_of("🌙"), Some(1));
        assert_eq!(map.pole_of("🌙"), Some(Pole::South));
        assert_eq!(map.pole_of("🌾"), Some(Pole::North));
        assert_eq!(map.qubit_of("🐺"), None);
        assert_eq!(Pole::from_value(0), Pole::North);
        assert_eq!(Pole::from_value(1), Pole::South);
        assert_eq!(Pole::from_value(1).opposite(), Pole::North);
        Ok(())
    }
}
