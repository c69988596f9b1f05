// src/simulation/computer.rs

use log::{debug, info};
use rand::Rng;
use std::collections::{BTreeMap, HashMap};

use crate::core::{ComponentId, MeasureMode, Outcome, Pole, QuantumError, QuantumResult, RegisterId, RegisterMap};
use crate::operations::{Gate, TwoQubitGate};
use crate::simulation::component::QuantumComponent;

/// Owner of every component in one biome.
///
/// Partition invariant: each allocated register belongs to exactly one live
/// component, and every live component's qubits are allocated registers.
/// Components only grow (by merging); retired component ids are never reused.
#[derive(Debug, Clone)]
pub struct QuantumComputer {
    map: RegisterMap,
    components: BTreeMap<ComponentId, QuantumComponent>,
    owners: HashMap<RegisterId, ComponentId>,
    next_component: u64,
}

impl QuantumComputer {
    /// Creates an empty computer whose register slots are the qubits of `map`.
    pub fn new(map: RegisterMap) -> Self {
        Self { map, components: BTreeMap::new(), owners: HashMap::new(), next_component: 0 }
    }

    pub fn register_map(&self) -> &RegisterMap {
        &self.map
    }

    /// Number of register slots (qubits in the map).
    pub fn capacity(&self) -> usize {
        self.map.num_qubits()
    }

    fn fresh_component_id(&mut self) -> ComponentId {
        let id = ComponentId(self.next_component);
        self.next_component += 1;
        id
    }

    /// Allocates the lowest free register as a new single-qubit component in |0⟩.
    ///
    /// # Errors
    /// `NoFreeQubit` when every qubit of the map is already allocated.
    pub fn allocate_register(&mut self) -> QuantumResult<RegisterId> {
        let register = (0..self.capacity())
            .map(RegisterId)
            .find(|r| !self.owners.contains_key(r))
            .ok_or(QuantumError::NoFreeQubit { capacity: self.capacity() })?;
        let id = self.fresh_component_id();
        let component = QuantumComponent::new(id, vec![register])?;
        self.components.insert(id, component);
        self.owners.insert(register, id);
        debug!("allocated {} in {}", register, id);
        Ok(register)
    }

    pub fn is_allocated(&self, register: RegisterId) -> bool {
        self.owners.contains_key(&register)
    }

    /// Allocated registers, ascending.
    pub fn allocated_registers(&self) -> Vec<RegisterId> {
        let mut registers: Vec<RegisterId> = self.owners.keys().copied().collect();
        registers.sort();
        registers
    }

    /// Id of the component owning `register`.
    pub fn component_id_of(&self, register: RegisterId) -> QuantumResult<ComponentId> {
        self.owners.get(&register).copied().ok_or(QuantumError::UnknownRegister { register })
    }

    /// The component owning `register`, if allocated.
    pub fn get_component_containing(&self, register: RegisterId) -> Option<&QuantumComponent> {
        self.owners.get(&register).and_then(|id| self.components.get(id))
    }

    pub fn get_component_containing_mut(&mut self, register: RegisterId) -> QuantumResult<&mut QuantumComponent> {
        let id = self.component_id_of(register)?;
        self.components.get_mut(&id).ok_or(QuantumError::UnknownRegister { register })
    }

    pub fn component(&self, id: ComponentId) -> Option<&QuantumComponent> {
        self.components.get(&id)
    }

    pub fn component_mut(&mut self, id: ComponentId) -> Option<&mut QuantumComponent> {
        self.components.get_mut(&id)
    }

    /// Live components in id order.
    pub fn components(&self) -> impl Iterator<Item = &QuantumComponent> {
        self.components.values()
    }

    pub fn components_mut(&mut self) -> impl Iterator<Item = &mut QuantumComponent> {
        self.components.values_mut()
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    /// Replaces components `a` and `b` by their tensor product.
    ///
    /// The new component lists `a`'s qubits first, then `b`'s. Both inputs are
    /// retired in the same step that the merged component is inserted, so no
    /// caller can observe a half-merged computer. Merging a component with
    /// itself returns it unchanged.
    ///
    /// # Returns
    /// * `Ok(ComponentId)` of the merged component.
    /// * `Err(QuantumError::InvalidOperation)` if either id is not live or the
    ///   result would exceed the component size limit.
    pub fn merge_components(&mut self, a: ComponentId, b: ComponentId) -> QuantumResult<ComponentId> {
        if a == b {
            return if self.components.contains_key(&a) {
                Ok(a)
            } else {
                Err(QuantumError::InvalidOperation { message: format!("{} is not a live component", a) })
            };
        }
        let merged = {
            let (ca, cb) = match (self.components.get(&a), self.components.get(&b)) {
                (Some(ca), Some(cb)) => (ca, cb),
                _ => {
                    return Err(QuantumError::InvalidOperation {
                        message: format!("cannot merge {} and {}: not both live", a, b),
                    });
                }
            };
            let id = ComponentId(self.next_component);
            QuantumComponent::tensor(id, ca, cb)?
        };
        self.next_component += 1;
        self.components.remove(&a);
        self.components.remove(&b);
        let id = merged.id();
        for q in merged.qubits() {
            self.owners.insert(*q, id);
        }
        info!("merged {} and {} into {} ({} qubits)", a, b, id, merged.num_qubits());
        self.components.insert(id, merged);
        Ok(id)
    }

    /// Merges the components owning two registers.
    pub fn merge_registers(&mut self, a: RegisterId, b: RegisterId) -> QuantumResult<ComponentId> {
        let ca = self.component_id_of(a)?;
        let cb = self.component_id_of(b)?;
        self.merge_components(ca, cb)
    }

    /// `(P(north), P(south))` of one register.
    pub fn get_register_probabilities(&self, register: RegisterId) -> QuantumResult<(f64, f64)> {
        let component = self.get_component_containing(register).ok_or(QuantumError::UnknownRegister { register })?;
        Ok((component.get_marginal_probability(register, 0)?, component.get_marginal_probability(register, 1)?))
    }

    pub fn get_marginal_probability(&self, register: RegisterId, value: usize) -> QuantumResult<f64> {
        self.get_component_containing(register)
            .ok_or(QuantumError::UnknownRegister { register })?
            .get_marginal_probability(register, value)
    }

    /// `(north, south)` labels of a register's axis.
    pub fn get_register_emoji_pair(&self, register: RegisterId) -> QuantumResult<(String, String)> {
        self.map
            .axis(register.0)
            .map(|(n, s)| (n.to_string(), s.to_string()))
            .ok_or(QuantumError::UnknownRegister { register })
    }

    pub fn apply_gate(&mut self, register: RegisterId, gate: Gate) -> QuantumResult<()> {
        self.get_component_containing_mut(register)?.apply_gate(register, gate)
    }

    /// Applies a two-qubit gate, merging the owning components first if needed.
    pub fn apply_two_qubit_gate(&mut self, first: RegisterId, second: RegisterId, gate: TwoQubitGate) -> QuantumResult<()> {
        let id = self.merge_registers(first, second)?;
        match self.components.get_mut(&id) {
            Some(component) => component.apply_two_qubit_gate(first, second, gate),
            None => Err(QuantumError::InvalidOperation { message: format!("{} vanished after merge", id) }),
        }
    }

    pub fn apply_lindblad_drive(&mut self, register: RegisterId, target_state: usize, rate: f64, dt: f64) -> QuantumResult<()> {
        self.get_component_containing_mut(register)?
            .apply_lindblad_drive(register, target_state, rate, dt)
    }

    /// Born-rule measurement of one register.
    pub fn measure<R: Rng + ?Sized>(&mut self, register: RegisterId, mode: MeasureMode, rng: &mut R) -> QuantumResult<Outcome> {
        let (pole, probability) = self.get_component_containing_mut(register)?.measure(register, mode, rng)?;
        let label = self.pole_label(register, pole)?;
        Ok(Outcome { register, pole, label, probability })
    }

    fn pole_label(&self, register: RegisterId, pole: Pole) -> QuantumResult<String> {
        self.map
            .label(register.0, pole)
            .map(str::to_string)
            .ok_or(QuantumError::UnknownRegister { register })
    }

    /// Merges the two registers' components and prepares a Bell-type correlation
    /// between them (Hadamard on `a`, then CNOT `a → b`).
    ///
    /// Starting from |00⟩ this yields `(|00⟩ + |11⟩)/√2`.
    pub fn create_entanglement(&mut self, a: RegisterId, b: RegisterId) -> QuantumResult<ComponentId> {
        if a == b {
            return Err(QuantumError::InvalidOperation { message: format!("cannot entangle {} with itself", a) });
        }
        let id = self.merge_registers(a, b)?;
        self.apply_gate(a, Gate::Hadamard)?;
        self.apply_two_qubit_gate(a, b, TwoQubitGate::ControlledNot)?;
        Ok(id)
    }

    /// Merges every listed register into one component and prepares a linear
    /// cluster state: Hadamard on each, then CZ on each neighbouring pair.
    pub fn create_cluster_state(&mut self, registers: &[RegisterId]) -> QuantumResult<ComponentId> {
        if registers.len() < 2 {
            return Err(QuantumError::InvalidOperation { message: "a cluster needs at least two registers".to_string() });
        }
        let mut id = self.component_id_of(registers[0])?;
        for register in &registers[1..] {
            let other = self.component_id_of(*register)?;
            id = self.merge_components(id, other)?;
        }
        for register in registers {
            self.apply_gate(*register, Gate::Hadamard)?;
        }
        for pair in registers.windows(2) {
            self.apply_two_qubit_gate(pair[0], pair[1], TwoQubitGate::ControlledZ)?;
        }
        debug!("cluster state over {} registers in {}", registers.len(), id);
        Ok(id)
    }

    /// Removes every correlation in the component owning `register`.
    ///
    /// Provisional: the intended semantics are unresolved. For now the
    /// component is not split; its qubits stay together and the state becomes
    /// the product of their single-qubit reduced states. That map is
    /// nonlinear, so it is not a quantum channel and has no Kraus form.
    pub fn remove_entanglement(&mut self, register: RegisterId) -> QuantumResult<()> {
        self.get_component_containing_mut(register)?.decorrelate()
    }

    /// Whole-biome teardown: every allocated register goes back to its own
    /// single-qubit component in |0⟩.
    pub fn reset(&mut self) -> QuantumResult<()> {
        let registers = self.allocated_registers();
        self.components.clear();
        self.owners.clear();
        for register in registers {
            let id = self.fresh_component_id();
            self.components.insert(id, QuantumComponent::new(id, vec![register])?);
            self.owners.insert(register, id);
        }
        info!("reset to {} independent registers", self.owners.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AxisConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn computer(qubits: usize) -> QuantumComputer {
        let axes: Vec<AxisConfig> = (0..qubits)
            .map(|i| AxisConfig { north: format!("n{}", i), south: format!("s{}", i) })
            .collect();
        QuantumComputer::new(RegisterMap::from_axes(&axes).expect("valid axes"))
    }

    fn check_partition(qc: &QuantumComputer) {
        let mut seen = Vec::new();
        for c in qc.components() {
            for q in c.qubits() {
                assert_eq!(qc.component_id_of(*q), Ok(c.id()));
                seen.push(*q);
            }
        }
        seen.sort();
        assert_eq!(seen, qc.allocated_registers());
    }

    #[test]
    fn test_allocate_until_exhausted() -> QuantumResult<()> {
        let mut qc = computer(2);
        assert_eq!(qc.allocate_register()?, RegisterId(0));
        assert_eq!(qc.allocate_register()?, RegisterId(1));
        assert_eq!(qc.allocate_register(), Err(QuantumError::NoFreeQubit { capacity: 2 }));
        check_partition(&qc);
        Ok(())
    }

    #[test]
    fn test_merge_three_registers_into_dimension_eight() -> QuantumResult<()> {
        let mut qc = computer(3);
        let r: Vec<RegisterId> = (0..3).map(|_| qc.allocate_register()).collect::<Result<_, _>>()?;
        let ab = qc.merge_registers(r[0], r[1])?;
        let abc = qc.merge_registers(r[0], r[2])?;
        assert_ne!(ab, abc);
        assert_eq!(qc.num_components(), 1);
        let component = qc.get_component_containing(r[2]).ok_or(QuantumError::UnknownRegister { register: r[2] })?;
        assert_eq!(component.hilbert_dimension(), 8);
        assert_eq!(component.qubits(), &r[..]);
        let total: f64 = component.get_basis_probabilities().iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(qc.component(ab).is_none(), "retired component still live");
        check_partition(&qc);
        Ok(())
    }

    #[test]
    fn test_merge_with_self_is_noop() -> QuantumResult<()> {
        let mut qc = computer(1);
        let r = qc.allocate_register()?;
        let id = qc.component_id_of(r)?;
        assert_eq!(qc.merge_components(id, id)?, id);
        assert_eq!(qc.num_components(), 1);
        Ok(())
    }

    #[test]
    fn test_create_entanglement_correlates_outcomes() -> QuantumResult<()> {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10 {
            let mut qc = computer(2);
            let a = qc.allocate_register()?;
            let b = qc.allocate_register()?;
            qc.create_entanglement(a, b)?;
            assert_eq!(qc.get_register_probabilities(a).map(|p| (p.0 * 2.0).round()), Ok(1.0));
            let first = qc.measure(a, MeasureMode::Collapse, &mut rng)?;
            let second = qc.measure(b, MeasureMode::Collapse, &mut rng)?;
            assert_eq!(first.pole, second.pole);
            assert!((second.probability - 1.0).abs() < 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_cluster_state_has_uniform_marginals() -> QuantumResult<()> {
        let mut qc = computer(3);
        let r: Vec<RegisterId> = (0..3).map(|_| qc.allocate_register()).collect::<Result<_, _>>()?;
        qc.create_cluster_state(&r)?;
        for register in &r {
            let (north, south) = qc.get_register_probabilities(*register)?;
            assert!((north - 0.5).abs() < 1e-9 && (south - 0.5).abs() < 1e-9);
        }
        assert!(qc.create_cluster_state(&r[..1]).is_err());
        Ok(())
    }

    #[test]
    fn test_remove_entanglement_keeps_component_and_marginals() -> QuantumResult<()> {
        let mut qc = computer(2);
        let a = qc.allocate_register()?;
        let b = qc.allocate_register()?;
        qc.create_entanglement(a, b)?;
        qc.remove_entanglement(a)?;
        assert_eq!(qc.num_components(), 1);
        let component = qc.get_component_containing(a).ok_or(QuantumError::UnknownRegister { register: a })?;
        let mi = crate::observables::mutual_information(component.get_density_matrix(), 0, 1, 2);
        assert!(mi < 1e-6);
        assert!((qc.get_marginal_probability(b, 0)? - 0.5).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_emoji_pair_and_reset() -> QuantumResult<()> {
        let mut qc = computer(2);
        let a = qc.allocate_register()?;
        let b = qc.allocate_register()?;
        assert_eq!(qc.get_register_emoji_pair(b)?, ("n1".to_string(), "s1".to_string()));
        qc.merge_registers(a, b)?;
        qc.reset()?;
        assert_eq!(qc.num_components(), 2);
        check_partition(&qc);
        assert!(qc.get_register_emoji_pair(RegisterId(9)).is_err());
        Ok(())
    }
}
