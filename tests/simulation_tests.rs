// tests/simulation_tests.rs

// Import necessary types from the qfarm crate
use qfarm::{
    AxisConfig, ComponentId, Gate, MeasureMode, Pole, QuantumComponent, QuantumComputer, QuantumError, RegisterId,
    RegisterMap, TwoQubitGate,
};
use qfarm::simulation::{EvolutionEngine, HamiltonianBuilder, HamiltonianConfig, LindbladBuilder, LindbladRates};
use rand::SeedableRng;
use rand::rngs::StdRng;

const SUM_TOLERANCE: f64 = 1e-9;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// Helper function to create RegisterId for tests
fn rid(id: usize) -> RegisterId {
    RegisterId(id)
}

fn computer(qubits: usize) -> QuantumComputer {
    let axes: Vec<AxisConfig> = (0..qubits)
        .map(|i| AxisConfig { north: format!("north-{}", i), south: format!("south-{}", i) })
        .collect();
    QuantumComputer::new(RegisterMap::from_axes(&axes).expect("axes are unique"))
}

// Helper function asserting every probability invariant of a component
fn check_probabilities(component: &QuantumComponent, context: &str) {
    let total: f64 = (0..component.hilbert_dimension()).map(|i| component.get_basis_probability(i)).sum();
    assert!((total - 1.0).abs() < SUM_TOLERANCE, "basis probabilities sum to {} - {}", total, context);
    assert!((component.get_trace() - 1.0).abs() < SUM_TOLERANCE, "trace {} - {}", component.get_trace(), context);
    for q in component.qubits() {
        let p0 = component.get_marginal_probability(*q, 0).expect("qubit in component");
        let p1 = component.get_marginal_probability(*q, 1).expect("qubit in component");
        assert!((p0 + p1 - 1.0).abs() < SUM_TOLERANCE, "{} marginals sum to {} - {}", q, p0 + p1, context);
        assert!(p0 >= -SUM_TOLERANCE && p1 >= -SUM_TOLERANCE, "negative marginal on {} - {}", q, context);
    }
}

#[test]
fn test_initialized_single_qubit_drive_and_measure() -> Result<(), QuantumError> {
    init_logger();
    let mut component = QuantumComponent::new(ComponentId(0), vec![rid(0)])?;
    component.initialize_to_basis_state(0)?;
    assert_eq!(component.get_basis_probability(0), 1.0);
    assert_eq!(component.get_basis_probability(1), 0.0);
    check_probabilities(&component, "after initialization");

    for step in 0..20 {
        component.apply_lindblad_drive(rid(0), 1, 0.5, 0.016)?;
        check_probabilities(&component, &format!("after drive step {}", step));
    }
    assert!(component.get_basis_probability(1) > 0.0);

    let p_north = component.get_marginal_probability(rid(0), 0)?;
    let p_south = component.get_marginal_probability(rid(0), 1)?;
    let mut rng = StdRng::seed_from_u64(2024);
    let (pole, probability) = component.measure(rid(0), MeasureMode::Collapse, &mut rng)?;
    let expected = match pole {
        Pole::North => p_north,
        Pole::South => p_south,
    };
    assert!((probability - expected).abs() < 1e-12, "recorded {} vs marginal {}", probability, expected);
    check_probabilities(&component, "after collapse");
    let settled = component.get_marginal_probability(rid(0), pole.value())?;
    assert!((settled - 1.0).abs() < 1e-12, "collapsed state left {} on the observed pole", settled);
    Ok(())
}

#[test]
fn test_measuring_a_certain_register_keeps_it() -> Result<(), QuantumError> {
    init_logger();
    let mut qc = computer(1);
    let register = qc.allocate_register()?;
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..3 {
        let outcome = qc.measure(register, MeasureMode::Collapse, &mut rng)?;
        assert_eq!(outcome.pole, Pole::North);
        assert_eq!(outcome.label, "north-0");
        assert!((outcome.probability - 1.0).abs() < 1e-12);
        let (north, south) = qc.get_register_probabilities(register)?;
        assert!((north - 1.0).abs() < 1e-12 && south.abs() < 1e-12);
    }
    Ok(())
}

#[test]
fn test_three_registers_merge_to_dimension_eight() -> Result<(), QuantumError> {
    init_logger();
    let mut qc = computer(3);
    let registers: Vec<RegisterId> = (0..3).map(|_| qc.allocate_register()).collect::<Result<_, _>>()?;
    let dims: Vec<usize> = registers
        .iter()
        .map(|r| qc.get_component_containing(*r).map(|c| c.hilbert_dimension()).unwrap_or(0))
        .collect();
    assert_eq!(dims, vec![2, 2, 2]);

    let first = qc.merge_registers(registers[0], registers[1])?;
    let first_dim = qc.component(first).map(|c| c.hilbert_dimension()).unwrap_or(0);
    assert_eq!(first_dim, 4);
    let all = qc.merge_registers(registers[1], registers[2])?;
    let merged = qc.component(all).ok_or(QuantumError::UnknownRegister { register: registers[2] })?;
    assert_eq!(merged.hilbert_dimension(), first_dim * 2);
    assert_eq!(merged.hilbert_dimension(), 8);
    check_probabilities(merged, "after merging three registers");
    Ok(())
}

#[test]
fn test_merge_dimension_is_product() -> Result<(), QuantumError> {
    let mut qc = computer(5);
    let r: Vec<RegisterId> = (0..5).map(|_| qc.allocate_register()).collect::<Result<_, _>>()?;
    let a = qc.merge_registers(r[0], r[1])?;
    qc.merge_registers(r[2], r[3])?;
    let b = qc.merge_registers(r[3], r[4])?;
    let da = qc.component(a).map(|c| c.hilbert_dimension()).unwrap_or(0);
    let db = qc.component(b).map(|c| c.hilbert_dimension()).unwrap_or(0);
    let ab = qc.merge_components(a, b)?;
    assert_eq!(qc.component(ab).map(|c| c.hilbert_dimension()), Some(da * db));
    assert_eq!(qc.num_components(), 1);
    Ok(())
}

#[test]
fn test_trace_invariant_across_operations() -> Result<(), QuantumError> {
    init_logger();
    let mut qc = computer(2);
    let a = qc.allocate_register()?;
    let b = qc.allocate_register()?;
    qc.apply_gate(a, Gate::RotateY(0.9))?;
    qc.apply_two_qubit_gate(a, b, TwoQubitGate::ControlledNot)?;

    let h = {
        let config = HamiltonianConfig {
            drives: [("north-1".to_string(), 0.4)].into_iter().collect(),
            self_energies: [("south-0".to_string(), 0.2)].into_iter().collect(),
            ..HamiltonianConfig::default()
        };
        HamiltonianBuilder::new(qc.register_map(), &config).build_for(&[a, b])?
    };
    let component = qc.get_component_containing_mut(a)?;
    for step in 0..30 {
        component.apply_hamiltonian_evolution(&h, 0.05)?;
        check_probabilities(component, &format!("after Hamiltonian step {}", step));
    }
    for step in 0..25 {
        component.apply_lindblad_drive(b, 0, 0.8, 0.016)?;
        check_probabilities(component, &format!("after drive step {}", step));
    }
    component.validate()?;

    let mut rng = StdRng::seed_from_u64(5);
    qc.measure(a, MeasureMode::Collapse, &mut rng)?;
    let component = qc.get_component_containing(b).ok_or(QuantumError::UnknownRegister { register: b })?;
    check_probabilities(component, "after collapse");
    Ok(())
}

#[test]
fn test_partial_drain_keeps_other_outcome_consistent() -> Result<(), QuantumError> {
    let mut qc = computer(2);
    let a = qc.allocate_register()?;
    let b = qc.allocate_register()?;
    qc.create_entanglement(a, b)?;
    let mut rng = StdRng::seed_from_u64(99);
    let outcome = qc.measure(a, MeasureMode::Drain { fraction: 0.4 }, &mut rng)?;
    assert!((outcome.probability - 0.5).abs() < 1e-9);

    let kept = 0.5 * 0.6;
    let expected_observed = kept / (kept + 0.5);
    let observed = qc.get_marginal_probability(a, outcome.value())?;
    assert!((observed - expected_observed).abs() < 1e-9);
    // Correlation with b is intact: b's marginal follows a's exactly.
    assert!((qc.get_marginal_probability(b, outcome.value())? - expected_observed).abs() < 1e-9);
    let component = qc.get_component_containing(a).ok_or(QuantumError::UnknownRegister { register: a })?;
    check_probabilities(component, "after drain");
    component.validate()
}

#[test]
fn test_biome_rates_drive_joint_component() -> Result<(), QuantumError> {
    init_logger();
    let mut qc = computer(2);
    let a = qc.allocate_register()?;
    let b = qc.allocate_register()?;
    let id = qc.merge_registers(a, b)?;

    let rates = LindbladRates::default()
        .with_transfer("north-0", "south-0", 0.6)
        .with_transfer("north-1", "south-1", 0.3);
    let component_qubits = qc.component(id).map(|c| c.qubits().to_vec()).unwrap_or_default();
    let terms = LindbladBuilder::new(qc.register_map(), &rates).build_for(&component_qubits)?;
    assert_eq!(terms.operators.len(), 2);
    let engine = EvolutionEngine::from_terms(4, None, &terms)?;

    let component = qc.component_mut(id).ok_or(QuantumError::UnknownRegister { register: a })?;
    for _ in 0..50 {
        engine.evolve_component(component, 0.1, 0.02)?;
    }
    check_probabilities(component, "after 5 time units");
    let pa = component.get_marginal_probability(a, 1)?;
    let pb = component.get_marginal_probability(b, 1)?;
    assert!((pa - (1.0 - (-3.0f64).exp())).abs() < 2e-2, "a south {}", pa);
    assert!((pb - (1.0 - (-1.5f64).exp())).abs() < 2e-2, "b south {}", pb);
    Ok(())
}

#[test]
fn test_no_free_qubit_reported() {
    let mut qc = computer(1);
    assert!(qc.allocate_register().is_ok());
    assert_eq!(qc.allocate_register(), Err(QuantumError::NoFreeQubit { capacity: 1 }));
}
