// src/biome/mod.rs

//! Independently simulated biomes.
//!
//! A biome is built from a `BiomeConfig`: one register per label axis, a
//! Lindblad rate table and a Hamiltonian. It owns one `QuantumComputer` and the
//! bound/unbound split of its registers, so exhausting one biome's registers
//! never affects another biome.

mod registry;

pub use registry::BiomeRegistry;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::core::{
    AxisConfig, BiomeId, ComponentId, Pole, QuantumError, QuantumResult, RegisterId, RegisterMap,
};
use crate::simulation::{
    EvolutionEngine, HamiltonianBuilder, HamiltonianConfig, LindbladBuilder, LindbladRates, Lookahead, QuantumComputer,
};

/// Which optional capabilities a biome provides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiomeKind {
    /// Evolution and probing only.
    #[default]
    Passive,
    /// Adds `EntanglementCapable`.
    Entangling,
    /// Adds `EnergyTap`.
    Tapping,
    /// Both capabilities.
    Hybrid,
}

impl BiomeKind {
    pub fn supports_entanglement(self) -> bool {
        matches!(self, BiomeKind::Entangling | BiomeKind::Hybrid)
    }

    pub fn supports_energy_tap(self) -> bool {
        matches!(self, BiomeKind::Tapping | BiomeKind::Hybrid)
    }
}

/// Static description of a biome, usually loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomeConfig {
    pub name: String,
    #[serde(default)]
    pub kind: BiomeKind,
    /// Axis `i` becomes qubit (and register) `i`.
    pub axes: Vec<AxisConfig>,
    #[serde(default)]
    pub rates: LindbladRates,
    #[serde(default)]
    pub hamiltonian: HamiltonianConfig,
}

impl BiomeConfig {
    pub fn from_json(json: &str) -> QuantumResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Operations that create or remove correlations between registers.
pub trait EntanglementCapable {
    /// Bell-type correlation between two registers; merges their components.
    fn create_entanglement(&mut self, a: RegisterId, b: RegisterId) -> QuantumResult<ComponentId>;

    /// Linear cluster state over `registers`; merges all their components.
    fn create_cluster_state(&mut self, registers: &[RegisterId]) -> QuantumResult<ComponentId>;

    /// Replaces the owning component's state by the product of its marginals.
    /// Provisional, see `QuantumComputer::remove_entanglement`.
    fn remove_entanglement(&mut self, register: RegisterId) -> QuantumResult<()>;
}

/// Harvests probability mass from one pole without a full collapse.
pub trait EnergyTap {
    /// Drains `fraction` of `pole`'s mass on `register`; returns the mass removed.
    fn tap_energy(&mut self, register: RegisterId, pole: Pole, fraction: f64) -> QuantumResult<f64>;
}

/// One biome: its computer, its register pool and cached evolution engines.
#[derive(Debug, Clone)]
pub struct Biome {
    id: BiomeId,
    name: String,
    kind: BiomeKind,
    rates: LindbladRates,
    hamiltonian: HamiltonianConfig,
    computer: QuantumComputer,
    unbound: BTreeSet<RegisterId>,
    bound: BTreeSet<RegisterId>,
    /// Keyed by component id; a merge retires the key with the component.
    engines: HashMap<ComponentId, EvolutionEngine>,
    elapsed: f64,
}

impl Biome {
    /// Validates `config` and allocates one register per axis.
    ///
    /// # Errors
    /// `DuplicateLabel`, `UnknownLabel` or `InvalidConfig` for a bad table.
    pub fn build(id: BiomeId, config: BiomeConfig) -> QuantumResult<Self> {
        let map = RegisterMap::from_axes(&config.axes)?;
        map.validate()?;
        LindbladBuilder::new(&map, &config.rates).validate()?;
        HamiltonianBuilder::new(&map, &config.hamiltonian).validate()?;

        let mut computer = QuantumComputer::new(map);
        let mut unbound = BTreeSet::new();
        for _ in 0..config.axes.len() {
            unbound.insert(computer.allocate_register()?);
        }
        info!("{} '{}' ({:?}) built with {} registers", id, config.name, config.kind, unbound.len());
        Ok(Self {
            id,
            name: config.name,
            kind: config.kind,
            rates: config.rates,
            hamiltonian: config.hamiltonian,
            computer,
            unbound,
            bound: BTreeSet::new(),
            engines: HashMap::new(),
            elapsed: 0.0,
        })
    }

    pub fn id(&self) -> BiomeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> BiomeKind {
        self.kind
    }

    pub fn computer(&self) -> &QuantumComputer {
        &self.computer
    }

    pub fn computer_mut(&mut self) -> &mut QuantumComputer {
        &mut self.computer
    }

    /// Simulated time advanced so far.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn register_capacity(&self) -> usize {
        self.bound.len() + self.unbound.len()
    }

    pub fn bound_registers(&self) -> Vec<RegisterId> {
        self.bound.iter().copied().collect()
    }

    pub fn unbound_registers(&self) -> Vec<RegisterId> {
        self.unbound.iter().copied().collect()
    }

    pub fn is_bound(&self, register: RegisterId) -> bool {
        self.bound.contains(&register)
    }

    /// Moves the lowest unbound register to the bound set.
    ///
    /// # Errors
    /// `ExhaustedPool` if every register is bound; nothing changes.
    pub fn bind_register(&mut self) -> QuantumResult<RegisterId> {
        let register = self.unbound.pop_first().ok_or_else(|| QuantumError::ExhaustedPool {
            message: format!("{} '{}' has no unbound register", self.id, self.name),
        })?;
        self.bound.insert(register);
        debug!("{} bound {}", self.id, register);
        Ok(register)
    }

    /// Returns a bound register to the unbound set.
    pub fn release_register(&mut self, register: RegisterId) -> QuantumResult<()> {
        if !self.bound.remove(&register) {
            return Err(QuantumError::InvalidOperation {
                message: format!("{} is not bound in {}", register, self.id),
            });
        }
        self.unbound.insert(register);
        debug!("{} released {}", self.id, register);
        Ok(())
    }

    /// Refreshes the engine cache: drops engines of retired components and
    /// builds engines for new ones.
    fn refresh_engines(&mut self) -> QuantumResult<()> {
        let live: BTreeSet<ComponentId> = self.computer.components().map(|c| c.id()).collect();
        self.engines.retain(|id, _| live.contains(id));
        let map = self.computer.register_map();
        for component in self.computer.components() {
            if self.engines.contains_key(&component.id()) {
                continue;
            }
            let qubits = component.qubits();
            let terms = LindbladBuilder::new(map, &self.rates).build_for(qubits)?;
            let h = if self.hamiltonian.is_empty() {
                None
            } else {
                Some(HamiltonianBuilder::new(map, &self.hamiltonian).build_for(qubits)?)
            };
            let engine = EvolutionEngine::from_terms(component.hilbert_dimension(), h, &terms)?;
            debug!(
                "{} engine for {}: {} jump operators",
                self.id,
                component.id(),
                engine.num_jump_operators()
            );
            self.engines.insert(component.id(), engine);
        }
        Ok(())
    }

    /// Advances every component by `dt`, in substeps of at most `max_dt`.
    pub fn evolve(&mut self, dt: f64, max_dt: f64) -> QuantumResult<()> {
        self.refresh_engines()?;
        for component in self.computer.components_mut() {
            let engine = self.engines.get(&component.id()).ok_or_else(|| QuantumError::InvalidOperation {
                message: format!("no evolution engine for {}", component.id()),
            })?;
            engine.evolve_component(component, dt, max_dt)?;
        }
        self.elapsed += dt;
        Ok(())
    }

    /// Predicts `steps` frames of every component without changing the biome.
    ///
    /// # Returns
    /// Per component, packed snapshots for each frame and the pairwise mutual
    /// information of the last one.
    pub fn lookahead(&mut self, steps: usize, dt: f64, max_dt: f64) -> QuantumResult<BTreeMap<ComponentId, Lookahead>> {
        self.refresh_engines()?;
        let mut frames = BTreeMap::new();
        for component in self.computer.components() {
            let engine = self.engines.get(&component.id()).ok_or_else(|| QuantumError::InvalidOperation {
                message: format!("no evolution engine for {}", component.id()),
            })?;
            frames.insert(component.id(), engine.lookahead(component.get_density_matrix(), steps, dt, max_dt)?);
        }
        Ok(frames)
    }

    fn require(&self, supported: bool, capability: &str) -> QuantumResult<()> {
        if supported {
            Ok(())
        } else {
            Err(QuantumError::Unsupported {
                message: format!("{} '{}' ({:?}) has no {}", self.id, self.name, self.kind, capability),
            })
        }
    }
}

impl EntanglementCapable for Biome {
    fn create_entanglement(&mut self, a: RegisterId, b: RegisterId) -> QuantumResult<ComponentId> {
        self.require(self.kind.supports_entanglement(), "entanglement")?;
        self.computer.create_entanglement(a, b)
    }

    fn create_cluster_state(&mut self, registers: &[RegisterId]) -> QuantumResult<ComponentId> {
        self.require(self.kind.supports_entanglement(), "entanglement")?;
        self.computer.create_cluster_state(registers)
    }

    fn remove_entanglement(&mut self, register: RegisterId) -> QuantumResult<()> {
        self.require(self.kind.supports_entanglement(), "entanglement")?;
        self.computer.remove_entanglement(register)
    }
}

impl EnergyTap for Biome {
    fn tap_energy(&mut self, register: RegisterId, pole: Pole, fraction: f64) -> QuantumResult<f64> {
        self.require(self.kind.supports_energy_tap(), "energy tap")?;
        self.computer
            .get_component_containing_mut(register)?
            .drain(register, pole.value(), fraction)
    }
}
