// src/biome/registry.rs

use log::{info, warn};
use std::collections::BTreeMap;

use super::{Biome, BiomeConfig, EnergyTap, EntanglementCapable};
use crate::core::{BiomeId, ComponentId, EngineConfig, QuantumError, QuantumResult};
use crate::simulation::Lookahead;

/// Explicitly constructed owner of every biome in a session.
///
/// Hands out stable `BiomeId`s; callers keep the id, never a reference, across
/// calls.
#[derive(Debug, Clone)]
pub struct BiomeRegistry {
    biomes: BTreeMap<BiomeId, Biome>,
    next_id: u64,
    max_dt: f64,
}

impl BiomeRegistry {
    pub fn new(config: &EngineConfig) -> Self {
        Self { biomes: BTreeMap::new(), next_id: 0, max_dt: config.max_dt }
    }

    /// Builds a biome and returns its id.
    pub fn register(&mut self, config: BiomeConfig) -> QuantumResult<BiomeId> {
        let id = BiomeId(self.next_id);
        let biome = Biome::build(id, config)?;
        self.next_id += 1;
        self.biomes.insert(id, biome);
        Ok(id)
    }

    /// Parses a JSON `BiomeConfig` and registers it.
    pub fn load_json(&mut self, json: &str) -> QuantumResult<BiomeId> {
        self.register(BiomeConfig::from_json(json)?)
    }

    /// Drops a biome. Its id is not reused.
    pub fn remove(&mut self, id: BiomeId) -> QuantumResult<Biome> {
        self.biomes.remove(&id).ok_or(QuantumError::UnknownBiome { biome: id })
    }

    pub fn get(&self, id: BiomeId) -> QuantumResult<&Biome> {
        self.biomes.get(&id).ok_or(QuantumError::UnknownBiome { biome: id })
    }

    pub fn get_mut(&mut self, id: BiomeId) -> QuantumResult<&mut Biome> {
        self.biomes.get_mut(&id).ok_or(QuantumError::UnknownBiome { biome: id })
    }

    pub fn ids(&self) -> Vec<BiomeId> {
        self.biomes.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.biomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.biomes.is_empty()
    }

    /// The biome as an entanglement provider, if its kind has that capability.
    pub fn entangler(&mut self, id: BiomeId) -> QuantumResult<&mut dyn EntanglementCapable> {
        let biome = self.get_mut(id)?;
        if !biome.kind().supports_entanglement() {
            return Err(QuantumError::Unsupported { message: format!("{} cannot entangle", id) });
        }
        Ok(biome)
    }

    /// The biome as an energy tap, if its kind has that capability.
    pub fn energy_tap(&mut self, id: BiomeId) -> QuantumResult<&mut dyn EnergyTap> {
        let biome = self.get_mut(id)?;
        if !biome.kind().supports_energy_tap() {
            return Err(QuantumError::Unsupported { message: format!("{} has no energy tap", id) });
        }
        Ok(biome)
    }

    /// Advances every biome by `dt`.
    ///
    /// A biome whose step fails is reported and skipped; the others still
    /// advance. The first error is returned after all biomes were visited.
    pub fn evolve_all(&mut self, dt: f64) -> QuantumResult<()> {
        let mut first_error = None;
        for (id, biome) in self.biomes.iter_mut() {
            if let Err(err) = biome.evolve(dt, self.max_dt) {
                warn!("{} failed to evolve: {}", id, err);
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Lookahead frames and final mutual information for every component of
    /// every biome.
    pub fn lookahead(&mut self, steps: usize, dt: f64) -> QuantumResult<BTreeMap<BiomeId, BTreeMap<ComponentId, Lookahead>>> {
        let mut frames = BTreeMap::new();
        for (id, biome) in self.biomes.iter_mut() {
            frames.insert(*id, biome.lookahead(steps, dt, self.max_dt)?);
        }
        info!("lookahead of {} frames over {} biomes", steps, frames.len());
        Ok(frames)
    }
}
