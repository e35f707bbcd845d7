//! Simulation parameters with documented constants
//!
//! Every manager's tuning constants are collected here (each manager defines
//! its own parameter block next to its code). The bundle can be loaded from a
//! TOML file; missing keys fall back to the defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ai::AiParams;
use crate::core::error::{CivError, Result};
use crate::culture::CultureParams;
use crate::diplomacy::DiplomacyParams;
use crate::economy::EconomyParams;
use crate::governance::GovernanceParams;
use crate::knowledge::KnowledgeParams;
use crate::language::LanguageParams;
use crate::military::MilitaryParams;
use crate::population::PopulationParams;
use crate::settlement::SettlementParams;
use crate::world::WorldGenParams;

/// Tuning constants for every subsystem.
///
/// These values have been tuned to produce slow, readable emergence at
/// `dt = 1.0` per tick. Changing them changes pacing, not semantics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub world: WorldGenParams,
    pub settlement: SettlementParams,
    pub culture: CultureParams,
    pub language: LanguageParams,
    pub governance: GovernanceParams,
    pub diplomacy: DiplomacyParams,
    pub knowledge: KnowledgeParams,
    pub military: MilitaryParams,
    pub economy: EconomyParams,
    pub population: PopulationParams,
    pub ai: AiParams,
    pub journal: JournalParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalParams {
    /// Records between automatic flushes when a journal file is attached
    pub flush_interval: usize,
    /// Records to preallocate
    pub initial_capacity: usize,
}

impl Default for JournalParams {
    fn default() -> Self {
        Self {
            flush_interval: 256,
            initial_capacity: 1024,
        }
    }
}

impl SimulationParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document; absent sections keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let params: SimulationParams = toml::from_str(content)?;
        params.validate()?;
        Ok(params)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate parameters for internal consistency
    pub fn validate(&self) -> Result<()> {
        let w = &self.world;
        if !(0.0..1.0).contains(&w.sea_level) {
            return Err(CivError::InvalidArgument(format!(
                "sea_level ({}) must be in [0, 1)",
                w.sea_level
            )));
        }
        if w.noise_octaves == 0 || w.noise_octaves > 16 {
            return Err(CivError::InvalidArgument(format!(
                "noise_octaves ({}) must be in 1..=16",
                w.noise_octaves
            )));
        }
        if w.noise_scale <= 0.0 {
            return Err(CivError::InvalidArgument("noise_scale must be positive".into()));
        }

        if self.settlement.flip_ratio < 1.0 {
            return Err(CivError::InvalidArgument(format!(
                "flip_ratio ({}) below 1.0 would let weaker claimants flip tiles",
                self.settlement.flip_ratio
            )));
        }

        if self.knowledge.base_cost <= 0.0 || self.knowledge.exponent < 0.0 {
            return Err(CivError::InvalidArgument(
                "knowledge cost curve must have positive base and non-negative exponent".into(),
            ));
        }

        if !(self.military.first_level_xp > 0.0 && self.military.first_level_xp.is_finite()) {
            return Err(CivError::InvalidArgument(format!(
                "first_level_xp ({}) must be positive",
                self.military.first_level_xp
            )));
        }

        if self.language.max_dialects == 0 {
            return Err(CivError::InvalidArgument("max_dialects must be at least 1".into()));
        }

        if self.journal.flush_interval == 0 {
            return Err(CivError::InvalidArgument("journal flush_interval must be positive".into()));
        }

        Ok(())
    }
}
