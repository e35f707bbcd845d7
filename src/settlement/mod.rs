//! Settlements and territorial control

pub mod influence;
pub mod manager;
pub mod production;
pub mod settlement;
pub mod spawn;

use serde::{Deserialize, Serialize};

pub use influence::{influence_at, InfluenceReport};
pub use manager::{Revolt, SettlementContext, SettlementManager, SettlementOutcome, MAX_SETTLEMENT_ID_LEN};
pub use production::UnitSpawn;
pub use settlement::{Demographics, Infrastructure, ProductionOrder, Settlement, Tier};
pub use spawn::suitability;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementParams {
    /// Minimum Euclidean distance between settlements
    pub min_distance: f32,
    /// Sites must score strictly above this to be founded
    pub suitability_threshold: f32,
    pub initial_population: u64,
    pub base_radius: u32,
    /// Influence needed to claim an unowned tile
    pub claim_threshold: f32,
    /// Challenger must exceed this multiple of the holder's influence
    pub flip_ratio: f32,
    pub revolt_loyalty: f32,
    /// Chance per tick (times dt) that a revolting settlement raises rebels
    pub rebel_spawn_chance: f32,
    pub spawn_attempts_per_settlement: usize,
}

impl Default for SettlementParams {
    fn default() -> Self {
        Self {
            min_distance: 4.0,
            suitability_threshold: 0.7,
            initial_population: 100,
            base_radius: 2,
            claim_threshold: 0.05,
            flip_ratio: 1.5,
            revolt_loyalty: 0.15,
            rebel_spawn_chance: 0.2,
            spawn_attempts_per_settlement: 50,
        }
    }
}
