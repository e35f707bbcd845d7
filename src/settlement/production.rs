//! Unit production - advances each settlement's training order each tick
//!
//! Progress per tick is `(2 + floor(population / 2000)) * dt`. A completed
//! order clears the slot and yields a spawn request at the settlement tile;
//! the military manager creates the unit.

use serde::{Deserialize, Serialize};

use crate::core::types::GridPos;
use crate::military::UnitType;
use crate::settlement::settlement::Settlement;

/// A unit the military manager should create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpawn {
    /// Nation (or `REBELS`) that will own the unit
    pub owner: String,
    pub unit_type: UnitType,
    pub position: GridPos,
    /// Settlement the unit came from
    pub origin: String,
    pub rebel: bool,
}

pub fn production_rate(population: u64) -> f32 {
    2.0 + (population / 2000) as f32
}

/// Advance one settlement's order; returns the finished spawn if any
pub fn tick_production(settlement: &mut Settlement, dt: f32) -> Option<UnitSpawn> {
    let rate = production_rate(settlement.population);
    let order = settlement.production.as_mut()?;
    order.progress += rate * dt;
    if !order.is_complete() {
        return None;
    }

    let unit_type = order.unit_type;
    settlement.production = None;
    Some(UnitSpawn {
        owner: settlement.region_id.clone(),
        unit_type,
        position: settlement.position.to_grid(),
        origin: settlement.id.clone(),
        rebel: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec2;
    use crate::settlement::settlement::ProductionOrder;

    #[test]
    fn test_production_rate_scales_with_population() {
        assert_eq!(production_rate(100), 2.0);
        assert_eq!(production_rate(1_999), 2.0);
        assert_eq!(production_rate(4_000), 4.0);
    }

    #[test]
    fn test_infantry_completes_and_clears_slot() {
        let mut s = Settlement::new("S1", "Ur", Vec2::new(3.5, 4.5), "N1");
        s.production = Some(ProductionOrder::new(UnitType::Infantry));

        let mut spawned = None;
        for _ in 0..30 {
            if let Some(spawn) = tick_production(&mut s, 1.0) {
                spawned = Some(spawn);
                break;
            }
        }

        let spawn = spawned.expect("infantry should finish within 20 ticks");
        assert_eq!(spawn.unit_type, UnitType::Infantry);
        assert_eq!(spawn.position, GridPos::new(3, 4));
        assert_eq!(spawn.owner, "N1");
        assert!(s.production.is_none());
    }

    #[test]
    fn test_idle_settlement_produces_nothing() {
        let mut s = Settlement::new("S1", "Ur", Vec2::new(0.0, 0.0), "N1");
        assert!(tick_production(&mut s, 1.0).is_none());
    }
}
