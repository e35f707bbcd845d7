//! Military - units, combat and conquests
//!
//! Settlements request units; the military manager owns them. Conquests
//! report completion back to the simulation, which transfers the settlement
//! and starts assimilation.

pub mod combat;
pub mod conquest;
pub mod unit;

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::error::{CivError, Result};
use crate::core::rng::{stream_rng, RngStream};
use crate::core::types::GridPos;
use crate::settlement::{SettlementManager, UnitSpawn};
use crate::world::WorldMap;

pub use combat::{resolve_combat, CombatResult, CombatTerrain};
pub use conquest::{Conquest, ConquestKind, ConquestResult};
pub use unit::{Unit, UnitType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MilitaryParams {
    pub defender_bonus: f32,
    pub damage_factor: f32,
    pub max_exchanges: u32,
    pub morale_loss: f32,
    pub min_morale: f32,
    pub xp_per_damage: f32,
    pub first_level_xp: f32,
    pub prisoner_share: f32,
    /// Ticks a conquest takes at dt = 1
    pub conquest_duration: f32,
}

impl Default for MilitaryParams {
    fn default() -> Self {
        Self {
            defender_bonus: 1.2,
            damage_factor: 0.2,
            max_exchanges: 3,
            morale_loss: 0.05,
            min_morale: 0.1,
            xp_per_damage: 0.5,
            first_level_xp: 10.0,
            prisoner_share: 0.1,
            conquest_duration: 10.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MilitaryOutcome {
    pub spawned: Vec<String>,
    pub conquests: Vec<ConquestResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilitaryManager {
    units: Vec<Unit>,
    conquests: Vec<Conquest>,
    params: MilitaryParams,
    rng: ChaCha8Rng,
    next_id: u64,
}

impl MilitaryManager {
    pub fn new(seed: u64, params: MilitaryParams) -> Self {
        Self {
            units: Vec::new(),
            conquests: Vec::new(),
            params,
            rng: stream_rng(seed, RngStream::Military),
            next_id: 1,
        }
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit(&self, id: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    pub fn units_of<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a Unit> + 'a {
        self.units.iter().filter(move |u| u.owner == owner)
    }

    pub fn units_at(&self, pos: GridPos) -> impl Iterator<Item = &Unit> {
        self.units.iter().filter(move |u| u.position == pos)
    }

    /// Sum of effective combat strength fielded by an owner
    pub fn strength_of(&self, owner: &str) -> f32 {
        self.units_of(owner)
            .map(|u| u.combat_strength * u.strength_ratio())
            .sum()
    }

    pub fn conquests(&self) -> &[Conquest] {
        &self.conquests
    }

    pub fn spawn_unit(&mut self, spawn: &UnitSpawn) -> Result<String> {
        if spawn.owner.is_empty() {
            return Err(CivError::InvalidArgument("unit owner must not be empty".into()));
        }
        let id = format!("U{}", self.next_id);
        self.next_id += 1;
        self.units
            .try_reserve(1)
            .map_err(|e| CivError::OutOfMemory(e.to_string()))?;
        let unit = Unit::new(&id, &spawn.owner, spawn.unit_type, spawn.position, self.params.first_level_xp);
        if spawn.rebel {
            info!("rebels raise {} at {} ({})", unit.unit_type.name(), spawn.position, spawn.origin);
        } else {
            debug!("{} trains {} at {}", spawn.origin, unit.unit_type.name(), spawn.position);
        }
        self.units.push(unit);
        Ok(id)
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.units
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| CivError::NotFound(format!("unit '{}'", id)))
    }

    pub fn disband(&mut self, id: &str) -> Result<Unit> {
        let i = self.index_of(id)?;
        Ok(self.units.remove(i))
    }

    /// Move within `floor(movement_speed)` king steps onto land, once per turn
    pub fn move_unit(&mut self, id: &str, target: GridPos, world: &WorldMap) -> Result<()> {
        let i = self.index_of(id)?;
        let unit = &self.units[i];
        if unit.has_moved {
            return Err(CivError::InvalidState(format!("{} has already moved this turn", id)));
        }
        let dest = world
            .tile(target.x, target.y)
            .filter(|t| t.is_land())
            .ok_or_else(|| CivError::InvalidArgument(format!("{} is not a land tile", target)))?;
        let dest = GridPos::new(dest.x, dest.y);
        let steps = world
            .wrapped_dx(unit.position.x, dest.x)
            .abs()
            .max((unit.position.y - dest.y).abs());
        if steps > unit.movement_speed.floor() as i32 {
            return Err(CivError::InvalidArgument(format!(
                "{} cannot reach {} ({} steps)",
                id, dest, steps
            )));
        }
        let unit = &mut self.units[i];
        unit.position = dest;
        unit.has_moved = true;
        Ok(())
    }

    /// Resolve an attack between adjacent units; destroyed units are removed
    pub fn attack(
        &mut self,
        attacker_id: &str,
        defender_id: &str,
        world: &WorldMap,
        settlements: &SettlementManager,
    ) -> Result<CombatResult> {
        let ai = self.index_of(attacker_id)?;
        let di = self.index_of(defender_id)?;
        if ai == di {
            return Err(CivError::InvalidArgument("a unit cannot attack itself".into()));
        }
        let (a_pos, d_pos) = (self.units[ai].position, self.units[di].position);
        let reach = world.wrapped_dx(a_pos.x, d_pos.x).abs().max((a_pos.y - d_pos.y).abs());
        if reach > 1 {
            return Err(CivError::InvalidArgument(format!("{} is out of reach of {}", defender_id, attacker_id)));
        }
        if self.units[ai].has_moved {
            return Err(CivError::InvalidState(format!("{} has already acted this turn", attacker_id)));
        }

        let terrain = CombatTerrain::at(world, settlements, d_pos);
        let weather = world.weather();
        let (attacker, defender) = if ai < di {
            let (lo, hi) = self.units.split_at_mut(di);
            (&mut lo[ai], &mut hi[0])
        } else {
            let (lo, hi) = self.units.split_at_mut(ai);
            (&mut hi[0], &mut lo[di])
        };
        let result = resolve_combat(attacker, defender, terrain, weather, &self.params, &mut self.rng);
        attacker.has_moved = true;
        if result.territory_gained {
            attacker.position = d_pos;
        }
        info!(
            "{} attacks {} on {:?}: {} wins",
            result.attacker_id, result.defender_id, terrain, result.victor_id
        );

        self.units.retain(|u| !u.is_destroyed());
        Ok(result)
    }

    pub fn begin_conquest(&mut self, attacker: &str, settlement_id: &str, kind: ConquestKind, now: f64) -> Result<String> {
        if self.conquests.iter().any(|c| c.settlement_id == settlement_id) {
            return Err(CivError::InvalidState(format!("{} is already under conquest", settlement_id)));
        }
        let id = format!("C{}", self.next_id);
        self.next_id += 1;
        self.conquests.push(Conquest {
            id: id.clone(),
            attacker: attacker.to_string(),
            settlement_id: settlement_id.to_string(),
            kind,
            progress: 0.0,
            duration: self.params.conquest_duration,
            started_at: now,
        });
        info!("{} begins {:?} of {}", attacker, kind, settlement_id);
        Ok(id)
    }

    pub fn cancel_conquest(&mut self, id: &str) -> Result<()> {
        let before = self.conquests.len();
        self.conquests.retain(|c| c.id != id);
        if self.conquests.len() == before {
            return Err(CivError::NotFound(format!("conquest '{}'", id)));
        }
        Ok(())
    }

    /// Create requested units, advance conquests, then reset the turn
    pub fn update(&mut self, dt: f32, spawns: &[UnitSpawn], settlements: &SettlementManager) -> MilitaryOutcome {
        let mut outcome = MilitaryOutcome::default();

        for spawn in spawns {
            match self.spawn_unit(spawn) {
                Ok(id) => outcome.spawned.push(id),
                Err(e) => warn!("could not spawn unit for {}: {}", spawn.origin, e),
            }
        }

        let mut finished = Vec::new();
        self.conquests.retain_mut(|c| {
            let Some(target) = settlements.get(&c.settlement_id) else {
                warn!("conquest {} dropped: {} no longer exists", c.id, c.settlement_id);
                return false;
            };
            if target.region_id == c.attacker {
                return false;
            }
            if !c.advance(dt) {
                return true;
            }
            finished.push(ConquestResult {
                conquest_id: c.id.clone(),
                attacker: c.attacker.clone(),
                settlement_id: c.settlement_id.clone(),
                former_region: target.region_id.clone(),
                kind: c.kind,
                plunder: target.accumulated_culture * c.kind.plunder_factor(),
                assimilation: c.kind.assimilation(),
            });
            false
        });
        for r in &finished {
            info!("{} completes {:?} of {} (plunder {:.1})", r.attacker, r.kind, r.settlement_id, r.plunder);
        }
        outcome.conquests = finished;

        for unit in &mut self.units {
            unit.has_moved = false;
        }
        outcome
    }
}
