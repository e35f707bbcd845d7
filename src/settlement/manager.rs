//! SettlementManager - lifecycle and per-tick pipeline for all settlements

use ahash::AHashMap;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::error::{CivError, Result};
use crate::core::rng::{stream_rng, RngStream};
use crate::core::types::{clamp01, GridPos, REBELS_REGION};
use crate::governance::GovernanceManager;
use crate::military::UnitType;
use crate::population::PopulationManager;
use crate::settlement::influence::{run_influence_pass, InfluenceReport};
use crate::settlement::production::{tick_production, UnitSpawn};
use crate::settlement::settlement::{
    culture_yield_for, radius_for_culture, shift_toward, ProductionOrder, Settlement, Tier,
};
use crate::settlement::spawn::{far_enough, suitability, tile_center};
use crate::settlement::SettlementParams;
use crate::world::WorldMap;

/// Longest id that still fits a tile record's owner field
pub const MAX_SETTLEMENT_ID_LEN: usize = 15;

const NAME_PREFIXES: &[&str] = &[
    "Ash", "Bel", "Cor", "Dun", "El", "Fen", "Gal", "Har", "Ir", "Kel", "Lor", "Mar", "Nor", "Os",
    "Ral", "Sil", "Tor", "Ul", "Var", "Wen",
];
const NAME_SUFFIXES: &[&str] = &[
    "ford", "holm", "wick", "dale", "mere", "stead", "burg", "ton", "gate", "moor", "haven", "by",
];

/// Sibling state the settlement pipeline reads
pub struct SettlementContext<'a> {
    pub governance: &'a GovernanceManager,
    pub population: &'a PopulationManager,
}

/// A settlement that just fell below the revolt threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revolt {
    pub settlement_id: String,
    pub former_region: String,
}

/// Everything the rest of the simulation must react to after a tick
#[derive(Debug, Clone, Default)]
pub struct SettlementOutcome {
    pub promotions: Vec<(String, Tier)>,
    pub unit_spawns: Vec<UnitSpawn>,
    pub revolts: Vec<Revolt>,
    pub influence: InfluenceReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementManager {
    settlements: Vec<Settlement>,
    index: AHashMap<String, usize>,
    params: SettlementParams,
    rng: ChaCha8Rng,
    next_id: u32,
}

impl SettlementManager {
    pub fn new(seed: u64, params: SettlementParams) -> Self {
        Self {
            settlements: Vec::new(),
            index: AHashMap::new(),
            params,
            rng: stream_rng(seed, RngStream::Settlement),
            next_id: 1,
        }
    }

    pub fn params(&self) -> &SettlementParams {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.settlements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settlements.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Settlement> {
        self.index.get(id).map(|&i| &self.settlements[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Settlement> {
        self.index.get(id).map(|&i| &mut self.settlements[i])
    }

    /// Settlements in storage order
    pub fn iter(&self) -> impl Iterator<Item = &Settlement> {
        self.settlements.iter()
    }

    pub fn in_region<'a>(&'a self, region: &'a str) -> impl Iterator<Item = &'a Settlement> + 'a {
        self.settlements.iter().filter(move |s| s.region_id == region)
    }

    pub fn capital_of(&self, region: &str) -> Option<&Settlement> {
        self.settlements.iter().find(|s| s.is_capital && s.region_id == region)
    }

    pub fn population_of_region(&self, region: &str) -> u64 {
        self.in_region(region).map(|s| s.population).sum()
    }

    pub fn culture_of_region(&self, region: &str) -> f64 {
        self.in_region(region).map(|s| s.accumulated_culture).sum()
    }

    pub fn libraries_of_region(&self, region: &str) -> u32 {
        self.in_region(region).map(|s| s.infrastructure.libraries).sum()
    }

    /// Take ownership of a settlement
    pub fn add_settlement(&mut self, settlement: Settlement) -> Result<()> {
        if settlement.id.is_empty() || settlement.id.len() > MAX_SETTLEMENT_ID_LEN {
            return Err(CivError::InvalidArgument(format!(
                "settlement id '{}' must be 1..={} bytes",
                settlement.id, MAX_SETTLEMENT_ID_LEN
            )));
        }
        if self.index.contains_key(&settlement.id) {
            return Err(CivError::InvalidState(format!(
                "duplicate settlement '{}'",
                settlement.id
            )));
        }
        self.settlements
            .try_reserve(1)
            .map_err(|_| CivError::OutOfMemory("settlement storage".into()))?;

        debug!("settlement {} added at {:?}", settlement.id, settlement.position);
        self.index.insert(settlement.id.clone(), self.settlements.len());
        self.settlements.push(settlement);
        Ok(())
    }

    /// Destroy a settlement and sweep its tile claims
    pub fn remove_settlement(&mut self, id: &str, world: &mut WorldMap) -> Result<Settlement> {
        let i = self
            .index
            .remove(id)
            .ok_or_else(|| CivError::NotFound(format!("settlement '{}'", id)))?;
        let removed = self.settlements.remove(i);
        self.rebuild_index();
        let released = world.clear_owner(id);
        info!("settlement {} removed, {} tiles released", id, released);
        Ok(removed)
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .settlements
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
    }

    fn fresh_id(&mut self) -> String {
        loop {
            let id = format!("S{:04}", self.next_id);
            self.next_id += 1;
            if !self.index.contains_key(&id) {
                return id;
            }
        }
    }

    fn random_name(&mut self) -> String {
        let p = NAME_PREFIXES[self.rng.gen_range(0..NAME_PREFIXES.len())];
        let s = NAME_SUFFIXES[self.rng.gen_range(0..NAME_SUFFIXES.len())];
        format!("{}{}", p, s)
    }

    /// Found a settlement at `pos` if the site passes the distance and
    /// suitability checks; returns the new id.
    pub fn try_found(&mut self, name: &str, pos: GridPos, region: &str, world: &WorldMap) -> Result<String> {
        if world.tile(pos.x, pos.y).is_none() {
            return Err(CivError::InvalidArgument(format!("site {} off the map", pos)));
        }
        let pos = GridPos::new(world.wrap_x(pos.x), pos.y);
        if !far_enough(world, &self.settlements, pos, self.params.min_distance) {
            return Err(CivError::InvalidState(format!(
                "site {} within {} tiles of another settlement",
                pos, self.params.min_distance
            )));
        }
        let score = suitability(world, pos);
        if score <= self.params.suitability_threshold {
            return Err(CivError::InvalidState(format!(
                "site {} unsuitable ({:.2})",
                pos, score
            )));
        }

        let id = self.fresh_id();
        let mut settlement = Settlement::new(&id, name, tile_center(pos), region);
        settlement.population = self.params.initial_population;
        settlement.territory_radius = self.params.base_radius;
        self.add_settlement(settlement)?;
        Ok(id)
    }

    /// Sample candidate sites until `count` settlements are founded or the
    /// attempt budget runs out.
    pub fn spawn_random(&mut self, count: usize, region: &str, world: &WorldMap) -> Vec<String> {
        let mut founded = Vec::new();
        let attempts = count * self.params.spawn_attempts_per_settlement;
        let (w, h) = (world.width() as i32, world.height() as i32);

        for _ in 0..attempts {
            if founded.len() >= count {
                break;
            }
            let pos = GridPos::new(self.rng.gen_range(0..w), self.rng.gen_range(0..h));
            let name = self.random_name();
            if let Ok(id) = self.try_found(&name, pos, region, world) {
                founded.push(id);
            }
        }

        if founded.len() < count {
            debug!(
                "spawn_random founded {} of {} settlements for {}",
                founded.len(),
                count,
                region
            );
        }
        founded
    }

    pub fn start_production(&mut self, id: &str, unit_type: UnitType) -> Result<()> {
        let s = self
            .get_mut(id)
            .ok_or_else(|| CivError::NotFound(format!("settlement '{}'", id)))?;
        if s.production.is_some() {
            return Err(CivError::InvalidState(format!("{} is already producing", id)));
        }
        s.production = Some(ProductionOrder::new(unit_type));
        Ok(())
    }

    /// Make `id` the capital of its region; the previous capital keeps its
    /// tier but loses the flag.
    pub fn designate_capital(&mut self, id: &str) -> Result<()> {
        let region = self
            .get(id)
            .map(|s| s.region_id.clone())
            .ok_or_else(|| CivError::NotFound(format!("settlement '{}'", id)))?;
        for s in self.settlements.iter_mut().filter(|s| s.region_id == region) {
            s.is_capital = false;
        }
        if let Some(s) = self.get_mut(id) {
            s.is_capital = true;
            s.tier = Tier::Capital;
        }
        Ok(())
    }

    /// Hand a settlement to another nation (conquest or reconquest of rebels)
    pub fn transfer(&mut self, id: &str, new_region: &str) -> Result<()> {
        let s = self
            .get_mut(id)
            .ok_or_else(|| CivError::NotFound(format!("settlement '{}'", id)))?;
        info!("settlement {} transferred {} -> {}", id, s.region_id, new_region);
        s.region_id = new_region.to_string();
        s.revolting = false;
        s.is_capital = false;
        s.loyalty = 0.5;
        Ok(())
    }

    /// Move every speaker of `from` in settlement `id` over to `to`
    pub fn convert_language(&mut self, id: &str, from: &str, to: &str) -> Result<u64> {
        let s = self
            .get_mut(id)
            .ok_or_else(|| CivError::NotFound(format!("settlement '{}'", id)))?;
        let moved = s.demographics.languages.remove(from).unwrap_or(0);
        if moved > 0 {
            *s.demographics.languages.entry(to.to_string()).or_insert(0) += moved;
            s.refresh_primaries();
        }
        Ok(moved)
    }

    /// Run the per-settlement pipeline then the tile influence pass
    pub fn update(&mut self, dt: f32, ctx: &SettlementContext<'_>, world: &mut WorldMap) -> SettlementOutcome {
        let mut outcome = SettlementOutcome::default();
        let params = self.params.clone();

        for i in 0..self.settlements.len() {
            let rebel_roll = self.rng.gen::<f32>();
            let s = &mut self.settlements[i];

            grow(s, dt, ctx.population.mortality(&s.id));

            if let Some(tier) = s.promote() {
                s.infrastructure.libraries += u32::from(tier >= Tier::Town);
                s.infrastructure.roads = clamp01(s.infrastructure.roads + 0.2);
                s.infrastructure.sanitation = clamp01(s.infrastructure.sanitation + 0.1);
                outcome.promotions.push((s.id.clone(), tier));
            }

            if let Some(spawn) = tick_production(s, dt) {
                outcome.unit_spawns.push(spawn);
            }

            s.culture_yield = culture_yield_for(s.population);
            s.accumulated_culture += s.culture_yield as f64 * dt as f64;
            s.territory_radius = s.territory_radius.max(radius_for_culture(s.accumulated_culture));

            let identity = ctx.governance.national_identity(&s.region_id);
            let friction = identity.map_or(0.0, |n| {
                let mut f = 0.0;
                if s.primary_language != n.language {
                    f += 0.05;
                }
                if s.primary_faith != n.faith {
                    f += 0.03;
                }
                if s.primary_ethnicity != n.ethnicity {
                    f += 0.02;
                }
                f
            });
            let crowding = (s.population as f32 / 10_000.0 - 1.0).max(0.0) * 0.05;
            s.unrest = clamp01(s.unrest + (crowding + friction - 0.1 * s.infrastructure.sanitation) * dt);

            if let Some(n) = identity {
                let amount = (0.01 * s.population as f64 * dt as f64).round() as u64;
                shift_toward(&mut s.demographics.ethnicities, &n.ethnicity, amount);
                shift_toward(&mut s.demographics.languages, &n.language, amount);
                shift_toward(&mut s.demographics.faiths, &n.faith, amount);
                s.refresh_primaries();
            }

            let (stability, legitimacy) = ctx.governance.standing(&s.region_id);
            let drift = 0.01 * s.infrastructure.roads - 0.02 * s.unrest
                + 0.05 * (stability - 0.5)
                + 0.03 * (legitimacy - 0.5);
            s.loyalty = clamp01(s.loyalty + drift * dt);

            if s.loyalty < params.revolt_loyalty && !s.revolting {
                warn!("settlement {} revolts against {}", s.id, s.region_id);
                outcome.revolts.push(Revolt {
                    settlement_id: s.id.clone(),
                    former_region: std::mem::replace(&mut s.region_id, REBELS_REGION.to_string()),
                });
                s.revolting = true;
                s.is_capital = false;
                s.production = None;
            }

            if s.revolting && rebel_roll < params.rebel_spawn_chance * dt {
                outcome.unit_spawns.push(UnitSpawn {
                    owner: REBELS_REGION.to_string(),
                    unit_type: UnitType::Infantry,
                    position: s.position.to_grid(),
                    origin: s.id.clone(),
                    rebel: true,
                });
            }
        }

        outcome.influence = self.run_influence_pass(world);
        outcome
    }

    /// Claim, refresh and flip tiles around every settlement
    pub fn run_influence_pass(&mut self, world: &mut WorldMap) -> InfluenceReport {
        run_influence_pass(
            &mut self.settlements,
            &self.index,
            world,
            self.params.claim_threshold,
            self.params.flip_ratio,
        )
    }
}

/// Growth then epidemic losses; fractional people carry over between ticks
fn grow(s: &mut Settlement, dt: f32, mortality: f32) {
    let births = s.population as f64 * s.growth_rate as f64 * s.attractiveness as f64 * dt as f64 + s.growth_carry;
    let whole = births.max(0.0).floor();
    s.growth_carry = births - whole;
    s.population = s.population.saturating_add(whole as u64);

    if mortality > 0.0 {
        let deaths = (s.population as f64 * mortality as f64 * dt as f64).round() as u64;
        s.population = s.population.saturating_sub(deaths);
    }
    s.demographics.rebalance(s.population);
}
