//! Economy - sectoral markets, prices, GDP and trade per nation
//!
//! Supply comes from claimed land and population, demand from population.
//! Prices follow excess demand; GDP is cleared volume at market price.
//! Trade treaties add a share of the smaller partner's GDP to both sides.

use std::collections::BTreeMap;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::error::{CivError, Result};
use crate::diplomacy::DiplomacyManager;
use crate::knowledge::{Domain, KnowledgeManager};
use crate::settlement::SettlementManager;
use crate::world::WorldMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sector {
    Agriculture,
    Mining,
    Manufacturing,
    Commerce,
}

impl Sector {
    pub const ALL: [Sector; 4] = [
        Sector::Agriculture,
        Sector::Mining,
        Sector::Manufacturing,
        Sector::Commerce,
    ];

    /// Knowledge domain that raises this sector's output
    pub fn driver(&self) -> Domain {
        match self {
            Sector::Agriculture => Domain::Agriculture,
            Sector::Mining => Domain::Metallurgy,
            Sector::Manufacturing => Domain::Engineering,
            Sector::Commerce => Domain::Navigation,
        }
    }

    /// People per unit of demand
    fn consumers_per_unit(&self) -> f32 {
        match self {
            Sector::Agriculture => 100.0,
            Sector::Mining => 2_000.0,
            Sector::Manufacturing => 1_500.0,
            Sector::Commerce => 3_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyParams {
    /// Relative price move per unit of excess demand per tick
    pub price_elasticity: f32,
    pub min_price: f32,
    pub max_price: f32,
    pub tax_rate: f32,
    /// Share of the smaller partner's GDP exchanged along a trade treaty
    pub trade_share: f32,
    /// Output bonus per knowledge level of the sector's driver domain
    pub knowledge_bonus: f32,
}

impl Default for EconomyParams {
    fn default() -> Self {
        Self {
            price_elasticity: 0.1,
            min_price: 0.1,
            max_price: 10.0,
            tax_rate: 0.1,
            trade_share: 0.02,
            knowledge_bonus: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub supply: f32,
    pub demand: f32,
    pub price: f32,
}

impl Default for Market {
    fn default() -> Self {
        Self {
            supply: 0.0,
            demand: 0.0,
            price: 1.0,
        }
    }
}

impl Market {
    pub fn cleared(&self) -> f32 {
        self.supply.min(self.demand)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationalEconomy {
    pub markets: BTreeMap<Sector, Market>,
    pub gdp: f32,
    pub inflation: f32,
    pub treasury: f32,
    pub trade_balance: f32,
    pub price_index: f32,
}

impl Default for NationalEconomy {
    fn default() -> Self {
        Self {
            markets: Sector::ALL.iter().map(|s| (*s, Market::default())).collect(),
            gdp: 0.0,
            inflation: 0.0,
            treasury: 0.0,
            trade_balance: 0.0,
            price_index: 1.0,
        }
    }
}

/// Sibling state the economy reads
pub struct EconomyContext<'a> {
    pub settlements: &'a SettlementManager,
    pub world: &'a WorldMap,
    pub diplomacy: &'a DiplomacyManager,
    pub knowledge: &'a KnowledgeManager,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EconomyManager {
    economies: BTreeMap<String, NationalEconomy>,
    params: EconomyParams,
}

/// Land yield summed over a nation's claimed tiles
#[derive(Debug, Clone, Copy, Default)]
struct LandYield {
    fertility: f32,
    resources: f32,
}

impl EconomyManager {
    pub fn new(params: EconomyParams) -> Self {
        Self {
            economies: BTreeMap::new(),
            params,
        }
    }

    pub fn add_nation(&mut self, nation: &str) {
        self.economies.entry(nation.to_string()).or_default();
    }

    pub fn remove_nation(&mut self, nation: &str) {
        self.economies.remove(nation);
    }

    pub fn economy(&self, nation: &str) -> Option<&NationalEconomy> {
        self.economies.get(nation)
    }

    pub fn nations(&self) -> impl Iterator<Item = &String> {
        self.economies.keys()
    }

    pub fn gdp(&self, nation: &str) -> f32 {
        self.economies.get(nation).map_or(0.0, |e| e.gdp)
    }

    pub fn treasury(&self, nation: &str) -> f32 {
        self.economies.get(nation).map_or(0.0, |e| e.treasury)
    }

    /// Withdraw from a nation's treasury
    pub fn spend(&mut self, nation: &str, amount: f32) -> Result<()> {
        let eco = self
            .economies
            .get_mut(nation)
            .ok_or_else(|| CivError::NotFound(format!("economy '{}'", nation)))?;
        if amount < 0.0 {
            return Err(CivError::InvalidArgument("negative spend".into()));
        }
        if eco.treasury < amount {
            return Err(CivError::InvalidState(format!(
                "{} cannot afford {:.1} (treasury {:.1})",
                nation, amount, eco.treasury
            )));
        }
        eco.treasury -= amount;
        Ok(())
    }

    /// Seize a share of the treasury (plunder, tribute)
    pub fn transfer_funds(&mut self, from: &str, to: &str, amount: f32) -> f32 {
        let taken = match self.economies.get_mut(from) {
            Some(e) => {
                let t = amount.clamp(0.0, e.treasury.max(0.0));
                e.treasury -= t;
                t
            }
            None => 0.0,
        };
        if let Some(e) = self.economies.get_mut(to) {
            e.treasury += taken;
        }
        taken
    }

    /// Credit plunder or other windfalls
    pub fn deposit(&mut self, nation: &str, amount: f32) {
        if let Some(e) = self.economies.get_mut(nation) {
            e.treasury += amount.max(0.0);
        }
    }

    pub fn update(&mut self, dt: f32, ctx: &EconomyContext<'_>) {
        let land = land_by_nation(ctx.settlements, ctx.world);
        let params = self.params.clone();

        for (nation, eco) in self.economies.iter_mut() {
            let population = ctx.settlements.population_of_region(nation) as f32;
            let yield_ = land.get(nation.as_str()).copied().unwrap_or_default();
            let partners = ctx.diplomacy.trade_partners(nation).len() as f32;

            for (sector, market) in eco.markets.iter_mut() {
                let level = ctx.knowledge.level(nation, sector.driver());
                let boost = 1.0 + params.knowledge_bonus * level as f32;
                let base = match sector {
                    Sector::Agriculture => yield_.fertility * 10.0,
                    Sector::Mining => yield_.resources * 10.0,
                    Sector::Manufacturing => population / 1_000.0,
                    Sector::Commerce => population / 2_000.0 * (1.0 + 0.1 * partners),
                };
                market.supply = base * boost;
                market.demand = population / sector.consumers_per_unit();

                let excess = (market.demand - market.supply) / market.supply.max(1.0);
                market.price *= 1.0 + params.price_elasticity * excess.clamp(-1.0, 1.0) * dt;
                market.price = market.price.clamp(params.min_price, params.max_price);
            }

            let index = eco.markets.values().map(|m| m.price).sum::<f32>() / eco.markets.len().max(1) as f32;
            eco.inflation = if eco.price_index > 0.0 {
                (index - eco.price_index) / eco.price_index
            } else {
                0.0
            };
            eco.price_index = index;
            eco.gdp = eco.markets.values().map(|m| m.cleared() * m.price).sum();
            eco.trade_balance = 0.0;
            if !eco.gdp.is_finite() {
                warn!("economy of {} diverged; resetting markets", nation);
                *eco = NationalEconomy {
                    treasury: eco.treasury,
                    ..Default::default()
                };
            }
        }

        self.apply_trade(ctx.diplomacy);

        for eco in self.economies.values_mut() {
            eco.treasury += (eco.gdp * params.tax_rate + eco.trade_balance) * dt;
        }
    }

    /// Per-tick trade volumes; the treasury pass scales them by dt
    fn apply_trade(&mut self, diplomacy: &DiplomacyManager) {
        let mut volumes: Vec<(String, f32)> = Vec::new();
        for (nation, eco) in &self.economies {
            for partner in diplomacy.trade_partners(nation) {
                let partner_gdp = self.gdp(&partner);
                let volume = eco.gdp.min(partner_gdp) * self.params.trade_share;
                volumes.push((nation.clone(), volume));
            }
        }
        for (nation, volume) in volumes {
            if let Some(e) = self.economies.get_mut(&nation) {
                e.trade_balance += volume;
                e.gdp += volume;
            }
        }
        debug!("trade pass over {} economies", self.economies.len());
    }
}

fn land_by_nation<'a>(settlements: &'a SettlementManager, world: &WorldMap) -> AHashMap<&'a str, LandYield> {
    let mut by_settlement: AHashMap<&str, LandYield> = AHashMap::new();
    for t in world.tiles().iter().filter(|t| t.is_owned()) {
        let Some(s) = settlements.get(&t.owner_id) else {
            continue;
        };
        let e = by_settlement.entry(s.id.as_str()).or_default();
        e.fertility += t.fertility;
        e.resources += if t.has_resource { t.resources } else { 0.0 };
    }

    let mut by_nation: AHashMap<&str, LandYield> = AHashMap::new();
    for s in settlements.iter() {
        if let Some(y) = by_settlement.get(s.id.as_str()) {
            let e = by_nation.entry(s.region_id.as_str()).or_default();
            e.fertility += y.fertility;
            e.resources += y.resources;
        }
    }
    by_nation
}
