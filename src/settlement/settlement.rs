//! Settlement - a populated place that grows, produces and claims territory

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::Vec2;
use crate::military::UnitType;

/// Growth tier; only ever promoted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Hamlet,
    Village,
    Town,
    City,
    Metropolis,
    Capital,
}

impl Tier {
    /// Tier earned by population alone
    pub fn for_population(population: u64) -> Self {
        match population {
            p if p >= 100_000 => Self::Metropolis,
            p if p >= 20_000 => Self::City,
            p if p >= 5_000 => Self::Town,
            p if p >= 1_000 => Self::Village,
            _ => Self::Hamlet,
        }
    }
}

/// Head-counts by ethnicity, language and faith
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub ethnicities: BTreeMap<String, u64>,
    pub languages: BTreeMap<String, u64>,
    pub faiths: BTreeMap<String, u64>,
    pub literacy: f32,
    pub health: f32,
}

impl Demographics {
    pub fn homogeneous(population: u64, ethnicity: &str, language: &str, faith: &str) -> Self {
        let mut d = Self {
            literacy: 0.05,
            health: 0.6,
            ..Default::default()
        };
        d.ethnicities.insert(ethnicity.to_string(), population);
        d.languages.insert(language.to_string(), population);
        d.faiths.insert(faith.to_string(), population);
        d
    }

    /// Rescale every category so it sums to `total`, preserving proportions
    pub fn rebalance(&mut self, total: u64) {
        rescale(&mut self.ethnicities, total);
        rescale(&mut self.languages, total);
        rescale(&mut self.faiths, total);
    }
}

/// Largest group in a category (ties resolve to the first key)
pub fn plurality(groups: &BTreeMap<String, u64>) -> Option<&str> {
    let mut best: Option<(&str, u64)> = None;
    for (k, v) in groups {
        if best.map_or(true, |(_, bv)| *v > bv) {
            best = Some((k.as_str(), *v));
        }
    }
    best.map(|(k, _)| k)
}

/// Move up to `amount` people from other groups into `target`; returns the
/// number moved.
pub fn shift_toward(groups: &mut BTreeMap<String, u64>, target: &str, amount: u64) -> u64 {
    let others: u64 = groups
        .iter()
        .filter(|(k, _)| k.as_str() != target)
        .map(|(_, v)| *v)
        .sum();
    let amount = amount.min(others);
    if amount == 0 {
        return 0;
    }

    let mut moved = 0;
    for (k, v) in groups.iter_mut() {
        if k.as_str() == target {
            continue;
        }
        let share = ((*v as u128 * amount as u128) / others as u128) as u64;
        let share = share.min(*v);
        *v -= share;
        moved += share;
    }
    // Integer remainder comes from whichever group still has people
    let mut remainder = amount - moved;
    for (k, v) in groups.iter_mut() {
        if remainder == 0 {
            break;
        }
        if k.as_str() == target || *v == 0 {
            continue;
        }
        let take = remainder.min(*v);
        *v -= take;
        moved += take;
        remainder -= take;
    }
    *groups.entry(target.to_string()).or_insert(0) += moved;
    groups.retain(|_, v| *v > 0);
    moved
}

fn rescale(groups: &mut BTreeMap<String, u64>, total: u64) {
    let current: u64 = groups.values().sum();
    if current == total || groups.is_empty() {
        return;
    }
    if current == 0 {
        if let Some(v) = groups.values_mut().next() {
            *v = total;
        }
        return;
    }
    let mut assigned = 0;
    for v in groups.values_mut() {
        *v = ((*v as u128 * total as u128) / current as u128) as u64;
        assigned += *v;
    }
    let largest = groups
        .iter()
        .max_by_key(|(_, v)| **v)
        .map(|(k, _)| k.clone());
    if let Some(k) = largest {
        if let Some(v) = groups.get_mut(&k) {
            *v += total.saturating_sub(assigned);
        }
    }
}

/// Built infrastructure, each in [0, 1] except counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Infrastructure {
    pub roads: f32,
    pub fortifications: f32,
    pub port: bool,
    pub sanitation: f32,
    pub libraries: u32,
}

/// A unit being trained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionOrder {
    pub unit_type: UnitType,
    pub progress: f32,
    pub cost: f32,
}

impl ProductionOrder {
    pub fn new(unit_type: UnitType) -> Self {
        Self {
            unit_type,
            progress: 0.0,
            cost: unit_type.production_cost(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= self.cost
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: String,
    pub name: String,
    pub tier: Tier,
    pub position: Vec2,
    pub population: u64,
    /// Fractional growth not yet turned into people
    pub growth_carry: f64,
    pub growth_rate: f32,
    pub attractiveness: f32,
    pub demographics: Demographics,
    pub infrastructure: Infrastructure,
    pub primary_ethnicity: String,
    pub primary_language: String,
    pub primary_faith: String,
    /// Owning nation, or `REBELS`
    pub region_id: String,
    pub is_capital: bool,
    pub revolting: bool,
    pub loyalty: f32,
    pub unrest: f32,
    pub culture_yield: u32,
    pub accumulated_culture: f64,
    pub territory_radius: u32,
    pub claimed_tiles: u32,
    pub production: Option<ProductionOrder>,
}

impl Settlement {
    pub fn new(id: &str, name: &str, position: Vec2, region_id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            tier: Tier::Hamlet,
            position,
            population: 100,
            growth_carry: 0.0,
            growth_rate: 0.01,
            attractiveness: 0.5,
            demographics: Demographics::default(),
            infrastructure: Infrastructure::default(),
            primary_ethnicity: String::new(),
            primary_language: String::new(),
            primary_faith: String::new(),
            region_id: region_id.to_string(),
            is_capital: false,
            revolting: false,
            loyalty: 0.7,
            unrest: 0.0,
            culture_yield: 1,
            accumulated_culture: 0.0,
            territory_radius: 2,
            claimed_tiles: 0,
            production: None,
        }
    }

    /// Set a single-identity population
    pub fn with_identity(mut self, ethnicity: &str, language: &str, faith: &str) -> Self {
        self.set_identity(ethnicity, language, faith);
        self
    }

    pub fn set_identity(&mut self, ethnicity: &str, language: &str, faith: &str) {
        self.demographics = Demographics::homogeneous(self.population, ethnicity, language, faith);
        self.primary_ethnicity = ethnicity.to_string();
        self.primary_language = language.to_string();
        self.primary_faith = faith.to_string();
    }

    pub fn with_population(mut self, population: u64) -> Self {
        self.population = population;
        self.demographics.rebalance(population);
        self.tier = self.tier.max(Tier::for_population(population));
        self.culture_yield = culture_yield_for(population);
        self
    }

    /// Re-derive primary identities from head-counts
    pub fn refresh_primaries(&mut self) {
        if let Some(e) = plurality(&self.demographics.ethnicities) {
            self.primary_ethnicity = e.to_string();
        }
        if let Some(l) = plurality(&self.demographics.languages) {
            self.primary_language = l.to_string();
        }
        if let Some(f) = plurality(&self.demographics.faiths) {
            self.primary_faith = f.to_string();
        }
    }

    /// Promote if population allows; never demotes
    pub fn promote(&mut self) -> Option<Tier> {
        let earned = Tier::for_population(self.population);
        if earned > self.tier {
            self.tier = earned;
            Some(earned)
        } else {
            None
        }
    }
}

pub fn culture_yield_for(population: u64) -> u32 {
    1 + (population / 5000) as u32
}

/// Territory radius unlocked by accumulated culture
pub fn radius_for_culture(accumulated: f64) -> u32 {
    if accumulated >= 500.0 {
        5
    } else if accumulated >= 100.0 {
        4
    } else if accumulated >= 20.0 {
        3
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(Tier::for_population(999), Tier::Hamlet);
        assert_eq!(Tier::for_population(1_000), Tier::Village);
        assert_eq!(Tier::for_population(5_000), Tier::Town);
        assert_eq!(Tier::for_population(20_000), Tier::City);
        assert_eq!(Tier::for_population(100_000), Tier::Metropolis);
    }

    #[test]
    fn test_promotion_never_demotes() {
        let mut s = Settlement::new("S1", "Ur", Vec2::new(1.0, 1.0), "N1").with_population(6_000);
        assert_eq!(s.tier, Tier::Town);
        s.population = 10;
        assert_eq!(s.promote(), None);
        assert_eq!(s.tier, Tier::Town);
    }

    #[test]
    fn test_culture_yield_and_radius() {
        assert_eq!(culture_yield_for(4_999), 1);
        assert_eq!(culture_yield_for(20_000), 5);
        assert_eq!(radius_for_culture(19.9), 0);
        assert_eq!(radius_for_culture(20.0), 3);
        assert_eq!(radius_for_culture(100.0), 4);
        assert_eq!(radius_for_culture(750.0), 5);
    }

    #[test]
    fn test_shift_toward_moves_people() {
        let mut groups = BTreeMap::new();
        groups.insert("a".to_string(), 60);
        groups.insert("b".to_string(), 40);
        let moved = shift_toward(&mut groups, "a", 10);
        assert_eq!(moved, 10);
        assert_eq!(groups["a"], 70);
        assert_eq!(groups["b"], 30);
        assert_eq!(groups.values().sum::<u64>(), 100);
    }

    #[test]
    fn test_shift_toward_caps_at_others() {
        let mut groups = BTreeMap::new();
        groups.insert("a".to_string(), 95);
        groups.insert("b".to_string(), 5);
        assert_eq!(shift_toward(&mut groups, "a", 50), 5);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups["a"], 100);
    }

    #[test]
    fn test_rebalance_preserves_total() {
        let mut d = Demographics::homogeneous(100, "x", "y", "z");
        d.ethnicities.insert("w".to_string(), 50);
        d.rebalance(301);
        assert_eq!(d.ethnicities.values().sum::<u64>(), 301);
        assert_eq!(d.languages.values().sum::<u64>(), 301);
    }
}
