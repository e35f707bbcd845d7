//! Knowledge - eight uncapped domains with exponential cost curves
//!
//! There is no tech tree. Each nation accumulates research points from its
//! population, libraries and culture and spends them on raising continuous
//! domain levels. Mathematics makes every other domain cheaper.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::error::{CivError, Result};
use crate::settlement::SettlementManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Domain {
    Science,
    Engineering,
    Culture,
    Medicine,
    Mathematics,
    Agriculture,
    Metallurgy,
    Navigation,
}

impl Domain {
    pub const ALL: [Domain; 8] = [
        Domain::Science,
        Domain::Engineering,
        Domain::Culture,
        Domain::Medicine,
        Domain::Mathematics,
        Domain::Agriculture,
        Domain::Metallurgy,
        Domain::Navigation,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeParams {
    pub base_cost: f64,
    pub exponent: f64,
    /// Research points per inhabitant per tick
    pub points_per_capita: f64,
    pub library_bonus: f64,
    pub max_math_reduction: f64,
}

impl Default for KnowledgeParams {
    fn default() -> Self {
        Self {
            base_cost: 100.0,
            exponent: 1.8,
            points_per_capita: 0.01,
            library_bonus: 0.2,
            max_math_reduction: 0.4,
        }
    }
}

/// Cap on whole levels one grant or pool drain can buy
pub const MAX_LEVELS_PER_ADVANCE: u32 = 1_000;

/// Points needed to raise a domain by one level from `level`
pub fn knowledge_cost(level: f64, base: f64, exponent: f64) -> f64 {
    base * (1.0 + level).powf(exponent)
}

/// Fractional discount mathematics grants to every other domain
pub fn math_reduction(mathematics: f64) -> f64 {
    (0.15 * (1.0 + mathematics / 200.0).ln()).min(0.4)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchState {
    levels: [f64; 8],
    /// Unspent research points
    pub pool: f64,
    /// Points gained last tick
    pub rate: f64,
    /// Explicit focus; `None` targets the lowest domain
    pub focus: Option<Domain>,
}

impl Default for ResearchState {
    fn default() -> Self {
        Self {
            levels: [0.0; 8],
            pool: 0.0,
            rate: 0.0,
            focus: None,
        }
    }
}

impl ResearchState {
    pub fn level(&self, domain: Domain) -> f64 {
        self.levels[domain.index()]
    }

    pub fn levels(&self) -> impl Iterator<Item = (Domain, f64)> + '_ {
        Domain::ALL.iter().map(move |d| (*d, self.levels[d.index()]))
    }

    /// Domain the pool is currently spent on
    pub fn current_focus(&self) -> Domain {
        self.focus.unwrap_or_else(|| {
            Domain::ALL
                .iter()
                .copied()
                .fold(Domain::Science, |best, d| if self.level(d) < self.level(best) { d } else { best })
        })
    }

    /// Cost of the next full level in `domain`, after the mathematics discount
    pub fn cost(&self, domain: Domain, params: &KnowledgeParams) -> f64 {
        let raw = knowledge_cost(self.level(domain), params.base_cost, params.exponent);
        if domain == Domain::Mathematics {
            raw
        } else {
            raw * (1.0 - math_reduction(self.level(Domain::Mathematics)).min(params.max_math_reduction))
        }
    }

    /// Spend all of `points` on `domain`: whole levels while affordable, then
    /// the remainder as a fraction of the next level. Returns levels gained.
    ///
    /// At most `MAX_LEVELS_PER_ADVANCE` whole levels are bought per call;
    /// points beyond that are dropped. Non-finite or negative points buy
    /// nothing.
    pub fn advance(&mut self, domain: Domain, mut points: f64, params: &KnowledgeParams) -> f64 {
        let before = self.level(domain);
        if !points.is_finite() {
            return 0.0;
        }
        let mut whole = 0;
        while points > 0.0 {
            let cost = self.cost(domain, params);
            if cost.is_nan() || cost <= 0.0 {
                break;
            }
            if points < cost {
                self.levels[domain.index()] += points / cost;
                break;
            }
            if whole == MAX_LEVELS_PER_ADVANCE {
                debug!("research overflow in {:?}: {:.1} points dropped", domain, points);
                break;
            }
            self.levels[domain.index()] += 1.0;
            points -= cost;
            whole += 1;
        }
        self.level(domain) - before
    }

    /// Drain the pool greedily into whole levels of the focus domain; the
    /// unaffordable remainder stays pooled
    pub fn spend_pool(&mut self, params: &KnowledgeParams) -> u32 {
        let domain = self.current_focus();
        let mut gained = 0;
        if !self.pool.is_finite() {
            self.pool = 0.0;
        }
        while gained < MAX_LEVELS_PER_ADVANCE {
            let cost = self.cost(domain, params);
            if cost.is_nan() || cost <= 0.0 || self.pool < cost {
                break;
            }
            self.pool -= cost;
            self.levels[domain.index()] += 1.0;
            gained += 1;
        }
        gained
    }
}

/// Research points per tick for a nation
pub fn research_rate(population: u64, libraries: u32, culture: f64, mathematics: f64, params: &KnowledgeParams) -> f64 {
    let math_bonus = 1.0 + math_reduction(mathematics);
    params.points_per_capita
        * population as f64
        * (1.0 + params.library_bonus * libraries as f64)
        * math_bonus
        * (1.0 + (1.0 + culture / 200.0).ln())
}

#[derive(Debug, Clone, Default)]
pub struct KnowledgeOutcome {
    /// (nation, domain, new level)
    pub breakthroughs: Vec<(String, Domain, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeManager {
    nations: BTreeMap<String, ResearchState>,
    params: KnowledgeParams,
}

impl KnowledgeManager {
    pub fn new(params: KnowledgeParams) -> Self {
        Self {
            nations: BTreeMap::new(),
            params,
        }
    }

    pub fn params(&self) -> &KnowledgeParams {
        &self.params
    }

    pub fn add_nation(&mut self, nation: &str) {
        self.nations.entry(nation.to_string()).or_default();
    }

    pub fn remove_nation(&mut self, nation: &str) {
        self.nations.remove(nation);
    }

    pub fn state(&self, nation: &str) -> Option<&ResearchState> {
        self.nations.get(nation)
    }

    /// Level of a domain; unknown nations know nothing
    pub fn level(&self, nation: &str, domain: Domain) -> f64 {
        self.nations.get(nation).map_or(0.0, |s| s.level(domain))
    }

    pub fn set_focus(&mut self, nation: &str, focus: Option<Domain>) -> Result<()> {
        let state = self
            .nations
            .get_mut(nation)
            .ok_or_else(|| CivError::NotFound(format!("research state for '{}'", nation)))?;
        state.focus = focus;
        Ok(())
    }

    /// Explicit grant (discovery, plunder); bypasses the pool
    pub fn grant(&mut self, nation: &str, domain: Domain, points: f64) -> Result<f64> {
        if !points.is_finite() || points < 0.0 {
            return Err(CivError::InvalidArgument(format!(
                "research points must be finite and non-negative, got {}",
                points
            )));
        }
        let params = self.params.clone();
        let state = self
            .nations
            .get_mut(nation)
            .ok_or_else(|| CivError::NotFound(format!("research state for '{}'", nation)))?;
        Ok(state.advance(domain, points, &params))
    }

    pub fn update(&mut self, dt: f32, settlements: &SettlementManager) -> KnowledgeOutcome {
        let mut outcome = KnowledgeOutcome::default();
        let params = &self.params;
        for (nation, state) in self.nations.iter_mut() {
            let population = settlements.population_of_region(nation);
            let libraries = settlements.libraries_of_region(nation);
            let culture = settlements.culture_of_region(nation);

            state.rate = research_rate(population, libraries, culture, state.level(Domain::Mathematics), params);
            state.pool += state.rate * dt as f64;

            let domain = state.current_focus();
            let gained = state.spend_pool(params);
            if gained > 0 {
                let level = state.level(domain);
                debug!("{} reaches {:?} {:.0}", nation, domain, level);
                if level.fract() == 0.0 && (level as u64) % 10 == 0 {
                    info!("{} masters {:?} level {}", nation, domain, level);
                }
                outcome.breakthroughs.push((nation.clone(), domain, level));
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_curve() {
        assert_eq!(knowledge_cost(0.0, 100.0, 1.8), 100.0);
        assert!((knowledge_cost(1.0, 100.0, 1.8) - 348.22).abs() < 0.01);
    }

    #[test]
    fn test_exact_level_purchase() {
        let params = KnowledgeParams::default();
        let mut s = ResearchState::default();
        let gained = s.advance(Domain::Science, 100.0, &params);
        assert_eq!(gained, 1.0);
        assert_eq!(s.level(Domain::Science), 1.0);
    }

    #[test]
    fn test_partial_advance() {
        let params = KnowledgeParams::default();
        let mut s = ResearchState::default();
        s.advance(Domain::Mathematics, 150.0, &params);
        let expected = 1.0 + 50.0 / knowledge_cost(1.0, 100.0, 1.8);
        assert!((s.level(Domain::Mathematics) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_math_reduction_capped() {
        assert_eq!(math_reduction(0.0), 0.0);
        assert!((math_reduction(200.0) - 0.15 * 2f64.ln()).abs() < 1e-12);
        assert_eq!(math_reduction(1e9), 0.4);
    }

    #[test]
    fn test_pool_keeps_remainder() {
        let params = KnowledgeParams::default();
        let mut s = ResearchState::default();
        s.focus = Some(Domain::Medicine);
        s.pool = 120.0;
        assert_eq!(s.spend_pool(&params), 1);
        assert_eq!(s.level(Domain::Medicine), 1.0);
        assert!((s.pool - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_focus_is_lowest() {
        let params = KnowledgeParams::default();
        let mut s = ResearchState::default();
        assert_eq!(s.current_focus(), Domain::Science);
        s.advance(Domain::Science, 100.0, &params);
        assert_eq!(s.current_focus(), Domain::Engineering);
    }

    #[test]
    fn test_unknown_nation() {
        let mut k = KnowledgeManager::new(KnowledgeParams::default());
        assert_eq!(k.level("nobody", Domain::Science), 0.0);
        assert!(k.grant("nobody", Domain::Science, 10.0).is_err());
        k.add_nation("N");
        assert!(k.grant("N", Domain::Science, -1.0).is_err());
    }

    #[test]
    fn test_non_finite_grant_rejected() {
        let mut k = KnowledgeManager::new(KnowledgeParams::default());
        k.add_nation("N");
        for points in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let err = k.grant("N", Domain::Science, points).unwrap_err();
            assert!(matches!(err, CivError::InvalidArgument(_)));
        }
        assert_eq!(k.level("N", Domain::Science), 0.0);
    }

    #[test]
    fn test_huge_grant_is_bounded() {
        let params = KnowledgeParams {
            exponent: 0.0,
            ..KnowledgeParams::default()
        };
        let mut s = ResearchState::default();
        let gained = s.advance(Domain::Science, 1e12, &params);
        assert_eq!(gained, MAX_LEVELS_PER_ADVANCE as f64);

        let mut k = KnowledgeManager::new(KnowledgeParams::default());
        k.add_nation("N");
        let gained = k.grant("N", Domain::Engineering, f64::MAX).unwrap();
        assert_eq!(gained, MAX_LEVELS_PER_ADVANCE as f64);
    }

    #[test]
    fn test_pool_drain_is_bounded() {
        let params = KnowledgeParams {
            exponent: 0.0,
            ..KnowledgeParams::default()
        };
        let mut s = ResearchState::default();
        s.focus = Some(Domain::Science);
        s.pool = 1e15;
        assert_eq!(s.spend_pool(&params), MAX_LEVELS_PER_ADVANCE);

        s.pool = f64::INFINITY;
        assert_eq!(s.spend_pool(&params), 0);
        assert_eq!(s.pool, 0.0);
    }
}
