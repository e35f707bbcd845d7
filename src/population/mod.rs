//! Population - age structure, vital rates and disease per settlement
//!
//! The settlement manager owns head-counts; this manager owns the
//! structure behind them. It exposes `mortality(settlement_id)` which the
//! settlement pipeline applies after growth.

use ahash::AHashMap;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::rng::{stream_rng, RngStream};
use crate::core::types::{approach, clamp01};
use crate::settlement::{Settlement, SettlementManager};

const DISEASES: &[&str] = &["plague", "pox", "flux", "fever", "cough", "blight"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationParams {
    pub base_birth_rate: f32,
    pub base_death_rate: f32,
    /// Per-tick outbreak chance for a fully unsanitary, crowded settlement
    pub outbreak_chance: f32,
    /// Share of the population an outbreak of severity 1.0 kills per tick
    pub outbreak_lethality: f32,
    pub vitality_rate: f32,
    /// Years spent in each of the young and adult brackets
    pub youth_years: f32,
    pub adult_years: f32,
}

impl Default for PopulationParams {
    fn default() -> Self {
        Self {
            base_birth_rate: 0.03,
            base_death_rate: 0.02,
            outbreak_chance: 0.004,
            outbreak_lethality: 0.05,
            vitality_rate: 0.05,
            youth_years: 15.0,
            adult_years: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outbreak {
    pub disease: String,
    pub severity: f32,
    /// Ticks left before the outbreak burns out
    pub remaining: f32,
}

/// Age structure and health of one settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDemographics {
    pub region_id: String,
    /// Age bracket shares; always sum to 1
    pub young: f32,
    pub adult: f32,
    pub elder: f32,
    pub birth_rate: f32,
    pub death_rate: f32,
    pub vitality: f32,
    pub outbreak: Option<Outbreak>,
}

impl RegionDemographics {
    pub fn new(region_id: &str) -> Self {
        Self {
            region_id: region_id.to_string(),
            young: 0.35,
            adult: 0.5,
            elder: 0.15,
            birth_rate: 0.0,
            death_rate: 0.0,
            vitality: 0.7,
            outbreak: None,
        }
    }

    fn normalize(&mut self) {
        self.young = self.young.max(0.0);
        self.adult = self.adult.max(0.0);
        self.elder = self.elder.max(0.0);
        let total = self.young + self.adult + self.elder;
        if total > 0.0 {
            self.young /= total;
            self.adult /= total;
            self.elder /= total;
        } else {
            *self = Self {
                outbreak: self.outbreak.take(),
                ..Self::new(&self.region_id)
            };
        }
    }
}

/// Outbreak transitions this tick
#[derive(Debug, Clone, Default)]
pub struct PopulationOutcome {
    /// (settlement id, disease)
    pub outbreaks_started: Vec<(String, String)>,
    pub outbreaks_ended: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationManager {
    regions: AHashMap<String, RegionDemographics>,
    params: PopulationParams,
    rng: ChaCha8Rng,
}

impl PopulationManager {
    pub fn new(seed: u64, params: PopulationParams) -> Self {
        Self {
            regions: AHashMap::new(),
            params,
            rng: stream_rng(seed, RngStream::Population),
        }
    }

    pub fn region(&self, settlement_id: &str) -> Option<&RegionDemographics> {
        self.regions.get(settlement_id)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Extra share of the population dying per tick from disease
    pub fn mortality(&self, settlement_id: &str) -> f32 {
        self.regions
            .get(settlement_id)
            .and_then(|r| r.outbreak.as_ref())
            .map_or(0.0, |o| o.severity * self.params.outbreak_lethality)
    }

    /// Start an outbreak by hand; replaces any active one
    pub fn seed_outbreak(&mut self, settlement_id: &str, disease: &str, severity: f32, duration: f32) {
        let region = self
            .regions
            .entry(settlement_id.to_string())
            .or_insert_with(|| RegionDemographics::new(settlement_id));
        region.outbreak = Some(Outbreak {
            disease: disease.to_string(),
            severity: clamp01(severity),
            remaining: duration.max(0.0),
        });
    }

    /// Mean vitality over the settlements of a nation
    pub fn vitality_of(&self, settlements: &SettlementManager, nation: &str) -> f32 {
        let mut sum = 0.0;
        let mut n = 0;
        for s in settlements.in_region(nation) {
            if let Some(r) = self.regions.get(&s.id) {
                sum += r.vitality;
                n += 1;
            }
        }
        if n == 0 {
            0.0
        } else {
            sum / n as f32
        }
    }

    pub fn update(&mut self, dt: f32, settlements: &SettlementManager) -> PopulationOutcome {
        let mut outcome = PopulationOutcome::default();
        self.regions.retain(|id, _| settlements.get(id).is_some());

        for s in settlements.iter() {
            let region = self
                .regions
                .entry(s.id.clone())
                .or_insert_with(|| RegionDemographics::new(&s.id));
            let roll = self.rng.gen::<f32>();
            let severity = self.rng.gen_range(0.1..0.6);
            let duration = self.rng.gen_range(5.0..20.0);
            let disease = DISEASES[self.rng.gen_range(0..DISEASES.len())];

            step_region(region, s, &self.params, dt);

            match region.outbreak.as_mut() {
                Some(o) => {
                    o.remaining -= dt;
                    if o.remaining <= 0.0 {
                        info!("{} outbreak in {} has ended", o.disease, s.id);
                        outcome.outbreaks_ended.push((s.id.clone(), o.disease.clone()));
                        region.outbreak = None;
                    }
                }
                None => {
                    let chance = outbreak_chance(&self.params, s) * dt;
                    if roll < chance {
                        debug!("{} breaks out in {} (severity {:.2})", disease, s.id, severity);
                        outcome.outbreaks_started.push((s.id.clone(), disease.to_string()));
                        region.outbreak = Some(Outbreak {
                            disease: disease.to_string(),
                            severity,
                            remaining: duration,
                        });
                    }
                }
            }
        }
        outcome
    }
}

fn crowding(s: &Settlement) -> f32 {
    (s.population as f32 / 10_000.0).min(1.0)
}

fn outbreak_chance(params: &PopulationParams, s: &Settlement) -> f32 {
    params.outbreak_chance * (0.5 + crowding(s)) * (1.0 - s.infrastructure.sanitation)
}

fn step_region(region: &mut RegionDemographics, s: &Settlement, params: &PopulationParams, dt: f32) {
    let sickness = region.outbreak.as_ref().map_or(0.0, |o| o.severity);
    let target = clamp01(
        0.4 + 0.4 * s.demographics.health + 0.2 * s.infrastructure.sanitation - 0.3 * crowding(s) - sickness,
    );
    region.vitality = clamp01(approach(region.vitality, target, params.vitality_rate * dt));

    region.birth_rate = params.base_birth_rate * (0.5 + 0.5 * region.vitality) * region.adult * 2.0;
    region.death_rate = params.base_death_rate * (1.5 - region.vitality) + sickness * params.outbreak_lethality;

    // Ageing and vital events move shares between brackets
    let aging_young = region.young * dt / params.youth_years;
    let aging_adult = region.adult * dt / params.adult_years;
    region.young += region.birth_rate * dt - aging_young;
    region.adult += aging_young - aging_adult;
    region.elder += aging_adult - region.death_rate * dt * 2.0 * region.elder.max(0.05);
    region.normalize();
}
