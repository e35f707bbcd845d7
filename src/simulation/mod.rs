//! Simulation - owns every manager and drives the tick
//!
//! Managers never touch one another. Each update receives shared references
//! to the siblings it reads and returns an outcome; the routing in `tick`
//! applies those outcomes through the owning manager's interface.

mod decisions;
mod persistence;
mod tick;

pub use persistence::{SaveHeader, TileRecord, SAVE_HEADER_SIZE, SAVE_MAGIC, SAVE_VERSION, TILE_RECORD_SIZE};
pub use tick::TickReport;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ai::AiManager;
use crate::core::clock::SimClock;
use crate::core::config::SimulationParams;
use crate::core::error::{CivError, Result};
use crate::core::game_config::GameConfig;
use crate::core::types::GridPos;
use crate::culture::CultureManager;
use crate::diplomacy::DiplomacyManager;
use crate::economy::EconomyManager;
use crate::governance::{GovernanceManager, NationalIdentity};
use crate::journal::{EventKind, Journal};
use crate::knowledge::KnowledgeManager;
use crate::language::LanguageManager;
use crate::military::MilitaryManager;
use crate::population::PopulationManager;
use crate::runtime::{EventDispatcher, HandlerId, Optimizer, TtlCache};
use crate::settlement::SettlementManager;
use crate::world::{generate, WorldMap};

/// Ticks in one simulated year at `dt = 1`
pub const TICKS_PER_YEAR: u64 = 12;

const SNAPSHOT_CACHE_BYTES: usize = 1 << 20;
const SNAPSHOT_TTL: f64 = 1.0;

/// Process state; `tick` only advances while `Running`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimState {
    Initializing,
    Running,
    Paused,
    Saving,
    Loading,
    ShuttingDown,
}

/// Everything needed to register a nation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationSpec {
    pub id: String,
    pub name: String,
    pub default_ethnicity: String,
    pub default_language: String,
    pub default_faith: String,
}

impl NationSpec {
    /// A nation whose identity ids are derived from its own id
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            default_ethnicity: format!("{}-folk", id),
            default_language: format!("{}-tongue", id),
            default_faith: format!("{}-faith", id),
        }
    }

    pub fn identity(&self) -> NationalIdentity {
        NationalIdentity {
            ethnicity: self.default_ethnicity.clone(),
            language: self.default_language.clone(),
            faith: self.default_faith.clone(),
        }
    }
}

/// Read-only digest of one nation for observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationSummary {
    pub id: String,
    pub name: String,
    pub government: String,
    pub settlements: usize,
    pub population: u64,
    pub territory: usize,
    pub treasury: f32,
    pub gdp: f32,
    pub units: usize,
    pub knowledge: f64,
}

#[derive(Debug)]
pub struct Simulation {
    state: SimState,
    config: GameConfig,
    params: SimulationParams,
    seed: u64,
    clock: SimClock,
    nations: BTreeMap<String, NationSpec>,

    // Reverse tick order: fields drop top to bottom
    journal: Journal,
    military: MilitaryManager,
    ai: AiManager,
    knowledge: KnowledgeManager,
    diplomacy: DiplomacyManager,
    governance: GovernanceManager,
    language: LanguageManager,
    culture: CultureManager,
    settlements: SettlementManager,
    economy: EconomyManager,
    population: PopulationManager,
    world: WorldMap,

    optimizer: Optimizer,
    cache: TtlCache,
    dispatcher: EventDispatcher,
    /// Records logged this tick, published after it completes
    pending: Vec<(EventKind, String)>,
    autosave_path: Option<PathBuf>,
    last_autosave: f64,
}

impl Simulation {
    /// Generate a world and set up empty managers; the simulation starts in
    /// `Initializing` until [`Simulation::start`] is called.
    pub fn new(config: GameConfig, params: SimulationParams, width: u32, height: u32, seed: u64) -> Result<Self> {
        params.validate()?;
        let world = generate(width, height, seed, &params.world)?;
        info!(
            "[Simulation] '{}' created: {}x{} world, seed {}",
            config.name, width, height, seed
        );
        Ok(Self::assemble(config, params, seed, world))
    }

    fn assemble(config: GameConfig, params: SimulationParams, seed: u64, world: WorldMap) -> Self {
        Self {
            state: SimState::Initializing,
            optimizer: Optimizer::new(config.enable_dependency_tracking),
            config,
            seed,
            clock: SimClock::new(TICKS_PER_YEAR),
            nations: BTreeMap::new(),
            world,
            population: PopulationManager::new(seed, params.population.clone()),
            economy: EconomyManager::new(params.economy.clone()),
            settlements: SettlementManager::new(seed, params.settlement.clone()),
            culture: CultureManager::new(seed, params.culture.clone()),
            language: LanguageManager::new(seed, params.language.clone()),
            governance: GovernanceManager::new(seed, params.governance.clone()),
            diplomacy: DiplomacyManager::new(seed, params.diplomacy.clone()),
            knowledge: KnowledgeManager::new(params.knowledge.clone()),
            ai: AiManager::new(seed, params.ai.clone()),
            military: MilitaryManager::new(seed, params.military.clone()),
            journal: Journal::new(&params.journal),
            cache: TtlCache::new(SNAPSHOT_CACHE_BYTES, SNAPSHOT_TTL),
            dispatcher: EventDispatcher::new(),
            pending: Vec::new(),
            autosave_path: None,
            last_autosave: 0.0,
            params,
        }
    }

    // ---- state machine ----

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn start(&mut self) -> Result<()> {
        match self.state {
            SimState::Initializing | SimState::Paused => {
                self.state = SimState::Running;
                Ok(())
            }
            SimState::Running => Ok(()),
            other => Err(CivError::InvalidState(format!("cannot start from {:?}", other))),
        }
    }

    pub fn pause(&mut self) -> Result<()> {
        match self.state {
            SimState::Running | SimState::Paused => {
                self.state = SimState::Paused;
                Ok(())
            }
            other => Err(CivError::InvalidState(format!("cannot pause from {:?}", other))),
        }
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.state != SimState::Paused {
            return Err(CivError::InvalidState(format!("cannot resume from {:?}", self.state)));
        }
        self.state = SimState::Running;
        Ok(())
    }

    /// Flush the journal and stop ticking for good
    pub fn shutdown(&mut self) {
        if self.state == SimState::ShuttingDown {
            return;
        }
        self.state = SimState::ShuttingDown;
        if self.journal.path().is_some() {
            if let Err(e) = self.journal.flush() {
                warn!("[Simulation] Final journal flush failed: {}", e);
            }
        }
        info!("[Simulation] Shut down after {} ticks", self.clock.current_tick());
    }

    // ---- accessors ----

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn current_year(&self) -> i32 {
        self.clock.current_year(self.config.start_year)
    }

    pub fn nations(&self) -> impl Iterator<Item = &NationSpec> {
        self.nations.values()
    }

    pub fn nation(&self, id: &str) -> Option<&NationSpec> {
        self.nations.get(id)
    }

    pub fn world(&self) -> &WorldMap {
        &self.world
    }

    pub fn population(&self) -> &PopulationManager {
        &self.population
    }

    pub fn economy(&self) -> &EconomyManager {
        &self.economy
    }

    pub fn settlements(&self) -> &SettlementManager {
        &self.settlements
    }

    pub fn settlements_mut(&mut self) -> &mut SettlementManager {
        &mut self.settlements
    }

    pub fn culture(&self) -> &CultureManager {
        &self.culture
    }

    pub fn culture_mut(&mut self) -> &mut CultureManager {
        &mut self.culture
    }

    pub fn language(&self) -> &LanguageManager {
        &self.language
    }

    pub fn governance(&self) -> &GovernanceManager {
        &self.governance
    }

    pub fn governance_mut(&mut self) -> &mut GovernanceManager {
        &mut self.governance
    }

    pub fn diplomacy(&self) -> &DiplomacyManager {
        &self.diplomacy
    }

    pub fn diplomacy_mut(&mut self) -> &mut DiplomacyManager {
        &mut self.diplomacy
    }

    pub fn knowledge(&self) -> &KnowledgeManager {
        &self.knowledge
    }

    pub fn military(&self) -> &MilitaryManager {
        &self.military
    }

    pub fn military_mut(&mut self) -> &mut MilitaryManager {
        &mut self.military
    }

    pub fn ai(&self) -> &AiManager {
        &self.ai
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn optimizer(&self) -> &Optimizer {
        &self.optimizer
    }

    pub fn optimizer_mut(&mut self) -> &mut Optimizer {
        &mut self.optimizer
    }

    // ---- setup ----

    /// Mirror the journal to a file, flushed periodically
    pub fn attach_journal(&mut self, path: impl Into<PathBuf>) {
        self.journal.attach_file(path);
    }

    /// Autosave target used when `autosave_interval > 0`
    pub fn set_autosave_path(&mut self, path: impl Into<PathBuf>) {
        self.autosave_path = Some(path.into());
    }

    /// Subscribe to a named event published after each tick ("tick" or any
    /// journal kind name such as "war-declared")
    pub fn subscribe<F>(&mut self, event_type: &str, handler: F) -> HandlerId
    where
        F: FnMut(&str, &[u8]) + 'static,
    {
        self.dispatcher.register(event_type, handler)
    }

    pub fn unsubscribe(&mut self, event_type: &str) -> usize {
        self.dispatcher.unregister(event_type)
    }

    /// Register a nation with every manager that keys state by nation
    pub fn add_nation(&mut self, spec: NationSpec) -> Result<()> {
        if spec.id.is_empty() || spec.id == crate::core::types::REBELS_REGION {
            return Err(CivError::InvalidArgument(format!("nation id '{}' is reserved", spec.id)));
        }
        if self.nations.contains_key(&spec.id) {
            return Err(CivError::InvalidState(format!("duplicate nation '{}'", spec.id)));
        }

        self.governance.create_government(&spec.id, &spec.name, spec.identity())?;
        if self.culture.identity(&spec.default_ethnicity).is_none() {
            self.culture.generate_identity(&spec.default_ethnicity, &spec.name)?;
        }
        if self.language.language(&spec.default_language).is_none() {
            self.language.generate(&spec.default_language)?;
        }
        self.economy.add_nation(&spec.id);
        self.knowledge.add_nation(&spec.id);
        self.ai.add_actor(&spec.id)?;
        for other in self.nations.keys() {
            self.diplomacy.ensure_relation(&spec.id, other)?;
        }

        info!("[Simulation] Nation {} ({}) added", spec.id, spec.name);
        self.record(EventKind::NationAdded, &spec.id, spec.name.as_bytes());
        self.nations.insert(spec.id.clone(), spec);
        Ok(())
    }

    /// Found a settlement for `nation` at a specific site
    pub fn found_settlement(&mut self, nation: &str, name: &str, pos: GridPos) -> Result<String> {
        let spec = self
            .nations
            .get(nation)
            .cloned()
            .ok_or_else(|| CivError::NotFound(format!("nation '{}'", nation)))?;
        let id = self.settlements.try_found(name, pos, nation, &self.world)?;
        self.settle(&id, &spec);
        Ok(id)
    }

    /// Found up to `count` settlements for `nation` on random suitable sites;
    /// the first becomes the capital when the nation has none.
    pub fn seed_settlements(&mut self, nation: &str, count: usize) -> Result<Vec<String>> {
        let spec = self
            .nations
            .get(nation)
            .cloned()
            .ok_or_else(|| CivError::NotFound(format!("nation '{}'", nation)))?;
        let founded = self.settlements.spawn_random(count, nation, &self.world);
        for id in &founded {
            self.settle(id, &spec);
        }
        if self.settlements.capital_of(nation).is_none() {
            if let Some(first) = founded.first() {
                self.settlements.designate_capital(first)?;
            }
        }
        Ok(founded)
    }

    fn settle(&mut self, id: &str, spec: &NationSpec) {
        let name = self.language.coin_name(&spec.default_language).ok();
        if let Some(s) = self.settlements.get_mut(id) {
            s.set_identity(&spec.default_ethnicity, &spec.default_language, &spec.default_faith);
            if let Some(name) = name {
                s.name = name;
            }
        }
        let label = self.settlements.get(id).map(|s| s.name.clone()).unwrap_or_default();
        self.record(EventKind::SettlementFounded, id, format!("{} {}", spec.id, label).as_bytes());
    }

    // ---- observation ----

    pub fn nation_summary(&self, id: &str) -> Result<NationSummary> {
        let spec = self
            .nations
            .get(id)
            .ok_or_else(|| CivError::NotFound(format!("nation '{}'", id)))?;
        let own: Vec<_> = self.settlements.in_region(id).collect();
        let territory = own
            .iter()
            .map(|s| s.claimed_tiles as usize)
            .sum();
        let knowledge = self
            .knowledge
            .state(id)
            .map(|r| r.levels().map(|(_, l)| l).sum())
            .unwrap_or(0.0);
        Ok(NationSummary {
            id: spec.id.clone(),
            name: spec.name.clone(),
            government: self
                .governance
                .government(id)
                .map(|g| g.name.clone())
                .unwrap_or_default(),
            settlements: own.len(),
            population: self.settlements.population_of_region(id),
            territory,
            treasury: self.economy.treasury(id),
            gdp: self.economy.gdp(id),
            units: self.military.units_of(id).count(),
            knowledge,
        })
    }

    /// JSON snapshot of every nation, cached for a short span of simulation
    /// time so observers polling between ticks share one serialization
    pub fn snapshot_json(&mut self) -> Result<Vec<u8>> {
        let now = self.clock.elapsed();
        let key = format!("snapshot@{}", self.clock.current_tick());
        if let Ok(bytes) = self.cache.get(&key, now) {
            return Ok(bytes.to_vec());
        }
        let summaries = self
            .nations
            .keys()
            .map(|id| self.nation_summary(id))
            .collect::<Result<Vec<_>>>()?;
        let bytes = serde_json::to_vec(&summaries)?;
        self.cache.sweep(now);
        if let Err(e) = self.cache.set(&key, &bytes, now) {
            warn!("[Simulation] Snapshot not cached: {}", e);
        }
        Ok(bytes)
    }

    /// Append a journal record; failures are logged, never fatal
    pub(crate) fn record(&mut self, kind: EventKind, context: &str, data: &[u8]) {
        if let Err(e) = self.journal.record(kind, context, data) {
            warn!("[Simulation] Journal record {:?} dropped: {}", kind, e);
        }
        self.pending.push((kind, context.to_string()));
    }

    pub fn save(&mut self, path: &Path) -> Result<()> {
        persistence::save(self, path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        persistence::load(path)
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.shutdown();
    }
}
