//! The per-tick pipeline and outcome routing

use serde_json::json;
use tracing::{debug, info, warn};

use crate::ai::AiView;
use crate::core::error::{CivError, Result};
use crate::core::types::REBELS_REGION;
use crate::economy::EconomyContext;
use crate::journal::EventKind;
use crate::military::ConquestResult;
use crate::settlement::{SettlementContext, UnitSpawn};
use crate::simulation::{SimState, Simulation};

/// What one tick did, for callers that want more than the journal
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub elapsed: f64,
    pub events_logged: usize,
    pub decisions_executed: usize,
    pub decisions_rejected: usize,
    pub units_spawned: usize,
    pub conquests: usize,
    pub revolts: usize,
}

pub(crate) fn payload(value: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap_or_default()
}

impl Simulation {
    /// Advance every manager by `dt` in the fixed order. Returns `None`
    /// without touching anything unless the simulation is running.
    pub fn tick(&mut self, dt: f32) -> Result<Option<TickReport>> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(CivError::InvalidArgument(format!("tick dt {} must be positive", dt)));
        }
        if self.state != SimState::Running {
            return Ok(None);
        }

        self.clock.advance(dt);
        let now = self.clock.elapsed();
        let tick = self.clock.current_tick();
        self.journal.set_clock(tick.min(u32::MAX as u64) as u32);
        let logged_before = self.journal.len();
        let mut report = TickReport {
            tick,
            elapsed: now,
            ..Default::default()
        };

        self.step_world(dt);
        self.step_population(dt);
        self.step_economy(dt);
        let spawns = self.step_settlements(dt, &mut report);
        self.step_culture(dt, now);
        self.step_language(dt);
        self.step_governance(dt);
        self.step_diplomacy(dt, now);
        self.step_knowledge(dt);
        self.step_ai(now, &mut report);
        self.step_military(dt, now, &spawns, &mut report);

        let year = self.current_year();
        let weather = self.world.weather();
        self.record(
            EventKind::TickCompleted,
            &format!("tick {}", tick),
            &payload(json!({ "year": year, "weather": format!("{:?}", weather) })),
        );
        report.events_logged = self.journal.len() - logged_before;

        self.maybe_autosave(now);
        self.publish(tick);
        Ok(Some(report))
    }

    /// Run `ticks` ticks, stopping early if the simulation leaves `Running`
    pub fn run(&mut self, ticks: u64, dt: f32) -> Result<u64> {
        let mut done = 0;
        for _ in 0..ticks {
            if self.tick(dt)?.is_none() {
                break;
            }
            done += 1;
        }
        Ok(done)
    }

    fn step_world(&mut self, dt: f32) {
        let season = self.clock.season();
        let (world, settlements) = (&mut self.world, &self.settlements);
        self.optimizer
            .measure("world", || world.update(dt, season, settlements));
    }

    fn step_population(&mut self, dt: f32) {
        let (population, settlements) = (&mut self.population, &self.settlements);
        let outcome = self
            .optimizer
            .measure("population", || population.update(dt, settlements));
        for (settlement, disease) in &outcome.outbreaks_started {
            self.record(EventKind::Outbreak, settlement, disease.as_bytes());
        }
        for (settlement, disease) in &outcome.outbreaks_ended {
            debug!("[Simulation] {} outbreak over in {}", disease, settlement);
        }
    }

    fn step_economy(&mut self, dt: f32) {
        let ctx = EconomyContext {
            settlements: &self.settlements,
            world: &self.world,
            diplomacy: &self.diplomacy,
            knowledge: &self.knowledge,
        };
        let economy = &mut self.economy;
        self.optimizer.measure("economy", || economy.update(dt, &ctx));
    }

    fn step_settlements(&mut self, dt: f32, report: &mut TickReport) -> Vec<UnitSpawn> {
        let ctx = SettlementContext {
            governance: &self.governance,
            population: &self.population,
        };
        let (settlements, world) = (&mut self.settlements, &mut self.world);
        let outcome = self
            .optimizer
            .measure("settlement", || settlements.update(dt, &ctx, world));

        for (id, tier) in &outcome.promotions {
            self.record(EventKind::SettlementPromoted, id, format!("{:?}", tier).as_bytes());
        }
        for revolt in &outcome.revolts {
            self.record(
                EventKind::SettlementRevolted,
                &revolt.settlement_id,
                revolt.former_region.as_bytes(),
            );
        }
        report.revolts = outcome.revolts.len();
        debug!(
            "[Simulation] influence: {} claimed, {} flipped",
            outcome.influence.claimed, outcome.influence.flipped
        );
        outcome.unit_spawns
    }

    fn step_culture(&mut self, dt: f32, now: f64) {
        let culture = &mut self.culture;
        let outcome = self.optimizer.measure("culture", || culture.update(dt, now));
        for (event, stage) in &outcome.stage_changes {
            self.record(EventKind::AssimilationStage, event, format!("{:?}", stage).as_bytes());
        }
        for event in &outcome.completed {
            let data = payload(json!({
                "stage": "complete",
                "source": event.source_id,
                "target": event.target_id,
                "region": event.region_id,
            }));
            self.record(EventKind::AssimilationStage, &event.id, &data);
        }
    }

    fn step_language(&mut self, dt: f32) {
        let (language, settlements) = (&mut self.language, &self.settlements);
        let outcome = self
            .optimizer
            .measure("language", || language.update(dt, settlements));

        for (parent, child) in &outcome.splits {
            // Every second settlement speaking the parent goes over to the dialect
            let speakers: Vec<String> = self
                .settlements
                .iter()
                .filter(|s| &s.primary_language == parent)
                .map(|s| s.id.clone())
                .collect();
            for id in speakers.iter().skip(1).step_by(2) {
                if let Err(e) = self.settlements.convert_language(id, parent, child) {
                    warn!("[Simulation] Dialect shift in {} failed: {}", id, e);
                }
            }
            self.record(EventKind::LanguageSplit, child, parent.as_bytes());
        }
        for lang in &outcome.extinctions {
            self.record(EventKind::LanguageExtinct, lang, &[]);
        }
        for (donor, target, concept) in &outcome.borrowings {
            debug!("[Simulation] {} borrows '{}' from {}", target, concept, donor);
        }
    }

    fn step_governance(&mut self, dt: f32) {
        let (governance, economy) = (&mut self.governance, &self.economy);
        let outcome = self
            .optimizer
            .measure("governance", || governance.update(dt, economy));

        for (gov, tier) in &outcome.tier_changes {
            self.record(EventKind::StatureChanged, gov, format!("{:?}", tier).as_bytes());
        }
        for gov in &outcome.crises {
            self.record(EventKind::GovernmentCrisis, gov, &[]);
        }
        for (gov, bill, passed) in &outcome.bills_resolved {
            let data = payload(json!({ "bill": bill, "passed": passed }));
            self.record(EventKind::BillResolved, gov, &data);
        }
        for (gov, name) in &outcome.renamed {
            self.record(EventKind::GovernmentRenamed, gov, name.as_bytes());
        }
    }

    fn step_diplomacy(&mut self, dt: f32, now: f64) {
        let diplomacy = &mut self.diplomacy;
        let outcome = self.optimizer.measure("diplomacy", || diplomacy.update(dt, now));
        for (a, b) in &outcome.wars {
            self.record(EventKind::WarDeclared, &format!("{}:{}", a, b), b"grievance");
        }
        for treaty in &outcome.expired_treaties {
            self.record(EventKind::TreatyExpired, treaty, &[]);
        }
    }

    fn step_knowledge(&mut self, dt: f32) {
        let (knowledge, settlements) = (&mut self.knowledge, &self.settlements);
        let outcome = self
            .optimizer
            .measure("knowledge", || knowledge.update(dt, settlements));
        for (nation, domain, level) in &outcome.breakthroughs {
            let data = payload(json!({ "domain": format!("{:?}", domain), "level": level }));
            self.record(EventKind::Breakthrough, nation, &data);
        }
    }

    fn step_ai(&mut self, now: f64, report: &mut TickReport) {
        let view = AiView {
            world: &self.world,
            settlements: &self.settlements,
            economy: &self.economy,
            governance: &self.governance,
            diplomacy: &self.diplomacy,
            knowledge: &self.knowledge,
            military: &self.military,
        };
        let ai = &mut self.ai;
        let chosen = self.optimizer.measure("ai", || ai.update(&view, now));

        for (actor, decision) in chosen {
            match self.execute_decision(&actor, &decision, now) {
                Ok(()) => report.decisions_executed += 1,
                Err(e) => {
                    debug!("[Simulation] {} could not {:?}: {}", actor, decision.kind, e);
                    report.decisions_rejected += 1;
                }
            }
        }
    }

    fn step_military(&mut self, dt: f32, now: f64, spawns: &[UnitSpawn], report: &mut TickReport) {
        let (military, settlements) = (&mut self.military, &self.settlements);
        let outcome = self
            .optimizer
            .measure("military", || military.update(dt, spawns, settlements));

        for id in &outcome.spawned {
            let owner = self
                .military
                .unit(id)
                .map(|u| u.owner.clone())
                .unwrap_or_default();
            self.record(EventKind::UnitSpawned, id, owner.as_bytes());
        }
        report.units_spawned = outcome.spawned.len();
        report.conquests = outcome.conquests.len();
        for result in &outcome.conquests {
            self.apply_conquest(result, now);
        }
    }

    /// Hand the settlement over, pay out plunder and start assimilating
    fn apply_conquest(&mut self, c: &ConquestResult, now: f64) {
        if let Err(e) = self.settlements.transfer(&c.settlement_id, &c.attacker) {
            warn!("[Simulation] Conquest {} could not transfer: {}", c.conquest_id, e);
            return;
        }
        self.economy.deposit(&c.attacker, c.plunder as f32);

        let conqueror = self.nations.get(&c.attacker).map(|n| n.default_ethnicity.clone());
        let conquered = self
            .settlements
            .get(&c.settlement_id)
            .map(|s| s.primary_ethnicity.clone());
        if let (Some(source), Some(target)) = (conqueror, conquered) {
            if source != target && self.culture.identity(&target).is_some() {
                if let Err(e) =
                    self.culture
                        .start_assimilation(&source, &target, &c.settlement_id, c.assimilation, now)
                {
                    debug!("[Simulation] No assimilation after {}: {}", c.conquest_id, e);
                }
            }
        }

        if c.former_region != REBELS_REGION && self.nations.contains_key(&c.former_region) {
            if let Err(e) = self.diplomacy.add_grievance(&c.former_region, &c.attacker, 0.5) {
                warn!("[Simulation] Grievance after {} not recorded: {}", c.conquest_id, e);
            }
        }

        let data = payload(json!({
            "attacker": c.attacker,
            "former": c.former_region,
            "kind": format!("{:?}", c.kind),
            "plunder": c.plunder,
        }));
        self.record(EventKind::ConquestCompleted, &c.settlement_id, &data);
    }

    fn maybe_autosave(&mut self, now: f64) {
        let interval = self.config.autosave_interval;
        if interval <= 0 || now - self.last_autosave < interval as f64 {
            return;
        }
        let Some(path) = self.autosave_path.clone() else {
            return;
        };
        self.last_autosave = now;
        match self.save(&path) {
            Ok(()) => info!("[Simulation] Autosaved to {}", path.display()),
            Err(e) => warn!("[Simulation] Autosave failed: {}", e),
        }
    }

    fn publish(&mut self, tick: u64) {
        let pending = std::mem::take(&mut self.pending);
        for (kind, context) in &pending {
            self.dispatcher.dispatch(kind.name(), context.as_bytes());
        }
        self.dispatcher.dispatch("tick", &tick.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::core::config::SimulationParams;
    use crate::core::game_config::GameConfig;
    use crate::simulation::NationSpec;

    fn running() -> Simulation {
        let mut sim = Simulation::new(GameConfig::default(), SimulationParams::default(), 48, 48, 3).unwrap();
        sim.add_nation(NationSpec::new("N1", "Avar")).unwrap();
        sim.add_nation(NationSpec::new("N2", "Belk")).unwrap();
        sim.seed_settlements("N1", 2).unwrap();
        sim.seed_settlements("N2", 2).unwrap();
        sim.start().unwrap();
        sim
    }

    #[test]
    fn test_tick_is_noop_unless_running() {
        let mut sim = Simulation::new(GameConfig::default(), SimulationParams::default(), 32, 32, 3).unwrap();
        assert_eq!(sim.tick(1.0).unwrap(), None);
        assert_eq!(sim.clock().current_tick(), 0);
        sim.start().unwrap();
        sim.pause().unwrap();
        assert_eq!(sim.tick(1.0).unwrap(), None);
    }

    #[test]
    fn test_bad_dt_rejected() {
        let mut sim = running();
        assert!(sim.tick(0.0).is_err());
        assert!(sim.tick(f32::NAN).is_err());
    }

    #[test]
    fn test_each_tick_journals_completion() {
        let mut sim = running();
        let before = sim.journal().count_by_type(EventKind::TickCompleted.tag());
        assert_eq!(sim.run(5, 1.0).unwrap(), 5);
        let after = sim.journal().count_by_type(EventKind::TickCompleted.tag());
        assert_eq!(after - before, 5);
        assert_eq!(sim.clock().current_tick(), 5);
    }

    #[test]
    fn test_tick_publishes_to_subscribers() {
        let mut sim = running();
        let ticks = Rc::new(Cell::new(0));
        let seen = ticks.clone();
        sim.subscribe("tick", move |_, _| seen.set(seen.get() + 1));
        sim.run(3, 1.0).unwrap();
        assert_eq!(ticks.get(), 3);
        assert_eq!(sim.unsubscribe("tick"), 1);
    }

    #[test]
    fn test_optimizer_times_every_manager_when_enabled() {
        let mut sim = running();
        sim.optimizer_mut().set_enabled(true);
        sim.tick(1.0).unwrap();
        for name in [
            "world",
            "population",
            "economy",
            "settlement",
            "culture",
            "language",
            "governance",
            "diplomacy",
            "knowledge",
            "ai",
            "military",
        ] {
            assert_eq!(sim.optimizer().metric(name).map(|m| m.count), Some(1), "{}", name);
        }
    }

    #[test]
    fn test_production_spawns_units_through_military() {
        let mut sim = running();
        let Some(id) = sim.settlements().in_region("N1").map(|s| s.id.clone()).next() else {
            return;
        };
        let units_before = sim.military().units_of("N1").count();
        sim.settlements_mut()
            .start_production(&id, crate::military::UnitType::Infantry)
            .ok();
        sim.run(30, 1.0).unwrap();
        assert!(sim.military().units_of("N1").count() > units_before);
        assert!(sim.journal().count_by_type(EventKind::UnitSpawned.tag()) > 0);
    }
}
