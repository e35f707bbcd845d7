//! AI - per-nation strategic and tactical decision queues
//!
//! Every actor periodically scores candidate decisions against the current
//! state of the world, weights them by its personality and queues them. The
//! simulation pops the best of each queue every tick and carries them out
//! through the owning managers, so the AI itself never mutates anything but
//! its own queues.

pub mod decision;
pub mod mind;

use std::collections::BTreeMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{CivError, Result};
use crate::core::rng::{stream_rng, RngStream};
use crate::core::types::GridPos;
use crate::diplomacy::{DiplomacyManager, TreatyKind};
use crate::economy::EconomyManager;
use crate::governance::{GovFunction, GovernanceManager, Reform};
use crate::knowledge::{Domain, KnowledgeManager};
use crate::military::{ConquestKind, MilitaryManager, UnitType};
use crate::settlement::SettlementManager;
use crate::world::WorldMap;

pub use decision::{Decision, DecisionKind, DecisionQueue};
pub use mind::{ActorMind, AiPersonality};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiParams {
    /// Simulation time between re-plans
    pub think_interval: f64,
    pub queue_capacity: usize,
    /// Queued decisions older than this are discarded
    pub decision_ttl: f64,
    /// Decisions below this priority are never executed
    pub min_priority: f32,
    pub tactical_per_tick: usize,
    pub max_settlements: usize,
    /// Treasury spent to found a settlement
    pub found_cost: f32,
    pub expand_radius: i32,
    pub treaty_trust: f32,
    pub max_institutions: usize,
}

impl Default for AiParams {
    fn default() -> Self {
        Self {
            think_interval: 5.0,
            queue_capacity: 8,
            decision_ttl: 20.0,
            min_priority: 0.1,
            tactical_per_tick: 2,
            max_settlements: 12,
            found_cost: 50.0,
            expand_radius: 6,
            treaty_trust: 0.45,
            max_institutions: 5,
        }
    }
}

/// Read-only view of the world an actor plans against
pub struct AiView<'a> {
    pub world: &'a WorldMap,
    pub settlements: &'a SettlementManager,
    pub economy: &'a EconomyManager,
    pub governance: &'a GovernanceManager,
    pub diplomacy: &'a DiplomacyManager,
    pub knowledge: &'a KnowledgeManager,
    pub military: &'a MilitaryManager,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiManager {
    minds: BTreeMap<String, ActorMind>,
    params: AiParams,
    rng: ChaCha8Rng,
}

impl AiManager {
    pub fn new(seed: u64, params: AiParams) -> Self {
        Self {
            minds: BTreeMap::new(),
            params,
            rng: stream_rng(seed, RngStream::Ai),
        }
    }

    pub fn params(&self) -> &AiParams {
        &self.params
    }

    pub fn add_actor(&mut self, id: &str) -> Result<()> {
        if self.minds.contains_key(id) {
            return Err(CivError::InvalidState(format!("duplicate actor '{}'", id)));
        }
        let personality = AiPersonality::random(&mut self.rng);
        self.minds
            .insert(id.to_string(), ActorMind::new(id, personality, self.params.queue_capacity));
        Ok(())
    }

    pub fn remove_actor(&mut self, id: &str) -> Option<ActorMind> {
        self.minds.remove(id)
    }

    pub fn mind(&self, id: &str) -> Option<&ActorMind> {
        self.minds.get(id)
    }

    pub fn mind_mut(&mut self, id: &str) -> Option<&mut ActorMind> {
        self.minds.get_mut(id)
    }

    pub fn minds(&self) -> impl Iterator<Item = &ActorMind> {
        self.minds.values()
    }

    /// Re-plan where due, then hand back the decisions to execute this tick
    pub fn update(&mut self, view: &AiView<'_>, now: f64) -> Vec<(String, Decision)> {
        let p = self.params.clone();
        let mut chosen = Vec::new();

        for mind in self.minds.values_mut() {
            mind.strategic.prune(now, p.decision_ttl);
            mind.tactical.prune(now, p.decision_ttl);

            if mind.due(now, p.think_interval) {
                let candidates = plan(mind, view, &p, &mut self.rng, now);
                debug!("{} considers {} options", mind.actor_id, candidates.len());
                for d in candidates {
                    mind.enqueue(d);
                }
                mind.last_plan = Some(now);
            }

            if mind.strategic.peek().map_or(false, |d| d.priority >= p.min_priority) {
                if let Some(d) = mind.strategic.pop() {
                    chosen.push((mind.actor_id.clone(), d));
                }
            }
            for _ in 0..p.tactical_per_tick {
                if !mind.tactical.peek().map_or(false, |d| d.priority >= p.min_priority) {
                    break;
                }
                if let Some(d) = mind.tactical.pop() {
                    chosen.push((mind.actor_id.clone(), d));
                }
            }
        }
        chosen
    }
}

fn institution_for(index: usize) -> (GovFunction, &'static str) {
    match index % 5 {
        0 => (GovFunction::Executive, "Chancery"),
        1 => (GovFunction::Judicial, "High Court"),
        2 => (GovFunction::Legislative, "Assembly"),
        3 => (GovFunction::Oversight, "Censorate"),
        _ => (GovFunction::Sovereignty, "Crown Council"),
    }
}

/// One step from `from` toward `to`, at most `reach` tiles in each axis
fn step_toward(world: &WorldMap, from: GridPos, to: GridPos, reach: i32) -> GridPos {
    let dx = world.wrapped_dx(from.x, to.x).clamp(-reach, reach);
    let dy = (to.y - from.y).clamp(-reach, reach);
    GridPos::new(world.wrap_x(from.x + dx), world.clamp_y(from.y + dy))
}

fn plan<R: Rng>(mind: &ActorMind, view: &AiView<'_>, p: &AiParams, rng: &mut R, now: f64) -> Vec<Decision> {
    let me = mind.actor_id.as_str();
    let w = &mind.personality;
    let mut out = Vec::new();

    let own: Vec<_> = view.settlements.in_region(me).collect();
    let treasury = view.economy.treasury(me);
    let my_strength = view.military.strength_of(me);

    // Expansion
    let home = view.settlements.capital_of(me).or_else(|| own.first().copied());
    if let Some(home) = home {
        if own.len() < p.max_settlements && treasury >= p.found_cost {
            let c = home.position.to_grid();
            let near = GridPos::new(
                view.world.wrap_x(c.x + rng.gen_range(-p.expand_radius..=p.expand_radius)),
                view.world.clamp_y(c.y + rng.gen_range(-p.expand_radius..=p.expand_radius)),
            );
            let room = 1.0 - own.len() as f32 / p.max_settlements as f32;
            out.push(Decision::new(
                DecisionKind::FoundSettlement { near },
                0.4 + 0.6 * room,
                w.expansion,
                now,
            ));
        }
    }

    // Relations
    let mut enemies = Vec::new();
    for r in view.diplomacy.relations().iter().filter(|r| r.involves(me)) {
        let other = r.other(me).to_string();
        let their_strength = view.military.strength_of(&other);
        if r.at_war() {
            enemies.push(other.clone());
            if r.trust >= 0.3 {
                let (stability, _) = view.governance.standing(me);
                let losing = if their_strength > my_strength { 0.2 } else { 0.0 };
                out.push(Decision::new(
                    DecisionKind::MakePeace { target: other },
                    0.3 + 0.5 * (1.0 - stability) + losing,
                    w.diplomacy,
                    now,
                ));
            }
        } else if r.has_legitimate_war_goal() && my_strength > 0.0 {
            out.push(Decision::new(
                DecisionKind::DeclareWar { target: other },
                my_strength / (my_strength + their_strength),
                w.aggression,
                now,
            ));
        } else if r.trust >= p.treaty_trust
            && !view
                .diplomacy
                .active_treaties_between(me, &other)
                .iter()
                .any(|t| t.kind == TreatyKind::Trade)
        {
            out.push(Decision::new(
                DecisionKind::ProposeTreaty {
                    partner: other,
                    kind: TreatyKind::Trade,
                },
                r.trust,
                w.diplomacy,
                now,
            ));
        }
    }

    // Government
    if let Some(g) = view.governance.government(me) {
        let t = &g.traits;
        if t.political_tension > 0.6 {
            let reform = if t.corruption > 0.5 {
                Reform {
                    democracy: Some((t.democracy + 0.1).min(1.0)),
                    ..Default::default()
                }
            } else {
                Reform {
                    centralization: Some((t.centralization + 0.1).min(1.0)),
                    ..Default::default()
                }
            };
            out.push(Decision::new(DecisionKind::Reform(reform), t.political_tension, w.order, now));
        }
        let active = g.active_institutions().count();
        if active < p.max_institutions {
            let (function, name) = institution_for(g.institutions.len());
            out.push(Decision::new(
                DecisionKind::BuildInstitution {
                    name: name.to_string(),
                    function,
                },
                0.4,
                w.order,
                now,
            ));
        }
    }

    // Research
    if let Some(state) = view.knowledge.state(me) {
        let mean = Domain::ALL.iter().map(|d| state.level(*d)).sum::<f64>() / Domain::ALL.len() as f64;
        let desired = if !enemies.is_empty() {
            Domain::Metallurgy
        } else if state.level(Domain::Mathematics) < mean {
            Domain::Mathematics
        } else {
            Domain::ALL
                .iter()
                .copied()
                .fold(Domain::Science, |best, d| if state.level(d) < state.level(best) { d } else { best })
        };
        if state.focus != Some(desired) {
            out.push(Decision::new(DecisionKind::SetResearchFocus(desired), 0.5, w.science, now));
        }
    }

    // Training
    let at_war = !enemies.is_empty();
    let unit_count = view.military.units_of(me).count();
    if let Some(s) = own
        .iter()
        .filter(|s| s.production.is_none())
        .max_by_key(|s| s.population)
    {
        let unit_type = if !at_war {
            UnitType::Archer
        } else if view.knowledge.level(me, Domain::Metallurgy) >= 1.0 {
            UnitType::Cavalry
        } else {
            UnitType::Infantry
        };
        let garrison = 1.0 - (unit_count as f32 / (own.len() as f32 * 2.0)).min(1.0);
        let utility = if at_war { 0.9 } else { 0.3 * garrison };
        out.push(Decision::new(
            DecisionKind::TrainUnit {
                settlement: s.id.clone(),
                unit_type,
            },
            utility,
            w.aggression,
            now,
        ));
    }

    // Campaigns
    for enemy in &enemies {
        let enemy_strength = view.military.strength_of(enemy);
        let targets: Vec<_> = view.settlements.in_region(enemy).collect();
        let hostile_units: Vec<_> = view.military.units_of(enemy).collect();

        for unit in view.military.units_of(me).filter(|u| !u.has_moved) {
            let reach = |a: GridPos, b: GridPos| view.world.wrapped_dx(a.x, b.x).abs().max((a.y - b.y).abs());

            if let Some(foe) = hostile_units.iter().find(|f| reach(unit.position, f.position) <= 1) {
                out.push(Decision::new(
                    DecisionKind::Attack {
                        unit: unit.id.clone(),
                        target: foe.id.clone(),
                    },
                    0.8,
                    w.aggression,
                    now,
                ));
                continue;
            }

            let Some(target) = targets
                .iter()
                .min_by_key(|s| reach(unit.position, s.position.to_grid()))
            else {
                continue;
            };
            let dest = target.position.to_grid();
            if reach(unit.position, dest) <= 1 {
                let kind = if my_strength > enemy_strength * 1.5 {
                    ConquestKind::Invasion
                } else {
                    ConquestKind::Raid
                };
                out.push(Decision::new(
                    DecisionKind::BeginConquest {
                        settlement: target.id.clone(),
                        kind,
                    },
                    0.8,
                    w.aggression,
                    now,
                ));
            } else {
                let step = step_toward(view.world, unit.position, dest, unit.movement_speed.floor() as i32);
                if view.world.tile(step.x, step.y).map_or(false, |t| t.is_land()) {
                    out.push(Decision::new(
                        DecisionKind::MoveUnit {
                            unit: unit.id.clone(),
                            to: step,
                        },
                        0.7,
                        w.aggression,
                        now,
                    ));
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diplomacy::DiplomacyParams;
    use crate::economy::EconomyParams;
    use crate::governance::{GovernanceParams, NationalIdentity};
    use crate::knowledge::KnowledgeParams;
    use crate::military::MilitaryParams;
    use crate::world::{generate, WorldGenParams};

    struct Fixture {
        world: WorldMap,
        settlements: SettlementManager,
        economy: EconomyManager,
        governance: GovernanceManager,
        diplomacy: DiplomacyManager,
        knowledge: KnowledgeManager,
        military: MilitaryManager,
    }

    impl Fixture {
        fn new() -> Self {
            let world = generate(32, 32, 11, &WorldGenParams::default()).unwrap();
            let mut governance = GovernanceManager::new(11, GovernanceParams::default());
            governance
                .create_government("N", "Nation", NationalIdentity::default())
                .unwrap();
            let mut knowledge = KnowledgeManager::new(KnowledgeParams::default());
            knowledge.add_nation("N");
            let mut economy = EconomyManager::new(EconomyParams::default());
            economy.add_nation("N");
            Self {
                world,
                settlements: SettlementManager::new(11, Default::default()),
                economy,
                governance,
                diplomacy: DiplomacyManager::new(11, DiplomacyParams::default()),
                knowledge,
                military: MilitaryManager::new(11, MilitaryParams::default()),
            }
        }

        fn view(&self) -> AiView<'_> {
            AiView {
                world: &self.world,
                settlements: &self.settlements,
                economy: &self.economy,
                governance: &self.governance,
                diplomacy: &self.diplomacy,
                knowledge: &self.knowledge,
                military: &self.military,
            }
        }
    }

    #[test]
    fn test_duplicate_actor_rejected() {
        let mut ai = AiManager::new(1, AiParams::default());
        ai.add_actor("N").unwrap();
        assert!(ai.add_actor("N").is_err());
    }

    #[test]
    fn test_plans_institutions_and_focus() {
        let fx = Fixture::new();
        let mut ai = AiManager::new(1, AiParams::default());
        ai.add_actor("N").unwrap();
        let chosen = ai.update(&fx.view(), 0.0);
        assert!(!chosen.is_empty());
        let mind = ai.mind("N").unwrap();
        assert_eq!(mind.last_plan, Some(0.0));
        let all: Vec<_> = chosen
            .iter()
            .map(|(_, d)| &d.kind)
            .chain(mind.strategic.iter().map(|d| &d.kind))
            .collect();
        assert!(all.iter().any(|k| matches!(k, DecisionKind::BuildInstitution { .. })));
        assert!(all.iter().any(|k| matches!(k, DecisionKind::SetResearchFocus(_))));
    }

    #[test]
    fn test_replans_only_when_due() {
        let fx = Fixture::new();
        let mut ai = AiManager::new(1, AiParams::default());
        ai.add_actor("N").unwrap();
        ai.update(&fx.view(), 0.0);
        ai.update(&fx.view(), 1.0);
        assert_eq!(ai.mind("N").unwrap().last_plan, Some(0.0));
        ai.update(&fx.view(), 5.0);
        assert_eq!(ai.mind("N").unwrap().last_plan, Some(5.0));
    }

    #[test]
    fn test_trade_proposed_to_trusted_neighbour() {
        let mut fx = Fixture::new();
        fx.diplomacy.set_trust("N", "M", 0.6).unwrap();
        let mind = ActorMind::new("N", AiPersonality::default(), 8);
        let mut rng = stream_rng(1, RngStream::Ai);
        let options = plan(&mind, &fx.view(), &AiParams::default(), &mut rng, 0.0);
        assert!(options.iter().any(|d| d.kind
            == DecisionKind::ProposeTreaty {
                partner: "M".into(),
                kind: TreatyKind::Trade
            }));
    }
}
