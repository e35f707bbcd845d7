//! Carrying out AI decisions through the owning managers

use serde_json::json;

use crate::ai::{Decision, DecisionKind};
use crate::core::error::{CivError, Result};
use crate::core::types::REBELS_REGION;
use crate::diplomacy::TreatyKind;
use crate::journal::EventKind;
use crate::simulation::tick::payload;
use crate::simulation::Simulation;

/// Simulation time a negotiated treaty stays in force
const TREATY_TERM: f64 = 120.0;

impl Simulation {
    /// Execute one decision on behalf of `actor`. Every precondition is
    /// checked by the manager that owns the affected state.
    pub(crate) fn execute_decision(&mut self, actor: &str, decision: &Decision, now: f64) -> Result<()> {
        match &decision.kind {
            DecisionKind::FoundSettlement { near } => {
                let cost = self.params.ai.found_cost;
                if self.economy.treasury(actor) < cost {
                    return Err(CivError::InvalidState(format!("{} cannot afford a settlement", actor)));
                }
                self.found_settlement(actor, "Outpost", *near)?;
                self.economy.spend(actor, cost)?;
            }
            DecisionKind::DeclareWar { target } => {
                self.diplomacy.declare_war(actor, target)?;
                self.record(EventKind::WarDeclared, &format!("{}:{}", actor, target), b"declared");
            }
            DecisionKind::MakePeace { target } => {
                if !self.diplomacy.at_war(actor, target) {
                    return Err(CivError::InvalidState(format!("{} is not at war with {}", actor, target)));
                }
                let id = self
                    .diplomacy
                    .propose_treaty(TreatyKind::Peace, &[actor, target], now, Some(TREATY_TERM))?;
                self.record(EventKind::PeaceSigned, &id, format!("{}:{}", actor, target).as_bytes());
            }
            DecisionKind::ProposeTreaty { partner, kind } => {
                let id = self
                    .diplomacy
                    .propose_treaty(*kind, &[actor, partner], now, Some(TREATY_TERM))?;
                let data = payload(json!({ "kind": format!("{:?}", kind), "parties": [actor, partner] }));
                self.record(EventKind::TreatySigned, &id, &data);
            }
            DecisionKind::Reform(reform) => {
                self.governance.reform(actor, reform)?;
            }
            DecisionKind::BuildInstitution { name, function } => {
                self.governance.add_institution(actor, name, *function)?;
            }
            DecisionKind::SetResearchFocus(domain) => {
                self.knowledge.set_focus(actor, Some(*domain))?;
            }
            DecisionKind::BeginConquest { settlement, kind } => {
                let owner = self
                    .settlements
                    .get(settlement)
                    .map(|s| s.region_id.clone())
                    .ok_or_else(|| CivError::NotFound(format!("settlement '{}'", settlement)))?;
                if owner == actor {
                    return Err(CivError::InvalidState(format!("{} already holds {}", actor, settlement)));
                }
                if owner != REBELS_REGION && !self.diplomacy.at_war(actor, &owner) {
                    return Err(CivError::InvalidState(format!("{} is not at war with {}", actor, owner)));
                }
                self.military.begin_conquest(actor, settlement, *kind, now)?;
            }
            DecisionKind::TrainUnit { settlement, unit_type } => {
                self.ensure_settlement_owner(actor, settlement)?;
                self.settlements.start_production(settlement, *unit_type)?;
            }
            DecisionKind::MoveUnit { unit, to } => {
                self.ensure_unit_owner(actor, unit)?;
                self.military.move_unit(unit, *to, &self.world)?;
            }
            DecisionKind::Attack { unit, target } => {
                self.ensure_unit_owner(actor, unit)?;
                let result = self
                    .military
                    .attack(unit, target, &self.world, &self.settlements)?;
                let data = payload(json!({
                    "victor": result.victor_id,
                    "attacker_casualties": result.attacker_casualties,
                    "defender_casualties": result.defender_casualties,
                    "prisoners": result.prisoners,
                }));
                self.record(
                    EventKind::Combat,
                    &format!("{}>{}", result.attacker_id, result.defender_id),
                    &data,
                );
            }
        }
        Ok(())
    }

    fn ensure_settlement_owner(&self, actor: &str, settlement: &str) -> Result<()> {
        let s = self
            .settlements
            .get(settlement)
            .ok_or_else(|| CivError::NotFound(format!("settlement '{}'", settlement)))?;
        if s.region_id != actor {
            return Err(CivError::InvalidState(format!("{} does not belong to {}", settlement, actor)));
        }
        Ok(())
    }

    fn ensure_unit_owner(&self, actor: &str, unit: &str) -> Result<()> {
        let u = self
            .military
            .unit(unit)
            .ok_or_else(|| CivError::NotFound(format!("unit '{}'", unit)))?;
        if u.owner != actor {
            return Err(CivError::InvalidState(format!("{} does not command {}", actor, unit)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SimulationParams;
    use crate::core::game_config::GameConfig;
    use crate::knowledge::Domain;
    use crate::simulation::NationSpec;

    fn sim() -> Simulation {
        let mut sim = Simulation::new(GameConfig::default(), SimulationParams::default(), 40, 40, 5).unwrap();
        sim.add_nation(NationSpec::new("P", "Pell")).unwrap();
        sim.add_nation(NationSpec::new("Q", "Quor")).unwrap();
        sim
    }

    fn decide(kind: DecisionKind) -> Decision {
        Decision::new(kind, 1.0, 1.0, 0.0)
    }

    #[test]
    fn test_treaty_decision_signs_and_journals() {
        let mut s = sim();
        s.diplomacy_mut().set_trust("P", "Q", 0.6).unwrap();
        s.execute_decision(
            "P",
            &decide(DecisionKind::ProposeTreaty {
                partner: "Q".into(),
                kind: TreatyKind::Trade,
            }),
            0.0,
        )
        .unwrap();
        assert_eq!(s.diplomacy().treaties().len(), 1);
        assert_eq!(s.journal().count_by_type(EventKind::TreatySigned.tag()), 1);
    }

    #[test]
    fn test_war_then_peace() {
        let mut s = sim();
        s.diplomacy_mut().set_trust("P", "Q", 0.7).unwrap();
        s.execute_decision("P", &decide(DecisionKind::DeclareWar { target: "Q".into() }), 0.0)
            .unwrap();
        assert!(s.diplomacy().at_war("P", "Q"));
        s.execute_decision("Q", &decide(DecisionKind::MakePeace { target: "P".into() }), 1.0)
            .unwrap();
        assert!(!s.diplomacy().at_war("P", "Q"));
        assert!(s
            .execute_decision("Q", &decide(DecisionKind::MakePeace { target: "P".into() }), 2.0)
            .is_err());
    }

    #[test]
    fn test_focus_decision() {
        let mut s = sim();
        s.execute_decision("P", &decide(DecisionKind::SetResearchFocus(Domain::Navigation)), 0.0)
            .unwrap();
        assert_eq!(s.knowledge().state("P").unwrap().focus, Some(Domain::Navigation));
    }

    #[test]
    fn test_cannot_command_foreign_units() {
        let mut s = sim();
        let err = s
            .execute_decision(
                "P",
                &decide(DecisionKind::MoveUnit {
                    unit: "U1".into(),
                    to: crate::core::types::GridPos::new(1, 1),
                }),
                0.0,
            )
            .unwrap_err();
        assert_eq!(err.code(), crate::core::error::ErrorCode::NotFound);
    }

    #[test]
    fn test_conquest_requires_war() {
        let mut s = sim();
        let Some(target) = s.seed_settlements("Q", 1).unwrap().pop() else {
            return;
        };
        let kind = crate::military::ConquestKind::Raid;
        assert!(s
            .execute_decision(
                "P",
                &decide(DecisionKind::BeginConquest {
                    settlement: target.clone(),
                    kind
                }),
                0.0
            )
            .is_err());
        s.diplomacy_mut().declare_war("P", "Q").unwrap();
        s.execute_decision("P", &decide(DecisionKind::BeginConquest { settlement: target, kind }), 0.0)
            .unwrap();
        assert_eq!(s.military().conquests().len(), 1);
    }
}
