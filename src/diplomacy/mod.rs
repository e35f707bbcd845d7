//! Diplomacy - trust, grievances, treaties and international organizations
//!
//! Relations are stored once per unordered pair. Levels follow trust except
//! War, which is entered only by declaration or accumulated grievance and left
//! only through a peace treaty.

pub mod relation;
pub mod treaty;

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::error::{CivError, Result};
use crate::core::rng::{stream_rng, RngStream};
use crate::core::types::{approach, clamp01};

pub use relation::{pair_key, Personality, Relation, RelationLevel, Stance};
pub use treaty::{Organization, Resolution, ResolutionKind, ResolutionStatus, Treaty, TreatyKind, Vote};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiplomacyParams {
    /// Trust drift toward 0.5 per tick
    pub trust_drift: f32,
    pub trade_trust_bonus: f32,
    /// Opinion moves this fraction of the gap to `(trust - 0.5) * 200` per tick
    pub opinion_drift: f32,
    pub grievance_decay: f32,
    pub war_grievance: f32,
    /// Minimum pairwise trust for a treaty to be accepted
    pub accept_trust: f32,
    pub sanction_grievance: f32,
    pub war_trust_penalty: f32,
}

impl Default for DiplomacyParams {
    fn default() -> Self {
        Self {
            trust_drift: 0.01,
            trade_trust_bonus: 0.005,
            opinion_drift: 0.05,
            grievance_decay: 0.005,
            war_grievance: 1.0,
            accept_trust: 0.3,
            sanction_grievance: 0.1,
            war_trust_penalty: 0.2,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiplomacyOutcome {
    /// (a, b) pairs that entered war through grievance
    pub wars: Vec<(String, String)>,
    pub expired_treaties: Vec<String>,
    pub level_changes: Vec<(String, String, RelationLevel)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiplomacyManager {
    relations: Vec<Relation>,
    treaties: Vec<Treaty>,
    organizations: Vec<Organization>,
    params: DiplomacyParams,
    rng: ChaCha8Rng,
    next_id: u64,
}

impl DiplomacyManager {
    pub fn new(seed: u64, params: DiplomacyParams) -> Self {
        Self {
            relations: Vec::new(),
            treaties: Vec::new(),
            organizations: Vec::new(),
            params,
            rng: stream_rng(seed, RngStream::Diplomacy),
            next_id: 1,
        }
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        let id = format!("{}{}", prefix, self.next_id);
        self.next_id += 1;
        id
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn treaties(&self) -> &[Treaty] {
        &self.treaties
    }

    pub fn treaty(&self, id: &str) -> Option<&Treaty> {
        self.treaties.iter().find(|t| t.id == id)
    }

    pub fn organizations(&self) -> &[Organization] {
        &self.organizations
    }

    pub fn organization(&self, id: &str) -> Option<&Organization> {
        self.organizations.iter().find(|o| o.id == id)
    }

    pub fn relation(&self, a: &str, b: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.is(a, b))
    }

    fn relation_index(&self, a: &str, b: &str) -> Option<usize> {
        self.relations.iter().position(|r| r.is(a, b))
    }

    /// Fetch the relation for a pair, creating a neutral one on first contact
    pub fn ensure_relation(&mut self, a: &str, b: &str) -> Result<&mut Relation> {
        if a == b {
            return Err(CivError::InvalidArgument(format!("'{}' cannot relate to itself", a)));
        }
        let i = match self.relation_index(a, b) {
            Some(i) => i,
            None => {
                let personality = *Personality::ALL
                    .choose(&mut self.rng)
                    .unwrap_or(&Personality::Pragmatic);
                self.relations
                    .try_reserve(1)
                    .map_err(|e| CivError::OutOfMemory(e.to_string()))?;
                self.relations.push(Relation::new(a, b, personality));
                self.relations.len() - 1
            }
        };
        Ok(&mut self.relations[i])
    }

    pub fn set_trust(&mut self, a: &str, b: &str, trust: f32) -> Result<()> {
        self.ensure_relation(a, b)?.set_trust(trust);
        Ok(())
    }

    /// Record a hostile act by `b` as felt by `a`
    pub fn add_grievance(&mut self, a: &str, b: &str, amount: f32) -> Result<()> {
        if amount < 0.0 {
            return Err(CivError::InvalidArgument("grievance must be non-negative".into()));
        }
        let r = self.ensure_relation(a, b)?;
        r.grievances += amount;
        Ok(())
    }

    pub fn set_casus_belli(&mut self, a: &str, b: &str, reason: &str) -> Result<()> {
        self.ensure_relation(a, b)?.casus_belli = reason.to_string();
        Ok(())
    }

    pub fn has_legitimate_war_goal(&self, a: &str, b: &str) -> bool {
        self.relation(a, b).map_or(false, |r| r.has_legitimate_war_goal())
    }

    pub fn at_war(&self, a: &str, b: &str) -> bool {
        self.relation(a, b).map_or(false, |r| r.at_war())
    }

    /// Every pair currently at war
    pub fn wars(&self) -> impl Iterator<Item = &Relation> {
        self.relations.iter().filter(|r| r.at_war())
    }

    pub fn declare_war(&mut self, aggressor: &str, target: &str) -> Result<()> {
        let penalty = self.params.war_trust_penalty;
        let r = self.ensure_relation(aggressor, target)?;
        if r.at_war() {
            return Err(CivError::InvalidState(format!("{} and {} are already at war", aggressor, target)));
        }
        r.level = RelationLevel::War;
        r.set_trust(r.trust - penalty);
        info!("{} declares war on {}", aggressor, target);

        for t in self.treaties.iter_mut().filter(|t| t.covers(aggressor, target)) {
            if matches!(t.kind, TreatyKind::NonAggression | TreatyKind::Alliance | TreatyKind::DefensivePact) {
                t.active = false;
            }
        }
        Ok(())
    }

    /// Sign a treaty if every pair of signatories trusts each other enough
    pub fn propose_treaty(
        &mut self,
        kind: TreatyKind,
        signatories: &[&str],
        now: f64,
        duration: Option<f64>,
    ) -> Result<String> {
        let mut parties: Vec<&str> = signatories.to_vec();
        parties.sort_unstable();
        parties.dedup();
        if parties.len() < 2 {
            return Err(CivError::InvalidArgument("a treaty needs at least two signatories".into()));
        }

        let mut min_trust = 1.0f32;
        for (i, a) in parties.iter().enumerate() {
            for b in &parties[i + 1..] {
                min_trust = min_trust.min(self.ensure_relation(a, b)?.trust);
            }
        }
        if min_trust < self.params.accept_trust {
            debug!("{:?} treaty among {:?} rejected (trust {:.2})", kind, parties, min_trust);
            return Err(CivError::InvalidState("Treaty rejected due to low trust".into()));
        }

        if kind == TreatyKind::Peace {
            for (i, a) in parties.iter().enumerate() {
                for b in &parties[i + 1..] {
                    let r = self.ensure_relation(a, b)?;
                    if r.at_war() {
                        r.level = RelationLevel::from_trust(r.trust);
                        r.stance = Stance::derive(r.level, r.personality);
                        r.grievances = r.grievances.min(0.5);
                        r.casus_belli.clear();
                        info!("peace between {} and {}", a, b);
                    }
                }
            }
        }

        let id = self.fresh_id("T");
        self.treaties
            .try_reserve(1)
            .map_err(|e| CivError::OutOfMemory(e.to_string()))?;
        self.treaties.push(Treaty {
            id: id.clone(),
            kind,
            signatories: parties.iter().map(|s| s.to_string()).collect(),
            start: now,
            duration,
            active: true,
        });
        Ok(id)
    }

    pub fn active_treaties_between(&self, a: &str, b: &str) -> Vec<&Treaty> {
        self.treaties.iter().filter(|t| t.covers(a, b)).collect()
    }

    /// Nations sharing an active trade treaty with `nation`
    pub fn trade_partners(&self, nation: &str) -> Vec<String> {
        let mut partners: Vec<String> = self
            .treaties
            .iter()
            .filter(|t| t.active && t.kind == TreatyKind::Trade && t.binds(nation))
            .flat_map(|t| t.signatories.iter())
            .filter(|s| s.as_str() != nation)
            .cloned()
            .collect();
        partners.sort();
        partners.dedup();
        partners
    }

    pub fn create_organization(&mut self, name: &str, founders: &[&str]) -> Result<String> {
        if founders.is_empty() {
            return Err(CivError::InvalidArgument("an organization needs members".into()));
        }
        let id = self.fresh_id("O");
        let mut members: Vec<String> = founders.iter().map(|s| s.to_string()).collect();
        members.sort();
        members.dedup();
        self.organizations.push(Organization {
            id: id.clone(),
            name: name.to_string(),
            members,
            resolutions: Vec::new(),
            cohesion: 0.5,
        });
        Ok(id)
    }

    fn org_mut(&mut self, id: &str) -> Result<&mut Organization> {
        self.organizations
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| CivError::NotFound(format!("organization '{}'", id)))
    }

    pub fn join(&mut self, org: &str, nation: &str) -> Result<()> {
        let o = self.org_mut(org)?;
        if o.is_member(nation) {
            return Err(CivError::InvalidState(format!("{} is already a member of {}", nation, o.name)));
        }
        o.members.push(nation.to_string());
        Ok(())
    }

    pub fn propose_resolution(&mut self, org: &str, title: &str, kind: ResolutionKind) -> Result<String> {
        let id = self.fresh_id("R");
        let o = self.org_mut(org)?;
        o.resolutions.push(Resolution {
            id: id.clone(),
            title: title.to_string(),
            kind,
            votes: Default::default(),
            status: ResolutionStatus::Open,
        });
        Ok(id)
    }

    /// Returns the final status once the last member has voted
    pub fn vote(&mut self, org: &str, resolution: &str, member: &str, vote: Vote) -> Result<Option<ResolutionStatus>> {
        let o = self.org_mut(org)?;
        if !o.is_member(member) {
            return Err(CivError::InvalidArgument(format!("{} is not a member of {}", member, o.name)));
        }
        let r = o
            .resolutions
            .iter_mut()
            .find(|r| r.id == resolution)
            .ok_or_else(|| CivError::NotFound(format!("resolution '{}'", resolution)))?;
        if r.status != ResolutionStatus::Open {
            return Err(CivError::InvalidState(format!("resolution {} is closed", resolution)));
        }
        r.votes.insert(member.to_string(), vote);

        let Some(status) = o.try_close(resolution) else {
            return Ok(None);
        };
        if status == ResolutionStatus::Passed {
            let sanction_target = o.resolutions.iter().find(|r| r.id == resolution).and_then(|r| match &r.kind {
                ResolutionKind::Sanction { target } => Some(target.clone()),
                ResolutionKind::Declaration => None,
            });
            if let Some(target) = sanction_target {
                o.apply_sanction();
                let members = o.members.clone();
                let amount = self.params.sanction_grievance;
                for m in members.iter().filter(|m| **m != target) {
                    self.add_grievance(&target, m, amount)?;
                }
                info!("{} sanctioned by {}", target, org);
            }
        }
        Ok(Some(status))
    }

    pub fn remove_nation(&mut self, nation: &str) {
        self.relations.retain(|r| !r.involves(nation));
        for t in self.treaties.iter_mut().filter(|t| t.binds(nation)) {
            t.active = false;
        }
        for o in &mut self.organizations {
            o.members.retain(|m| m != nation);
        }
    }

    pub fn update(&mut self, dt: f32, now: f64) -> DiplomacyOutcome {
        let mut outcome = DiplomacyOutcome::default();
        let p = self.params.clone();

        for t in self.treaties.iter_mut().filter(|t| t.active) {
            if t.expired_at(now) {
                t.active = false;
                debug!("treaty {} ({:?}) expired", t.id, t.kind);
                outcome.expired_treaties.push(t.id.clone());
            }
        }

        for i in 0..self.relations.len() {
            let trade = self
                .treaties
                .iter()
                .filter(|t| t.kind == TreatyKind::Trade && t.covers(&self.relations[i].a, &self.relations[i].b))
                .count() as f32;

            let r = &mut self.relations[i];
            let before = r.level;
            let trust = approach(r.trust, 0.5, p.trust_drift * dt) + p.trade_trust_bonus * trade * dt;
            r.trust = clamp01(trust);

            let target = (r.trust - 0.5) * 200.0;
            r.opinion = (r.opinion + (target - r.opinion) * (p.opinion_drift * dt).min(1.0)).clamp(-100.0, 100.0);

            if !r.at_war() {
                if r.grievances >= p.war_grievance {
                    r.level = RelationLevel::War;
                    warn!("grievances between {} and {} boil over into war", r.a, r.b);
                    outcome.wars.push((r.a.clone(), r.b.clone()));
                } else {
                    r.grievances = (r.grievances - p.grievance_decay * dt).max(0.0);
                    r.level = RelationLevel::from_trust(r.trust);
                }
            }
            r.stance = Stance::derive(r.level, r.personality);
            if r.level != before {
                outcome.level_changes.push((r.a.clone(), r.b.clone(), r.level));
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorCode;

    #[test]
    fn test_treaty_accept_then_reject() {
        let mut d = DiplomacyManager::new(1, DiplomacyParams::default());
        d.set_trust("P", "Q", 0.5).unwrap();
        let id = d.propose_treaty(TreatyKind::Trade, &["P", "Q"], 0.0, None).unwrap();
        assert_eq!(d.treaty(&id).unwrap().signatory_count(), 2);

        d.set_trust("P", "Q", 0.2).unwrap();
        let err = d.propose_treaty(TreatyKind::Trade, &["P", "Q"], 0.0, None).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidState);
        assert_eq!(err.to_string(), "Treaty rejected due to low trust");
        assert_eq!(d.treaties().len(), 1);
    }

    #[test]
    fn test_single_signatory_rejected() {
        let mut d = DiplomacyManager::new(1, DiplomacyParams::default());
        let err = d.propose_treaty(TreatyKind::Alliance, &["P", "P"], 0.0, None).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_relation_stored_once() {
        let mut d = DiplomacyManager::new(1, DiplomacyParams::default());
        d.ensure_relation("P", "Q").unwrap();
        d.ensure_relation("Q", "P").unwrap();
        assert_eq!(d.relations().len(), 1);
    }

    #[test]
    fn test_trade_raises_trust() {
        let mut d = DiplomacyManager::new(1, DiplomacyParams::default());
        d.propose_treaty(TreatyKind::Trade, &["P", "Q"], 0.0, None).unwrap();
        d.update(1.0, 1.0);
        assert!((d.relation("P", "Q").unwrap().trust - 0.505).abs() < 1e-6);
        assert_eq!(d.trade_partners("P"), vec!["Q".to_string()]);
    }

    #[test]
    fn test_grievance_triggers_war_and_peace_ends_it() {
        let mut d = DiplomacyManager::new(1, DiplomacyParams::default());
        d.add_grievance("P", "Q", 1.2).unwrap();
        let out = d.update(1.0, 1.0);
        assert_eq!(out.wars.len(), 1);
        assert!(d.at_war("P", "Q"));

        d.propose_treaty(TreatyKind::Peace, &["Q", "P"], 2.0, None).unwrap();
        assert!(!d.at_war("P", "Q"));
    }

    #[test]
    fn test_grievance_exactly_at_threshold_starts_war() {
        let mut d = DiplomacyManager::new(1, DiplomacyParams::default());
        d.add_grievance("P", "Q", 1.0).unwrap();
        let out = d.update(1.0, 1.0);
        assert_eq!(out.wars, vec![("P".to_string(), "Q".to_string())]);
        assert!(d.at_war("P", "Q"));
    }

    #[test]
    fn test_grievance_below_threshold_decays() {
        let mut d = DiplomacyManager::new(1, DiplomacyParams::default());
        d.add_grievance("P", "Q", 0.5).unwrap();
        let out = d.update(1.0, 1.0);
        assert!(out.wars.is_empty());
        assert!(d.relation("P", "Q").unwrap().grievances < 0.5);
    }

    #[test]
    fn test_treaty_expires() {
        let mut d = DiplomacyManager::new(1, DiplomacyParams::default());
        let id = d.propose_treaty(TreatyKind::Research, &["P", "Q"], 0.0, Some(3.0)).unwrap();
        d.update(1.0, 2.0);
        assert!(d.treaty(&id).unwrap().active);
        let out = d.update(1.0, 3.0);
        assert_eq!(out.expired_treaties, vec![id.clone()]);
        assert!(!d.treaty(&id).unwrap().active);
    }

    #[test]
    fn test_sanction_adds_grievance() {
        let mut d = DiplomacyManager::new(1, DiplomacyParams::default());
        let org = d.create_organization("League", &["P", "Q"]).unwrap();
        let res = d
            .propose_resolution(&org, "Punish R", ResolutionKind::Sanction { target: "R".into() })
            .unwrap();
        assert_eq!(d.vote(&org, &res, "P", Vote::For).unwrap(), None);
        assert!(d.vote(&org, &res, "R", Vote::For).is_err());
        assert_eq!(d.vote(&org, &res, "Q", Vote::For).unwrap(), Some(ResolutionStatus::Passed));
        assert!((d.relation("R", "P").unwrap().grievances - 0.1).abs() < 1e-6);
        assert!((d.organization(&org).unwrap().cohesion - 0.475).abs() < 1e-6);
    }

    #[test]
    fn test_trust_stays_in_range() {
        let mut d = DiplomacyManager::new(1, DiplomacyParams::default());
        d.set_trust("P", "Q", 1.0).unwrap();
        for _ in 0..5 {
            d.propose_treaty(TreatyKind::Trade, &["P", "Q"], 0.0, None).unwrap();
        }
        for t in 0..500 {
            d.update(1.0, t as f64);
            let trust = d.relation("P", "Q").unwrap().trust;
            assert!((0.0..=1.0).contains(&trust));
        }
    }
}
