//! Governance - emergent governments driven by continuous traits
//!
//! No government types are predefined. Each nation's government is a bag of
//! traits that drift under their own pressures; the name, stature tier and
//! behaviour all derive from those traits.

pub mod government;
pub mod legislature;
pub mod naming;

use std::collections::BTreeMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::error::{CivError, Result};
use crate::core::rng::{stream_rng, RngStream};
use crate::core::types::{approach, clamp01};
use crate::economy::EconomyManager;

pub use government::{
    GovFunction, GovTraits, Government, Institution, NationalIdentity, Reform, Role, StatureTier, Subdivision,
};
pub use legislature::{enact, Bill, BillStatus, Constitution, LegislativeBody, Rule, VotingMethod};
pub use naming::government_name;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceParams {
    pub stability_target: f32,
    pub stability_rate: f32,
    /// Immediate stability loss from a reform
    pub reform_shock: f32,
    pub crisis_threshold: f32,
    /// Institution upkeep is `institution_cost * stature^1.2`
    pub institution_cost: f32,
    /// Share of GDP budgeted for institutions
    pub budget_share: f32,
    pub min_budget: f32,
    pub dissolve_rate: f32,
    pub legitimacy_rate: f32,
}

impl Default for GovernanceParams {
    fn default() -> Self {
        Self {
            stability_target: 0.7,
            stability_rate: 0.02,
            reform_shock: 0.15,
            crisis_threshold: 0.8,
            institution_cost: 0.05,
            budget_share: 0.05,
            min_budget: 1.0,
            dissolve_rate: 0.1,
            legitimacy_rate: 0.01,
        }
    }
}

const MIN_STATURE: f32 = 0.1;

/// Notable governance changes this tick
#[derive(Debug, Clone, Default)]
pub struct GovernanceOutcome {
    pub tier_changes: Vec<(String, StatureTier)>,
    pub crises: Vec<String>,
    /// (government, bill id, passed)
    pub bills_resolved: Vec<(String, String, bool)>,
    pub renamed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceManager {
    governments: BTreeMap<String, Government>,
    params: GovernanceParams,
    rng: ChaCha8Rng,
    next_id: u64,
}

impl GovernanceManager {
    pub fn new(seed: u64, params: GovernanceParams) -> Self {
        Self {
            governments: BTreeMap::new(),
            params,
            rng: stream_rng(seed, RngStream::Governance),
            next_id: 1,
        }
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        let id = format!("{}{}", prefix, self.next_id);
        self.next_id += 1;
        id
    }

    fn gov_mut(&mut self, id: &str) -> Result<&mut Government> {
        self.governments
            .get_mut(id)
            .ok_or_else(|| CivError::NotFound(format!("government '{}'", id)))
    }

    pub fn government(&self, id: &str) -> Option<&Government> {
        self.governments.get(id)
    }

    pub fn government_mut(&mut self, id: &str) -> Option<&mut Government> {
        self.governments.get_mut(id)
    }

    pub fn governments(&self) -> impl Iterator<Item = &Government> {
        self.governments.values()
    }

    pub fn stature_tier(&self, id: &str) -> Option<StatureTier> {
        self.governments.get(id).map(|g| g.stature_tier)
    }

    pub fn national_identity(&self, id: &str) -> Option<&NationalIdentity> {
        self.governments.get(id).map(|g| &g.identity)
    }

    /// (stability, legitimacy); a missing government reads as neutral
    pub fn standing(&self, id: &str) -> (f32, f32) {
        self.governments
            .get(id)
            .map_or((0.5, 0.5), |g| (g.traits.stability, g.traits.legitimacy))
    }

    /// Found a government with slightly randomised starting traits
    pub fn create_government(&mut self, id: &str, nation_name: &str, identity: NationalIdentity) -> Result<()> {
        if self.governments.contains_key(id) {
            return Err(CivError::InvalidState(format!("duplicate government '{}'", id)));
        }
        let mut g = Government::new(id, nation_name, identity);
        g.traits.centralization = self.rng.gen_range(0.2..0.8);
        g.traits.democracy = self.rng.gen_range(0.0..0.6);
        g.name = government_name(
            nation_name,
            g.traits.centralization,
            g.traits.democracy,
            g.traits.corruption,
            g.traits.stability,
        );
        info!("{} founded", g.name);
        self.governments.insert(id.to_string(), g);
        Ok(())
    }

    pub fn remove_government(&mut self, id: &str) -> Result<Government> {
        self.governments
            .remove(id)
            .ok_or_else(|| CivError::NotFound(format!("government '{}'", id)))
    }

    /// Shift traits at the cost of an immediate stability hit
    pub fn reform(&mut self, id: &str, reform: &Reform) -> Result<()> {
        let shock = self.params.reform_shock;
        let g = self.gov_mut(id)?;
        if let Some(c) = reform.centralization {
            g.traits.centralization = clamp01(c);
        }
        if let Some(d) = reform.democracy {
            g.traits.democracy = clamp01(d);
        }
        g.traits.stability = clamp01(g.traits.stability - shock);
        g.reforms += 1;
        info!("{} reforms (reform #{})", g.name, g.reforms);
        Ok(())
    }

    pub fn add_role(&mut self, id: &str, function: GovFunction, role: Role) -> Result<()> {
        if !(0.0..=1.0).contains(&role.authority) || !(0.0..=1.0).contains(&role.responsibility) {
            return Err(CivError::InvalidArgument(
                "role authority and responsibility must be in [0, 1]".into(),
            ));
        }
        self.gov_mut(id)?.roles.insert(function, role);
        Ok(())
    }

    pub fn add_institution(&mut self, id: &str, name: &str, function: GovFunction) -> Result<String> {
        let inst_id = self.fresh_id("I");
        let g = self.gov_mut(id)?;
        g.institutions.push(Institution {
            id: inst_id.clone(),
            name: name.to_string(),
            function,
            stature: 1.0,
            active: true,
            dissolving: false,
        });
        Ok(inst_id)
    }

    /// Start winding an institution down
    pub fn dissolve_institution(&mut self, id: &str, institution: &str) -> Result<()> {
        let g = self.gov_mut(id)?;
        let inst = g
            .institutions
            .iter_mut()
            .find(|i| i.id == institution)
            .ok_or_else(|| CivError::NotFound(format!("institution '{}'", institution)))?;
        if !inst.active || inst.dissolving {
            return Err(CivError::InvalidState(format!("{} is already dissolving", institution)));
        }
        inst.dissolving = true;
        Ok(())
    }

    pub fn add_subdivision(&mut self, id: &str, name: &str, autonomy: f32, settlement_ids: Vec<String>) -> Result<String> {
        let sub_id = self.fresh_id("D");
        let g = self.gov_mut(id)?;
        g.subdivisions.push(Subdivision {
            id: sub_id.clone(),
            name: name.to_string(),
            autonomy: clamp01(autonomy),
            settlement_ids,
        });
        Ok(sub_id)
    }

    pub fn add_legislature(&mut self, id: &str, name: &str, seats: u32, method: VotingMethod) -> Result<String> {
        if seats == 0 {
            return Err(CivError::InvalidArgument("a legislature needs at least one seat".into()));
        }
        let body_id = self.fresh_id("L");
        self.gov_mut(id)?
            .legislatures
            .push(LegislativeBody::new(&body_id, name, seats, method));
        Ok(body_id)
    }

    pub fn set_constitution(&mut self, id: &str, constitution: Constitution) -> Result<()> {
        self.gov_mut(id)?.constitution = Some(constitution);
        Ok(())
    }

    pub fn propose_bill(&mut self, id: &str, body: &str, title: &str, rule: Rule, repeal: bool, now: f64) -> Result<String> {
        let bill_id = self.fresh_id("B");
        let g = self.gov_mut(id)?;
        if repeal && !g.constitution.as_ref().map_or(false, |c| c.has_rule(&rule.id)) {
            return Err(CivError::NotFound(format!("no rule '{}' to repeal", rule.id)));
        }
        let body = g
            .legislature_mut(body)
            .ok_or_else(|| CivError::NotFound(format!("legislature '{}'", body)))?;
        body.bills.push(Bill {
            id: bill_id.clone(),
            title: title.to_string(),
            rule,
            repeal,
            votes: Vec::new(),
            status: BillStatus::Pending,
            proposed_at: now,
        });
        Ok(bill_id)
    }

    /// Record a seat's vote; returns the final status once every seat has voted
    pub fn cast_vote(&mut self, id: &str, body: &str, bill: &str, seat: u32, yes: bool) -> Result<Option<BillStatus>> {
        let g = self.gov_mut(id)?;
        let legislature = g
            .legislatures
            .iter_mut()
            .find(|l| l.id == body)
            .ok_or_else(|| CivError::NotFound(format!("legislature '{}'", body)))?;
        if seat >= legislature.seats {
            return Err(CivError::InvalidArgument(format!("seat {} out of range", seat)));
        }
        let b = legislature
            .bills
            .iter_mut()
            .find(|b| b.id == bill)
            .ok_or_else(|| CivError::NotFound(format!("pending bill '{}'", bill)))?;
        if b.has_voted(seat) {
            return Err(CivError::InvalidState(format!("seat {} already voted on {}", seat, bill)));
        }
        b.votes.push((seat, yes));

        let Some(resolved) = legislature.try_resolve(bill) else {
            return Ok(None);
        };
        let constitution = g.constitution.get_or_insert_with(Constitution::default);
        enact(constitution, &resolved);
        Ok(Some(resolved.status))
    }

    pub fn update(&mut self, dt: f32, economy: &EconomyManager) -> GovernanceOutcome {
        let mut outcome = GovernanceOutcome::default();
        let p = self.params.clone();

        for g in self.governments.values_mut() {
            step_traits(g, &p, dt, &mut outcome);

            let budget = (p.budget_share * economy.gdp(&g.id)).max(p.min_budget);
            step_institutions(g, &p, budget, dt);

            auto_vote(g, &mut self.rng, &mut outcome);

            g.nci = g.nci();
            let tier = StatureTier::from_nci(g.nci);
            if tier != g.stature_tier {
                debug!("{} stature {:?} -> {:?}", g.id, g.stature_tier, tier);
                g.stature_tier = tier;
                outcome.tier_changes.push((g.id.clone(), tier));
            }

            let t = &g.traits;
            let name = government_name(&g.nation_name, t.centralization, t.democracy, t.corruption, t.stability);
            if name != g.name {
                info!("{} is now the {}", g.name, name);
                outcome.renamed.push((g.id.clone(), name.clone()));
                g.name = name;
            }
        }
        outcome
    }
}

fn step_traits(g: &mut Government, p: &GovernanceParams, dt: f32, outcome: &mut GovernanceOutcome) {
    let role_eff = g.role_efficiency();
    let t = &mut g.traits;

    let autocracy_drag = if t.democracy < 0.3 { 0.8 } else { 1.0 };
    t.efficiency = clamp01(t.centralization * autocracy_drag * 0.5 + role_eff * 0.5);

    t.stability = approach(t.stability, p.stability_target, p.stability_rate * dt);
    if t.efficiency < 0.3 {
        t.stability -= 0.05 * dt;
    }

    if t.democracy < 0.5 {
        t.corruption += 0.01 * t.centralization * dt;
    }
    if t.stability < 0.4 {
        t.corruption += 0.01 * (0.4 - t.stability) * dt;
    }
    if t.democracy > 0.7 {
        t.corruption -= 0.02 * dt;
    }

    if t.efficiency < 0.4 || t.corruption > 0.6 {
        t.political_tension += 0.02 * dt;
    } else {
        t.political_tension -= 0.01 * dt;
    }

    let legitimacy_target = 0.5 * t.stability + 0.3 * (1.0 - t.corruption) + 0.2 * t.democracy;
    t.legitimacy = approach(t.legitimacy, legitimacy_target, p.legitimacy_rate * dt);

    if t.political_tension > p.crisis_threshold {
        // Crisis pushes the state toward whichever extreme it leans to
        if t.centralization >= 0.5 {
            t.centralization += 0.1;
        } else {
            t.centralization -= 0.1;
        }
        t.political_tension -= 0.1;
        t.stability -= 0.1;
        warn!("{} is in crisis", g.id);
        outcome.crises.push(g.id.clone());
    }
    g.traits.clamp();
}

fn step_institutions(g: &mut Government, p: &GovernanceParams, budget: f32, dt: f32) {
    let efficiency = g.traits.efficiency;
    let active = g.active_institutions().count();
    if active == 0 {
        return;
    }
    let share = budget / active as f32;
    for inst in g.institutions.iter_mut().filter(|i| i.active) {
        if inst.dissolving {
            inst.stature -= p.dissolve_rate * dt;
            if inst.stature <= MIN_STATURE {
                inst.stature = MIN_STATURE;
                inst.active = false;
                inst.dissolving = false;
                info!("institution {} of {} dissolved", inst.name, g.id);
            }
            continue;
        }
        let cost = p.institution_cost * inst.stature.powf(1.2);
        inst.stature = (inst.stature + (share - cost) * efficiency * 0.01 * dt).max(MIN_STATURE);
    }
}

/// Seats vote on pending bills; yes odds rise with legitimacy and democracy
fn auto_vote(g: &mut Government, rng: &mut ChaCha8Rng, outcome: &mut GovernanceOutcome) {
    let t = &g.traits;
    let yes_odds = clamp01(0.3 + 0.4 * t.legitimacy + 0.3 * t.democracy - 0.3 * t.political_tension);

    let mut resolved = Vec::new();
    for body in g.legislatures.iter_mut() {
        let pending: Vec<String> = body.bills.iter().map(|b| b.id.clone()).collect();
        for bill_id in pending {
            let seats = body.seats;
            if let Some(bill) = body.bills.iter_mut().find(|b| b.id == bill_id) {
                for seat in 0..seats {
                    if !bill.has_voted(seat) {
                        bill.votes.push((seat, rng.gen::<f32>() < yes_odds));
                    }
                }
            }
            if let Some(b) = body.try_resolve(&bill_id) {
                resolved.push(b);
            }
        }
    }

    for bill in resolved {
        let constitution = g.constitution.get_or_insert_with(Constitution::default);
        enact(constitution, &bill);
        outcome
            .bills_resolved
            .push((g.id.clone(), bill.id.clone(), bill.status == BillStatus::Passed));
    }
}
