//! Legislative bodies, bills and constitutions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VotingMethod {
    Majority,
    Supermajority,
    Unanimous,
    /// The first vote cast decides
    LeaderDecides,
}

impl VotingMethod {
    /// Share of votes that yes-votes must exceed
    pub fn threshold(&self) -> f32 {
        match self {
            VotingMethod::Majority => 0.5,
            VotingMethod::Supermajority => 0.66,
            VotingMethod::Unanimous => 1.0,
            VotingMethod::LeaderDecides => 0.0,
        }
    }

    pub fn passes(&self, votes: &[(u32, bool)]) -> bool {
        let total = votes.len();
        let yes = votes.iter().filter(|(_, v)| *v).count();
        match self {
            VotingMethod::Unanimous => total > 0 && yes == total,
            VotingMethod::LeaderDecides => votes.first().map_or(false, |(_, v)| *v),
            _ => yes as f32 > self.threshold() * total as f32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub text: String,
}

impl Rule {
    pub fn new(id: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constitution {
    pub rules: Vec<Rule>,
    /// Bumped on every amendment
    pub revision: u32,
}

impl Constitution {
    pub fn has_rule(&self, id: &str) -> bool {
        self.rules.iter().any(|r| r.id == id)
    }

    pub fn amend(&mut self, rule: Rule) {
        match self.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
        self.revision += 1;
    }

    pub fn repeal(&mut self, id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.id != id);
        let removed = self.rules.len() != before;
        if removed {
            self.revision += 1;
        }
        removed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillStatus {
    Pending,
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    pub title: String,
    pub rule: Rule,
    pub repeal: bool,
    /// (seat, yes)
    pub votes: Vec<(u32, bool)>,
    pub status: BillStatus,
    pub proposed_at: f64,
}

impl Bill {
    pub fn has_voted(&self, seat: u32) -> bool {
        self.votes.iter().any(|(s, _)| *s == seat)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegislativeBody {
    pub id: String,
    pub name: String,
    pub seats: u32,
    pub method: VotingMethod,
    pub bills: Vec<Bill>,
    /// Resolved bills, oldest first
    pub history: Vec<Bill>,
}

impl LegislativeBody {
    pub fn new(id: &str, name: &str, seats: u32, method: VotingMethod) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            seats,
            method,
            bills: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn bill(&self, id: &str) -> Option<&Bill> {
        self.bills.iter().chain(self.history.iter()).find(|b| b.id == id)
    }

    /// Settle a bill once every seat has voted; returns the resolved bill
    pub fn try_resolve(&mut self, bill_id: &str) -> Option<Bill> {
        let i = self.bills.iter().position(|b| b.id == bill_id)?;
        if self.bills[i].votes.len() < self.seats as usize {
            return None;
        }
        let mut bill = self.bills.remove(i);
        bill.status = if self.method.passes(&bill.votes) {
            BillStatus::Passed
        } else {
            BillStatus::Failed
        };
        self.history.push(bill.clone());
        Some(bill)
    }
}

/// Apply a resolved bill to a constitution
pub fn enact(constitution: &mut Constitution, bill: &Bill) {
    if bill.status != BillStatus::Passed {
        return;
    }
    if bill.repeal {
        constitution.repeal(&bill.rule.id);
    } else {
        constitution.amend(bill.rule.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn votes(v: &[bool]) -> Vec<(u32, bool)> {
        v.iter().enumerate().map(|(i, b)| (i as u32, *b)).collect()
    }

    #[test]
    fn test_majority_must_exceed_half() {
        assert!(!VotingMethod::Majority.passes(&votes(&[true, false])));
        assert!(VotingMethod::Majority.passes(&votes(&[true, true, false])));
    }

    #[test]
    fn test_supermajority() {
        assert!(!VotingMethod::Supermajority.passes(&votes(&[true, true, true, false, false])));
        assert!(VotingMethod::Supermajority.passes(&votes(&[true, true, true, true, false])));
    }

    #[test]
    fn test_unanimous_and_leader() {
        assert!(VotingMethod::Unanimous.passes(&votes(&[true, true])));
        assert!(!VotingMethod::Unanimous.passes(&votes(&[true, false])));
        assert!(VotingMethod::LeaderDecides.passes(&votes(&[true, false, false])));
        assert!(!VotingMethod::LeaderDecides.passes(&votes(&[false, true, true])));
    }

    #[test]
    fn test_enact_and_repeal() {
        let mut c = Constitution::default();
        let mut bill = Bill {
            id: "B1".into(),
            title: "Free speech".into(),
            rule: Rule::new("speech", "Speech is free"),
            repeal: false,
            votes: Vec::new(),
            status: BillStatus::Passed,
            proposed_at: 0.0,
        };
        enact(&mut c, &bill);
        assert!(c.has_rule("speech"));
        bill.repeal = true;
        enact(&mut c, &bill);
        assert!(!c.has_rule("speech"));
        assert_eq!(c.revision, 2);
    }
}
