//! Treaties and international organizations

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TreatyKind {
    Trade,
    NonAggression,
    Alliance,
    Peace,
    DefensivePact,
    Research,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treaty {
    pub id: String,
    pub kind: TreatyKind,
    pub signatories: Vec<String>,
    pub start: f64,
    /// `None` never expires
    pub duration: Option<f64>,
    pub active: bool,
}

impl Treaty {
    pub fn signatory_count(&self) -> usize {
        self.signatories.len()
    }

    pub fn binds(&self, nation: &str) -> bool {
        self.signatories.iter().any(|s| s == nation)
    }

    /// Active and signed by both nations
    pub fn covers(&self, a: &str, b: &str) -> bool {
        self.active && self.binds(a) && self.binds(b)
    }

    pub fn expired_at(&self, now: f64) -> bool {
        self.duration.map_or(false, |d| now - self.start >= d)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vote {
    For,
    Against,
    Abstain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionKind {
    Declaration,
    Sanction { target: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionStatus {
    Open,
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub id: String,
    pub title: String,
    pub kind: ResolutionKind,
    pub votes: BTreeMap<String, Vote>,
    pub status: ResolutionStatus,
}

impl Resolution {
    pub fn tally(&self) -> (usize, usize, usize) {
        self.votes.values().fold((0, 0, 0), |(f, a, ab), v| match v {
            Vote::For => (f + 1, a, ab),
            Vote::Against => (f, a + 1, ab),
            Vote::Abstain => (f, a, ab + 1),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub members: Vec<String>,
    pub resolutions: Vec<Resolution>,
    pub cohesion: f32,
}

impl Organization {
    pub fn is_member(&self, nation: &str) -> bool {
        self.members.iter().any(|m| m == nation)
    }

    /// Close a resolution once every member has voted; passes iff for > against
    pub fn try_close(&mut self, resolution: &str) -> Option<ResolutionStatus> {
        let members = self.members.len();
        let r = self.resolutions.iter_mut().find(|r| r.id == resolution)?;
        if r.status != ResolutionStatus::Open || r.votes.len() < members {
            return None;
        }
        let (yes, no, _) = r.tally();
        r.status = if yes > no {
            ResolutionStatus::Passed
        } else {
            ResolutionStatus::Failed
        };
        Some(r.status)
    }

    pub fn apply_sanction(&mut self) {
        self.cohesion = (self.cohesion - 0.05 * (1.0 - self.cohesion)).clamp(0.0, 1.0);
    }
}
