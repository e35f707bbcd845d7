//! Conquests: timed takeovers of a settlement

use serde::{Deserialize, Serialize};

use crate::culture::AssimilationKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConquestKind {
    Raid,
    Invasion,
    Siege,
    Annexation,
}

impl ConquestKind {
    /// Share of the settlement's accumulated culture carried off
    pub fn plunder_factor(&self) -> f64 {
        match self {
            Self::Raid => 1.5,
            Self::Invasion => 1.2,
            Self::Siege => 0.8,
            Self::Annexation => 0.5,
        }
    }

    pub fn assimilation(&self) -> AssimilationKind {
        match self {
            Self::Invasion | Self::Annexation => AssimilationKind::Forced,
            Self::Raid | Self::Siege => AssimilationKind::Voluntary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conquest {
    pub id: String,
    /// Attacking nation
    pub attacker: String,
    pub settlement_id: String,
    pub kind: ConquestKind,
    pub progress: f32,
    pub duration: f32,
    pub started_at: f64,
}

impl Conquest {
    /// Returns true once complete
    pub fn advance(&mut self, dt: f32) -> bool {
        self.progress = (self.progress + dt / self.duration).min(1.0);
        self.progress >= 1.0
    }
}

/// A finished conquest for the simulation to route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConquestResult {
    pub conquest_id: String,
    pub attacker: String,
    pub settlement_id: String,
    pub former_region: String,
    pub kind: ConquestKind,
    pub plunder: f64,
    pub assimilation: AssimilationKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assimilation_kind() {
        assert_eq!(ConquestKind::Invasion.assimilation(), AssimilationKind::Forced);
        assert_eq!(ConquestKind::Annexation.assimilation(), AssimilationKind::Forced);
        assert_eq!(ConquestKind::Raid.assimilation(), AssimilationKind::Voluntary);
        assert_eq!(ConquestKind::Siege.assimilation(), AssimilationKind::Voluntary);
    }

    #[test]
    fn test_progress() {
        let mut c = Conquest {
            id: "C1".into(),
            attacker: "N".into(),
            settlement_id: "S0001".into(),
            kind: ConquestKind::Siege,
            progress: 0.0,
            duration: 4.0,
            started_at: 0.0,
        };
        assert!(!c.advance(1.0));
        assert!(!c.advance(2.0));
        assert!(c.advance(1.0));
        assert_eq!(c.progress, 1.0);
    }
}
