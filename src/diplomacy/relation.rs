//! Pairwise diplomatic relations

use serde::{Deserialize, Serialize};

use crate::core::types::clamp01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelationLevel {
    War,
    Hostile,
    Neutral,
    Friendly,
    Allied,
}

impl RelationLevel {
    /// Peacetime level implied by trust. War is never derived from trust.
    pub fn from_trust(trust: f32) -> Self {
        if trust < 0.3 {
            RelationLevel::Hostile
        } else if trust < 0.4 {
            RelationLevel::Neutral
        } else if trust < 0.7 {
            RelationLevel::Friendly
        } else {
            RelationLevel::Allied
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Personality {
    Pacifist,
    Pragmatic,
    Opportunist,
    Belligerent,
}

impl Personality {
    pub const ALL: [Personality; 4] = [
        Personality::Pacifist,
        Personality::Pragmatic,
        Personality::Opportunist,
        Personality::Belligerent,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stance {
    Cooperative,
    Neutral,
    Guarded,
    Aggressive,
}

impl Stance {
    pub fn derive(level: RelationLevel, personality: Personality) -> Self {
        use Personality::*;
        match (level, personality) {
            (RelationLevel::War, _) => Stance::Aggressive,
            (RelationLevel::Hostile, Opportunist | Belligerent) => Stance::Aggressive,
            (RelationLevel::Hostile, _) => Stance::Guarded,
            (RelationLevel::Neutral, Pacifist) => Stance::Cooperative,
            (RelationLevel::Neutral, Belligerent) => Stance::Guarded,
            (RelationLevel::Neutral, _) => Stance::Neutral,
            (RelationLevel::Friendly | RelationLevel::Allied, Belligerent) => Stance::Neutral,
            (RelationLevel::Friendly | RelationLevel::Allied, _) => Stance::Cooperative,
        }
    }
}

/// Order a pair so each relation is stored once
pub fn pair_key<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Always `a < b`
    pub a: String,
    pub b: String,
    pub trust: f32,
    /// -100..=100
    pub opinion: f32,
    pub level: RelationLevel,
    pub stance: Stance,
    pub personality: Personality,
    pub grievances: f32,
    pub casus_belli: String,
}

impl Relation {
    pub fn new(a: &str, b: &str, personality: Personality) -> Self {
        let (a, b) = pair_key(a, b);
        let level = RelationLevel::from_trust(0.5);
        Self {
            a: a.to_string(),
            b: b.to_string(),
            trust: 0.5,
            opinion: 0.0,
            level,
            stance: Stance::derive(level, personality),
            personality,
            grievances: 0.0,
            casus_belli: String::new(),
        }
    }

    pub fn involves(&self, nation: &str) -> bool {
        self.a == nation || self.b == nation
    }

    pub fn is(&self, a: &str, b: &str) -> bool {
        let (a, b) = pair_key(a, b);
        self.a == a && self.b == b
    }

    pub fn other(&self, nation: &str) -> &str {
        if self.a == nation {
            &self.b
        } else {
            &self.a
        }
    }

    pub fn at_war(&self) -> bool {
        self.level == RelationLevel::War
    }

    pub fn set_trust(&mut self, trust: f32) {
        self.trust = clamp01(trust);
        if !self.at_war() {
            self.level = RelationLevel::from_trust(self.trust);
        }
        self.stance = Stance::derive(self.level, self.personality);
    }

    pub fn has_legitimate_war_goal(&self) -> bool {
        self.grievances > 1.0 || !self.casus_belli.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_thresholds() {
        assert_eq!(RelationLevel::from_trust(0.29), RelationLevel::Hostile);
        assert_eq!(RelationLevel::from_trust(0.3), RelationLevel::Neutral);
        assert_eq!(RelationLevel::from_trust(0.5), RelationLevel::Friendly);
        assert_eq!(RelationLevel::from_trust(0.7), RelationLevel::Allied);
    }

    #[test]
    fn test_keys_are_normalized() {
        let r = Relation::new("Q", "P", Personality::Pragmatic);
        assert_eq!((r.a.as_str(), r.b.as_str()), ("P", "Q"));
        assert!(r.is("Q", "P"));
        assert_eq!(r.other("Q"), "P");
    }

    #[test]
    fn test_war_goal() {
        let mut r = Relation::new("P", "Q", Personality::Pacifist);
        assert!(!r.has_legitimate_war_goal());
        r.grievances = 1.0;
        assert!(!r.has_legitimate_war_goal());
        r.grievances = 1.01;
        assert!(r.has_legitimate_war_goal());
        r.grievances = 0.0;
        r.casus_belli = "border raids".into();
        assert!(r.has_legitimate_war_goal());
    }

    #[test]
    fn test_war_survives_trust_change() {
        let mut r = Relation::new("P", "Q", Personality::Belligerent);
        r.level = RelationLevel::War;
        r.set_trust(0.9);
        assert_eq!(r.level, RelationLevel::War);
        assert_eq!(r.stance, Stance::Aggressive);
    }
}
