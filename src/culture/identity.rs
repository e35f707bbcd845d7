//! Cultural identities as bags of named traits

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::types::clamp01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CulturalTrait {
    pub name: String,
    /// Always in [0, 1]
    pub strength: f32,
    pub influence: f32,
}

impl CulturalTrait {
    pub fn new(name: &str, strength: f32) -> Self {
        Self {
            name: name.to_string(),
            strength: clamp01(strength),
            influence: 1.0,
        }
    }
}

/// Trait names new identities draw from
pub const TRAIT_POOL: &[&str] = &[
    "ancestor_veneration",
    "martial_honor",
    "mercantile",
    "seafaring",
    "oral_tradition",
    "monumental_building",
    "hospitality",
    "asceticism",
    "egalitarian",
    "hierarchical",
    "pastoral",
    "scholarly",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CulturalIdentity {
    pub id: String,
    pub name: String,
    /// Ordered; order is insertion order and stays stable
    pub traits: Vec<CulturalTrait>,
    pub cohesion: f32,
    pub distinctiveness: f32,
    pub influence_radius: f32,
    pub parent_id: Option<String>,
}

impl CulturalIdentity {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            traits: Vec::new(),
            cohesion: 0.5,
            distinctiveness: 1.0,
            influence_radius: 5.0,
            parent_id: None,
        }
    }

    pub fn with_trait(mut self, name: &str, strength: f32) -> Self {
        self.set_trait(name, strength);
        self
    }

    /// A random bag of three to five traits
    pub fn random<R: Rng>(id: &str, name: &str, rng: &mut R) -> Self {
        let mut identity = Self::new(id, name);
        let count = rng.gen_range(3..=5);
        while identity.traits.len() < count {
            let t = TRAIT_POOL[rng.gen_range(0..TRAIT_POOL.len())];
            if identity.trait_strength(t).is_none() {
                identity.set_trait(t, rng.gen_range(0.2..0.9));
            }
        }
        identity.cohesion = rng.gen_range(0.3..0.7);
        identity.influence_radius = rng.gen_range(3.0..8.0);
        identity
    }

    pub fn trait_strength(&self, name: &str) -> Option<f32> {
        self.traits.iter().find(|t| t.name == name).map(|t| t.strength)
    }

    /// Set or insert a trait, clamping to [0, 1]
    pub fn set_trait(&mut self, name: &str, strength: f32) {
        match self.traits.iter_mut().find(|t| t.name == name) {
            Some(t) => t.strength = clamp01(strength),
            None => self.traits.push(CulturalTrait::new(name, strength)),
        }
    }

    /// Raise a trait by `amount` (clamped); returns false if absent
    pub fn raise_trait(&mut self, name: &str, amount: f32) -> bool {
        match self.traits.iter_mut().find(|t| t.name == name) {
            Some(t) => {
                t.strength = clamp01(t.strength + amount);
                true
            }
            None => false,
        }
    }
}

/// Mean of `1 - |a - b|` over traits both identities carry; 0 if none
pub fn similarity(a: &CulturalIdentity, b: &CulturalIdentity) -> f32 {
    let mut sum = 0.0;
    let mut n = 0;
    for ta in &a.traits {
        if let Some(sb) = b.trait_strength(&ta.name) {
            sum += 1.0 - (ta.strength - sb).abs();
            n += 1;
        }
    }
    if n == 0 {
        0.0
    } else {
        sum / n as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_matching_traits() {
        let a = CulturalIdentity::new("a", "A").with_trait("x", 0.8).with_trait("y", 0.2);
        let b = CulturalIdentity::new("b", "B").with_trait("x", 0.6).with_trait("z", 0.9);
        assert!((similarity(&a, &b) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_no_overlap_is_zero() {
        let a = CulturalIdentity::new("a", "A").with_trait("x", 0.8);
        let b = CulturalIdentity::new("b", "B").with_trait("y", 0.8);
        assert_eq!(similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_traits_are_clamped() {
        let mut a = CulturalIdentity::new("a", "A").with_trait("x", 1.7);
        assert_eq!(a.trait_strength("x"), Some(1.0));
        a.raise_trait("x", -3.0);
        assert_eq!(a.trait_strength("x"), Some(0.0));
        assert!(!a.raise_trait("missing", 0.1));
    }
}
