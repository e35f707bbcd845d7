//! Trait diffusion between identities
//!
//! Deltas are gathered against the identities as they stood at the start of
//! the pass and applied afterwards, so the result does not depend on the
//! order pairs are visited.

use std::collections::BTreeMap;

use crate::culture::identity::CulturalIdentity;
use crate::culture::CultureParams;

/// Strength a source trait needs before it can seed a new target trait
const SEED_THRESHOLD: f32 = 0.3;
const SEED_FRACTION: f32 = 0.1;

/// Per-trait rate of diffusion from `source` into `target`
pub fn diffusion_rate(
    params: &CultureParams,
    source_strength: f32,
    source: &CulturalIdentity,
    target: &CulturalIdentity,
) -> f32 {
    let target_resistance = 1.0 - target.cohesion;
    let d = (source.influence_radius - target.influence_radius).abs();
    params.base_rate
        * source_strength
        * (1.0 - target_resistance * params.resistance_factor)
        * (-params.distance_decay * d).exp()
}

#[derive(Default)]
struct Delta {
    raise: f32,
    seed: Option<f32>,
}

/// One diffusion pass over every ordered pair
pub fn diffuse(identities: &mut BTreeMap<String, CulturalIdentity>, params: &CultureParams, dt: f32) {
    let mut deltas: BTreeMap<(String, String), Delta> = BTreeMap::new();

    for source in identities.values() {
        for target in identities.values() {
            if source.id == target.id {
                continue;
            }
            for t in &source.traits {
                let rate = diffusion_rate(params, t.strength, source, target);
                let key = (target.id.clone(), t.name.clone());
                if target.trait_strength(&t.name).is_some() {
                    deltas.entry(key).or_default().raise += rate * dt;
                } else if t.strength > SEED_THRESHOLD {
                    let init = SEED_FRACTION * t.strength;
                    let delta = deltas.entry(key).or_default();
                    delta.seed = Some(delta.seed.map_or(init, |s: f32| s.max(init)));
                }
            }
        }
    }

    for ((target_id, name), delta) in deltas {
        let Some(target) = identities.get_mut(&target_id) else {
            continue;
        };
        if !target.raise_trait(&name, delta.raise) {
            if let Some(init) = delta.seed {
                target.set_trait(&name, init);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> BTreeMap<String, CulturalIdentity> {
        let mut m = BTreeMap::new();
        m.insert(
            "a".to_string(),
            CulturalIdentity::new("a", "A").with_trait("x", 0.9).with_trait("y", 0.5),
        );
        m.insert("b".to_string(), CulturalIdentity::new("b", "B").with_trait("x", 0.2));
        m
    }

    #[test]
    fn test_rate_formula() {
        let params = CultureParams::default();
        let a = CulturalIdentity::new("a", "A");
        let mut b = CulturalIdentity::new("b", "B");
        b.cohesion = 0.5;
        b.influence_radius = 3.0;
        let expected = 0.01 * 0.8 * (1.0 - 0.5 * 0.5) * (-0.1f32 * 2.0).exp();
        assert!((diffusion_rate(&params, 0.8, &a, &b) - expected).abs() < 1e-7);
    }

    #[test]
    fn test_matching_trait_rises_and_new_trait_seeds() {
        let mut ids = pair();
        diffuse(&mut ids, &CultureParams::default(), 1.0);
        let b = &ids["b"];
        assert!(b.trait_strength("x").unwrap() > 0.2);
        // 0.5 > 0.3 so `y` seeds at 10% of the source
        assert!((b.trait_strength("y").unwrap() - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_strengths_stay_in_unit_range() {
        let mut ids = pair();
        for _ in 0..5_000 {
            diffuse(&mut ids, &CultureParams::default(), 5.0);
        }
        for identity in ids.values() {
            for t in &identity.traits {
                assert!((0.0..=1.0).contains(&t.strength));
            }
        }
    }
}
