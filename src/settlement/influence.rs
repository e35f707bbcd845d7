//! Tile influence pass
//!
//! Every settlement projects `culture_yield / (dist * resistance + 1)` over
//! the tiles within its territory radius. Unowned tiles are claimed above
//! the claim threshold; tiles held by another settlement flip only when the
//! newcomer beats `flip_ratio` times the holder's influence.

use ahash::AHashMap;
use tracing::warn;

use crate::settlement::settlement::Settlement;
use crate::world::WorldMap;

/// Tiles touched by one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InfluenceReport {
    pub claimed: u32,
    pub flipped: u32,
    pub refreshed: u32,
}

/// Influence of a source with `culture_yield` over distance `dist`
pub fn influence_at(culture_yield: u32, dist: f32, resistance: f32) -> f32 {
    culture_yield as f32 / (dist * resistance + 1.0)
}

enum Claim {
    Take,
    Flip(String),
    Refresh,
    Skip,
}

fn decide(owner: &str, current: f32, me: &str, influence: f32, claim_threshold: f32, flip_ratio: f32) -> Claim {
    if owner.is_empty() {
        if influence > claim_threshold {
            Claim::Take
        } else {
            Claim::Skip
        }
    } else if owner == me {
        Claim::Refresh
    } else if influence > flip_ratio * current {
        Claim::Flip(owner.to_string())
    } else {
        Claim::Skip
    }
}

/// Run the pass over `settlements` in storage order
pub fn run_influence_pass(
    settlements: &mut [Settlement],
    index: &AHashMap<String, usize>,
    world: &mut WorldMap,
    claim_threshold: f32,
    flip_ratio: f32,
) -> InfluenceReport {
    let mut report = InfluenceReport::default();
    let height = world.height() as i32;

    for i in 0..settlements.len() {
        let center = settlements[i].position.to_grid();
        let radius = settlements[i].territory_radius as i32;
        let yield_ = settlements[i].culture_yield;
        let id = settlements[i].id.clone();

        for dy in -radius..=radius {
            let y = center.y + dy;
            // Rows past the poles are not part of the map
            if y < 0 || y >= height {
                continue;
            }
            for dx in -radius..=radius {
                let dist = ((dx * dx + dy * dy) as f32).sqrt();
                if dist > radius as f32 {
                    continue;
                }
                let x = world.wrap_x(center.x + dx);
                let Some(tile) = world.tile(x, y) else {
                    continue;
                };

                let influence = influence_at(yield_, dist, tile.terrain_resistance());
                let decision = decide(
                    &tile.owner_id,
                    tile.cultural_influence,
                    &id,
                    influence,
                    claim_threshold,
                    flip_ratio,
                );

                let result = match &decision {
                    Claim::Take | Claim::Flip(_) => world.claim_tile(x, y, &id, influence),
                    Claim::Refresh => world.refresh_influence(x, y, influence),
                    Claim::Skip => Ok(()),
                };
                if let Err(e) = result {
                    warn!("influence pass skipped tile ({}, {}): {}", x, y, e);
                    continue;
                }

                match decision {
                    Claim::Take => {
                        report.claimed += 1;
                        settlements[i].claimed_tiles += 1;
                    }
                    Claim::Flip(previous) => {
                        report.flipped += 1;
                        settlements[i].claimed_tiles += 1;
                        if let Some(&j) = index.get(&previous) {
                            let prior = &mut settlements[j];
                            prior.claimed_tiles = prior.claimed_tiles.saturating_sub(1);
                        }
                    }
                    Claim::Refresh => report.refreshed += 1,
                    Claim::Skip => {}
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_influence_formula() {
        assert!((influence_at(5, 2.0, 1.0) - 5.0 / 3.0).abs() < 1e-6);
        assert!((influence_at(1, 3.0, 1.0) - 0.25).abs() < 1e-6);
        assert!((influence_at(2, 1.0, 5.0) - 2.0 / 6.0).abs() < 1e-6);
        assert_eq!(influence_at(3, 0.0, 1.0), 3.0);
    }

    #[test]
    fn test_decide_policy() {
        assert!(matches!(decide("", 0.0, "A", 0.06, 0.05, 1.5), Claim::Take));
        assert!(matches!(decide("", 0.0, "A", 0.05, 0.05, 1.5), Claim::Skip));
        assert!(matches!(decide("A", 1.0, "A", 0.2, 0.05, 1.5), Claim::Refresh));
        assert!(matches!(decide("B", 1.0, "A", 1.5, 0.05, 1.5), Claim::Skip));
        assert!(matches!(decide("B", 1.0, "A", 1.51, 0.05, 1.5), Claim::Flip(_)));
    }
}
