//! River carving
//!
//! Rivers start on high, wet land and follow the steepest strictly-downhill
//! cardinal neighbour. A traced course is only kept if it drains into the
//! ocean or into an existing river, so every river tile has a
//! non-increasing elevation path to water.

use rand::Rng;

use crate::core::types::GridPos;
use crate::world::map::WorldMap;
use crate::world::tile::Biome;

pub const CIV_MAX_RIVERS_PER_MAP: usize = 32;
pub const MAX_RIVER_STEPS: usize = 200;

const SOURCE_MIN_ELEVATION: f32 = 0.6;
const SOURCE_MIN_MOISTURE: f32 = 0.4;
const SOURCE_SAMPLES_PER_ATTEMPT: usize = 1000;
const RIVER_FERTILITY_BONUS: f32 = 0.3;

/// How a traced course ended
#[derive(Debug, Clone, PartialEq, Eq)]
enum Course {
    /// Reached the ocean or joined another river
    Drains(Vec<GridPos>),
    /// Ran into a basin or out of steps
    Stalls,
}

/// Carve up to [`CIV_MAX_RIVERS_PER_MAP`] rivers; returns how many were kept
pub fn carve_rivers<R: Rng>(map: &mut WorldMap, rng: &mut R) -> usize {
    let mut committed = 0;
    let (w, h) = (map.width() as i32, map.height() as i32);

    for _ in 0..CIV_MAX_RIVERS_PER_MAP {
        for _ in 0..SOURCE_SAMPLES_PER_ATTEMPT {
            let source = GridPos::new(rng.gen_range(0..w), rng.gen_range(0..h));
            let Some(tile) = map.tile(source.x, source.y) else {
                continue;
            };
            if tile.is_water()
                || tile.has_river
                || tile.elevation <= SOURCE_MIN_ELEVATION
                || tile.moisture <= SOURCE_MIN_MOISTURE
            {
                continue;
            }

            if let Course::Drains(path) = trace(map, source) {
                for pos in &path {
                    if let Some(tile) = map.tile_mut(pos.x, pos.y) {
                        tile.has_river = true;
                        tile.biome = Biome::Wetland;
                        tile.fertility = (tile.fertility + RIVER_FERTILITY_BONUS).min(1.0);
                        tile.vegetation_density = Biome::Wetland.vegetation(tile.moisture);
                    }
                }
                committed += 1;
                break;
            }
        }
    }

    committed
}

fn trace(map: &WorldMap, source: GridPos) -> Course {
    let mut path = vec![source];
    let mut current = source;

    for _ in 0..MAX_RIVER_STEPS {
        let Some(here) = map.tile(current.x, current.y) else {
            return Course::Stalls;
        };

        let next = map
            .neighbors4(current.x, current.y)
            .into_iter()
            .filter_map(|p| map.tile(p.x, p.y).map(|t| (p, t)))
            .filter(|(_, t)| t.elevation < here.elevation)
            .min_by(|a, b| a.1.elevation.total_cmp(&b.1.elevation));

        let Some((pos, tile)) = next else {
            return Course::Stalls;
        };

        if tile.is_water() || tile.has_river {
            return Course::Drains(path);
        }
        path.push(pos);
        current = pos;
    }

    Course::Stalls
}
