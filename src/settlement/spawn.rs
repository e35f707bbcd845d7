//! Site selection for new settlements

use crate::core::types::{GridPos, Vec2};
use crate::settlement::settlement::Settlement;
use crate::world::{Terrain, WorldMap};

/// How attractive a tile is for founding, in [0, 1]; water scores 0
pub fn suitability(world: &WorldMap, pos: GridPos) -> f32 {
    let Some(tile) = world.tile(pos.x, pos.y) else {
        return 0.0;
    };
    if tile.is_water() {
        return 0.0;
    }

    let terrain = match tile.terrain {
        Terrain::Plain => 0.4,
        Terrain::Coastal => 0.35,
        Terrain::Hill => 0.25,
        Terrain::Mountain => 0.0,
    };
    let water = if world.water_within(pos.x, pos.y, 2) { 0.2 } else { 0.0 };
    let resource = if tile.has_resource { 0.1 } else { 0.0 };

    (terrain + 0.4 * tile.fertility + water + resource).min(1.0)
}

/// Is `pos` at least `min_distance` from every existing settlement?
pub fn far_enough(world: &WorldMap, settlements: &[Settlement], pos: GridPos, min_distance: f32) -> bool {
    settlements
        .iter()
        .all(|s| world.distance(s.position.to_grid(), pos) >= min_distance)
}

/// Settlements sit at the centre of their tile
pub fn tile_center(pos: GridPos) -> Vec2 {
    Vec2::new(pos.x as f32 + 0.5, pos.y as f32 + 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Biome, Tile, WorldGenParams};

    fn map_with(fertility: f32, river_at: Option<(i32, i32)>) -> WorldMap {
        let mut tiles = Vec::new();
        for y in 0..16 {
            for x in 0..16 {
                let mut t = Tile::new(x, y);
                t.elevation = 0.5;
                t.biome = Biome::Grassland;
                t.fertility = fertility;
                if river_at == Some((x, y)) {
                    t.has_river = true;
                    t.biome = Biome::Wetland;
                }
                tiles.push(t);
            }
        }
        WorldMap::from_tiles(16, 16, 0, WorldGenParams::default(), tiles)
    }

    #[test]
    fn test_fertile_riverside_plain_is_suitable() {
        let map = map_with(0.8, Some((5, 6)));
        let s = suitability(&map, GridPos::new(5, 5));
        assert!((s - (0.4 + 0.32 + 0.2)).abs() < 1e-6);
        assert!(s > 0.7);
    }

    #[test]
    fn test_dry_plain_is_not_suitable() {
        let map = map_with(0.5, None);
        assert!(suitability(&map, GridPos::new(5, 5)) < 0.7);
    }

    #[test]
    fn test_distance_check_wraps() {
        let map = map_with(0.5, None);
        let existing = vec![Settlement::new("S1", "A", tile_center(GridPos::new(0, 5)), "N")];
        assert!(!far_enough(&map, &existing, GridPos::new(15, 5), 4.0));
        assert!(far_enough(&map, &existing, GridPos::new(6, 5), 4.0));
    }
}
