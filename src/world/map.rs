//! WorldMap - the tile grid manager
//!
//! Owns the row-major tile array. Other managers read tiles freely; the only
//! writes from outside world generation go through the claim interface used
//! by the territory pass.

use ahash::AHashMap;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::clock::Season;
use crate::core::error::{CivError, Result};
use crate::core::rng::{stream_rng, RngStream};
use crate::core::types::GridPos;
use crate::settlement::SettlementManager;
use crate::world::generator::WorldGenParams;
use crate::world::tile::Tile;
use crate::world::weather::Weather;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldMap {
    width: u32,
    height: u32,
    seed: u64,
    params: WorldGenParams,
    tiles: Vec<Tile>,
    weather: Weather,
    rng: ChaCha8Rng,
}

/// Aggregate counts for summaries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldStats {
    pub land_tiles: usize,
    pub water_tiles: usize,
    pub river_tiles: usize,
    pub resource_tiles: usize,
    pub owned_tiles: usize,
    pub mean_elevation: f32,
}

/// Map state outside the tile grid, carried in the save trailer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldState {
    pub seed: u64,
    pub params: WorldGenParams,
    pub weather: Weather,
    rng: ChaCha8Rng,
}

impl WorldMap {
    pub fn from_tiles(width: u32, height: u32, seed: u64, params: WorldGenParams, tiles: Vec<Tile>) -> Self {
        debug_assert_eq!(tiles.len(), (width * height) as usize);
        Self {
            width,
            height,
            seed,
            params,
            tiles,
            weather: Weather::Clear,
            rng: stream_rng(seed, RngStream::Weather),
        }
    }

    /// Rebuild a map from saved tiles plus its saved state
    pub fn from_state(width: u32, height: u32, tiles: Vec<Tile>, state: WorldState) -> Result<Self> {
        if tiles.len() != width as usize * height as usize {
            return Err(CivError::InvalidArgument(format!(
                "{} tiles do not fill a {}x{} map",
                tiles.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            seed: state.seed,
            params: state.params,
            tiles,
            weather: state.weather,
            rng: state.rng,
        })
    }

    pub fn state(&self) -> WorldState {
        WorldState {
            seed: self.seed,
            params: self.params.clone(),
            weather: self.weather,
            rng: self.rng.clone(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn sea_level(&self) -> f32 {
        self.params.sea_level
    }

    pub fn params(&self) -> &WorldGenParams {
        &self.params
    }

    pub fn weather(&self) -> Weather {
        self.weather
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub(crate) fn tiles_mut(&mut self) -> &mut [Tile] {
        &mut self.tiles
    }

    /// Horizontal wrap (the map is a cylinder)
    pub fn wrap_x(&self, x: i32) -> i32 {
        x.rem_euclid(self.width as i32)
    }

    pub fn clamp_y(&self, y: i32) -> i32 {
        y.clamp(0, self.height as i32 - 1)
    }

    /// Row-major index; X wraps, Y out of range yields `None`
    pub fn index(&self, x: i32, y: i32) -> Option<usize> {
        if y < 0 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + self.wrap_x(x) as usize)
    }

    pub fn tile(&self, x: i32, y: i32) -> Option<&Tile> {
        self.index(x, y).map(|i| &self.tiles[i])
    }

    pub(crate) fn tile_mut(&mut self, x: i32, y: i32) -> Option<&mut Tile> {
        self.index(x, y).map(move |i| &mut self.tiles[i])
    }

    pub fn tile_at(&self, index: usize) -> Option<&Tile> {
        self.tiles.get(index)
    }

    /// Cardinal neighbours (wrapping X, dropping rows off the map)
    pub fn neighbors4(&self, x: i32, y: i32) -> Vec<GridPos> {
        let mut out = Vec::with_capacity(4);
        for (dx, dy) in [(0, -1), (1, 0), (0, 1), (-1, 0)] {
            let ny = y + dy;
            if ny < 0 || ny >= self.height as i32 {
                continue;
            }
            out.push(GridPos::new(self.wrap_x(x + dx), ny));
        }
        out
    }

    /// Shortest horizontal offset accounting for wrap
    pub fn wrapped_dx(&self, x0: i32, x1: i32) -> i32 {
        let w = self.width as i32;
        let dx = (x1 - x0).rem_euclid(w);
        if dx > w / 2 {
            dx - w
        } else {
            dx
        }
    }

    /// Euclidean distance with X wrap
    pub fn distance(&self, a: GridPos, b: GridPos) -> f32 {
        let dx = self.wrapped_dx(a.x, b.x) as f32;
        let dy = (b.y - a.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    /// Is there water or a river within `radius` tiles (Chebyshev)?
    pub fn water_within(&self, x: i32, y: i32, radius: i32) -> bool {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if let Some(t) = self.tile(x + dx, y + dy) {
                    if t.is_water() || t.has_river {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Claim an unowned tile or flip an owned one to `owner`
    pub fn claim_tile(&mut self, x: i32, y: i32, owner: &str, influence: f32) -> Result<()> {
        let tile = self
            .tile_mut(x, y)
            .ok_or_else(|| CivError::InvalidArgument(format!("tile ({}, {}) off the map", x, y)))?;
        tile.owner_id.clear();
        tile.owner_id.push_str(owner);
        tile.cultural_influence = influence.max(0.0);
        Ok(())
    }

    /// Refresh the current owner's influence
    pub fn refresh_influence(&mut self, x: i32, y: i32, influence: f32) -> Result<()> {
        let tile = self
            .tile_mut(x, y)
            .ok_or_else(|| CivError::InvalidArgument(format!("tile ({}, {}) off the map", x, y)))?;
        tile.cultural_influence = influence.max(0.0);
        Ok(())
    }

    /// Clear every back-reference to `owner`; returns tiles released
    pub fn clear_owner(&mut self, owner: &str) -> usize {
        let mut released = 0;
        for tile in self.tiles.iter_mut().filter(|t| t.owner_id == owner) {
            tile.owner_id.clear();
            tile.cultural_influence = 0.0;
            tile.population_density = 0.0;
            tile.political_influence = 0.0;
            released += 1;
        }
        released
    }

    pub fn owned_tile_count(&self, owner: &str) -> usize {
        self.tiles.iter().filter(|t| t.owner_id == owner).count()
    }

    pub fn river_tile_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.has_river).count()
    }

    pub fn land_tile_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_land()).count()
    }

    pub fn stats(&self) -> WorldStats {
        let mut stats = WorldStats::default();
        let mut elevation_sum = 0.0;
        for t in &self.tiles {
            if t.is_water() {
                stats.water_tiles += 1;
            } else {
                stats.land_tiles += 1;
            }
            if t.has_river {
                stats.river_tiles += 1;
            }
            if t.has_resource {
                stats.resource_tiles += 1;
            }
            if t.is_owned() {
                stats.owned_tiles += 1;
            }
            elevation_sum += t.elevation;
        }
        if !self.tiles.is_empty() {
            stats.mean_elevation = elevation_sum / self.tiles.len() as f32;
        }
        stats
    }

    /// Per-tick update: weather and the derived population/political layers
    pub fn update(&mut self, _dt: f32, season: Season, settlements: &SettlementManager) {
        self.weather = Weather::roll(season, &mut self.rng);

        let mut claimed: AHashMap<&str, u32> = AHashMap::new();
        let mut max_influence: f32 = 0.0;
        for t in self.tiles.iter().filter(|t| t.is_owned()) {
            *claimed.entry(t.owner_id.as_str()).or_insert(0) += 1;
            max_influence = max_influence.max(t.cultural_influence);
        }

        let densities: AHashMap<String, f32> = claimed
            .iter()
            .map(|(owner, count)| {
                let pop = settlements.get(owner).map(|s| s.population).unwrap_or(0);
                (owner.to_string(), pop as f32 / (*count).max(1) as f32)
            })
            .collect();

        for t in self.tiles.iter_mut() {
            if t.is_owned() {
                t.population_density = densities.get(&t.owner_id).copied().unwrap_or(0.0);
                t.political_influence = if max_influence > 0.0 {
                    t.cultural_influence / max_influence
                } else {
                    0.0
                };
            } else {
                t.population_density = 0.0;
                t.political_influence = 0.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tile::Biome;

    fn flat_map(w: u32, h: u32) -> WorldMap {
        let mut tiles = Vec::new();
        for y in 0..h as i32 {
            for x in 0..w as i32 {
                let mut t = Tile::new(x, y);
                t.elevation = 0.5;
                t.biome = Biome::Grassland;
                tiles.push(t);
            }
        }
        WorldMap::from_tiles(w, h, 0, WorldGenParams::default(), tiles)
    }

    #[test]
    fn test_index_wraps_x_not_y() {
        let map = flat_map(16, 16);
        assert_eq!(map.index(-1, 0), Some(15));
        assert_eq!(map.index(16, 1), Some(16));
        assert_eq!(map.index(0, -1), None);
        assert_eq!(map.index(0, 16), None);
    }

    #[test]
    fn test_wrapped_distance() {
        let map = flat_map(20, 16);
        let d = map.distance(GridPos::new(0, 0), GridPos::new(19, 0));
        assert!((d - 1.0).abs() < 1e-6);
        let d = map.distance(GridPos::new(10, 10), GridPos::new(12, 10));
        assert!((d - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_neighbors_at_top_edge() {
        let map = flat_map(16, 16);
        let n = map.neighbors4(0, 0);
        assert_eq!(n.len(), 3);
        assert!(n.contains(&GridPos::new(15, 0)));
    }

    #[test]
    fn test_clear_owner_sweep() {
        let mut map = flat_map(16, 16);
        map.claim_tile(1, 1, "S1", 2.0).unwrap();
        map.claim_tile(2, 1, "S1", 1.0).unwrap();
        map.claim_tile(3, 1, "S2", 1.0).unwrap();
        assert_eq!(map.clear_owner("S1"), 2);
        assert_eq!(map.owned_tile_count("S1"), 0);
        assert_eq!(map.owned_tile_count("S2"), 1);
        assert_eq!(map.tile(1, 1).unwrap().cultural_influence, 0.0);
    }

    #[test]
    fn test_claim_off_map_rejected() {
        let mut map = flat_map(16, 16);
        assert!(map.claim_tile(0, 99, "S1", 1.0).is_err());
    }
}
