//! World generation
//!
//! Deterministic from `(width, height, seed)` and [`WorldGenParams`]:
//! 1. fBm gradient noise elevation, normalised and raised to 1.5
//! 2. Independent moisture field, dried along the coast
//! 3. Latitude/elevation temperature
//! 4. Optional 3x3 smoothing of elevation
//! 5. Terrain and biome classification
//! 6. Fertility and vegetation
//! 7. Rivers (see [`super::rivers`])
//! 8. Point resources

use noise::{NoiseFn, Perlin};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::error::{CivError, Result};
use crate::core::rng::{stream_rng, RngStream};
use crate::world::map::WorldMap;
use crate::world::rivers;
use crate::world::tile::{Biome, Terrain, Tile};

pub const MIN_MAP_WIDTH: u32 = 16;
pub const MIN_MAP_HEIGHT: u32 = 16;
pub const MAX_MAP_DIMENSION: u32 = 4096;

/// Elevation above which land becomes mountain (when mountains are enabled)
const MOUNTAIN_THRESHOLD: f32 = 0.85;
const HILL_THRESHOLD: f32 = 0.70;
/// Band above sea level classified as coastal
const COASTAL_BAND: f32 = 0.05;
/// Band above sea level where moisture is reduced
const DRY_COAST_BAND: f32 = 0.1;
const ELEVATION_EXPONENT: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldGenParams {
    /// Elevation below which tiles are ocean
    pub sea_level: f32,
    /// Target share of land; 0.4 leaves the noise field untouched
    pub land_ratio: f32,
    /// Mountain emphasis; 0.1 leaves the noise field untouched
    pub mountain_ratio: f32,
    /// Noise frequency per tile (lower = larger continents)
    pub noise_scale: f64,
    pub noise_octaves: u32,
    pub enable_smoothing: bool,
    pub enable_mountains: bool,
    pub enable_rivers: bool,
    pub enable_resources: bool,
}

impl Default for WorldGenParams {
    fn default() -> Self {
        Self {
            sea_level: 0.25,
            land_ratio: 0.4,
            mountain_ratio: 0.1,
            noise_scale: 0.05,
            noise_octaves: 5,
            enable_smoothing: true,
            enable_mountains: true,
            enable_rivers: true,
            enable_resources: true,
        }
    }
}

pub fn validate_dimensions(width: u32, height: u32) -> Result<()> {
    if !(MIN_MAP_WIDTH..=MAX_MAP_DIMENSION).contains(&width)
        || !(MIN_MAP_HEIGHT..=MAX_MAP_DIMENSION).contains(&height)
    {
        return Err(CivError::InvalidArgument(format!(
            "map size {}x{} outside [{}..{}]x[{}..{}]",
            width, height, MIN_MAP_WIDTH, MAX_MAP_DIMENSION, MIN_MAP_HEIGHT, MAX_MAP_DIMENSION
        )));
    }
    Ok(())
}

/// Generate a complete world map
pub fn generate(width: u32, height: u32, seed: u64, params: &WorldGenParams) -> Result<WorldMap> {
    if let Err(e) = validate_dimensions(width, height) {
        tracing::error!("World generation rejected: {}", e);
        return Err(e);
    }

    let w = width as usize;
    let h = height as usize;
    let count = w * h;

    let mut tiles: Vec<Tile> = Vec::new();
    tiles.try_reserve_exact(count).map_err(|_| {
        tracing::error!("Unable to allocate {} tiles", count);
        CivError::OutOfMemory(format!("tile array of {} entries", count))
    })?;
    for y in 0..h {
        for x in 0..w {
            tiles.push(Tile::new(x as i32, y as i32));
        }
    }

    // 1. Elevation
    let mut elevation = normalized_field(w, h, RngStream::Elevation.noise_seed(seed), params);
    for e in elevation.iter_mut() {
        let mut v = e.powf(ELEVATION_EXPONENT) as f32;
        v += (params.land_ratio - 0.4) * 0.25;
        if v > HILL_THRESHOLD {
            v += (params.mountain_ratio - 0.1) * 0.5 * (v - HILL_THRESHOLD) / 0.3;
        }
        *e = v.clamp(0.0, 1.0) as f64;
    }

    // 4. Smoothing (applied before anything reads elevation)
    if params.enable_smoothing {
        for _ in 0..2 {
            elevation = box_blur(&elevation, w, h);
        }
    }

    // 2. Moisture
    let moisture = normalized_field(w, h, RngStream::Moisture.noise_seed(seed), params);

    // 3. Temperature noise
    let temp_noise = Perlin::new(RngStream::Temperature.noise_seed(seed));
    let half_h = h as f32 / 2.0;

    for (i, tile) in tiles.iter_mut().enumerate() {
        let e = elevation[i] as f32;
        tile.elevation = e;

        let mut m = moisture[i] as f32;
        if e >= params.sea_level && e < params.sea_level + DRY_COAST_BAND {
            m *= 0.7;
        }
        tile.moisture = m.clamp(0.0, 1.0);

        let lat = ((tile.y as f32 - half_h).abs() / half_h).min(1.0);
        let mut t = 1.0 - lat.powf(1.2);
        let n = temp_noise.get([
            (tile.x as f64 + 0.5) * params.noise_scale * 2.0,
            (tile.y as f64 + 0.5) * params.noise_scale * 2.0,
        ]) as f32;
        t += n * 0.05;
        if e >= params.sea_level {
            t -= 0.3 * (e - params.sea_level);
        }
        tile.temperature = t.clamp(0.0, 1.0);

        classify(tile, params);
    }

    let mut map = WorldMap::from_tiles(width, height, seed, params.clone(), tiles);

    // 7. Rivers
    if params.enable_rivers {
        let mut rng = stream_rng(seed, RngStream::Rivers);
        let committed = rivers::carve_rivers(&mut map, &mut rng);
        tracing::debug!("Carved {} rivers", committed);
    }

    // 8. Resources
    if params.enable_resources {
        let mut rng = stream_rng(seed, RngStream::Resources);
        place_resources(&mut map, &mut rng);
    }

    tracing::info!(
        "Generated {}x{} world (seed {}): {} land tiles, {} river tiles",
        width,
        height,
        seed,
        map.land_tile_count(),
        map.river_tile_count()
    );

    Ok(map)
}

/// Terrain, biome, fertility and vegetation for one tile
fn classify(tile: &mut Tile, params: &WorldGenParams) {
    let e = tile.elevation;
    if e < params.sea_level {
        tile.terrain = Terrain::Plain;
        tile.biome = Biome::Water;
        tile.fertility = 0.0;
        tile.vegetation_density = 0.0;
        tile.has_river = false;
        return;
    }

    tile.terrain = if params.enable_mountains && e > MOUNTAIN_THRESHOLD {
        Terrain::Mountain
    } else if e > HILL_THRESHOLD {
        Terrain::Hill
    } else if e < params.sea_level + COASTAL_BAND {
        Terrain::Coastal
    } else {
        Terrain::Plain
    };

    tile.biome = Biome::classify(tile.temperature, tile.moisture);

    // 6. Fertility
    let base = 0.6 * tile.moisture + 0.2 * tile.temperature;
    tile.fertility = (base * tile.terrain.fertility_factor() * tile.biome.fertility_factor()).clamp(0.0, 1.0);
    tile.vegetation_density = tile.biome.vegetation(tile.moisture).clamp(0.0, 1.0);
}

/// fBm noise over the grid, min-max normalised to [0, 1]
fn normalized_field(w: usize, h: usize, seed: u32, params: &WorldGenParams) -> Vec<f64> {
    let perlin = Perlin::new(seed);
    let mut field = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            field.push(fbm(&perlin, x as f64 + 0.5, y as f64 + 0.5, params.noise_scale, params.noise_octaves));
        }
    }

    let (min, max) = field
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let range = max - min;
    if range <= f64::EPSILON {
        return vec![0.5; w * h];
    }
    field.iter().map(|v| (v - min) / range).collect()
}

/// Fractional Brownian motion, persistence 0.5, lacunarity 2
fn fbm(noise: &impl NoiseFn<f64, 2>, x: f64, y: f64, scale: f64, octaves: u32) -> f64 {
    let mut sum = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = scale;
    let mut norm = 0.0;
    for _ in 0..octaves {
        sum += amplitude * noise.get([x * frequency, y * frequency]);
        norm += amplitude;
        amplitude *= 0.5;
        frequency *= 2.0;
    }
    if norm > 0.0 {
        sum / norm
    } else {
        0.0
    }
}

/// One 3x3 box filter pass; X wraps, Y clamps to available rows
fn box_blur(src: &[f64], w: usize, h: usize) -> Vec<f64> {
    let mut out = vec![0.0; src.len()];
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0.0;
            let mut n = 0.0;
            for dy in -1i64..=1 {
                let ny = y as i64 + dy;
                if ny < 0 || ny >= h as i64 {
                    continue;
                }
                for dx in -1i64..=1 {
                    let nx = (x as i64 + dx).rem_euclid(w as i64) as usize;
                    sum += src[ny as usize * w + nx];
                    n += 1.0;
                }
            }
            out[y * w + x] = sum / n;
        }
    }
    out
}

/// Bernoulli resource placement with terrain-dependent odds
fn place_resources<R: Rng>(map: &mut WorldMap, rng: &mut R) {
    for tile in map.tiles_mut() {
        if tile.is_water() {
            continue;
        }
        let chance = match (tile.terrain, tile.biome) {
            (Terrain::Mountain, _) => 0.25,
            (Terrain::Hill, _) => 0.20,
            (_, Biome::Forest) => 0.15,
            _ => 0.05,
        };
        if rng.gen::<f32>() < chance {
            tile.has_resource = true;
            tile.resources = 0.5 + 0.5 * rng.gen::<f32>();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_size_accepted() {
        let map = generate(MIN_MAP_WIDTH, MIN_MAP_HEIGHT, 3, &WorldGenParams::default()).unwrap();
        assert_eq!(map.tiles().len(), (MIN_MAP_WIDTH * MIN_MAP_HEIGHT) as usize);
    }

    #[test]
    fn test_below_minimum_rejected() {
        let params = WorldGenParams::default();
        let err = generate(MIN_MAP_WIDTH - 1, MIN_MAP_HEIGHT, 3, &params).unwrap_err();
        assert_eq!(err.code(), crate::core::error::ErrorCode::InvalidArgument);
        assert!(generate(MIN_MAP_WIDTH, MIN_MAP_HEIGHT - 1, 3, &params).is_err());
        assert!(generate(MAX_MAP_DIMENSION + 1, 32, 3, &params).is_err());
    }

    #[test]
    fn test_fields_in_unit_range() {
        let map = generate(48, 32, 11, &WorldGenParams::default()).unwrap();
        for t in map.tiles() {
            for v in [t.elevation, t.moisture, t.temperature, t.fertility, t.vegetation_density, t.resources] {
                assert!((0.0..=1.0).contains(&v), "value {} out of range at {},{}", v, t.x, t.y);
            }
        }
    }

    #[test]
    fn test_ocean_tiles_are_barren_water() {
        let params = WorldGenParams::default();
        let map = generate(64, 64, 5, &params).unwrap();
        for t in map.tiles().iter().filter(|t| t.elevation < params.sea_level) {
            assert_eq!(t.biome, Biome::Water);
            assert_eq!(t.fertility, 0.0);
            assert!(!t.has_river);
        }
    }

    #[test]
    fn test_no_mountains_when_disabled() {
        let params = WorldGenParams {
            enable_mountains: false,
            ..Default::default()
        };
        let map = generate(64, 64, 9, &params).unwrap();
        assert!(map.tiles().iter().all(|t| t.terrain != Terrain::Mountain));
    }

    #[test]
    fn test_same_seed_same_world() {
        let params = WorldGenParams::default();
        let a = generate(40, 40, 77, &params).unwrap();
        let b = generate(40, 40, 77, &params).unwrap();
        assert_eq!(a.tiles(), b.tiles());
        let c = generate(40, 40, 78, &params).unwrap();
        assert_ne!(a.tiles(), c.tiles());
    }

    #[test]
    fn test_box_blur_preserves_constant_field() {
        let src = vec![0.4; 9 * 7];
        let out = box_blur(&src, 9, 7);
        assert!(out.iter().all(|v| (v - 0.4).abs() < 1e-12));
    }
}
