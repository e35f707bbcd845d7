//! World map: generation, tiles, rivers and weather

pub mod generator;
pub mod map;
pub mod rivers;
pub mod tile;
pub mod weather;

pub use generator::{generate, WorldGenParams, MAX_MAP_DIMENSION, MIN_MAP_HEIGHT, MIN_MAP_WIDTH};
pub use map::{WorldMap, WorldState, WorldStats};
pub use rivers::CIV_MAX_RIVERS_PER_MAP;
pub use tile::{Biome, Terrain, Tile};
pub use weather::Weather;
