//! Tile - one cell of the world grid

use serde::{Deserialize, Serialize};

/// Physical class of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Terrain {
    #[default]
    Plain = 0,
    Hill = 1,
    Mountain = 2,
    Coastal = 3,
}

impl Terrain {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Plain),
            1 => Some(Self::Hill),
            2 => Some(Self::Mountain),
            3 => Some(Self::Coastal),
            _ => None,
        }
    }

    /// Fertility multiplier applied during generation
    pub fn fertility_factor(&self) -> f32 {
        match self {
            Self::Plain => 1.0,
            Self::Hill => 0.7,
            Self::Mountain => 0.1,
            Self::Coastal => 1.2,
        }
    }
}

/// Climate/vegetation classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Biome {
    #[default]
    Water = 0,
    Grassland = 1,
    Forest = 2,
    Desert = 3,
    Tundra = 4,
    Wetland = 5,
}

impl Biome {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Water),
            1 => Some(Self::Grassland),
            2 => Some(Self::Forest),
            3 => Some(Self::Desert),
            4 => Some(Self::Tundra),
            5 => Some(Self::Wetland),
            _ => None,
        }
    }

    /// Biome from the fixed (temperature, moisture) table
    pub fn classify(temperature: f32, moisture: f32) -> Self {
        if temperature < 0.15 {
            Self::Tundra
        } else if temperature < 0.35 {
            if moisture < 0.6 {
                Self::Grassland
            } else {
                Self::Forest
            }
        } else if temperature < 0.65 {
            if moisture < 0.5 {
                Self::Grassland
            } else {
                Self::Forest
            }
        } else if moisture < 0.2 {
            Self::Desert
        } else if moisture < 0.45 {
            Self::Grassland
        } else {
            Self::Forest
        }
    }

    pub fn fertility_factor(&self) -> f32 {
        match self {
            Self::Desert | Self::Tundra => 0.2,
            Self::Forest => 1.3,
            Self::Wetland => 1.5,
            Self::Grassland => 1.0,
            Self::Water => 0.0,
        }
    }

    /// Vegetation cover given tile moisture
    pub fn vegetation(&self, moisture: f32) -> f32 {
        match self {
            Self::Forest => 0.2 + 0.8 * moisture,
            Self::Grassland => 0.4 * moisture,
            Self::Wetland => 0.6,
            Self::Desert => 0.05,
            Self::Tundra => 0.1,
            Self::Water => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
    pub elevation: f32,
    pub moisture: f32,
    pub temperature: f32,
    pub terrain: Terrain,
    pub biome: Biome,
    pub vegetation_density: f32,
    pub fertility: f32,
    pub resources: f32,
    pub has_river: bool,
    pub has_resource: bool,
    /// Settlement id of the current claimant; empty when unclaimed
    pub owner_id: String,
    /// Influence of the current claimant on this tile
    pub cultural_influence: f32,
    pub population_density: f32,
    pub political_influence: f32,
}

impl Tile {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }

    pub fn is_water(&self) -> bool {
        self.biome == Biome::Water
    }

    pub fn is_land(&self) -> bool {
        !self.is_water()
    }

    pub fn is_owned(&self) -> bool {
        !self.owner_id.is_empty()
    }

    /// Resistance of the tile to cultural influence
    pub fn terrain_resistance(&self) -> f32 {
        if self.terrain == Terrain::Mountain {
            5.0
        } else if self.is_water() {
            2.0
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_biome_table() {
        assert_eq!(Biome::classify(0.1, 0.9), Biome::Tundra);
        assert_eq!(Biome::classify(0.2, 0.5), Biome::Grassland);
        assert_eq!(Biome::classify(0.2, 0.6), Biome::Forest);
        assert_eq!(Biome::classify(0.5, 0.49), Biome::Grassland);
        assert_eq!(Biome::classify(0.5, 0.5), Biome::Forest);
        assert_eq!(Biome::classify(0.8, 0.1), Biome::Desert);
        assert_eq!(Biome::classify(0.8, 0.3), Biome::Grassland);
        assert_eq!(Biome::classify(0.8, 0.45), Biome::Forest);
    }

    #[test]
    fn test_terrain_resistance() {
        let mut tile = Tile::new(0, 0);
        tile.biome = Biome::Grassland;
        assert_eq!(tile.terrain_resistance(), 1.0);
        tile.terrain = Terrain::Mountain;
        assert_eq!(tile.terrain_resistance(), 5.0);
        tile.terrain = Terrain::Plain;
        tile.biome = Biome::Water;
        assert_eq!(tile.terrain_resistance(), 2.0);
    }

    #[test]
    fn test_enum_codes_round_trip() {
        for b in [Biome::Water, Biome::Grassland, Biome::Forest, Biome::Desert, Biome::Tundra, Biome::Wetland] {
            assert_eq!(Biome::from_u8(b as u8), Some(b));
        }
        assert_eq!(Terrain::from_u8(9), None);
    }
}
