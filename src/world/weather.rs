//! World weather
//!
//! Weather affects combat effectiveness and movement. Seasons change the
//! probabilities of each condition.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::clock::Season;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Weather {
    #[default]
    Clear,
    Rain,
    Snow,
    Storm,
    Fog,
}

impl Weather {
    pub const ALL: [Weather; 5] = [
        Weather::Clear,
        Weather::Rain,
        Weather::Snow,
        Weather::Storm,
        Weather::Fog,
    ];

    /// Combat effectiveness multiplier (applies to both sides)
    pub fn combat_modifier(&self) -> f32 {
        match self {
            Self::Clear => 1.0,
            Self::Fog => 0.9,
            Self::Rain => 0.85,
            Self::Snow => 0.75,
            Self::Storm => 0.6,
        }
    }

    /// Movement multiplier (1.0 = normal)
    pub fn movement_modifier(&self) -> f32 {
        match self {
            Self::Clear => 1.0,
            Self::Fog => 0.9,
            Self::Rain => 0.8,
            Self::Snow => 0.7,
            Self::Storm => 0.5,
        }
    }

    /// Probabilities [Clear, Rain, Snow, Storm, Fog] for a season
    pub fn seasonal_weights(season: Season) -> [f32; 5] {
        match season {
            Season::Spring => [0.45, 0.3, 0.0, 0.1, 0.15],
            Season::Summer => [0.6, 0.2, 0.0, 0.15, 0.05],
            Season::Autumn => [0.35, 0.35, 0.05, 0.1, 0.15],
            Season::Winter => [0.3, 0.1, 0.4, 0.1, 0.1],
        }
    }

    /// Roll the weather for a season
    pub fn roll<R: Rng>(season: Season, rng: &mut R) -> Self {
        let weights = Self::seasonal_weights(season);
        let total: f32 = weights.iter().sum();
        let mut roll = rng.gen::<f32>() * total;
        for (weather, w) in Self::ALL.iter().zip(weights.iter()) {
            if roll < *w {
                return *weather;
            }
            roll -= w;
        }
        Self::Clear
    }
}
