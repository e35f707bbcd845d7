//! Simulation clock
//!
//! Tracks the tick counter and accumulated simulation time. A simulated year
//! is `ticks_per_year` ticks at `dt = 1`; seasons split the year in four.

use serde::{Deserialize, Serialize};

use crate::core::types::Tick;

/// Season of the simulated year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    /// Season from the fraction of the year elapsed (0.0-1.0)
    pub fn from_year_fraction(fraction: f64) -> Self {
        let f = fraction.rem_euclid(1.0);
        if f < 0.25 {
            Self::Spring
        } else if f < 0.5 {
            Self::Summer
        } else if f < 0.75 {
            Self::Autumn
        } else {
            Self::Winter
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimClock {
    tick: Tick,
    elapsed: f64,
    ticks_per_year: u64,
}

impl SimClock {
    pub fn new(ticks_per_year: u64) -> Self {
        Self {
            tick: 0,
            elapsed: 0.0,
            ticks_per_year: ticks_per_year.max(1),
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.tick += 1;
        self.elapsed += dt as f64;
    }

    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    /// Simulation time in tick units
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn current_year(&self, start_year: i32) -> i32 {
        start_year + (self.elapsed / self.ticks_per_year as f64).floor() as i32
    }

    pub fn season(&self) -> Season {
        Season::from_year_fraction(self.elapsed / self.ticks_per_year as f64)
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances() {
        let mut clock = SimClock::new(12);
        assert_eq!(clock.current_tick(), 0);
        clock.advance(1.0);
        clock.advance(0.5);
        assert_eq!(clock.current_tick(), 2);
        assert!((clock.elapsed() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_seasons_cycle() {
        let mut clock = SimClock::new(12);
        assert_eq!(clock.season(), Season::Spring);
        for _ in 0..3 {
            clock.advance(1.0);
        }
        assert_eq!(clock.season(), Season::Summer);
        for _ in 0..6 {
            clock.advance(1.0);
        }
        assert_eq!(clock.season(), Season::Winter);
        for _ in 0..3 {
            clock.advance(1.0);
        }
        assert_eq!(clock.season(), Season::Spring);
        assert_eq!(clock.current_year(-4000), -3999);
    }
}
