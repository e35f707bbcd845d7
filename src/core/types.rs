//! Core type definitions used throughout the codebase

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Simulation tick counter
pub type Tick = u64;

/// Region id assigned to settlements that have broken away from their nation.
pub const REBELS_REGION: &str = "REBELS";

/// Integer grid coordinate on the world map
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[display(fmt = "({}, {})", x, y)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev (king-move) distance, ignoring wrap.
    pub fn chebyshev(&self, other: &GridPos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// 2D continuous position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Vec2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Tile this position falls in
    pub fn to_grid(&self) -> GridPos {
        GridPos::new(self.x.floor() as i32, self.y.floor() as i32)
    }
}

/// Clamp a continuous quantity into the unit interval.
#[inline]
pub fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

/// Move `current` toward `target` by at most `step`.
#[inline]
pub fn approach(current: f32, target: f32, step: f32) -> f32 {
    if current < target {
        (current + step).min(target)
    } else {
        (current - step).max(target)
    }
}
