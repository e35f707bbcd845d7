//! Units and their progression

use serde::{Deserialize, Serialize};

use crate::core::types::GridPos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitType {
    Infantry,
    Archer,
    Cavalry,
    Siege,
}

impl UnitType {
    /// Production points a settlement must accumulate
    pub fn production_cost(&self) -> f32 {
        match self {
            Self::Infantry => 40.0,
            Self::Archer => 45.0,
            Self::Cavalry => 60.0,
            Self::Siege => 80.0,
        }
    }

    pub fn base_strength(&self) -> f32 {
        match self {
            Self::Infantry => 10.0,
            Self::Archer => 8.0,
            Self::Cavalry => 12.0,
            Self::Siege => 15.0,
        }
    }

    pub fn base_movement(&self) -> f32 {
        match self {
            Self::Cavalry => 2.0,
            _ => 1.0,
        }
    }

    pub fn visibility_range(&self) -> u32 {
        match self {
            Self::Archer | Self::Cavalry => 3,
            Self::Infantry => 2,
            Self::Siege => 1,
        }
    }

    /// Manpower the unit fields at full strength
    pub fn max_strength(&self) -> f32 {
        match self {
            Self::Siege => 50.0,
            Self::Cavalry => 80.0,
            _ => 100.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Infantry => "Infantry",
            Self::Archer => "Archers",
            Self::Cavalry => "Cavalry",
            Self::Siege => "Siege Train",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub name: String,
    /// Owning nation, or `REBELS`
    pub owner: String,
    pub unit_type: UnitType,
    pub combat_strength: f32,
    pub movement_speed: f32,
    pub morale: f32,
    pub experience: f32,
    pub level: u32,
    pub next_level_xp: f32,
    pub current_strength: f32,
    pub max_strength: f32,
    pub position: GridPos,
    pub visibility_range: u32,
    pub has_moved: bool,
}

impl Unit {
    pub fn new(id: &str, owner: &str, unit_type: UnitType, position: GridPos, first_level_xp: f32) -> Self {
        Self {
            id: id.to_string(),
            name: format!("{} {}", owner, unit_type.name()),
            owner: owner.to_string(),
            unit_type,
            combat_strength: unit_type.base_strength(),
            movement_speed: unit_type.base_movement(),
            morale: 1.0,
            experience: 0.0,
            level: 1,
            next_level_xp: first_level_xp,
            current_strength: unit_type.max_strength(),
            max_strength: unit_type.max_strength(),
            position,
            visibility_range: unit_type.visibility_range(),
            has_moved: false,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.current_strength <= 0.0
    }

    pub fn strength_ratio(&self) -> f32 {
        if self.max_strength <= 0.0 {
            0.0
        } else {
            self.current_strength / self.max_strength
        }
    }

    /// Add experience; returns how many levels were gained
    pub fn gain_experience(&mut self, xp: f32) -> u32 {
        if !xp.is_finite() || xp <= 0.0 {
            return 0;
        }
        self.experience += xp;
        let mut gained = 0;
        while self.next_level_xp > 0.0 && self.next_level_xp.is_finite() && self.experience >= self.next_level_xp {
            self.level += 1;
            self.combat_strength *= 1.10;
            self.movement_speed *= 1.05;
            self.next_level_xp *= 1.5;
            gained += 1;
        }
        gained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_up_loop() {
        let mut u = Unit::new("U1", "N", UnitType::Infantry, GridPos::new(0, 0), 10.0);
        // 10 and 15 are both crossed by 20 xp
        assert_eq!(u.gain_experience(20.0), 2);
        assert_eq!(u.level, 3);
        assert!((u.next_level_xp - 22.5).abs() < 1e-4);
        assert!((u.combat_strength - 10.0 * 1.1 * 1.1).abs() < 1e-4);
        assert!((u.movement_speed - 1.05 * 1.05).abs() < 1e-4);
    }

    #[test]
    fn test_degenerate_xp_terminates() {
        let mut u = Unit::new("u", "N", UnitType::Infantry, GridPos::new(0, 0), 0.0);
        assert_eq!(u.gain_experience(5.0), 0);
        assert_eq!(u.level, 1);

        let mut u = Unit::new("u", "N", UnitType::Infantry, GridPos::new(0, 0), 10.0);
        assert_eq!(u.gain_experience(f32::INFINITY), 0);
        let gained = u.gain_experience(f32::MAX);
        assert!(gained > 0 && gained < 300);
    }

    #[test]
    fn test_costs() {
        assert_eq!(UnitType::Infantry.production_cost(), 40.0);
        assert_eq!(UnitType::Siege.production_cost(), 80.0);
    }
}
