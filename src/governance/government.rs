//! Government state: continuous traits, roles, institutions, subdivisions

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::governance::legislature::{Constitution, LegislativeBody};

/// Functions a government can assign to a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GovFunction {
    Legislative,
    Executive,
    Judicial,
    Oversight,
    Sovereignty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub title: String,
    pub authority: f32,
    pub responsibility: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatureTier {
    FailedState,
    Frontier,
    Developing,
    Stable,
    Regional,
    GreatPower,
    Hegemon,
}

impl StatureTier {
    /// Tier for a national capability index
    pub fn from_nci(nci: f32) -> Self {
        match nci {
            n if n >= 500.0 => StatureTier::Hegemon,
            n if n >= 300.0 => StatureTier::GreatPower,
            n if n >= 150.0 => StatureTier::Regional,
            n if n >= 75.0 => StatureTier::Stable,
            n if n >= 30.0 => StatureTier::Developing,
            n if n >= 10.0 => StatureTier::Frontier,
            _ => StatureTier::FailedState,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Institution {
    pub id: String,
    pub name: String,
    pub function: GovFunction,
    /// Unbounded experience; never below 0.1
    pub stature: f32,
    pub active: bool,
    pub dissolving: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subdivision {
    pub id: String,
    pub name: String,
    pub autonomy: f32,
    pub settlement_ids: Vec<String>,
}

/// Identity the state promotes in its settlements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NationalIdentity {
    pub ethnicity: String,
    pub language: String,
    pub faith: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovTraits {
    pub centralization: f32,
    pub democracy: f32,
    pub stability: f32,
    pub legitimacy: f32,
    pub efficiency: f32,
    pub corruption: f32,
    pub political_tension: f32,
}

impl Default for GovTraits {
    fn default() -> Self {
        Self {
            centralization: 0.5,
            democracy: 0.3,
            stability: 0.6,
            legitimacy: 0.6,
            efficiency: 0.5,
            corruption: 0.2,
            political_tension: 0.2,
        }
    }
}

impl GovTraits {
    pub fn clamp(&mut self) {
        for v in [
            &mut self.centralization,
            &mut self.democracy,
            &mut self.stability,
            &mut self.legitimacy,
            &mut self.efficiency,
            &mut self.corruption,
            &mut self.political_tension,
        ] {
            *v = v.clamp(0.0, 1.0);
        }
    }
}

/// Requested trait changes; `None` leaves a trait alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reform {
    pub centralization: Option<f32>,
    pub democracy: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Government {
    /// Nation id
    pub id: String,
    pub nation_name: String,
    /// Generated from traits; changes as the state evolves
    pub name: String,
    pub identity: NationalIdentity,
    pub traits: GovTraits,
    pub roles: BTreeMap<GovFunction, Role>,
    pub institutions: Vec<Institution>,
    pub subdivisions: Vec<Subdivision>,
    pub legislatures: Vec<LegislativeBody>,
    pub constitution: Option<Constitution>,
    pub stature_tier: StatureTier,
    pub nci: f32,
    pub reforms: u32,
}

impl Government {
    pub fn new(id: &str, nation_name: &str, identity: NationalIdentity) -> Self {
        Self {
            id: id.to_string(),
            nation_name: nation_name.to_string(),
            name: nation_name.to_string(),
            identity,
            traits: GovTraits::default(),
            roles: BTreeMap::new(),
            institutions: Vec::new(),
            subdivisions: Vec::new(),
            legislatures: Vec::new(),
            constitution: None,
            stature_tier: StatureTier::FailedState,
            nci: 0.0,
            reforms: 0,
        }
    }

    /// Mean authority x responsibility over roles; 0.1 when there are none
    pub fn role_efficiency(&self) -> f32 {
        if self.roles.is_empty() {
            return 0.1;
        }
        self.roles
            .values()
            .map(|r| r.authority * r.responsibility)
            .sum::<f32>()
            / self.roles.len() as f32
    }

    pub fn active_institutions(&self) -> impl Iterator<Item = &Institution> {
        self.institutions.iter().filter(|i| i.active)
    }

    /// National capability index over active institutions
    pub fn nci(&self) -> f32 {
        let sum: f32 = self
            .active_institutions()
            .map(|i| (1.0 + i.stature).log2())
            .sum();
        10.0 * sum * self.traits.efficiency * self.traits.stability
    }

    pub fn legislature(&self, id: &str) -> Option<&LegislativeBody> {
        self.legislatures.iter().find(|l| l.id == id)
    }

    pub fn legislature_mut(&mut self, id: &str) -> Option<&mut LegislativeBody> {
        self.legislatures.iter_mut().find(|l| l.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(StatureTier::from_nci(0.0), StatureTier::FailedState);
        assert_eq!(StatureTier::from_nci(10.0), StatureTier::Frontier);
        assert_eq!(StatureTier::from_nci(30.0), StatureTier::Developing);
        assert_eq!(StatureTier::from_nci(75.0), StatureTier::Stable);
        assert_eq!(StatureTier::from_nci(150.0), StatureTier::Regional);
        assert_eq!(StatureTier::from_nci(300.0), StatureTier::GreatPower);
        assert_eq!(StatureTier::from_nci(500.0), StatureTier::Hegemon);
    }

    #[test]
    fn test_role_efficiency_default() {
        let mut g = Government::new("N", "Nation", NationalIdentity::default());
        assert_eq!(g.role_efficiency(), 0.1);
        g.roles.insert(
            GovFunction::Executive,
            Role {
                title: "King".into(),
                authority: 0.8,
                responsibility: 0.5,
            },
        );
        assert!((g.role_efficiency() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_nci_counts_active_only() {
        let mut g = Government::new("N", "Nation", NationalIdentity::default());
        g.traits.efficiency = 1.0;
        g.traits.stability = 1.0;
        for (i, active) in [true, false].iter().enumerate() {
            g.institutions.push(Institution {
                id: format!("I{}", i),
                name: "Court".into(),
                function: GovFunction::Judicial,
                stature: 3.0,
                active: *active,
                dissolving: false,
            });
        }
        assert!((g.nci() - 20.0).abs() < 1e-4);
    }
}
