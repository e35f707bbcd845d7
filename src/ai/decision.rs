//! Decisions and bounded priority queues

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::core::types::GridPos;
use crate::diplomacy::TreatyKind;
use crate::governance::{GovFunction, Reform};
use crate::knowledge::Domain;
use crate::military::{ConquestKind, UnitType};

/// Something an actor wants done; carried out by the owning manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecisionKind {
    // Strategic
    FoundSettlement { near: GridPos },
    DeclareWar { target: String },
    MakePeace { target: String },
    ProposeTreaty { partner: String, kind: TreatyKind },
    Reform(Reform),
    BuildInstitution { name: String, function: GovFunction },
    SetResearchFocus(Domain),
    BeginConquest { settlement: String, kind: ConquestKind },
    // Tactical
    TrainUnit { settlement: String, unit_type: UnitType },
    MoveUnit { unit: String, to: GridPos },
    Attack { unit: String, target: String },
}

impl DecisionKind {
    pub fn is_tactical(&self) -> bool {
        matches!(
            self,
            DecisionKind::TrainUnit { .. } | DecisionKind::MoveUnit { .. } | DecisionKind::Attack { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub kind: DecisionKind,
    /// Raw desirability in [0, 1]
    pub utility: f32,
    /// `utility * personality weight`
    pub priority: f32,
    pub created_at: f64,
}

impl Decision {
    pub fn new(kind: DecisionKind, utility: f32, weight: f32, now: f64) -> Self {
        let utility = utility.clamp(0.0, 1.0);
        Self {
            kind,
            utility,
            priority: utility * weight,
            created_at: now,
        }
    }
}

/// Highest priority first; equal priorities keep insertion order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionQueue {
    items: Vec<Decision>,
    capacity: usize,
}

impl DecisionQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decision> {
        self.items.iter()
    }

    pub fn peek(&self) -> Option<&Decision> {
        self.items.first()
    }

    /// Insert, replacing an equal decision only when the new one ranks higher.
    /// The lowest entries fall off past capacity.
    pub fn push(&mut self, decision: Decision) {
        if let Some(existing) = self.items.iter_mut().find(|d| d.kind == decision.kind) {
            if decision.priority > existing.priority {
                *existing = decision;
            }
        } else {
            self.items.push(decision);
        }
        self.items.sort_by_key(|d| Reverse(OrderedFloat(d.priority)));
        self.items.truncate(self.capacity);
    }

    pub fn pop(&mut self) -> Option<Decision> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        }
    }

    /// Drop decisions older than `ttl`
    pub fn prune(&mut self, now: f64, ttl: f64) -> usize {
        let before = self.items.len();
        self.items.retain(|d| now - d.created_at <= ttl);
        before - self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn focus(d: Domain, utility: f32) -> Decision {
        Decision::new(DecisionKind::SetResearchFocus(d), utility, 1.0, 0.0)
    }

    #[test]
    fn test_queue_orders_by_priority() {
        let mut q = DecisionQueue::with_capacity(4);
        q.push(focus(Domain::Science, 0.2));
        q.push(focus(Domain::Medicine, 0.9));
        q.push(focus(Domain::Culture, 0.5));
        assert_eq!(q.pop().unwrap().kind, DecisionKind::SetResearchFocus(Domain::Medicine));
        assert_eq!(q.pop().unwrap().kind, DecisionKind::SetResearchFocus(Domain::Culture));
    }

    #[test]
    fn test_queue_dedupes_and_truncates() {
        let mut q = DecisionQueue::with_capacity(2);
        q.push(focus(Domain::Science, 0.2));
        q.push(focus(Domain::Science, 0.6));
        assert_eq!(q.len(), 1);
        assert!((q.peek().unwrap().priority - 0.6).abs() < 1e-6);
        q.push(focus(Domain::Medicine, 0.1));
        q.push(focus(Domain::Culture, 0.3));
        assert_eq!(q.len(), 2);
        assert!(q.iter().all(|d| d.kind != DecisionKind::SetResearchFocus(Domain::Medicine)));
    }

    #[test]
    fn test_prune_by_age() {
        let mut q = DecisionQueue::with_capacity(4);
        q.push(focus(Domain::Science, 0.2));
        assert_eq!(q.prune(25.0, 20.0), 1);
        assert!(q.is_empty());
    }

    #[test]
    fn test_tactical_split() {
        assert!(DecisionKind::Attack {
            unit: "U1".into(),
            target: "U2".into()
        }
        .is_tactical());
        assert!(!DecisionKind::SetResearchFocus(Domain::Science).is_tactical());
    }
}
