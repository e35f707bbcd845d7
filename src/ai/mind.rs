//! Per-actor personality and queues

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ai::decision::{Decision, DecisionQueue};

/// Weights multiplying the utility of each family of decisions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiPersonality {
    pub expansion: f32,
    pub aggression: f32,
    pub diplomacy: f32,
    pub science: f32,
    pub order: f32,
}

impl Default for AiPersonality {
    fn default() -> Self {
        Self {
            expansion: 0.5,
            aggression: 0.5,
            diplomacy: 0.5,
            science: 0.5,
            order: 0.5,
        }
    }
}

impl AiPersonality {
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self {
            expansion: rng.gen_range(0.2..1.0),
            aggression: rng.gen_range(0.1..0.9),
            diplomacy: rng.gen_range(0.2..1.0),
            science: rng.gen_range(0.2..1.0),
            order: rng.gen_range(0.2..1.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorMind {
    pub actor_id: String,
    pub personality: AiPersonality,
    pub strategic: DecisionQueue,
    pub tactical: DecisionQueue,
    /// Simulation time of the last re-plan
    pub last_plan: Option<f64>,
}

impl ActorMind {
    pub fn new(actor_id: &str, personality: AiPersonality, capacity: usize) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            personality,
            strategic: DecisionQueue::with_capacity(capacity),
            tactical: DecisionQueue::with_capacity(capacity),
            last_plan: None,
        }
    }

    pub fn due(&self, now: f64, interval: f64) -> bool {
        self.last_plan.map_or(true, |t| now - t >= interval)
    }

    pub fn enqueue(&mut self, decision: Decision) {
        if decision.kind.is_tactical() {
            self.tactical.push(decision);
        } else {
            self.strategic.push(decision);
        }
    }
}
