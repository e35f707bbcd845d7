//! Civ Sim - deterministic simulation core for an emergent grand-strategy game
//!
//! Nations are never scripted. Settlements grow on a generated map, cultures
//! drift and assimilate, languages split, governments reform themselves and
//! AI actors plan wars and treaties from what they observe. Everything runs
//! off seeded per-subsystem RNG streams inside [`simulation::Simulation`].

pub mod ai;
pub mod core;
pub mod culture;
pub mod diplomacy;
pub mod economy;
pub mod governance;
pub mod journal;
pub mod knowledge;
pub mod language;
pub mod military;
pub mod population;
pub mod runtime;
pub mod settlement;
pub mod simulation;
pub mod world;

pub use crate::core::error::{CivError, ErrorCode, Result};
pub use crate::core::{GameConfig, SimulationParams};
pub use crate::journal::{EventKind, Journal};
pub use crate::simulation::{NationSpec, SimState, Simulation, TickReport};
