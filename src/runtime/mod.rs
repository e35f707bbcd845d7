//! Profiling, caching and event fan-out used by the simulation loop

pub mod cache;
pub mod dispatcher;
pub mod optimizer;

pub use cache::TtlCache;
pub use dispatcher::{EventDispatcher, HandlerId};
pub use optimizer::{Metric, Optimizer};
