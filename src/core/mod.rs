pub mod clock;
pub mod config;
pub mod error;
pub mod game_config;
pub mod logging;
pub mod rng;
pub mod types;

pub use clock::{Season, SimClock};
pub use config::SimulationParams;
pub use error::{CivError, ErrorCode, Result};
pub use game_config::{ConfigStore, ConfigValue, GameConfig};
pub use types::{GridPos, Tick, Vec2};
