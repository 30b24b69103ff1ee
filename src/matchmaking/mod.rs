//! Matchmaking subsystem
//!
//! Seeks opponents when the steward is idle: a weighted type catalog, an
//! opponent selector with cooldowns, a challenger for the outgoing request,
//! and the engine that drives one attempt per cycle.

pub mod challenger;
pub mod engine;
pub mod opponents;
pub mod types;

pub use challenger::Challenger;
pub use engine::MatchmakingEngine;
pub use opponents::OpponentSelector;
pub use types::{build_catalog, MatchmakingType};
