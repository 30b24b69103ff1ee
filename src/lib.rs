//! Arena Steward - automated game-playing client orchestration
//!
//! This crate supervises concurrent game sessions against a remote game arena
//! under a fixed concurrency budget: it multiplexes server-pushed challenge
//! and game-lifecycle events, accepts or declines inbound challenges, and
//! seeks opponents through a matchmaking subsystem when idle. The network
//! layer is abstracted behind the [`client::ArenaClient`] capability trait.

pub mod client;
pub mod config;
pub mod error;
pub mod game;
pub mod matchmaking;
pub mod metrics;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{Result, StewardError};
pub use types::*;

// Re-export key components
pub use client::ArenaClient;
pub use game::{GameCounter, GameManager};
pub use matchmaking::MatchmakingEngine;
pub use service::AppState;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
