//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! arena-steward orchestration core, including TOML file loading, environment
//! variable overrides, and validation.

use crate::types::{GameMode, Speed, Variant};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub challenge: ChallengeSettings,
    pub matchmaking: MatchmakingSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for the health/metrics endpoint
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Inbound challenge screening settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeSettings {
    /// Global ceiling on concurrent games, reserved slots included
    pub max_concurrent_games: usize,
    /// Variants accepted from challengers
    pub variants: Vec<Variant>,
    /// Speed classes accepted from challengers
    pub time_controls: Vec<Speed>,
    /// Initial clock bounds in seconds
    pub min_initial: u32,
    pub max_initial: u32,
    /// Increment bounds in seconds
    pub min_increment: u32,
    pub max_increment: u32,
    /// Modes accepted from bot challengers; empty declines all bots
    pub bot_modes: Vec<GameMode>,
    /// Modes accepted from human challengers; empty declines all humans
    pub human_modes: Vec<GameMode>,
    /// Decline zero-increment bullet challenges
    pub bullet_with_increment_only: bool,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Whether the steward seeks games on its own when idle
    pub enabled: bool,
    /// How long to wait for a terminal event on an outgoing challenge, seconds
    pub poll_timeout_seconds: u64,
    /// Base opponent cooldown after a resolved matchmaking game, seconds
    pub delay_seconds: u64,
    /// Usernames never challenged and never accepted
    pub blacklist: Vec<String>,
    /// Matchmaking type catalog, keyed by type name
    pub types: HashMap<String, MatchmakingTypeConfig>,
}

/// One entry of the matchmaking type table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchmakingTypeConfig {
    /// Time control as "minutes+increment", e.g. "3+2" or "0.5+0"
    pub time_control: String,
    pub rated: Option<bool>,
    pub variant: Option<Variant>,
    /// Opponent-cooldown scaling factor
    pub multiplier: Option<f64>,
    /// Relative selection weight
    pub weight: Option<f64>,
    pub min_rating_diff: Option<i32>,
    pub max_rating_diff: Option<i32>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "arena-steward".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for ChallengeSettings {
    fn default() -> Self {
        Self {
            max_concurrent_games: 1,
            variants: vec![Variant::Standard],
            time_controls: vec![Speed::Bullet, Speed::Blitz, Speed::Rapid],
            min_initial: 0,
            max_initial: 10_800, // 3 hours
            min_increment: 0,
            max_increment: 180,
            bot_modes: vec![GameMode::Rated, GameMode::Casual],
            human_modes: vec![GameMode::Rated, GameMode::Casual],
            bullet_with_increment_only: false,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_timeout_seconds: 20,
            delay_seconds: 10,
            blacklist: Vec::new(),
            types: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Apply environment variable overrides on top of the current values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            self.service.health_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HEALTH_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }
        if let Ok(max_games) = env::var("MAX_CONCURRENT_GAMES") {
            self.challenge.max_concurrent_games = max_games
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_CONCURRENT_GAMES value: {}", max_games))?;
        }
        if let Ok(enabled) = env::var("MATCHMAKING_ENABLED") {
            self.matchmaking.enabled = enabled
                .parse()
                .map_err(|_| anyhow!("Invalid MATCHMAKING_ENABLED value: {}", enabled))?;
        }
        if let Ok(delay) = env::var("MATCHMAKING_DELAY_SECONDS") {
            self.matchmaking.delay_seconds = delay
                .parse()
                .map_err(|_| anyhow!("Invalid MATCHMAKING_DELAY_SECONDS value: {}", delay))?;
        }
        if let Ok(timeout) = env::var("MATCHMAKING_POLL_TIMEOUT_SECONDS") {
            self.matchmaking.poll_timeout_seconds = timeout.parse().map_err(|_| {
                anyhow!("Invalid MATCHMAKING_POLL_TIMEOUT_SECONDS value: {}", timeout)
            })?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get the outgoing-challenge poll timeout as Duration
    pub fn matchmaking_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.matchmaking.poll_timeout_seconds.max(1))
    }

    /// Get the opponent cooldown base delay as Duration
    pub fn opponent_delay(&self) -> Duration {
        Duration::from_secs(self.matchmaking.delay_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate challenge screening
    if config.challenge.max_concurrent_games == 0 {
        return Err(anyhow!("max_concurrent_games must be greater than 0"));
    }
    if config.challenge.min_initial > config.challenge.max_initial {
        return Err(anyhow!("min_initial cannot exceed max_initial"));
    }
    if config.challenge.min_increment > config.challenge.max_increment {
        return Err(anyhow!("min_increment cannot exceed max_increment"));
    }
    if config.challenge.variants.is_empty() {
        return Err(anyhow!("At least one variant must be allowed"));
    }
    if config.challenge.time_controls.is_empty() {
        return Err(anyhow!("At least one time control speed must be allowed"));
    }

    // Validate matchmaking
    if config.matchmaking.enabled && config.matchmaking.types.is_empty() {
        return Err(anyhow!(
            "Matchmaking is enabled but no matchmaking types are configured"
        ));
    }
    for (name, type_config) in &config.matchmaking.types {
        if type_config.time_control.is_empty() {
            return Err(anyhow!("Matchmaking type {} has no time control", name));
        }
        if let (Some(min), Some(max)) = (type_config.min_rating_diff, type_config.max_rating_diff)
        {
            if min > max {
                return Err(anyhow!(
                    "Matchmaking type {} has min_rating_diff above max_rating_diff",
                    name
                ));
            }
        }
        if let Some(weight) = type_config.weight {
            if weight <= 0.0 {
                return Err(anyhow!(
                    "Matchmaking type {} must have a positive weight",
                    name
                ));
            }
        }
    }

    Ok(())
}
