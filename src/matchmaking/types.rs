//! Matchmaking type catalog
//!
//! A matchmaking type is a named preset of time control, variant, and
//! rating-tolerance parameters the steward can seek games under. The catalog
//! is built once from configuration; weights and cooldown multipliers are
//! normalized at construction relative to sibling types.

use crate::config::MatchmakingTypeConfig;
use crate::error::{Result, StewardError};
use crate::types::{PerfType, Variant};
use crate::utils::format_time_control;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Base cooldown multiplier applied when the config leaves it unset
const DEFAULT_MULTIPLIER: f64 = 15.0;

/// Rating-diff window applied when the config leaves it unset
const DEFAULT_MIN_RATING_DIFF: i32 = 0;
const DEFAULT_MAX_RATING_DIFF: i32 = 10_000;

/// One immutable entry of the matchmaking catalog
#[derive(Debug, Clone)]
pub struct MatchmakingType {
    pub name: String,
    /// Initial clock time in seconds
    pub initial_time: u32,
    /// Clock increment in seconds
    pub increment: u32,
    pub rated: bool,
    pub variant: Variant,
    pub perf_type: PerfType,
    /// Opponent-cooldown scaling factor
    pub multiplier: f64,
    /// Relative weight for random type selection
    pub weight: f64,
    pub min_rating_diff: i32,
    pub max_rating_diff: i32,
}

impl MatchmakingType {
    /// Worst-case wall-clock length of one game under this type
    ///
    /// Models ~80 plies per side plus increment accrual; used for weight
    /// normalization and cooldown scaling.
    pub fn estimated_game_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.initial_time) * 2 + u64::from(self.increment) * 160)
    }
}

impl std::fmt::Display for MatchmakingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (TC: {}, {}, {})",
            self.name,
            format_time_control(self.initial_time, self.increment),
            if self.rated { "rated" } else { "casual" },
            self.variant
        )
    }
}

/// Build the active catalog from the configured type table
///
/// Types are ordered by name so the catalog is deterministic regardless of
/// map iteration order. Types without an explicit weight are weighted
/// inversely to their estimated game duration; types without an explicit
/// multiplier are scaled by the number of distinct perf categories.
pub fn build_catalog(types: &HashMap<String, MatchmakingTypeConfig>) -> Result<Vec<MatchmakingType>> {
    let mut names: Vec<&String> = types.keys().collect();
    names.sort();

    let mut catalog = Vec::with_capacity(names.len());
    for name in names {
        let config = &types[name];
        let (initial_time, increment) = parse_time_control(name, &config.time_control)?;
        let variant = config.variant.unwrap_or(Variant::Standard);
        let perf_type = perf_type_for(variant, initial_time, increment);

        catalog.push(MatchmakingType {
            name: name.clone(),
            initial_time,
            increment,
            rated: config.rated.unwrap_or(true),
            variant,
            perf_type,
            multiplier: config.multiplier.unwrap_or(DEFAULT_MULTIPLIER),
            weight: config.weight.unwrap_or(1.0),
            min_rating_diff: config.min_rating_diff.unwrap_or(DEFAULT_MIN_RATING_DIFF),
            max_rating_diff: config.max_rating_diff.unwrap_or(DEFAULT_MAX_RATING_DIFF),
        });
    }

    let perf_count = catalog
        .iter()
        .map(|t| t.perf_type)
        .collect::<HashSet<_>>()
        .len();

    for mm_type in &mut catalog {
        let config = &types[&mm_type.name];
        if config.multiplier.is_none() {
            mm_type.multiplier *= perf_count as f64;
        }
        if config.weight.is_none() {
            let estimated = mm_type.estimated_game_duration().as_secs().max(1);
            mm_type.weight /= estimated as f64;
        }
    }

    Ok(catalog)
}

/// Parse a "minutes+increment" time control, e.g. "3+2" or "0.5+0"
fn parse_time_control(name: &str, time_control: &str) -> Result<(u32, u32)> {
    let invalid = || StewardError::ConfigurationError {
        message: format!(
            "Matchmaking type {} has invalid time control: {}",
            name, time_control
        ),
    };

    let (initial_part, increment_part) = time_control.split_once('+').ok_or_else(invalid)?;

    let initial_time = if initial_part.is_empty() {
        0
    } else {
        let minutes: f64 = initial_part.parse().map_err(|_| invalid())?;
        if !(0.0..=180.0).contains(&minutes) {
            return Err(invalid().into());
        }
        (minutes * 60.0).round() as u32
    };

    let increment = if increment_part.is_empty() {
        0
    } else {
        increment_part.parse().map_err(|_| invalid())?
    };

    Ok((initial_time, increment))
}

/// Derive the rating bucket a game of this shape counts toward
pub fn perf_type_for(variant: Variant, initial_time: u32, increment: u32) -> PerfType {
    match variant {
        Variant::Standard => {
            let estimated = initial_time + increment * 40;
            if estimated < 179 {
                PerfType::Bullet
            } else if estimated < 479 {
                PerfType::Blitz
            } else if estimated < 1499 {
                PerfType::Rapid
            } else {
                PerfType::Classical
            }
        }
        Variant::Chess960 => PerfType::Chess960,
        Variant::Crazyhouse => PerfType::Crazyhouse,
        Variant::Antichess => PerfType::Antichess,
        Variant::Atomic => PerfType::Atomic,
        Variant::Horde => PerfType::Horde,
        Variant::KingOfTheHill => PerfType::KingOfTheHill,
        Variant::RacingKings => PerfType::RacingKings,
        Variant::ThreeCheck => PerfType::ThreeCheck,
    }
}
