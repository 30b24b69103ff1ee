//! Opponent selection with cooldowns and rating-tolerance widening
//!
//! The selector filters the online-bot roster for a matchmaking type, skipping
//! TOS-flagged accounts, opponents under an active cooldown, and bots already
//! skipped this roster generation. When nothing matches the configured rating
//! window, the window widens monotonically across calls until a ceiling; a
//! fresh game start resets the widening.

use crate::error::{Result, StewardError};
use crate::matchmaking::types::MatchmakingType;
use crate::types::{Bot, ChallengeColor, PerfType};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

/// Highest widening step; beyond this the search reports no opponent
const WIDENING_CEILING: u32 = 4;

/// Tolerance factor applied to the rating window at a widening step
fn tolerance_factor(step: u32) -> f64 {
    1.0 + 0.5 * f64::from(step)
}

/// Picks the next opponent and color for a matchmaking type
pub struct OpponentSelector {
    base_delay: Duration,
    /// Cooldown expiries per (opponent, rating bucket)
    timeouts: HashMap<(String, PerfType), DateTime<Utc>>,
    /// Bots skipped this roster generation (busy at selection time)
    skipped: HashSet<String>,
    last_candidate: Option<String>,
    widening: u32,
    next_color: ChallengeColor,
    rng: StdRng,
}

impl OpponentSelector {
    pub fn new(base_delay: Duration) -> Self {
        Self::with_rng(base_delay, StdRng::from_entropy())
    }

    /// Deterministic construction for tests
    pub fn with_seed(base_delay: Duration, seed: u64) -> Self {
        Self::with_rng(base_delay, StdRng::seed_from_u64(seed))
    }

    fn with_rng(base_delay: Duration, rng: StdRng) -> Self {
        Self {
            base_delay,
            timeouts: HashMap::new(),
            skipped: HashSet::new(),
            last_candidate: None,
            widening: 0,
            next_color: ChallengeColor::White,
            rng,
        }
    }

    /// Select an opponent and the color to play against it
    ///
    /// Candidates are filtered at the current widening step first; each empty
    /// pass loosens the rating window one step until the ceiling, at which
    /// point `NoOpponent` is returned and the widening stays pinned.
    pub fn select(
        &mut self,
        bots: &[Bot],
        mm_type: &MatchmakingType,
    ) -> Result<(Bot, ChallengeColor)> {
        let now = current_timestamp();

        for step in self.widening..=WIDENING_CEILING {
            let factor = tolerance_factor(step);
            let min_diff = (f64::from(mm_type.min_rating_diff) / factor).floor() as i32;
            let max_diff = (f64::from(mm_type.max_rating_diff) * factor).ceil() as i32;

            let eligible: Vec<&Bot> = bots
                .iter()
                .filter(|bot| {
                    !bot.tos_violation
                        && !self.skipped.contains(&bot.username)
                        && !self.is_timed_out(&bot.username, mm_type.perf_type, now)
                        && {
                            let diff = bot
                                .rating_diffs
                                .get(&mm_type.perf_type)
                                .copied()
                                .unwrap_or(0)
                                .abs();
                            diff >= min_diff && diff <= max_diff
                        }
                })
                .collect();

            if let Some(bot) = eligible.choose(&mut self.rng) {
                if step > self.widening {
                    debug!(
                        "Widened rating tolerance to x{:.1} for {}",
                        factor, mm_type.name
                    );
                }
                self.widening = step;
                self.last_candidate = Some(bot.username.clone());
                let color = self.next_color;
                self.next_color = color.opposite();
                return Ok(((*bot).clone(), color));
            }
        }

        self.widening = WIDENING_CEILING;
        Err(StewardError::NoOpponent {
            type_name: mm_type.name.clone(),
        }
        .into())
    }

    /// Discard the most recently selected candidate without recording a
    /// cooldown (it turned out to be busy)
    pub fn skip_bot(&mut self) {
        if let Some(username) = self.last_candidate.take() {
            self.skipped.insert(username);
        }
    }

    /// Forget session skips; called when the roster is refreshed
    pub fn clear_skips(&mut self) {
        self.skipped.clear();
    }

    /// Collapse the rating window back to the configured bounds
    pub fn reset_widening(&mut self) {
        self.widening = 0;
    }

    /// Record a cooldown after a resolved matchmaking attempt
    ///
    /// Completed games cool down for `base_delay * multiplier`; aborted games
    /// and failed challenges retry after the base delay, stretched to the game
    /// duration when that is longer.
    pub fn add_timeout(
        &mut self,
        username: &str,
        completed: bool,
        game_duration: Duration,
        mm_type: &MatchmakingType,
    ) {
        let cooldown = if completed {
            self.base_delay.mul_f64(mm_type.multiplier)
        } else {
            self.base_delay.max(game_duration)
        };

        let expiry = current_timestamp()
            + chrono::Duration::from_std(cooldown).unwrap_or_else(|_| chrono::Duration::zero());
        debug!(
            "Cooldown for {} under {} until {}",
            username, mm_type.perf_type, expiry
        );
        self.timeouts
            .insert((username.to_string(), mm_type.perf_type), expiry);
    }

    /// Active cooldown expiry for an opponent, if any
    pub fn timeout_until(&self, username: &str, perf_type: PerfType) -> Option<DateTime<Utc>> {
        self.timeouts
            .get(&(username.to_string(), perf_type))
            .copied()
    }

    fn is_timed_out(&self, username: &str, perf_type: PerfType, now: DateTime<Utc>) -> bool {
        self.timeouts
            .get(&(username.to_string(), perf_type))
            .is_some_and(|expiry| *expiry > now)
    }
}
