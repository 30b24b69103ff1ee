//! Inbound challenge screening
//!
//! Checks an inbound challenge against the configured variant, time-control,
//! and mode policies before it ever reaches the pending queue. Returns the
//! decline reason to send back, or `None` when the challenge is acceptable.

use crate::config::ChallengeSettings;
use crate::types::{ChallengeInfo, DeclineReason, GameMode, Speed};
use tracing::info;

/// Decide whether an inbound challenge must be declined
pub fn screen_challenge(
    challenge: &ChallengeInfo,
    settings: &ChallengeSettings,
    blacklist: &[String],
) -> Option<DeclineReason> {
    if blacklist
        .iter()
        .any(|name| name.eq_ignore_ascii_case(&challenge.challenger))
    {
        info!("Challenger {} is blacklisted", challenge.challenger);
        return Some(DeclineReason::Generic);
    }

    if !settings.variants.contains(&challenge.variant) {
        info!("Variant {} is not allowed by config", challenge.variant);
        return Some(DeclineReason::Variant);
    }

    if !settings.time_controls.contains(&challenge.speed) {
        info!("Speed {:?} is not allowed by config", challenge.speed);
        return Some(DeclineReason::TimeControl);
    }

    if challenge.initial_time < settings.min_initial
        || challenge.increment < settings.min_increment
    {
        info!(
            "Time control {}+{} is too fast for config",
            challenge.initial_time, challenge.increment
        );
        return Some(DeclineReason::TooFast);
    }

    if challenge.initial_time > settings.max_initial
        || challenge.increment > settings.max_increment
    {
        info!(
            "Time control {}+{} is too slow for config",
            challenge.initial_time, challenge.increment
        );
        return Some(DeclineReason::TooSlow);
    }

    if settings.bullet_with_increment_only
        && challenge.speed == Speed::Bullet
        && challenge.increment == 0
    {
        info!("Zero-increment bullet is not allowed by config");
        return Some(DeclineReason::TooFast);
    }

    let modes = if challenge.is_bot() {
        &settings.bot_modes
    } else {
        &settings.human_modes
    };

    if modes.is_empty() {
        return Some(if challenge.is_bot() {
            info!("Bot challengers are not allowed by config");
            DeclineReason::NoBot
        } else {
            info!("Human challengers are not allowed by config");
            DeclineReason::OnlyBot
        });
    }

    if challenge.rated && !modes.contains(&GameMode::Rated) {
        info!("Rated is not allowed by config");
        return Some(DeclineReason::Casual);
    }
    if !challenge.rated && !modes.contains(&GameMode::Casual) {
        info!("Casual is not allowed by config");
        return Some(DeclineReason::Rated);
    }

    None
}
