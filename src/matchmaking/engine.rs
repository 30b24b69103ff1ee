//! Matchmaking engine
//!
//! Owns the online-bot roster, the matchmaking type catalog, and the opponent
//! cooldown bookkeeping, and drives one challenge-creation attempt per
//! invocation. Types that cannot find any opponent are suspended and restored
//! on the next roster refresh; an empty active catalog is reported as a
//! misconfiguration.

use crate::client::ArenaClient;
use crate::config::MatchmakingSettings;
use crate::error::Result;
use crate::matchmaking::challenger::Challenger;
use crate::matchmaking::opponents::OpponentSelector;
use crate::matchmaking::types::{build_catalog, MatchmakingType};
use crate::types::{Bot, BusyReason, ChallengeRequest, ChallengeResponse, PerfType};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// How long a fetched roster stays fresh, in minutes
const ROSTER_REFRESH_MINUTES: i64 = 30;

/// Rating assumed for buckets the account has not played
const DEFAULT_OWN_RATING: i32 = 2500;

/// Rating assumed for buckets an opponent has not played
const DEFAULT_BOT_RATING: i32 = 1500;

/// Drives matchmaking: roster refresh, type selection, opponent search,
/// busy check, and the challenge attempt itself
pub struct MatchmakingEngine {
    client: Arc<dyn ArenaClient>,
    challenger: Challenger,
    selector: OpponentSelector,
    username: String,
    blacklist: Vec<String>,
    poll_timeout: Duration,
    types: Vec<MatchmakingType>,
    suspended: Vec<MatchmakingType>,
    online_bots: Vec<Bot>,
    next_refresh: DateTime<Utc>,
    game_start: DateTime<Utc>,
    current_type: Option<MatchmakingType>,
    current_opponent: Option<String>,
    rng: StdRng,
}

impl MatchmakingEngine {
    pub fn new(
        client: Arc<dyn ArenaClient>,
        username: String,
        settings: &MatchmakingSettings,
    ) -> Result<Self> {
        Self::with_rng(client, username, settings, StdRng::from_entropy())
    }

    /// Deterministic construction for tests
    pub fn with_seed(
        client: Arc<dyn ArenaClient>,
        username: String,
        settings: &MatchmakingSettings,
        seed: u64,
    ) -> Result<Self> {
        Self::with_rng(client, username, settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        client: Arc<dyn ArenaClient>,
        username: String,
        settings: &MatchmakingSettings,
        rng: StdRng,
    ) -> Result<Self> {
        let types = build_catalog(&settings.types)?;
        let base_delay = Duration::from_secs(settings.delay_seconds);

        Ok(Self {
            challenger: Challenger::new(client.clone()),
            selector: OpponentSelector::new(base_delay),
            client,
            username,
            blacklist: settings.blacklist.clone(),
            poll_timeout: Duration::from_secs(settings.poll_timeout_seconds.max(1)),
            types,
            suspended: Vec::new(),
            online_bots: Vec::new(),
            next_refresh: current_timestamp(),
            game_start: current_timestamp(),
            current_type: None,
            current_opponent: None,
            rng,
        })
    }

    /// Run one matchmaking cycle
    ///
    /// Returns `None` when the cycle was a no-op (roster refresh, busy or
    /// offline candidate), otherwise the terminal outcome of the attempt.
    pub async fn create_challenge(&mut self) -> Option<ChallengeResponse> {
        if self.refresh_due() {
            self.refresh_roster().await;
            return None;
        }

        if self.current_type.is_none() {
            if self.types.is_empty() {
                warn!("No usable matchmaking type configured");
                return Some(ChallengeResponse::misconfigured());
            }
            match self.types.choose_weighted(&mut self.rng, |t| t.weight) {
                Ok(choice) => {
                    info!("Matchmaking type: {}", choice);
                    self.current_type = Some(choice.clone());
                }
                Err(e) => {
                    warn!("Matchmaking type selection failed: {}", e);
                    return Some(ChallengeResponse::misconfigured());
                }
            }
        }

        let mm_type = self.current_type.clone()?;

        let (opponent, color) = match self.selector.select(&self.online_bots, &mm_type) {
            Ok(pair) => pair,
            Err(_) => {
                info!(
                    "Suspending matchmaking type {}: no suitable opponent is available",
                    mm_type.name
                );
                self.types.retain(|t| t.name != mm_type.name);
                self.suspended.push(mm_type);
                self.current_type = None;
                if self.types.is_empty() {
                    warn!("No usable matchmaking type configured");
                    return Some(ChallengeResponse::misconfigured());
                }
                return Some(ChallengeResponse::no_opponent());
            }
        };

        let rating_diff = opponent
            .rating_diffs
            .get(&mm_type.perf_type)
            .copied()
            .unwrap_or(0);

        if let Some(busy_reason) = self.busy_reason(&opponent).await {
            match busy_reason {
                BusyReason::Playing => {
                    debug!(
                        "Skipping {} ({:+}): currently playing",
                        opponent.username, rating_diff
                    );
                    self.selector.skip_bot();
                }
                BusyReason::Offline => {
                    info!(
                        "Removing {} from online bots: no longer online",
                        opponent.username
                    );
                    self.online_bots.retain(|bot| bot != &opponent);
                }
            }
            return None;
        }

        info!(
            "Challenging {} ({:+}) as {} to {}",
            opponent.username, rating_diff, color, mm_type
        );
        let request = ChallengeRequest {
            opponent: opponent.username.clone(),
            initial_time: mm_type.initial_time,
            increment: mm_type.increment,
            rated: mm_type.rated,
            color,
            variant: mm_type.variant,
            timeout: self.poll_timeout,
        };

        self.current_opponent = Some(opponent.username.clone());
        let response = self.challenger.create(&request).await;

        if !response.success && !(response.has_reached_rate_limit || response.is_misconfigured) {
            self.selector.add_timeout(
                &opponent.username,
                false,
                mm_type.estimated_game_duration(),
                &mm_type,
            );
        }

        Some(response)
    }

    /// Called when the matchmaking-originated game actually starts
    pub fn on_game_started(&mut self) {
        self.game_start = current_timestamp();
        self.selector.reset_widening();
    }

    /// Called when the matchmaking-originated game ends
    ///
    /// Aborted games substitute the estimated duration, since the real one is
    /// not representative, and do not count as completed for cooldown scaling.
    pub fn on_game_finished(&mut self, was_aborted: bool) {
        let Some(mm_type) = self.current_type.take() else {
            return;
        };

        let mut game_duration = (current_timestamp() - self.game_start).to_std().unwrap_or_default();
        if was_aborted {
            game_duration += mm_type.estimated_game_duration();
        }

        if let Some(opponent) = self.current_opponent.take() {
            self.selector
                .add_timeout(&opponent, !was_aborted, game_duration, &mm_type);
        }
    }

    /// Number of bots currently in the roster
    pub fn online_bot_count(&self) -> usize {
        self.online_bots.len()
    }

    /// Number of types currently suspended
    pub fn suspended_type_count(&self) -> usize {
        self.suspended.len()
    }

    /// Number of types currently selectable
    pub fn active_type_count(&self) -> usize {
        self.types.len()
    }

    /// Opponent cooldown bookkeeping, read-only
    pub fn selector(&self) -> &OpponentSelector {
        &self.selector
    }

    fn refresh_due(&self) -> bool {
        current_timestamp() >= self.next_refresh || self.online_bots.is_empty()
    }

    async fn refresh_roster(&mut self) {
        info!("Updating online bots and rankings ...");

        // A changed roster may make a suspended type viable again.
        if !self.suspended.is_empty() {
            info!("Restoring {} suspended matchmaking types", self.suspended.len());
            self.types.append(&mut self.suspended);
        }
        self.selector.clear_skips();

        match self.fetch_online_bots().await {
            Ok(bots) => {
                self.online_bots = bots;
                self.next_refresh = current_timestamp() + chrono::Duration::minutes(ROSTER_REFRESH_MINUTES);
            }
            Err(e) => {
                warn!("Failed to refresh online bots: {}", e);
            }
        }
    }

    async fn fetch_online_bots(&mut self) -> Result<Vec<Bot>> {
        let account = self.client.get_account().await?;
        let own_ratings: HashMap<PerfType, i32> = PerfType::ALL
            .iter()
            .map(|perf| {
                (
                    *perf,
                    account
                        .ratings
                        .get(perf)
                        .copied()
                        .unwrap_or(DEFAULT_OWN_RATING),
                )
            })
            .collect();

        let mut stream = self.client.stream_online_bots().await?;
        let mut bots = Vec::new();
        let (mut online, mut flagged, mut disabled, mut blacklisted) = (0, 0, 0, 0);

        while let Some(info) = stream.next().await {
            online += 1;
            if info.tos_violation {
                flagged += 1;
            }
            if info.username == self.username {
                continue;
            }
            if info.disabled {
                disabled += 1;
                continue;
            }
            if self
                .blacklist
                .iter()
                .any(|name| name.eq_ignore_ascii_case(&info.username))
            {
                blacklisted += 1;
                continue;
            }

            let rating_diffs = PerfType::ALL
                .iter()
                .map(|perf| {
                    let bot_rating = info
                        .ratings
                        .get(perf)
                        .copied()
                        .unwrap_or(DEFAULT_BOT_RATING);
                    (*perf, bot_rating - own_ratings[perf])
                })
                .collect();

            bots.push(Bot {
                username: info.username,
                tos_violation: info.tos_violation,
                rating_diffs,
            });
        }

        info!(
            "{} bots online: {} with TOS violations, {} disabled, {} blacklisted",
            online, flagged, disabled, blacklisted
        );
        Ok(bots)
    }

    async fn busy_reason(&self, bot: &Bot) -> Option<BusyReason> {
        match self.client.get_user_status(&bot.username).await {
            Ok(status) if !status.online => Some(BusyReason::Offline),
            Ok(status) if status.playing => Some(BusyReason::Playing),
            Ok(_) => None,
            Err(e) => {
                warn!("Status lookup for {} failed: {}", bot.username, e);
                Some(BusyReason::Playing)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn set_roster_stale(&mut self) {
        self.next_refresh = current_timestamp();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockArenaClient;
    use crate::config::MatchmakingTypeConfig;
    use crate::types::{AccountInfo, BotInfo, ChallengeEvent, UserStatus};

    fn settings(max_rating_diff: Option<i32>) -> MatchmakingSettings {
        MatchmakingSettings {
            enabled: true,
            poll_timeout_seconds: 1,
            delay_seconds: 60,
            blacklist: vec!["pariah".to_string()],
            types: HashMap::from([(
                "bullet".to_string(),
                MatchmakingTypeConfig {
                    time_control: "1+0".to_string(),
                    multiplier: Some(3.0),
                    max_rating_diff,
                    ..Default::default()
                },
            )]),
        }
    }

    fn bot_info(username: &str, bullet_rating: i32) -> BotInfo {
        BotInfo {
            username: username.to_string(),
            disabled: false,
            tos_violation: false,
            ratings: HashMap::from([(PerfType::Bullet, bullet_rating)]),
        }
    }

    fn client_with_bots(bots: Vec<BotInfo>) -> Arc<MockArenaClient> {
        let client = Arc::new(MockArenaClient::new());
        client.set_account(AccountInfo {
            username: "steward".to_string(),
            ratings: HashMap::from([(PerfType::Bullet, 2000)]),
        });
        client.set_online_bots(bots);
        client
    }

    async fn engine_with_fresh_roster(
        client: Arc<MockArenaClient>,
        max_rating_diff: Option<i32>,
    ) -> MatchmakingEngine {
        let mut engine = MatchmakingEngine::with_seed(
            client,
            "steward".to_string(),
            &settings(max_rating_diff),
            42,
        )
        .unwrap();
        // First cycle always refreshes the roster.
        assert!(engine.create_challenge().await.is_none());
        engine
    }

    #[tokio::test]
    async fn test_roster_refresh_filters_self_disabled_and_blacklisted() {
        let client = client_with_bots(vec![
            bot_info("steward", 2000),
            bot_info("rival", 2050),
            bot_info("pariah", 2000),
            BotInfo {
                disabled: true,
                ..bot_info("ghost", 2000)
            },
        ]);
        let engine = engine_with_fresh_roster(client, None).await;

        assert_eq!(engine.online_bot_count(), 1);
    }

    #[tokio::test]
    async fn test_successful_challenge_cycle() {
        let client = client_with_bots(vec![bot_info("rival", 2050)]);
        client.push_challenge_script(vec![
            ChallengeEvent::Created {
                challenge_id: "c1".to_string(),
            },
            ChallengeEvent::Accepted,
        ]);
        let mut engine = engine_with_fresh_roster(client.clone(), None).await;

        let response = engine.create_challenge().await.unwrap();
        assert!(response.success);
        assert_eq!(response.challenge_id.as_deref(), Some("c1"));

        let request = &client.challenge_requests()[0];
        assert_eq!(request.opponent, "rival");
        assert_eq!(request.initial_time, 60);
    }

    #[tokio::test]
    async fn test_completion_cooldown_matches_multiplier_times_delay() {
        let client = client_with_bots(vec![bot_info("bot7", 2050)]);
        client.push_challenge_script(vec![
            ChallengeEvent::Created {
                challenge_id: "c1".to_string(),
            },
            ChallengeEvent::Accepted,
        ]);
        let mut engine = engine_with_fresh_roster(client, None).await;

        let response = engine.create_challenge().await.unwrap();
        assert!(response.success);

        engine.on_game_started();
        engine.on_game_finished(false);

        let expiry = engine
            .selector()
            .timeout_until("bot7", PerfType::Bullet)
            .expect("cooldown entry present");
        // delay 60s * multiplier 3.0
        let expected = current_timestamp() + chrono::Duration::seconds(180);
        assert!((expiry - expected).num_seconds().abs() <= 2);

        // The type selection is cleared for the next cycle.
        let followup = engine.create_challenge().await.unwrap();
        assert!(followup.no_opponent || !followup.success);
    }

    #[tokio::test]
    async fn test_failed_challenge_records_cooldown_and_keeps_type() {
        let client = client_with_bots(vec![bot_info("rival", 2050)]);
        client.push_challenge_script(vec![ChallengeEvent::Declined]);
        let mut engine = engine_with_fresh_roster(client, None).await;

        let response = engine.create_challenge().await.unwrap();
        assert!(!response.success);

        assert!(engine
            .selector()
            .timeout_until("rival", PerfType::Bullet)
            .is_some());
        // A failed attempt may retry the same type on the next cycle.
        assert!(engine.current_type.is_some());
    }

    #[tokio::test]
    async fn test_rate_limit_passes_through_without_cooldown() {
        let client = client_with_bots(vec![bot_info("rival", 2050)]);
        client.push_challenge_script(vec![ChallengeEvent::RateLimited]);
        let mut engine = engine_with_fresh_roster(client, None).await;

        let response = engine.create_challenge().await.unwrap();
        assert!(response.has_reached_rate_limit);
        assert!(engine
            .selector()
            .timeout_until("rival", PerfType::Bullet)
            .is_none());
    }

    #[tokio::test]
    async fn test_busy_opponent_skipped_until_roster_refresh() {
        let client = client_with_bots(vec![bot_info("rival", 2050)]);
        client.set_user_status(
            "rival",
            UserStatus {
                online: true,
                playing: true,
            },
        );
        let mut engine = engine_with_fresh_roster(client.clone(), None).await;

        // Busy candidates are a no-op cycle, not an error, and record nothing.
        assert!(engine.create_challenge().await.is_none());
        assert!(engine
            .selector()
            .timeout_until("rival", PerfType::Bullet)
            .is_none());

        // Once idle again and the roster refreshed, the bot is challengeable.
        client.set_user_status(
            "rival",
            UserStatus {
                online: true,
                playing: false,
            },
        );
        client.push_challenge_script(vec![
            ChallengeEvent::Created {
                challenge_id: "c2".to_string(),
            },
            ChallengeEvent::Accepted,
        ]);
        engine.set_roster_stale();
        assert!(engine.create_challenge().await.is_none()); // refresh cycle
        let response = engine.create_challenge().await.unwrap();
        assert!(response.success);
    }

    #[tokio::test]
    async fn test_offline_opponent_removed_from_roster() {
        let client = client_with_bots(vec![bot_info("rival", 2050)]);
        client.set_user_status(
            "rival",
            UserStatus {
                online: false,
                playing: false,
            },
        );
        let mut engine = engine_with_fresh_roster(client, None).await;

        assert!(engine.create_challenge().await.is_none());
        assert_eq!(engine.online_bot_count(), 0);
    }

    #[tokio::test]
    async fn test_type_suspension_and_misconfiguration() {
        // Ratings 500 apart with a max diff of 100: no opponent even widened.
        let client = client_with_bots(vec![bot_info("rival", 2500)]);
        let mut engine = engine_with_fresh_roster(client, Some(100)).await;

        let response = engine.create_challenge().await.unwrap();
        assert!(response.is_misconfigured);
        assert_eq!(engine.active_type_count(), 0);
        assert_eq!(engine.suspended_type_count(), 1);
    }

    #[tokio::test]
    async fn test_suspended_type_restored_on_refresh() {
        let client = client_with_bots(vec![bot_info("rival", 2500)]);
        let mut engine = engine_with_fresh_roster(client, Some(100)).await;

        let response = engine.create_challenge().await.unwrap();
        assert!(response.is_misconfigured);

        engine.set_roster_stale();
        assert!(engine.create_challenge().await.is_none()); // refresh cycle
        assert_eq!(engine.active_type_count(), 1);
        assert_eq!(engine.suspended_type_count(), 0);
    }
}
