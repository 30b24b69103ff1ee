//! Game manager: the top-level concurrency coordinator
//!
//! Multiplexes inbound challenge and game-lifecycle notifications, enforces
//! the global concurrency budget across reserved and running games, spawns and
//! joins per-game sessions, and arbitrates between challenge intake and
//! matchmaking.
//!
//! All queues live behind a single state lock; the enqueue operations are the
//! only concurrent-write surface. The control loop itself runs sequentially
//! and blocks only on its signal-or-timeout primitive.

use crate::client::ArenaClient;
use crate::error::Result;
use crate::game::counter::GameCounter;
use crate::game::session::GameSession;
use crate::matchmaking::MatchmakingEngine;
use crate::metrics::MetricsCollector;
use crate::types::{ChallengeId, DeclineReason, GameId};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// How long the control loop waits for a signal before trying matchmaking
const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Queues and bookkeeping owned by the control loop
#[derive(Default)]
struct ManagerState {
    /// Running sessions by game id
    games: HashMap<GameId, GameSession>,
    /// Inbound challenges awaiting an accept decision, oldest first
    open_challenges: VecDeque<ChallengeId>,
    /// Accepted-but-not-yet-started games holding a budget slot
    reserved: Vec<GameId>,
    /// Game-start notifications awaiting processing
    started: VecDeque<GameId>,
    /// Game-finish notifications awaiting processing
    finished: VecDeque<GameId>,
    /// The game the current matchmaking challenge turned into, if any
    current_matchmaking_game: Option<GameId>,
}

/// The top-level game/challenge coordinator
pub struct GameManager {
    client: Arc<dyn ArenaClient>,
    counter: Arc<GameCounter>,
    metrics: Arc<MetricsCollector>,
    engine: AsyncMutex<MatchmakingEngine>,
    state: Mutex<ManagerState>,
    changed: Notify,
    running: AtomicBool,
    matchmaking_enabled: AtomicBool,
    poll_interval: Duration,
}

impl GameManager {
    pub fn new(
        client: Arc<dyn ArenaClient>,
        engine: MatchmakingEngine,
        max_concurrent_games: usize,
        matchmaking_enabled: bool,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            client,
            counter: Arc::new(GameCounter::new(max_concurrent_games)),
            metrics,
            engine: AsyncMutex::new(engine),
            state: Mutex::new(ManagerState::default()),
            changed: Notify::new(),
            running: AtomicBool::new(true),
            matchmaking_enabled: AtomicBool::new(matchmaking_enabled),
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Override the idle poll interval (mainly for tests)
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Enqueue an inbound challenge for the accept decision
    pub fn add_challenge(&self, challenge_id: ChallengeId) {
        self.state
            .lock()
            .unwrap()
            .open_challenges
            .push_back(challenge_id);
        self.metrics.challenge().received_total.inc();
        self.changed.notify_one();
    }

    /// Drop a queued challenge; a no-op when the id is not queued
    pub fn remove_challenge(&self, challenge_id: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(pos) = state
            .open_challenges
            .iter()
            .position(|id| id == challenge_id)
        {
            state.open_challenges.remove(pos);
            drop(state);
            info!("Challenge {} has been canceled", challenge_id);
            self.changed.notify_one();
        }
    }

    /// Record a server-announced game start
    pub async fn on_game_started(&self, game_id: GameId) {
        let is_matchmaking_game = {
            let mut state = self.state.lock().unwrap();
            state.started.push_back(game_id.clone());
            state.current_matchmaking_game.as_deref() == Some(game_id.as_str())
        };

        if is_matchmaking_game {
            self.engine.lock().await.on_game_started();
        }
        self.changed.notify_one();
    }

    /// Record a server-announced game finish
    pub async fn on_game_finished(&self, game_id: GameId) {
        let matchmaking_aborted = {
            let mut state = self.state.lock().unwrap();
            state.finished.push_back(game_id.clone());
            if state.current_matchmaking_game.as_deref() == Some(game_id.as_str()) {
                state.current_matchmaking_game = None;
                let aborted = state
                    .games
                    .get(&game_id)
                    .map(GameSession::was_aborted)
                    .unwrap_or(false);
                Some(aborted)
            } else {
                None
            }
        };

        if let Some(was_aborted) = matchmaking_aborted {
            self.engine.lock().await.on_game_finished(was_aborted);
        }
        self.changed.notify_one();
    }

    /// Ask the control loop to stop
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.changed.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn matchmaking_enabled(&self) -> bool {
        self.matchmaking_enabled.load(Ordering::SeqCst)
    }

    /// Concurrency counter shared with health reporting
    pub fn counter(&self) -> Arc<GameCounter> {
        self.counter.clone()
    }

    pub fn queued_challenges(&self) -> usize {
        self.state.lock().unwrap().open_challenges.len()
    }

    pub fn reserved_slots(&self) -> usize {
        self.state.lock().unwrap().reserved.len()
    }

    pub fn running_games(&self) -> usize {
        self.state.lock().unwrap().games.len()
    }

    /// Run the control loop until [`stop`](Self::stop) is called
    ///
    /// Each wake drains game starts, then game finishes, then greedily accepts
    /// queued challenges while budget remains. A timeout with no wake runs at
    /// most one matchmaking cycle.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        info!(
            "Game manager started (max {} concurrent games)",
            self.counter.max()
        );

        while self.running.load(Ordering::SeqCst) {
            let woke = timeout(self.poll_interval, self.changed.notified())
                .await
                .is_ok();
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            if !woke {
                self.check_matchmaking().await;
                continue;
            }

            self.drain_started().await;
            self.drain_finished().await;
            self.accept_queued().await;
        }

        self.shutdown().await;
        Ok(())
    }

    /// Process queued game starts: consume the reserved slot and spawn the
    /// session, aborting the game instead when the budget is already spent
    async fn drain_started(&self) {
        loop {
            let game_id = {
                let mut state = self.state.lock().unwrap();
                let game_id = state.started.pop_front();
                if let Some(id) = &game_id {
                    if let Some(pos) = state.reserved.iter().position(|r| r == id) {
                        state.reserved.remove(pos);
                    }
                }
                game_id
            };
            let Some(game_id) = game_id else { break };

            if !self.counter.try_increment() {
                warn!(
                    "Max number of concurrent games reached, aborting already started game {}",
                    game_id
                );
                self.client.abort_game(&game_id).await;
                self.metrics.game().budget_aborts_total.inc();
                continue;
            }

            let session = GameSession::spawn(self.client.clone(), game_id.clone());
            self.state.lock().unwrap().games.insert(game_id, session);
            self.metrics.game().games_started_total.inc();
            self.metrics
                .game()
                .active_games
                .set(self.counter.active() as i64);
        }
    }

    /// Process queued game finishes: join the session and free the slot
    async fn drain_finished(&self) {
        loop {
            let game_id = { self.state.lock().unwrap().finished.pop_front() };
            let Some(game_id) = game_id else { break };

            let session = { self.state.lock().unwrap().games.remove(&game_id) };
            let Some(session) = session else {
                debug!("No session for finished game {}", game_id);
                continue;
            };

            let was_aborted = session.join().await;
            self.counter.decrement();
            self.metrics
                .game()
                .games_finished_total
                .with_label_values(&[if was_aborted { "aborted" } else { "played" }])
                .inc();
            self.metrics
                .game()
                .active_games
                .set(self.counter.active() as i64);
            info!("Game {} finished", game_id);
        }
    }

    /// Accept queued challenges oldest-first while budget remains
    async fn accept_queued(&self) {
        while let Some(challenge_id) = self.next_challenge() {
            if self.client.accept_challenge(&challenge_id).await {
                info!("Accepted challenge {}", challenge_id);
                self.state.lock().unwrap().reserved.push(challenge_id);
                self.metrics.challenge().accepted_total.inc();
            } else {
                // The remote side owns the retry; the challenge is dropped.
                warn!("Challenge {} could not be accepted", challenge_id);
                self.metrics.challenge().accept_failures_total.inc();
            }
        }
    }

    fn next_challenge(&self) -> Option<ChallengeId> {
        let mut state = self.state.lock().unwrap();
        if state.open_challenges.is_empty() {
            return None;
        }
        if self.counter.is_max(state.reserved.len()) {
            return None;
        }
        state.open_challenges.pop_front()
    }

    /// Run at most one matchmaking cycle when idle capacity exists
    async fn check_matchmaking(&self) {
        if !self.matchmaking_enabled.load(Ordering::SeqCst) {
            return;
        }
        {
            let state = self.state.lock().unwrap();
            if self.counter.is_max(state.reserved.len()) {
                return;
            }
            if state.current_matchmaking_game.is_some() {
                return;
            }
        }

        let (response, online_bots, suspended_types) = {
            let mut engine = self.engine.lock().await;
            let response = engine.create_challenge().await;
            (
                response,
                engine.online_bot_count(),
                engine.suspended_type_count(),
            )
        };
        self.metrics
            .matchmaking()
            .online_bots
            .set(online_bots as i64);
        self.metrics
            .matchmaking()
            .suspended_types
            .set(suspended_types as i64);

        let Some(response) = response else { return };

        let outcome = if response.success {
            match &response.challenge_id {
                Some(challenge_id) => {
                    let mut state = self.state.lock().unwrap();
                    state.reserved.push(challenge_id.clone());
                    state.current_matchmaking_game = Some(challenge_id.clone());
                }
                None => warn!("Matchmaking challenge succeeded without an id"),
            }
            "success"
        } else if response.has_reached_rate_limit {
            warn!("Matchmaking stopped due to rate limiting");
            self.matchmaking_enabled.store(false, Ordering::SeqCst);
            "rate_limited"
        } else if response.is_misconfigured {
            warn!("Matchmaking disabled: no usable matchmaking type configured");
            self.matchmaking_enabled.store(false, Ordering::SeqCst);
            "misconfigured"
        } else if response.no_opponent {
            "no_opponent"
        } else {
            "failed"
        };
        self.metrics
            .matchmaking()
            .attempts_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Drain everything on the way out: cancel the pending matchmaking
    /// challenge, wait for running games, decline whatever is still queued
    async fn shutdown(&self) {
        info!("Game manager stopping ...");

        let pending_matchmaking = {
            let mut state = self.state.lock().unwrap();
            match state.current_matchmaking_game.take() {
                Some(id) if state.reserved.contains(&id) => {
                    state.reserved.retain(|r| r != &id);
                    Some(id)
                }
                _ => None,
            }
        };
        if let Some(challenge_id) = pending_matchmaking {
            info!("Canceling pending matchmaking challenge {}", challenge_id);
            self.client.cancel_challenge(&challenge_id).await;
        }

        loop {
            let session = {
                let mut state = self.state.lock().unwrap();
                let key = state.games.keys().next().cloned();
                key.and_then(|k| state.games.remove(&k))
            };
            let Some(session) = session else { break };
            info!("Waiting for game {} to finish ...", session.game_id());
            session.join().await;
            self.counter.decrement();
        }

        loop {
            let challenge_id = { self.state.lock().unwrap().open_challenges.pop_front() };
            let Some(challenge_id) = challenge_id else { break };
            self.client
                .decline_challenge(&challenge_id, DeclineReason::Generic)
                .await;
            self.metrics
                .challenge()
                .declined_total
                .with_label_values(&[DeclineReason::Generic.as_str()])
                .inc();
        }

        self.metrics.game().active_games.set(0);
        info!("Game manager stopped");
    }
}
