//! Application state and service coordination
//!
//! Wires the arena client, the matchmaking engine, the game manager, the
//! supervised event listener, and the health server into one startable and
//! stoppable unit.

use crate::client::{ArenaClient, Backoff, RetryPolicy};
use crate::config::{AppConfig, ChallengeSettings};
use crate::error::Result;
use crate::game::manager::GameManager;
use crate::game::screen::screen_challenge;
use crate::matchmaking::MatchmakingEngine;
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector};
use crate::types::{AccountInfo, ArenaEvent};
use crate::utils::format_time_control;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, Instant};
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

/// Initial and maximum delay between event stream reconnect attempts
const RECONNECT_INITIAL_DELAY: Duration = Duration::from_secs(1);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(60);

/// The assembled steward service
pub struct AppState {
    config: AppConfig,
    client: Arc<dyn ArenaClient>,
    manager: Arc<GameManager>,
    metrics: Arc<MetricsCollector>,
    account: AccountInfo,
    manager_task: Option<JoinHandle<Result<()>>>,
    listener_task: Option<JoinHandle<()>>,
    health_server: Option<Arc<HealthServer>>,
    health_task: Option<JoinHandle<()>>,
    uptime_task: Option<JoinHandle<()>>,
}

impl AppState {
    /// Build all components; fetches the operator account up front
    pub async fn new(config: AppConfig, client: Arc<dyn ArenaClient>) -> Result<Self> {
        let metrics = Arc::new(MetricsCollector::new()?);

        let account = {
            let client = client.clone();
            RetryPolicy::state_changing()
                .run(|| {
                    let client = client.clone();
                    async move { client.get_account().await }
                })
                .await?
        };
        info!("Logged in as {}", account.username);

        let engine = MatchmakingEngine::new(
            client.clone(),
            account.username.clone(),
            &config.matchmaking,
        )?;
        let manager = Arc::new(GameManager::new(
            client.clone(),
            engine,
            config.challenge.max_concurrent_games,
            config.matchmaking.enabled,
            metrics.clone(),
        ));

        Ok(Self {
            config,
            client,
            manager,
            metrics,
            account,
            manager_task: None,
            listener_task: None,
            health_server: None,
            health_task: None,
            uptime_task: None,
        })
    }

    /// Spawn the control loop, the event listener, and the health server
    pub async fn start(&mut self) -> Result<()> {
        self.manager_task = Some(tokio::spawn(self.manager.clone().run()));

        let listener = EventListener {
            client: self.client.clone(),
            manager: self.manager.clone(),
            metrics: self.metrics.clone(),
            username: self.account.username.clone(),
            challenge_settings: self.config.challenge.clone(),
            blacklist: self.config.matchmaking.blacklist.clone(),
        };
        self.listener_task = Some(tokio::spawn(listener.run()));

        let health_server = Arc::new(
            HealthServer::new(
                HealthServerConfig {
                    port: self.config.service.health_port,
                    ..Default::default()
                },
                self.metrics.clone(),
            )
            .with_manager(self.manager.clone()),
        );
        self.health_task = Some(tokio::spawn({
            let health_server = health_server.clone();
            async move {
                if let Err(e) = health_server.start().await {
                    error!("Health server failed: {}", e);
                }
            }
        }));
        self.health_server = Some(health_server);

        self.uptime_task = Some(tokio::spawn({
            let metrics = self.metrics.clone();
            let started_at = Instant::now();
            async move {
                let mut tick = interval(Duration::from_secs(15));
                loop {
                    tick.tick().await;
                    metrics
                        .service()
                        .uptime_seconds
                        .set(started_at.elapsed().as_secs() as i64);
                }
            }
        }));

        info!("Arena steward is running");
        Ok(())
    }

    /// Stop intake, drain the manager, and take the servers down
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down ...");

        if let Some(listener) = self.listener_task.take() {
            listener.abort();
        }

        self.manager.stop();
        if let Some(task) = self.manager_task.take() {
            match timeout(self.config.shutdown_timeout(), task).await {
                Ok(_) => info!("Game manager drained"),
                Err(_) => warn!("Shutdown timeout exceeded before all games finished"),
            }
        }

        if let Some(health_server) = &self.health_server {
            health_server.stop();
        }
        if let Some(task) = self.health_task.take() {
            let _ = task.await;
        }
        if let Some(task) = self.uptime_task.take() {
            task.abort();
        }

        info!("Arena steward stopped");
        Ok(())
    }

    pub fn manager(&self) -> Arc<GameManager> {
        self.manager.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn account(&self) -> &AccountInfo {
        &self.account
    }

    pub fn is_running(&self) -> bool {
        self.manager.is_running()
    }
}

/// Supervised consumer of the account event stream
///
/// When the stream ends or fails the listener reconnects with a doubling
/// backoff, reset as soon as an event flows again.
struct EventListener {
    client: Arc<dyn ArenaClient>,
    manager: Arc<GameManager>,
    metrics: Arc<MetricsCollector>,
    username: String,
    challenge_settings: ChallengeSettings,
    blacklist: Vec<String>,
}

impl EventListener {
    async fn run(self) {
        let mut backoff = Backoff::new(RECONNECT_INITIAL_DELAY, RECONNECT_MAX_DELAY);

        loop {
            match self.client.stream_events().await {
                Ok(mut stream) => {
                    info!("Connected to arena event stream");
                    while let Some(event) = stream.next().await {
                        backoff.reset();
                        self.dispatch(event).await;
                    }
                    warn!("Arena event stream ended");
                }
                Err(e) => {
                    warn!("Arena event stream failed: {}", e);
                }
            }

            self.metrics.service().stream_reconnects_total.inc();
            let delay = backoff.next_delay();
            debug!("Reconnecting event stream in {:?}", delay);
            sleep(delay).await;
        }
    }

    async fn dispatch(&self, event: ArenaEvent) {
        match event {
            ArenaEvent::ChallengeReceived { challenge } => {
                self.metrics
                    .service()
                    .events_total
                    .with_label_values(&["challenge"])
                    .inc();

                // The stream echoes our own outgoing challenges.
                if challenge.challenger == self.username {
                    return;
                }

                info!(
                    "Challenge {}: {} {} ({}) TC: {} {} {}",
                    challenge.id,
                    challenge.challenger_title.as_deref().unwrap_or(""),
                    challenge.challenger,
                    challenge
                        .challenger_rating
                        .map_or("?".to_string(), |r| r.to_string()),
                    format_time_control(challenge.initial_time, challenge.increment),
                    if challenge.rated { "Rated" } else { "Casual" },
                    challenge.variant
                );

                match screen_challenge(&challenge, &self.challenge_settings, &self.blacklist) {
                    Some(reason) => {
                        self.client.decline_challenge(&challenge.id, reason).await;
                        self.metrics
                            .challenge()
                            .declined_total
                            .with_label_values(&[reason.as_str()])
                            .inc();
                    }
                    None => self.manager.add_challenge(challenge.id),
                }
            }
            ArenaEvent::ChallengeCanceled { challenge_id } => {
                self.metrics
                    .service()
                    .events_total
                    .with_label_values(&["challengeCanceled"])
                    .inc();
                self.manager.remove_challenge(&challenge_id);
            }
            ArenaEvent::ChallengeDeclined { challenge_id } => {
                self.metrics
                    .service()
                    .events_total
                    .with_label_values(&["challengeDeclined"])
                    .inc();
                debug!("Challenge {} was declined", challenge_id);
            }
            ArenaEvent::GameStarted { game_id } => {
                self.metrics
                    .service()
                    .events_total
                    .with_label_values(&["gameStart"])
                    .inc();
                self.manager.on_game_started(game_id).await;
            }
            ArenaEvent::GameFinished { game_id } => {
                self.metrics
                    .service()
                    .events_total
                    .with_label_values(&["gameFinish"])
                    .inc();
                self.manager.on_game_finished(game_id).await;
            }
        }
    }
}
