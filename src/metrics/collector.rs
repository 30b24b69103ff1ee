//! Metrics collection using Prometheus
//!
//! Counters and gauges for challenge intake, game lifecycle, and matchmaking,
//! grouped the way the health endpoint reports them.

use anyhow::Result;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Main metrics collector for the steward
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,
    service_metrics: ServiceMetrics,
    challenge_metrics: ChallengeMetrics,
    game_metrics: GameMetrics,
    matchmaking_metrics: MatchmakingMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,
    /// Events received on the account stream, by kind
    pub events_total: IntCounterVec,
    /// Event stream reconnect attempts
    pub stream_reconnects_total: IntCounter,
}

/// Inbound challenge metrics
#[derive(Clone)]
pub struct ChallengeMetrics {
    /// Challenges queued for the accept decision
    pub received_total: IntCounter,
    /// Challenges accepted
    pub accepted_total: IntCounter,
    /// Challenges declined, by reason
    pub declined_total: IntCounterVec,
    /// Accept calls the server refused
    pub accept_failures_total: IntCounter,
}

/// Game lifecycle metrics
#[derive(Clone)]
pub struct GameMetrics {
    /// Currently running game sessions
    pub active_games: IntGauge,
    /// Game sessions spawned
    pub games_started_total: IntCounter,
    /// Games finished, by outcome (played/aborted)
    pub games_finished_total: IntCounterVec,
    /// Games aborted to protect the concurrency budget
    pub budget_aborts_total: IntCounter,
}

/// Matchmaking metrics
#[derive(Clone)]
pub struct MatchmakingMetrics {
    /// Matchmaking cycles with a terminal outcome, by outcome
    pub attempts_total: IntCounterVec,
    /// Bots currently in the roster
    pub online_bots: IntGauge,
    /// Matchmaking types currently suspended
    pub suspended_types: IntGauge,
}

impl MetricsCollector {
    /// Create a new metrics collector with a fresh registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Create a new metrics collector with a custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let challenge_metrics = ChallengeMetrics::new(&registry)?;
        let game_metrics = GameMetrics::new(&registry)?;
        let matchmaking_metrics = MatchmakingMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            challenge_metrics,
            game_metrics,
            matchmaking_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn challenge(&self) -> &ChallengeMetrics {
        &self.challenge_metrics
    }

    pub fn game(&self) -> &GameMetrics {
        &self.game_metrics
    }

    pub fn matchmaking(&self) -> &MatchmakingMetrics {
        &self.matchmaking_metrics
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds = IntGauge::with_opts(Opts::new(
            "steward_uptime_seconds",
            "Service uptime in seconds",
        ))?;
        let events_total = IntCounterVec::new(
            Opts::new(
                "steward_events_total",
                "Events received on the account stream",
            ),
            &["kind"],
        )?;
        let stream_reconnects_total = IntCounter::with_opts(Opts::new(
            "steward_stream_reconnects_total",
            "Event stream reconnect attempts",
        ))?;

        registry.register(Box::new(uptime_seconds.clone()))?;
        registry.register(Box::new(events_total.clone()))?;
        registry.register(Box::new(stream_reconnects_total.clone()))?;

        Ok(Self {
            uptime_seconds,
            events_total,
            stream_reconnects_total,
        })
    }
}

impl ChallengeMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let received_total = IntCounter::with_opts(Opts::new(
            "steward_challenges_received_total",
            "Inbound challenges queued for the accept decision",
        ))?;
        let accepted_total = IntCounter::with_opts(Opts::new(
            "steward_challenges_accepted_total",
            "Inbound challenges accepted",
        ))?;
        let declined_total = IntCounterVec::new(
            Opts::new(
                "steward_challenges_declined_total",
                "Inbound challenges declined",
            ),
            &["reason"],
        )?;
        let accept_failures_total = IntCounter::with_opts(Opts::new(
            "steward_challenge_accept_failures_total",
            "Accept calls the server refused",
        ))?;

        registry.register(Box::new(received_total.clone()))?;
        registry.register(Box::new(accepted_total.clone()))?;
        registry.register(Box::new(declined_total.clone()))?;
        registry.register(Box::new(accept_failures_total.clone()))?;

        Ok(Self {
            received_total,
            accepted_total,
            declined_total,
            accept_failures_total,
        })
    }
}

impl GameMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_games = IntGauge::with_opts(Opts::new(
            "steward_active_games",
            "Currently running game sessions",
        ))?;
        let games_started_total = IntCounter::with_opts(Opts::new(
            "steward_games_started_total",
            "Game sessions spawned",
        ))?;
        let games_finished_total = IntCounterVec::new(
            Opts::new("steward_games_finished_total", "Games finished"),
            &["outcome"],
        )?;
        let budget_aborts_total = IntCounter::with_opts(Opts::new(
            "steward_budget_aborts_total",
            "Games aborted to protect the concurrency budget",
        ))?;

        registry.register(Box::new(active_games.clone()))?;
        registry.register(Box::new(games_started_total.clone()))?;
        registry.register(Box::new(games_finished_total.clone()))?;
        registry.register(Box::new(budget_aborts_total.clone()))?;

        Ok(Self {
            active_games,
            games_started_total,
            games_finished_total,
            budget_aborts_total,
        })
    }
}

impl MatchmakingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let attempts_total = IntCounterVec::new(
            Opts::new(
                "steward_matchmaking_attempts_total",
                "Matchmaking cycles with a terminal outcome",
            ),
            &["outcome"],
        )?;
        let online_bots = IntGauge::with_opts(Opts::new(
            "steward_online_bots",
            "Bots currently in the matchmaking roster",
        ))?;
        let suspended_types = IntGauge::with_opts(Opts::new(
            "steward_suspended_matchmaking_types",
            "Matchmaking types currently suspended",
        ))?;

        registry.register(Box::new(attempts_total.clone()))?;
        registry.register(Box::new(online_bots.clone()))?;
        registry.register(Box::new(suspended_types.clone()))?;

        Ok(Self {
            attempts_total,
            online_bots,
            suspended_types,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_registers_all_families() {
        let collector = MetricsCollector::new().unwrap();

        collector.challenge().received_total.inc();
        collector.game().active_games.set(2);
        collector
            .matchmaking()
            .attempts_total
            .with_label_values(&["success"])
            .inc();

        let families = collector.registry().gather();
        let names: Vec<String> = families.iter().map(|f| f.get_name().to_string()).collect();

        assert!(names.iter().any(|n| n.contains("challenges_received")));
        assert!(names.iter().any(|n| n.contains("active_games")));
        assert!(names.iter().any(|n| n.contains("matchmaking_attempts")));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Arc::new(Registry::new());
        assert!(MetricsCollector::with_registry(registry.clone()).is_ok());
        assert!(MetricsCollector::with_registry(registry).is_err());
    }
}
