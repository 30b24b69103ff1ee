//! End-to-end orchestration tests
//!
//! Drive the assembled service against the mock arena client: events flow in
//! through the listener, the manager control loop reacts, and the mock records
//! every state-changing call.

use arena_steward::client::MockArenaClient;
use arena_steward::config::{AppConfig, MatchmakingTypeConfig};
use arena_steward::game::GameManager;
use arena_steward::matchmaking::MatchmakingEngine;
use arena_steward::metrics::MetricsCollector;
use arena_steward::service::AppState;
use arena_steward::types::{
    AccountInfo, ArenaEvent, BotInfo, ChallengeEvent, ChallengeInfo, PerfType, Speed, Variant,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

async fn wait_until<F: Fn() -> bool>(condition: F, what: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

fn test_config(health_port: u16, max_concurrent_games: usize) -> AppConfig {
    let mut config = AppConfig::default();
    config.service.health_port = health_port;
    config.challenge.max_concurrent_games = max_concurrent_games;
    config
}

fn inbound_challenge(id: &str, challenger: &str) -> ChallengeInfo {
    ChallengeInfo {
        id: id.to_string(),
        challenger: challenger.to_string(),
        challenger_title: Some("BOT".to_string()),
        challenger_rating: Some(2000),
        variant: Variant::Standard,
        speed: Speed::Blitz,
        initial_time: 180,
        increment: 2,
        rated: true,
    }
}

fn challenge_event(id: &str, challenger: &str) -> ArenaEvent {
    ArenaEvent::ChallengeReceived {
        challenge: inbound_challenge(id, challenger),
    }
}

#[tokio::test]
async fn test_budget_one_accepts_sequentially() {
    let client = Arc::new(MockArenaClient::new());
    let events = client.event_sender();

    let mut app = AppState::new(test_config(39181, 1), client.clone())
        .await
        .unwrap();
    app.start().await.unwrap();
    let manager = app.manager();

    // C1 arrives and is accepted, reserving the only slot.
    events.send(challenge_event("c1", "rival")).unwrap();
    wait_until(
        || client.accepted_challenges() == vec!["c1".to_string()],
        "c1 accepted",
    )
    .await;
    assert_eq!(manager.reserved_slots(), 1);

    // C1's game starts: the reservation becomes a running session.
    events
        .send(ArenaEvent::GameStarted {
            game_id: "c1".to_string(),
        })
        .unwrap();
    wait_until(|| manager.running_games() == 1, "c1 session running").await;
    assert_eq!(manager.reserved_slots(), 0);

    // C2 arrives while the budget is exhausted and stays queued.
    events.send(challenge_event("c2", "other")).unwrap();
    wait_until(|| manager.queued_challenges() == 1, "c2 queued").await;
    sleep(Duration::from_millis(50)).await;
    assert_eq!(client.accepted_challenges(), vec!["c1".to_string()]);

    // C1 finishing frees the slot; the next wake accepts C2.
    events
        .send(ArenaEvent::GameFinished {
            game_id: "c1".to_string(),
        })
        .unwrap();
    wait_until(
        || client.accepted_challenges() == vec!["c1".to_string(), "c2".to_string()],
        "c2 accepted",
    )
    .await;

    app.shutdown().await.unwrap();
    assert!(!manager.is_running());
}

#[tokio::test]
async fn test_screened_challenges_are_declined_not_queued() {
    let client = Arc::new(MockArenaClient::new());
    let events = client.event_sender();

    let mut app = AppState::new(test_config(39182, 2), client.clone())
        .await
        .unwrap();
    app.start().await.unwrap();

    let mut bad_variant = inbound_challenge("c1", "rival");
    bad_variant.variant = Variant::Atomic;
    events
        .send(ArenaEvent::ChallengeReceived {
            challenge: bad_variant,
        })
        .unwrap();

    wait_until(
        || client.declined_challenges().len() == 1,
        "screened challenge declined",
    )
    .await;
    assert_eq!(app.manager().queued_challenges(), 0);
    assert!(client.accepted_challenges().is_empty());

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_declines_still_queued_challenges() {
    let client = Arc::new(MockArenaClient::new());
    let events = client.event_sender();

    let mut app = AppState::new(test_config(39183, 1), client.clone())
        .await
        .unwrap();
    app.start().await.unwrap();
    let manager = app.manager();

    events.send(challenge_event("c1", "rival")).unwrap();
    wait_until(
        || client.accepted_challenges() == vec!["c1".to_string()],
        "c1 accepted",
    )
    .await;

    events.send(challenge_event("c2", "other")).unwrap();
    events.send(challenge_event("c3", "third")).unwrap();
    wait_until(|| manager.queued_challenges() == 2, "c2 and c3 queued").await;

    app.shutdown().await.unwrap();

    let declined: Vec<String> = client
        .declined_challenges()
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(declined, vec!["c2".to_string(), "c3".to_string()]);
}

#[tokio::test]
async fn test_idle_loop_runs_matchmaking_once() {
    let client = Arc::new(MockArenaClient::new());
    client.set_account(AccountInfo {
        username: "steward".to_string(),
        ratings: HashMap::from([(PerfType::Bullet, 2000)]),
    });
    client.set_online_bots(vec![BotInfo {
        username: "bot7".to_string(),
        disabled: false,
        tos_violation: false,
        ratings: HashMap::from([(PerfType::Bullet, 2050)]),
    }]);
    client.push_challenge_script(vec![
        ChallengeEvent::Created {
            challenge_id: "m1".to_string(),
        },
        ChallengeEvent::Accepted,
    ]);

    let mut config = test_config(39184, 1);
    config.matchmaking.enabled = true;
    config.matchmaking.poll_timeout_seconds = 1;
    config.matchmaking.delay_seconds = 10;
    config.matchmaking.types.insert(
        "bullet".to_string(),
        MatchmakingTypeConfig {
            time_control: "1+0".to_string(),
            ..Default::default()
        },
    );

    let engine = MatchmakingEngine::with_seed(
        client.clone(),
        "steward".to_string(),
        &config.matchmaking,
        7,
    )
    .unwrap();
    let metrics = Arc::new(MetricsCollector::new().unwrap());
    let manager = Arc::new(
        GameManager::new(client.clone(), engine, 1, true, metrics)
            .with_poll_interval(Duration::from_millis(50)),
    );

    let task = tokio::spawn(manager.clone().run());

    // Idle wake cycles refresh the roster, then issue exactly one challenge.
    wait_until(
        || client.challenge_requests().len() == 1,
        "matchmaking challenge issued",
    )
    .await;
    wait_until(|| manager.reserved_slots() == 1, "slot reserved").await;
    assert_eq!(client.challenge_requests()[0].opponent, "bot7");

    // No second attempt while the matchmaking game is pending.
    sleep(Duration::from_millis(200)).await;
    assert_eq!(client.challenge_requests().len(), 1);

    // The challenge becomes a game and runs to completion.
    manager.on_game_started("m1".to_string()).await;
    wait_until(|| manager.running_games() == 1, "m1 session running").await;
    manager.on_game_finished("m1".to_string()).await;
    wait_until(|| manager.running_games() == 0, "m1 joined").await;

    // With bot7 now on cooldown and no other candidate, the type suspends
    // and matchmaking reports misconfiguration instead of looping.
    wait_until(|| !manager.matchmaking_enabled(), "matchmaking paused").await;

    manager.stop();
    task.await.unwrap().unwrap();
    assert!(client.canceled_challenges().is_empty());
}

#[tokio::test]
async fn test_budget_race_aborts_excess_game_in_loop() {
    let client = Arc::new(MockArenaClient::new());
    let events = client.event_sender();

    let mut app = AppState::new(test_config(39185, 1), client.clone())
        .await
        .unwrap();
    app.start().await.unwrap();
    let manager = app.manager();

    events
        .send(ArenaEvent::GameStarted {
            game_id: "g1".to_string(),
        })
        .unwrap();
    events
        .send(ArenaEvent::GameStarted {
            game_id: "g2".to_string(),
        })
        .unwrap();

    wait_until(
        || client.aborted_games() == vec!["g2".to_string()],
        "excess game aborted",
    )
    .await;
    assert_eq!(manager.running_games(), 1);

    events
        .send(ArenaEvent::GameFinished {
            game_id: "g1".to_string(),
        })
        .unwrap();
    wait_until(|| manager.running_games() == 0, "g1 joined").await;

    app.shutdown().await.unwrap();
}
