//! Arena network capability interface
//!
//! This module defines the capability trait the orchestration core requires
//! from the arena network layer, plus a mock implementation for testing and
//! development. The concrete HTTP/SSE client lives outside this crate; all
//! transport retries happen behind this boundary per the policies in
//! [`retry`].

pub mod retry;

pub use retry::{Backoff, RetryPolicy};

use crate::error::{Result, StewardError};
use crate::types::{
    AccountInfo, ArenaEvent, BotInfo, ChallengeEvent, ChallengeRequest, DeclineReason, GameStatus,
    GameUpdate, UserStatus,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;

/// Account event stream; finite per invocation, the listener reconnects
pub type EventStream = Pin<Box<dyn Stream<Item = ArenaEvent> + Send>>;

/// Events of one streaming challenge-creation call
pub type ChallengeEventStream = Pin<Box<dyn Stream<Item = ChallengeEvent> + Send>>;

/// One full pass over the currently online bots
pub type BotStream = Pin<Box<dyn Stream<Item = BotInfo> + Send>>;

/// Per-game event stream owned by a single game session
pub type GameStream = Pin<Box<dyn Stream<Item = GameUpdate> + Send>>;

/// Capability interface required from the arena network layer
///
/// State-changing calls return plain booleans: the implementation converts
/// transport failures into `false` after its retry budget, logging a single
/// diagnostic line. Nothing behind this trait panics or leaks transport errors
/// into the orchestration core.
#[async_trait]
pub trait ArenaClient: Send + Sync {
    /// Accept an inbound challenge
    async fn accept_challenge(&self, challenge_id: &str) -> bool;

    /// Decline an inbound challenge with a reason
    async fn decline_challenge(&self, challenge_id: &str, reason: DeclineReason) -> bool;

    /// Cancel an outgoing challenge that has not started yet
    async fn cancel_challenge(&self, challenge_id: &str) -> bool;

    /// Abort a game that has not really begun
    async fn abort_game(&self, game_id: &str) -> bool;

    /// Issue an outgoing challenge; the stream ends after one terminal event
    async fn create_challenge(&self, request: &ChallengeRequest) -> ChallengeEventStream;

    /// Fetch the operator account with its per-category ratings
    async fn get_account(&self) -> Result<AccountInfo>;

    /// Stream the currently online bot accounts
    async fn stream_online_bots(&self) -> Result<BotStream>;

    /// Look up the online/playing status of a single user
    async fn get_user_status(&self, username: &str) -> Result<UserStatus>;

    /// Open the account event stream
    async fn stream_events(&self) -> Result<EventStream>;

    /// Open the event stream of a single game
    async fn stream_game(&self, game_id: &str) -> Result<GameStream>;
}

/// Mock arena client for testing and development
///
/// Behavior is scripted per call: challenge streams are queued in order,
/// per-game streams and user statuses are keyed by id. Every state-changing
/// call is recorded for assertions.
pub struct MockArenaClient {
    account: Mutex<AccountInfo>,
    online_bots: Mutex<Vec<BotInfo>>,
    statuses: Mutex<HashMap<String, UserStatus>>,
    accept_results: Mutex<VecDeque<bool>>,
    challenge_scripts: Mutex<VecDeque<Vec<ChallengeEvent>>>,
    game_scripts: Mutex<HashMap<String, Vec<GameUpdate>>>,
    event_tx: mpsc::UnboundedSender<ArenaEvent>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<ArenaEvent>>>,
    accepted: Mutex<Vec<String>>,
    declined: Mutex<Vec<(String, DeclineReason)>>,
    canceled: Mutex<Vec<String>>,
    aborted: Mutex<Vec<String>>,
    challenge_requests: Mutex<Vec<ChallengeRequest>>,
}

impl MockArenaClient {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            account: Mutex::new(AccountInfo {
                username: "steward".to_string(),
                ratings: HashMap::new(),
            }),
            online_bots: Mutex::new(Vec::new()),
            statuses: Mutex::new(HashMap::new()),
            accept_results: Mutex::new(VecDeque::new()),
            challenge_scripts: Mutex::new(VecDeque::new()),
            game_scripts: Mutex::new(HashMap::new()),
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
            accepted: Mutex::new(Vec::new()),
            declined: Mutex::new(Vec::new()),
            canceled: Mutex::new(Vec::new()),
            aborted: Mutex::new(Vec::new()),
            challenge_requests: Mutex::new(Vec::new()),
        }
    }

    /// Sender feeding the account event stream
    pub fn event_sender(&self) -> mpsc::UnboundedSender<ArenaEvent> {
        self.event_tx.clone()
    }

    pub fn set_account(&self, account: AccountInfo) {
        *self.account.lock().unwrap() = account;
    }

    pub fn set_online_bots(&self, bots: Vec<BotInfo>) {
        *self.online_bots.lock().unwrap() = bots;
    }

    pub fn set_user_status(&self, username: &str, status: UserStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(username.to_string(), status);
    }

    /// Queue the outcome of the next `accept_challenge` call (default: true)
    pub fn push_accept_result(&self, result: bool) {
        self.accept_results.lock().unwrap().push_back(result);
    }

    /// Queue the event script of the next `create_challenge` call
    pub fn push_challenge_script(&self, events: Vec<ChallengeEvent>) {
        self.challenge_scripts.lock().unwrap().push_back(events);
    }

    /// Script the per-game stream for `game_id`
    pub fn script_game(&self, game_id: &str, updates: Vec<GameUpdate>) {
        self.game_scripts
            .lock()
            .unwrap()
            .insert(game_id.to_string(), updates);
    }

    pub fn accepted_challenges(&self) -> Vec<String> {
        self.accepted.lock().unwrap().clone()
    }

    pub fn declined_challenges(&self) -> Vec<(String, DeclineReason)> {
        self.declined.lock().unwrap().clone()
    }

    pub fn canceled_challenges(&self) -> Vec<String> {
        self.canceled.lock().unwrap().clone()
    }

    pub fn aborted_games(&self) -> Vec<String> {
        self.aborted.lock().unwrap().clone()
    }

    pub fn challenge_requests(&self) -> Vec<ChallengeRequest> {
        self.challenge_requests.lock().unwrap().clone()
    }
}

impl Default for MockArenaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArenaClient for MockArenaClient {
    async fn accept_challenge(&self, challenge_id: &str) -> bool {
        self.accepted.lock().unwrap().push(challenge_id.to_string());
        self.accept_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(true)
    }

    async fn decline_challenge(&self, challenge_id: &str, reason: DeclineReason) -> bool {
        self.declined
            .lock()
            .unwrap()
            .push((challenge_id.to_string(), reason));
        true
    }

    async fn cancel_challenge(&self, challenge_id: &str) -> bool {
        self.canceled.lock().unwrap().push(challenge_id.to_string());
        true
    }

    async fn abort_game(&self, game_id: &str) -> bool {
        self.aborted.lock().unwrap().push(game_id.to_string());
        true
    }

    async fn create_challenge(&self, request: &ChallengeRequest) -> ChallengeEventStream {
        self.challenge_requests.lock().unwrap().push(request.clone());
        let script = self
            .challenge_scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                vec![ChallengeEvent::Error {
                    message: "unscripted challenge".to_string(),
                }]
            });
        Box::pin(tokio_stream::iter(script))
    }

    async fn get_account(&self) -> Result<AccountInfo> {
        Ok(self.account.lock().unwrap().clone())
    }

    async fn stream_online_bots(&self) -> Result<BotStream> {
        let bots = self.online_bots.lock().unwrap().clone();
        Ok(Box::pin(tokio_stream::iter(bots)))
    }

    async fn get_user_status(&self, username: &str) -> Result<UserStatus> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(username)
            .copied()
            .unwrap_or(UserStatus {
                online: true,
                playing: false,
            }))
    }

    async fn stream_events(&self) -> Result<EventStream> {
        match self.event_rx.lock().unwrap().take() {
            Some(rx) => Ok(Box::pin(UnboundedReceiverStream::new(rx))),
            None => Err(StewardError::StreamDisconnected {
                message: "event stream already consumed".to_string(),
            }
            .into()),
        }
    }

    async fn stream_game(&self, game_id: &str) -> Result<GameStream> {
        let updates = self
            .game_scripts
            .lock()
            .unwrap()
            .get(game_id)
            .cloned()
            .unwrap_or_else(|| {
                vec![
                    GameUpdate::State {
                        status: GameStatus::Started,
                    },
                    GameUpdate::State {
                        status: GameStatus::Mate,
                    },
                ]
            });
        Ok(Box::pin(tokio_stream::iter(updates)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChallengeColor, Variant};
    use std::time::Duration;
    use tokio_stream::StreamExt;

    fn request(opponent: &str) -> ChallengeRequest {
        ChallengeRequest {
            opponent: opponent.to_string(),
            initial_time: 60,
            increment: 1,
            rated: true,
            color: ChallengeColor::White,
            variant: Variant::Standard,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_mock_records_state_changing_calls() {
        let client = MockArenaClient::new();

        assert!(client.accept_challenge("c1").await);
        client.decline_challenge("c2", DeclineReason::Variant).await;
        client.abort_game("g1").await;

        assert_eq!(client.accepted_challenges(), vec!["c1".to_string()]);
        assert_eq!(
            client.declined_challenges(),
            vec![("c2".to_string(), DeclineReason::Variant)]
        );
        assert_eq!(client.aborted_games(), vec!["g1".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_challenge_scripts_run_in_order() {
        let client = MockArenaClient::new();
        client.push_challenge_script(vec![ChallengeEvent::Accepted]);
        client.push_challenge_script(vec![ChallengeEvent::Declined]);

        let first: Vec<_> = client.create_challenge(&request("a")).await.collect().await;
        let second: Vec<_> = client.create_challenge(&request("b")).await.collect().await;

        assert_eq!(first, vec![ChallengeEvent::Accepted]);
        assert_eq!(second, vec![ChallengeEvent::Declined]);
        assert_eq!(client.challenge_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_event_stream_delivers_pushed_events() {
        let client = MockArenaClient::new();
        let sender = client.event_sender();

        sender
            .send(ArenaEvent::GameStarted {
                game_id: "g1".to_string(),
            })
            .unwrap();

        let mut stream = client.stream_events().await.unwrap();
        let event = stream.next().await.unwrap();
        assert!(matches!(event, ArenaEvent::GameStarted { game_id } if game_id == "g1"));

        assert!(client.stream_events().await.is_err());
    }
}
