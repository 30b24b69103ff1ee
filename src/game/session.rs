//! Per-game worker session
//!
//! Each active game runs as its own task that owns the per-game event stream.
//! The session is opaque to the manager beyond spawn/join; it records whether
//! the game ended aborted so matchmaking cooldowns can be scaled correctly.

use crate::client::ArenaClient;
use crate::types::{GameId, GameUpdate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{info, warn};

/// One running game's worker unit
pub struct GameSession {
    game_id: GameId,
    aborted: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl GameSession {
    /// Spawn the worker task for a started game
    pub fn spawn(client: Arc<dyn ArenaClient>, game_id: GameId) -> Self {
        let aborted = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(run_session(client, game_id.clone(), aborted.clone()));

        Self {
            game_id,
            aborted,
            handle,
        }
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    /// Whether the game ended without being played out
    ///
    /// Only meaningful once the server has announced the game as finished.
    pub fn was_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Wait for the worker to drain its stream; returns the abort flag
    pub async fn join(self) -> bool {
        if let Err(e) = self.handle.await {
            warn!("Game session {} task failed: {}", self.game_id, e);
        }
        self.aborted.load(Ordering::SeqCst)
    }
}

async fn run_session(client: Arc<dyn ArenaClient>, game_id: GameId, aborted: Arc<AtomicBool>) {
    let mut stream = match client.stream_game(&game_id).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Could not open game stream {}: {}", game_id, e);
            return;
        }
    };

    info!("Game session {} started", game_id);

    while let Some(update) = stream.next().await {
        match update {
            GameUpdate::State { status } => {
                if status.is_over() {
                    aborted.store(status.is_aborted(), Ordering::SeqCst);
                    info!("Game {} over: {:?}", game_id, status);
                }
            }
            GameUpdate::Ping => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockArenaClient;
    use crate::types::GameStatus;

    #[tokio::test]
    async fn test_session_completes_with_played_out_game() {
        let client = Arc::new(MockArenaClient::new());
        client.script_game(
            "g1",
            vec![
                GameUpdate::State {
                    status: GameStatus::Started,
                },
                GameUpdate::Ping,
                GameUpdate::State {
                    status: GameStatus::Mate,
                },
            ],
        );

        let session = GameSession::spawn(client, "g1".to_string());
        assert!(!session.join().await);
    }

    #[tokio::test]
    async fn test_session_flags_aborted_game() {
        let client = Arc::new(MockArenaClient::new());
        client.script_game(
            "g1",
            vec![
                GameUpdate::State {
                    status: GameStatus::Started,
                },
                GameUpdate::State {
                    status: GameStatus::Aborted,
                },
            ],
        );

        let session = GameSession::spawn(client, "g1".to_string());
        assert!(session.join().await);
    }
}
