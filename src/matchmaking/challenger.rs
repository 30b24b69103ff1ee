//! Outgoing challenge creation
//!
//! The challenger folds the streaming challenge-creation call into a single
//! terminal [`ChallengeResponse`]. Transport errors and timeouts become failed
//! responses with one diagnostic line; nothing escapes to the caller.

use crate::client::ArenaClient;
use crate::types::{ChallengeEvent, ChallengeRequest, ChallengeResponse};
use crate::utils::format_time_control;
use std::sync::Arc;
use tokio::time::timeout;
use tokio_stream::StreamExt;
use tracing::{info, warn};

/// Issues a single outgoing challenge and interprets the response stream
pub struct Challenger {
    client: Arc<dyn ArenaClient>,
}

impl Challenger {
    pub fn new(client: Arc<dyn ArenaClient>) -> Self {
        Self { client }
    }

    /// Create one challenge and wait for its terminal outcome
    pub async fn create(&self, request: &ChallengeRequest) -> ChallengeResponse {
        let mut stream = self.client.create_challenge(request).await;
        let mut challenge_id = None;

        loop {
            let event = match timeout(request.timeout, stream.next()).await {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Challenge against {} timed out after {:?}",
                        request.opponent, request.timeout
                    );
                    break;
                }
            };

            match event {
                ChallengeEvent::Created { challenge_id: id } => challenge_id = Some(id),
                ChallengeEvent::Accepted => return ChallengeResponse::accepted(challenge_id),
                ChallengeEvent::Declined => {
                    info!("{} declined the challenge", request.opponent);
                    return ChallengeResponse::failed();
                }
                ChallengeEvent::RateLimited => {
                    warn!("Challenge rate limit reached");
                    return ChallengeResponse::rate_limited();
                }
                ChallengeEvent::InvalidTimeControl => {
                    warn!(
                        "Arena rejected time control {} as invalid",
                        format_time_control(request.initial_time, request.increment)
                    );
                    return ChallengeResponse::misconfigured();
                }
                ChallengeEvent::Error { message } => {
                    warn!("Challenge against {} failed: {}", request.opponent, message);
                    return ChallengeResponse::failed();
                }
            }
        }

        ChallengeResponse::failed()
    }
}
