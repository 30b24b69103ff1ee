//! Common types used throughout the arena steward

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Opaque challenge identifier issued by the arena server
pub type ChallengeId = String;

/// Opaque game identifier issued by the arena server
pub type GameId = String;

/// Game variant supported by the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Variant {
    Standard,
    Chess960,
    Crazyhouse,
    Antichess,
    Atomic,
    Horde,
    KingOfTheHill,
    RacingKings,
    ThreeCheck,
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Variant::Standard => "standard",
            Variant::Chess960 => "chess960",
            Variant::Crazyhouse => "crazyhouse",
            Variant::Antichess => "antichess",
            Variant::Atomic => "atomic",
            Variant::Horde => "horde",
            Variant::KingOfTheHill => "kingOfTheHill",
            Variant::RacingKings => "racingKings",
            Variant::ThreeCheck => "threeCheck",
        };
        write!(f, "{}", name)
    }
}

/// Server-side rating bucket used to compare bot strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PerfType {
    Bullet,
    Blitz,
    Rapid,
    Classical,
    Chess960,
    Crazyhouse,
    Antichess,
    Atomic,
    Horde,
    KingOfTheHill,
    RacingKings,
    ThreeCheck,
}

impl PerfType {
    /// All rating buckets the arena tracks
    pub const ALL: [PerfType; 12] = [
        PerfType::Bullet,
        PerfType::Blitz,
        PerfType::Rapid,
        PerfType::Classical,
        PerfType::Chess960,
        PerfType::Crazyhouse,
        PerfType::Antichess,
        PerfType::Atomic,
        PerfType::Horde,
        PerfType::KingOfTheHill,
        PerfType::RacingKings,
        PerfType::ThreeCheck,
    ];
}

impl std::fmt::Display for PerfType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PerfType::Bullet => "bullet",
            PerfType::Blitz => "blitz",
            PerfType::Rapid => "rapid",
            PerfType::Classical => "classical",
            PerfType::Chess960 => "chess960",
            PerfType::Crazyhouse => "crazyhouse",
            PerfType::Antichess => "antichess",
            PerfType::Atomic => "atomic",
            PerfType::KingOfTheHill => "kingOfTheHill",
            PerfType::Horde => "horde",
            PerfType::RacingKings => "racingKings",
            PerfType::ThreeCheck => "threeCheck",
        };
        write!(f, "{}", name)
    }
}

/// Server-side speed classification of a time control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Speed {
    UltraBullet,
    Bullet,
    Blitz,
    Rapid,
    Classical,
    Correspondence,
}

/// Color requested when issuing a challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeColor {
    White,
    Black,
    Random,
}

impl ChallengeColor {
    /// The color the opponent would receive
    pub fn opposite(self) -> Self {
        match self {
            ChallengeColor::White => ChallengeColor::Black,
            ChallengeColor::Black => ChallengeColor::White,
            ChallengeColor::Random => ChallengeColor::Random,
        }
    }
}

impl std::fmt::Display for ChallengeColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChallengeColor::White => write!(f, "white"),
            ChallengeColor::Black => write!(f, "black"),
            ChallengeColor::Random => write!(f, "random"),
        }
    }
}

/// Game mode accepted from a challenger class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Rated,
    Casual,
}

/// Reason sent to the server when declining a challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeclineReason {
    Generic,
    Variant,
    TimeControl,
    TooFast,
    TooSlow,
    Casual,
    Rated,
    NoBot,
    OnlyBot,
}

impl DeclineReason {
    /// Wire label used by the arena API and as a metrics dimension
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclineReason::Generic => "generic",
            DeclineReason::Variant => "variant",
            DeclineReason::TimeControl => "timeControl",
            DeclineReason::TooFast => "tooFast",
            DeclineReason::TooSlow => "tooSlow",
            DeclineReason::Casual => "casual",
            DeclineReason::Rated => "rated",
            DeclineReason::NoBot => "noBot",
            DeclineReason::OnlyBot => "onlyBot",
        }
    }
}

/// Why a selected opponent cannot be challenged right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyReason {
    /// Currently playing another game; skip without penalty
    Playing,
    /// No longer online; drop from the roster
    Offline,
}

/// An online bot eligible for matchmaking
///
/// Identity is the username; rating diffs are relative to the operator account,
/// positive when the opponent is stronger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bot {
    pub username: String,
    pub tos_violation: bool,
    pub rating_diffs: HashMap<PerfType, i32>,
}

impl PartialEq for Bot {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
    }
}

impl Eq for Bot {}

/// Raw online-bot record as streamed by the arena server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotInfo {
    pub username: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub tos_violation: bool,
    #[serde(default)]
    pub ratings: HashMap<PerfType, i32>,
}

/// Operator account information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub username: String,
    #[serde(default)]
    pub ratings: HashMap<PerfType, i32>,
}

/// Online/playing status of a single user
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UserStatus {
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub playing: bool,
}

/// An outgoing challenge to a specific opponent
#[derive(Debug, Clone)]
pub struct ChallengeRequest {
    pub opponent: String,
    /// Initial clock time in seconds
    pub initial_time: u32,
    /// Clock increment in seconds
    pub increment: u32,
    pub rated: bool,
    pub color: ChallengeColor,
    pub variant: Variant,
    /// How long to wait for a terminal event on the challenge stream
    pub timeout: Duration,
}

/// Terminal outcome of one outgoing challenge attempt
#[derive(Debug, Clone, Default)]
pub struct ChallengeResponse {
    pub challenge_id: Option<ChallengeId>,
    pub success: bool,
    pub no_opponent: bool,
    pub has_reached_rate_limit: bool,
    pub is_misconfigured: bool,
}

impl ChallengeResponse {
    pub fn accepted(challenge_id: Option<ChallengeId>) -> Self {
        Self {
            challenge_id,
            success: true,
            ..Default::default()
        }
    }

    pub fn failed() -> Self {
        Self::default()
    }

    pub fn no_opponent() -> Self {
        Self {
            no_opponent: true,
            ..Default::default()
        }
    }

    pub fn rate_limited() -> Self {
        Self {
            has_reached_rate_limit: true,
            ..Default::default()
        }
    }

    pub fn misconfigured() -> Self {
        Self {
            is_misconfigured: true,
            ..Default::default()
        }
    }
}

/// One event on the streaming challenge-creation call
///
/// The stream ends after the first terminal event; `Created` only carries the
/// assigned id and is followed by a terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeEvent {
    Created { challenge_id: ChallengeId },
    Accepted,
    Declined,
    RateLimited,
    InvalidTimeControl,
    Error { message: String },
}

/// An inbound challenge as announced on the event stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeInfo {
    pub id: ChallengeId,
    pub challenger: String,
    #[serde(default)]
    pub challenger_title: Option<String>,
    #[serde(default)]
    pub challenger_rating: Option<u32>,
    pub variant: Variant,
    pub speed: Speed,
    /// Initial clock time in seconds
    pub initial_time: u32,
    /// Clock increment in seconds
    pub increment: u32,
    pub rated: bool,
}

impl ChallengeInfo {
    /// Whether the challenger is another bot account
    pub fn is_bot(&self) -> bool {
        self.challenger_title.as_deref() == Some("BOT")
    }
}

/// Union type for all events pushed on the account event stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ArenaEvent {
    ChallengeReceived { challenge: ChallengeInfo },
    ChallengeCanceled { challenge_id: ChallengeId },
    ChallengeDeclined { challenge_id: ChallengeId },
    GameStarted { game_id: GameId },
    GameFinished { game_id: GameId },
}

/// Terminal and intermediate status of a running game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameStatus {
    Created,
    Started,
    Aborted,
    NoStart,
    Mate,
    Resign,
    Stalemate,
    Draw,
    Outoftime,
}

impl GameStatus {
    pub fn is_over(&self) -> bool {
        !matches!(self, GameStatus::Created | GameStatus::Started)
    }

    /// Whether the game ended without being played out
    pub fn is_aborted(&self) -> bool {
        matches!(self, GameStatus::Aborted | GameStatus::NoStart)
    }
}

/// One event on a per-game stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GameUpdate {
    State { status: GameStatus },
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_equality_by_username() {
        let a = Bot {
            username: "alpha".to_string(),
            tos_violation: false,
            rating_diffs: HashMap::new(),
        };
        let mut b = a.clone();
        b.tos_violation = true;
        b.rating_diffs.insert(PerfType::Bullet, 100);
        assert_eq!(a, b);
    }

    #[test]
    fn test_challenge_color_opposite() {
        assert_eq!(ChallengeColor::White.opposite(), ChallengeColor::Black);
        assert_eq!(ChallengeColor::Black.opposite(), ChallengeColor::White);
        assert_eq!(ChallengeColor::Random.opposite(), ChallengeColor::Random);
    }

    #[test]
    fn test_game_status_classification() {
        assert!(!GameStatus::Started.is_over());
        assert!(GameStatus::Mate.is_over());
        assert!(GameStatus::Aborted.is_over());
        assert!(GameStatus::Aborted.is_aborted());
        assert!(GameStatus::NoStart.is_aborted());
        assert!(!GameStatus::Resign.is_aborted());
    }

    #[test]
    fn test_bot_title_detection() {
        let challenge = ChallengeInfo {
            id: "c1".to_string(),
            challenger: "somebot".to_string(),
            challenger_title: Some("BOT".to_string()),
            challenger_rating: Some(2100),
            variant: Variant::Standard,
            speed: Speed::Blitz,
            initial_time: 180,
            increment: 2,
            rated: true,
        };
        assert!(challenge.is_bot());

        let human = ChallengeInfo {
            challenger_title: Some("GM".to_string()),
            ..challenge.clone()
        };
        assert!(!human.is_bot());
    }

    #[test]
    fn test_arena_event_round_trip() {
        let event = ArenaEvent::GameStarted {
            game_id: "abc123".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"GameStarted\""));
        let parsed: ArenaEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, ArenaEvent::GameStarted { game_id } if game_id == "abc123"));
    }
}
