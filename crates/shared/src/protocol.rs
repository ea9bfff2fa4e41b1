use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{Color, GameId, GameStatus, Mode, MoveRecord, PromotionRole, Square};

fn default_true() -> bool {
    true
}

/// The engine reports a single record for replay steps and a list for game info.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<MoveRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(MoveRecord),
        Many(Vec<MoveRecord>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(record)) => vec![record],
        Some(OneOrMany::Many(records)) => records,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGameRequest {
    pub mode: Mode,
}

/// Body of `/chess/info` and `/undo`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GameRequest {
    pub session_id: GameId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MoveRequest {
    pub src: Square,
    pub tar: Square,
    pub session_id: GameId,
    pub role: PromotionRole,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReplayRequest {
    pub session_id: GameId,
    pub step: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidResponse {
    #[serde(default)]
    pub valid: bool,
}

impl ValidResponse {
    pub fn invalid() -> Self {
        Self { valid: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub msg: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserResponse {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub total_hours: Option<f64>,
    #[serde(default)]
    pub score: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewGameResponse {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub session_id: Option<GameId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameInfoResponse {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub fen: Option<String>,
    #[serde(default)]
    pub status: Option<GameStatus>,
    #[serde(default)]
    pub turn: Option<Color>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub history: Vec<MoveRecord>,
    #[serde(default)]
    pub mode: Option<Mode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoveResponse {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub is_being_checked: bool,
    #[serde(default)]
    pub game_status: Option<GameStatus>,
    #[serde(default)]
    pub turn: Option<Color>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegalMovesResponse {
    #[serde(default = "default_true")]
    pub valid: bool,
    #[serde(default)]
    pub moves: Vec<Square>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSummary {
    pub session_id: GameId,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub last_update: Option<String>,
    #[serde(default)]
    pub mode: Option<Mode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeListResponse {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub resume_list: Vec<GameSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayListResponse {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub replay_list: Vec<GameSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayStepResponse {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub fen: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub history: Vec<MoveRecord>,
}
