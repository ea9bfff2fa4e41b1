//! Client side of the game engine's HTTP contract.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use shared::domain::{GameId, Square};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Engine endpoints. Every one of them is a JSON `POST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineRoute {
    Login,
    Signup,
    User,
    NewGame,
    Info,
    Update,
    LegalMoves { session_id: GameId, square: Square },
    Undo,
    Resume,
    Replays,
    Replay,
}

impl EngineRoute {
    pub fn path(&self) -> String {
        match self {
            EngineRoute::Login => "/login".to_string(),
            EngineRoute::Signup => "/signup".to_string(),
            EngineRoute::User => "/user".to_string(),
            EngineRoute::NewGame => "/chess/new".to_string(),
            EngineRoute::Info => "/chess/info".to_string(),
            EngineRoute::Update => "/chess/update".to_string(),
            EngineRoute::LegalMoves { session_id, square } => {
                format!("/chess/{session_id}/{square}")
            }
            EngineRoute::Undo => "/undo".to_string(),
            EngineRoute::Resume => "/resume".to_string(),
            EngineRoute::Replays => "/replays".to_string(),
            EngineRoute::Replay => "/replay".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("game engine unreachable: {0}")]
    Transport(String),
    #[error("game engine returned a non-JSON body (status {status}): {detail}")]
    InvalidBody { status: u16, detail: String },
}

#[async_trait]
pub trait GameEngine: Send + Sync {
    /// Posts `body` to `route` and returns the engine's JSON body as-is.
    async fn call(&self, route: &EngineRoute, body: Value) -> Result<Value, EngineError>;
}

pub struct HttpGameEngine {
    http: Client,
    base_url: Url,
}

impl HttpGameEngine {
    pub fn new(base_url: Url, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, route: &EngineRoute) -> Result<Url, EngineError> {
        self.base_url
            .join(route.path().trim_start_matches('/'))
            .map_err(|e| EngineError::Transport(format!("invalid engine url: {e}")))
    }
}

#[async_trait]
impl GameEngine for HttpGameEngine {
    async fn call(&self, route: &EngineRoute, body: Value) -> Result<Value, EngineError> {
        let url = self.endpoint(route)?;
        debug!(%url, "forwarding to game engine");
        let response = self
            .http
            .post(url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "game engine answered with error status");
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| EngineError::InvalidBody {
            status: status.as_u16(),
            detail: e.to_string(),
        })
    }
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
