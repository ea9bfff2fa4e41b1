//! Client side of the gateway's HTTP routes.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{GameId, Mode, Square},
    error::ApiError,
    protocol::{
        Credentials, GameInfoResponse, GameRequest, LegalMovesResponse, LogoutResponse,
        MoveRequest, MoveResponse, NewGameRequest, NewGameResponse, ReplayListResponse,
        ReplayRequest, ReplayStepResponse, ResumeListResponse, UserResponse, ValidResponse,
    },
};
use tracing::debug;
use url::Url;

use crate::error::ControllerError;

/// Game calls the controllers depend on.
#[async_trait]
pub trait GameGateway: Send + Sync {
    async fn game_info(&self, session_id: GameId) -> Result<GameInfoResponse, ControllerError>;
    async fn legal_moves(
        &self,
        session_id: GameId,
        square: Square,
    ) -> Result<LegalMovesResponse, ControllerError>;
    async fn submit_move(&self, request: &MoveRequest) -> Result<MoveResponse, ControllerError>;
    async fn undo(&self, session_id: GameId) -> Result<ValidResponse, ControllerError>;
    async fn replay_step(
        &self,
        session_id: GameId,
        step: u32,
    ) -> Result<ReplayStepResponse, ControllerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewGame {
    Created(GameId),
    /// Not logged in, or the engine declined.
    Refused,
}

/// reqwest client holding the gateway's session cookie.
pub struct HttpGatewayClient {
    http: Client,
    base_url: Url,
}

impl HttpGatewayClient {
    pub fn new(mut base_url: Url) -> anyhow::Result<Self> {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder().cookie_store(true).build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<ValidResponse, ControllerError> {
        self.post("login", credentials).await
    }

    pub async fn signup(
        &self,
        credentials: &Credentials,
    ) -> Result<ValidResponse, ControllerError> {
        self.post("signup", credentials).await
    }

    pub async fn logout(&self) -> Result<LogoutResponse, ControllerError> {
        self.get("logout").await
    }

    pub async fn user(&self) -> Result<UserResponse, ControllerError> {
        self.get("user").await
    }

    pub async fn new_game(&self, mode: Mode) -> Result<NewGame, ControllerError> {
        let response: NewGameResponse = self.post("chess/new", &NewGameRequest { mode }).await?;
        match (response.valid, response.session_id) {
            (true, Some(session_id)) => Ok(NewGame::Created(session_id)),
            (true, None) => Err(ControllerError::Malformed(
                "new game response without session_id".to_string(),
            )),
            (false, _) => Ok(NewGame::Refused),
        }
    }

    pub async fn resume_list(&self) -> Result<ResumeListResponse, ControllerError> {
        self.get("resume").await
    }

    pub async fn replay_list(&self) -> Result<ReplayListResponse, ControllerError> {
        self.get("replays").await
    }

    fn endpoint(&self, path: &str) -> Result<Url, ControllerError> {
        self.base_url
            .join(path)
            .map_err(|e| ControllerError::Malformed(format!("invalid gateway url: {e}")))
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ControllerError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ControllerError::Transport(e.to_string()))?;
        read_json(response).await
    }

    async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, ControllerError> {
        let url = self.endpoint(path)?;
        debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ControllerError::Transport(e.to_string()))?;
        read_json(response).await
    }
}

async fn read_json<R: DeserializeOwned>(response: Response) -> Result<R, ControllerError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ControllerError::Transport(e.to_string()))?;

    if !status.is_success() {
        let detail = serde_json::from_slice::<ApiError>(&bytes)
            .map(|err| err.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
        return Err(if status.is_server_error() {
            ControllerError::Transport(format!("{status}: {detail}"))
        } else {
            ControllerError::Malformed(format!("{status}: {detail}"))
        });
    }

    serde_json::from_slice(&bytes).map_err(|e| ControllerError::Malformed(e.to_string()))
}

#[async_trait]
impl GameGateway for HttpGatewayClient {
    async fn game_info(&self, session_id: GameId) -> Result<GameInfoResponse, ControllerError> {
        self.post("chess/info", &GameRequest { session_id }).await
    }

    async fn legal_moves(
        &self,
        session_id: GameId,
        square: Square,
    ) -> Result<LegalMovesResponse, ControllerError> {
        self.get(&format!("chess/{session_id}/{square}")).await
    }

    async fn submit_move(&self, request: &MoveRequest) -> Result<MoveResponse, ControllerError> {
        self.post("chess/update", request).await
    }

    async fn undo(&self, session_id: GameId) -> Result<ValidResponse, ControllerError> {
        self.post("undo", &GameRequest { session_id }).await
    }

    async fn replay_step(
        &self,
        session_id: GameId,
        step: u32,
    ) -> Result<ReplayStepResponse, ControllerError> {
        self.post("replay", &ReplayRequest { session_id, step }).await
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
