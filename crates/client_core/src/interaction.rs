//! Live game controller: select, move, promote, take back.
//!
//! Every operation bumps a generation counter before its first request and
//! only applies its response if the counter is unchanged, so a superseded or
//! closed operation never writes state. The lock is never held across a
//! gateway call.

use std::{collections::BTreeMap, sync::Arc};

use shared::{
    domain::{Color, GameId, GameStatus, Mode, MoveRecord, PromotionRole, Square},
    protocol::{GameInfoResponse, MoveRequest, MoveResponse},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    error::ControllerError,
    gateway::GameGateway,
    retry::RetryPolicy,
    selection::{highlight_map, Highlight, SelectionState},
    ClientEvent, Outcome, EVENT_CAPACITY,
};

/// Last state confirmed by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSnapshot {
    pub session_id: GameId,
    pub fen: String,
    pub status: GameStatus,
    pub turn: Color,
    pub history: Vec<MoveRecord>,
    pub mode: Mode,
}

impl GameSnapshot {
    fn from_info(session_id: GameId, info: GameInfoResponse) -> Result<Self, ControllerError> {
        if !info.valid {
            return Err(ControllerError::Unauthorized);
        }
        let missing =
            |field: &str| ControllerError::Malformed(format!("game info without {field}"));
        Ok(Self {
            session_id,
            fen: info.fen.ok_or_else(|| missing("fen"))?,
            status: info.status.unwrap_or(GameStatus::Continue),
            turn: info.turn.ok_or_else(|| missing("turn"))?,
            history: info.history,
            mode: info.mode.ok_or_else(|| missing("mode"))?,
        })
    }

    pub fn last_move(&self) -> Option<&MoveRecord> {
        self.history.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Idle,
    PieceSelected,
    Submitting,
    Terminal(GameStatus),
}

struct InteractionState {
    generation: u64,
    closed: bool,
    snapshot: Option<GameSnapshot>,
    selection: SelectionState,
    pending_role: PromotionRole,
    undo_in_flight: bool,
}

impl InteractionState {
    fn begin(&mut self) -> Result<u64, ControllerError> {
        if self.closed {
            return Err(ControllerError::Detached);
        }
        self.generation += 1;
        Ok(self.generation)
    }

    fn is_current(&self, generation: u64) -> bool {
        !self.closed && self.generation == generation
    }

    fn highlights(&self) -> BTreeMap<Square, Highlight> {
        highlight_map(
            self.snapshot.as_ref().and_then(GameSnapshot::last_move),
            &self.selection,
        )
    }
}

pub struct InteractionController {
    gateway: Arc<dyn GameGateway>,
    session_id: GameId,
    retry: RetryPolicy,
    inner: Mutex<InteractionState>,
    events: broadcast::Sender<ClientEvent>,
}

impl InteractionController {
    pub fn new(gateway: Arc<dyn GameGateway>, session_id: GameId) -> Arc<Self> {
        Self::with_retry(gateway, session_id, RetryPolicy::default())
    }

    pub fn with_retry(
        gateway: Arc<dyn GameGateway>,
        session_id: GameId,
        retry: RetryPolicy,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            gateway,
            session_id,
            retry,
            inner: Mutex::new(InteractionState {
                generation: 0,
                closed: false,
                snapshot: None,
                selection: SelectionState::Idle,
                pending_role: PromotionRole::default(),
                undo_in_flight: false,
            }),
            events,
        })
    }

    pub fn session_id(&self) -> GameId {
        self.session_id
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> Option<GameSnapshot> {
        self.inner.lock().await.snapshot.clone()
    }

    pub async fn selection(&self) -> SelectionState {
        self.inner.lock().await.selection.clone()
    }

    pub async fn pending_role(&self) -> PromotionRole {
        self.inner.lock().await.pending_role
    }

    pub async fn highlights(&self) -> BTreeMap<Square, Highlight> {
        self.inner.lock().await.highlights()
    }

    pub async fn phase(&self) -> Phase {
        let state = self.inner.lock().await;
        match (&state.snapshot, &state.selection) {
            (None, _) => Phase::Loading,
            (Some(snapshot), _) if snapshot.status.is_terminal() => {
                Phase::Terminal(snapshot.status)
            }
            (Some(_), SelectionState::Idle) => Phase::Idle,
            (Some(_), SelectionState::PieceSelected { .. }) => Phase::PieceSelected,
            (Some(_), SelectionState::Submitting { .. }) => Phase::Submitting,
        }
    }

    /// Fetches the authoritative game state. `Unauthorized` means the caller
    /// must leave the game view; no board is kept.
    pub async fn load(&self) -> Result<Outcome, ControllerError> {
        let generation = self.inner.lock().await.begin()?;
        let result = self.fetch_snapshot().await;

        let mut state = self.inner.lock().await;
        if !state.is_current(generation) {
            return Ok(Outcome::Stale);
        }
        self.apply_snapshot(&mut state, result)?;
        Ok(Outcome::Refreshed)
    }

    /// First click selects and asks for legal targets; second click submits.
    pub async fn select_square(&self, square: Square) -> Result<Outcome, ControllerError> {
        let (generation, request) = {
            let mut state = self.inner.lock().await;
            if state.closed {
                return Err(ControllerError::Detached);
            }
            if state.snapshot.is_none() || state.undo_in_flight {
                return Ok(Outcome::Ignored);
            }
            let selected = match &state.selection {
                SelectionState::Submitting { .. } => {
                    debug!(%square, "click ignored while a move is in flight");
                    return Ok(Outcome::Ignored);
                }
                SelectionState::Idle => None,
                SelectionState::PieceSelected { square: src, .. } => Some(*src),
            };

            let request = selected.map(|src| MoveRequest {
                src,
                tar: square,
                session_id: self.session_id,
                role: state.pending_role,
            });
            if let Some(request) = &request {
                state.selection = SelectionState::Submitting {
                    src: request.src,
                    tar: request.tar,
                };
                self.emit(ClientEvent::SelectionChanged(state.highlights()));
            }
            (state.begin()?, request)
        };

        match request {
            None => self.query_legal_moves(generation, square).await,
            Some(request) => self.submit(generation, request).await,
        }
    }

    /// Applies to the next submitted move only; nothing is sent.
    pub async fn set_promotion_role(&self, role: PromotionRole) {
        self.inner.lock().await.pending_role = role;
        debug!(?role, "promotion role set");
    }

    /// Undoes the plies of one human turn (two against the engine, one in
    /// pvp), then reloads; the reloaded state decides what is shown.
    pub async fn takeback(&self) -> Result<Outcome, ControllerError> {
        let (generation, plies) = {
            let mut state = self.inner.lock().await;
            if state.closed {
                return Err(ControllerError::Detached);
            }
            let Some(mode) = state.snapshot.as_ref().map(|snapshot| snapshot.mode) else {
                return Ok(Outcome::Ignored);
            };
            if state.undo_in_flight || state.selection.is_submitting() {
                return Ok(Outcome::Ignored);
            }
            state.undo_in_flight = true;
            state.selection = SelectionState::Idle;
            (state.begin()?, mode.undo_plies())
        };

        // reload even after a failed undo: earlier plies may already be gone
        let undone = self.undo_plies(plies).await;
        let result = self.fetch_snapshot().await;

        let mut state = self.inner.lock().await;
        state.undo_in_flight = false;
        if !state.is_current(generation) {
            return Ok(Outcome::Stale);
        }
        self.apply_snapshot(&mut state, result)?;
        if let Err(err) = undone {
            self.emit(ClientEvent::Error(err.to_string()));
            return Err(err);
        }
        Ok(Outcome::Refreshed)
    }

    /// Detaches the controller; in-flight responses are dropped from now on.
    pub async fn close(&self) {
        let mut state = self.inner.lock().await;
        state.closed = true;
        state.generation += 1;
        state.selection = SelectionState::Idle;
        debug!(session_id = %self.session_id, "interaction controller closed");
    }

    async fn query_legal_moves(
        &self,
        generation: u64,
        square: Square,
    ) -> Result<Outcome, ControllerError> {
        let result = self
            .retry
            .run("legal_moves", || self.gateway.legal_moves(self.session_id, square))
            .await;

        let mut state = self.inner.lock().await;
        if !state.is_current(generation) {
            return Ok(Outcome::Stale);
        }
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                self.emit(ClientEvent::Error(err.to_string()));
                return Err(err);
            }
        };
        if !response.valid {
            debug!(%square, "legal move query refused");
            state.selection = SelectionState::Idle;
            self.emit(ClientEvent::SelectionChanged(state.highlights()));
            return Ok(Outcome::Rejected);
        }

        state.selection = SelectionState::PieceSelected {
            square,
            legal_moves: response.moves.clone(),
        };
        self.emit(ClientEvent::SelectionChanged(state.highlights()));
        Ok(Outcome::Selected {
            square,
            legal_moves: response.moves,
        })
    }

    async fn submit(
        &self,
        generation: u64,
        request: MoveRequest,
    ) -> Result<Outcome, ControllerError> {
        // moves are not retried: a lost response may hide an applied move
        let result = self.gateway.submit_move(&request).await;

        let response: MoveResponse = {
            let mut state = self.inner.lock().await;
            if !state.is_current(generation) {
                return Ok(Outcome::Stale);
            }
            match result {
                Err(err) => {
                    state.selection = SelectionState::Idle;
                    self.emit(ClientEvent::SelectionChanged(state.highlights()));
                    self.emit(ClientEvent::Error(err.to_string()));
                    return Err(err);
                }
                Ok(response) if !response.valid => {
                    info!(src = %request.src, tar = %request.tar, "move rejected");
                    state.selection = SelectionState::Idle;
                    self.emit(ClientEvent::MoveRejected {
                        src: request.src,
                        tar: request.tar,
                    });
                    self.emit(ClientEvent::SelectionChanged(state.highlights()));
                    return Ok(Outcome::Rejected);
                }
                Ok(response) => response,
            }
        };

        let refreshed = self.fetch_snapshot().await;

        let mut state = self.inner.lock().await;
        if !state.is_current(generation) {
            return Ok(Outcome::Stale);
        }
        let applied = self.apply_snapshot(&mut state, refreshed);

        // the move happened even if the reload failed
        let status = response
            .game_status
            .or_else(|| state.snapshot.as_ref().map(|snapshot| snapshot.status))
            .unwrap_or(GameStatus::Continue);
        if response.is_being_checked {
            self.emit(ClientEvent::Check);
        }
        if status.is_terminal() {
            info!(session_id = %self.session_id, %status, "game over");
            self.emit(ClientEvent::GameOver(status));
        }
        applied?;
        Ok(Outcome::Moved {
            check: response.is_being_checked,
            status,
        })
    }

    /// Stops at the first refused or failed undo.
    async fn undo_plies(&self, plies: usize) -> Result<(), ControllerError> {
        for ply in 0..plies {
            match self.gateway.undo(self.session_id).await {
                Ok(response) if response.valid => {}
                Ok(_) => {
                    debug!(ply, "nothing left to undo");
                    break;
                }
                Err(err) => {
                    warn!(ply, %err, "undo failed");
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    async fn fetch_snapshot(&self) -> Result<GameSnapshot, ControllerError> {
        let info = self
            .retry
            .run("game_info", || self.gateway.game_info(self.session_id))
            .await?;
        GameSnapshot::from_info(self.session_id, info)
    }

    fn apply_snapshot(
        &self,
        state: &mut InteractionState,
        result: Result<GameSnapshot, ControllerError>,
    ) -> Result<(), ControllerError> {
        state.selection = SelectionState::Idle;
        match result {
            Ok(snapshot) => {
                self.emit(ClientEvent::StateRefreshed {
                    fen: snapshot.fen.clone(),
                    last_move: snapshot.last_move().copied(),
                });
                state.snapshot = Some(snapshot);
                self.emit(ClientEvent::SelectionChanged(state.highlights()));
                Ok(())
            }
            Err(ControllerError::Unauthorized) => {
                warn!(session_id = %self.session_id, "game is not available to this user");
                state.snapshot = None;
                self.emit(ClientEvent::Redirect);
                Err(ControllerError::Unauthorized)
            }
            Err(err) => {
                self.emit(ClientEvent::Error(err.to_string()));
                Err(err)
            }
        }
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/interaction_tests.rs"]
mod tests;
