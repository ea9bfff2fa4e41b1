//! Read-only step cursor over a recorded game.

use std::{collections::BTreeMap, sync::Arc};

use shared::domain::{GameId, MoveRecord, Square};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::{
    error::ControllerError,
    gateway::GameGateway,
    retry::RetryPolicy,
    selection::{highlight_map, Highlight, SelectionState},
    ClientEvent, Outcome, EVENT_CAPACITY,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySnapshot {
    pub step: u32,
    pub fen: Option<String>,
    pub last_move: Option<MoveRecord>,
}

struct ReplayState {
    generation: u64,
    closed: bool,
    cursor: u32,
    /// Step most recently asked for; `advance` counts from here so quick
    /// clicks are not lost while a request is in flight.
    requested: u32,
    /// Step whose board is currently shown, if any.
    displayed: Option<u32>,
    fen: Option<String>,
    last_move: Option<MoveRecord>,
}

impl ReplayState {
    fn begin(&mut self) -> Result<u64, ControllerError> {
        if self.closed {
            return Err(ControllerError::Detached);
        }
        self.generation += 1;
        Ok(self.generation)
    }

    fn request(&mut self, step: u32) -> Result<u64, ControllerError> {
        let generation = self.begin()?;
        self.requested = step;
        Ok(generation)
    }

    fn is_current(&self, generation: u64) -> bool {
        !self.closed && self.generation == generation
    }
}

pub struct ReplayController {
    gateway: Arc<dyn GameGateway>,
    session_id: GameId,
    retry: RetryPolicy,
    inner: Mutex<ReplayState>,
    events: broadcast::Sender<ClientEvent>,
}

impl ReplayController {
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
            inner: Mutex::new(ReplayState {
                generation: 0,
                closed: false,
                cursor: 0,
                requested: 0,
                displayed: None,
                fen: None,
                last_move: None,
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

    pub async fn step(&self) -> u32 {
        self.inner.lock().await.cursor
    }

    pub async fn snapshot(&self) -> ReplaySnapshot {
        let state = self.inner.lock().await;
        ReplaySnapshot {
            step: state.cursor,
            fen: state.fen.clone(),
            last_move: state.last_move,
        }
    }

    pub async fn highlights(&self) -> BTreeMap<Square, Highlight> {
        let state = self.inner.lock().await;
        highlight_map(state.last_move.as_ref(), &SelectionState::Idle)
    }

    /// Shows `step`. A step the engine refuses rolls the cursor back one step
    /// at a time until a valid one, keeping the board already shown when the
    /// rollback lands on it. A refused step 0 means the replay is not ours.
    pub async fn load_step(&self, step: u32) -> Result<Outcome, ControllerError> {
        let generation = self.inner.lock().await.request(step)?;
        self.fetch_step(generation, step).await
    }

    /// Moves the cursor by `delta` from the last requested step, clamped at 0.
    pub async fn advance(&self, delta: i64) -> Result<Outcome, ControllerError> {
        let (generation, candidate) = {
            let mut state = self.inner.lock().await;
            if state.closed {
                return Err(ControllerError::Detached);
            }
            let current = state.requested;
            let candidate = (i64::from(current) + delta).clamp(0, i64::from(u32::MAX));
            let candidate = u32::try_from(candidate).unwrap_or(u32::MAX);
            if candidate == current {
                return Ok(Outcome::Unchanged);
            }
            (state.request(candidate)?, candidate)
        };
        self.fetch_step(generation, candidate).await
    }

    async fn fetch_step(&self, generation: u64, step: u32) -> Result<Outcome, ControllerError> {
        let mut target = step;
        loop {
            let result = self
                .retry
                .run("replay_step", || self.gateway.replay_step(self.session_id, target))
                .await;

            let mut state = self.inner.lock().await;
            if !state.is_current(generation) {
                return Ok(Outcome::Stale);
            }
            let response = match result {
                Ok(response) => response,
                Err(err) => {
                    state.requested = state.cursor;
                    self.emit(ClientEvent::Error(err.to_string()));
                    return Err(err);
                }
            };

            if response.valid {
                state.cursor = target;
                state.requested = target;
                state.displayed = Some(target);
                state.fen = response.fen.clone();
                state.last_move = response.history.last().copied();
                self.emit(ClientEvent::StateRefreshed {
                    fen: response.fen.unwrap_or_default(),
                    last_move: state.last_move,
                });
                return Ok(if target == step {
                    Outcome::Stepped { step }
                } else {
                    Outcome::RolledBack { step: target }
                });
            }

            let Some(previous) = target.checked_sub(1) else {
                warn!(session_id = %self.session_id, "replay is not available to this user");
                state.cursor = 0;
                state.requested = 0;
                state.displayed = None;
                state.fen = None;
                state.last_move = None;
                self.emit(ClientEvent::Redirect);
                return Err(ControllerError::Unauthorized);
            };
            debug!(step = target, "replay step out of range, rolling back");
            state.requested = previous;
            if state.displayed == Some(previous) {
                state.cursor = previous;
                return Ok(Outcome::RolledBack { step: previous });
            }
            target = previous;
        }
    }

    /// Replays never mutate the recorded game.
    pub async fn takeback(&self) -> Result<Outcome, ControllerError> {
        warn!(session_id = %self.session_id, "takeback refused on a replay");
        Err(ControllerError::ReplayMutation)
    }

    pub async fn close(&self) {
        let mut state = self.inner.lock().await;
        state.closed = true;
        state.generation += 1;
        debug!(session_id = %self.session_id, "replay controller closed");
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/replay_tests.rs"]
mod tests;
