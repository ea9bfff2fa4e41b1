//! Scripted in-memory gateway for controller tests.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::{Color, GameId, GameStatus, Mode, MoveRecord, PromotionRole, Square},
    protocol::{
        GameInfoResponse, LegalMovesResponse, MoveRequest, MoveResponse, ReplayStepResponse,
        ValidResponse,
    },
};
use tokio::sync::{broadcast, oneshot, Mutex, Notify};

use crate::{error::ControllerError, gateway::GameGateway, retry::RetryPolicy, ClientEvent};

pub(crate) fn sq(raw: &str) -> Square {
    raw.parse().expect("square")
}

pub(crate) fn record(src: &str, tar: &str) -> MoveRecord {
    MoveRecord {
        src: sq(src),
        tar: sq(tar),
        role: None,
    }
}

pub(crate) fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        base_delay: Duration::from_millis(1),
    }
}

pub(crate) fn drain(events: &mut broadcast::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Info,
    LegalMoves(Square),
    Move {
        src: Square,
        tar: Square,
        role: PromotionRole,
    },
    Undo,
    Replay(u32),
}

struct Board {
    history: Vec<MoveRecord>,
    turn: Color,
    status: GameStatus,
}

/// Plays a tiny fixed script: legal targets come from a table, the engine
/// reply in non-pvp modes is always e7-e5.
pub(crate) struct FakeGateway {
    mode: Mode,
    board: Mutex<Board>,
    legal: HashMap<Square, Vec<Square>>,
    calls: Mutex<Vec<Call>>,
    authorized: bool,
    check_after_move: bool,
    status_after_move: GameStatus,
    replay_steps: u32,
    transport_failures: AtomicU32,
    calls_before_failures: AtomicU32,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    pub(crate) entered: Notify,
}

impl FakeGateway {
    pub(crate) fn new(mode: Mode) -> Self {
        let legal = HashMap::from([
            (sq("e2"), vec![sq("e3"), sq("e4")]),
            (sq("g1"), vec![sq("f3"), sq("h3")]),
            (sq("e7"), vec![sq("e6"), sq("e5")]),
        ]);
        Self {
            mode,
            board: Mutex::new(Board {
                history: Vec::new(),
                turn: Color::White,
                status: GameStatus::Continue,
            }),
            legal,
            calls: Mutex::new(Vec::new()),
            authorized: true,
            check_after_move: false,
            status_after_move: GameStatus::Continue,
            replay_steps: 0,
            transport_failures: AtomicU32::new(0),
            calls_before_failures: AtomicU32::new(0),
            gate: Mutex::new(None),
            entered: Notify::new(),
        }
    }

    pub(crate) fn unauthorized(mut self) -> Self {
        self.authorized = false;
        self
    }

    pub(crate) fn with_history(self, history: Vec<MoveRecord>) -> Self {
        let turn = if history.len() % 2 == 0 {
            Color::White
        } else {
            Color::Black
        };
        let board = Board {
            history,
            turn,
            status: GameStatus::Continue,
        };
        Self {
            board: Mutex::new(board),
            ..self
        }
    }

    pub(crate) fn with_move_result(mut self, check: bool, status: GameStatus) -> Self {
        self.check_after_move = check;
        self.status_after_move = status;
        self
    }

    pub(crate) fn with_replay_steps(mut self, steps: u32) -> Self {
        self.replay_steps = steps;
        self
    }

    pub(crate) fn fail_next(&self, count: u32) {
        self.fail_after(0, count);
    }

    /// Lets `skip` calls through, then fails the `count` after them.
    pub(crate) fn fail_after(&self, skip: u32, count: u32) {
        self.calls_before_failures.store(skip, Ordering::SeqCst);
        self.transport_failures.store(count, Ordering::SeqCst);
    }

    /// The next call blocks until the returned sender fires or is dropped.
    pub(crate) async fn hold_next_call(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().await = Some(rx);
        tx
    }

    pub(crate) async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    async fn enter(&self, call: Call) -> Result<(), ControllerError> {
        self.calls.lock().await.push(call);
        let skipped = self
            .calls_before_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let failing = !skipped
            && self
                .transport_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if failing {
            return Err(ControllerError::Transport("connection refused".to_string()));
        }
        let gate = self.gate.lock().await.take();
        if let Some(gate) = gate {
            self.entered.notify_one();
            let _ = gate.await;
        }
        Ok(())
    }

    fn fen(len: usize) -> String {
        format!("fen-after-{len}")
    }
}

#[async_trait]
impl GameGateway for FakeGateway {
    async fn game_info(&self, _session_id: GameId) -> Result<GameInfoResponse, ControllerError> {
        self.enter(Call::Info).await?;
        if !self.authorized {
            return Ok(GameInfoResponse::default());
        }
        let board = self.board.lock().await;
        Ok(GameInfoResponse {
            valid: true,
            fen: Some(Self::fen(board.history.len())),
            status: Some(board.status),
            turn: Some(board.turn),
            history: board.history.clone(),
            mode: Some(self.mode),
        })
    }

    async fn legal_moves(
        &self,
        _session_id: GameId,
        square: Square,
    ) -> Result<LegalMovesResponse, ControllerError> {
        self.enter(Call::LegalMoves(square)).await?;
        Ok(LegalMovesResponse {
            valid: self.authorized,
            moves: self.legal.get(&square).cloned().unwrap_or_default(),
        })
    }

    async fn submit_move(&self, request: &MoveRequest) -> Result<MoveResponse, ControllerError> {
        self.enter(Call::Move {
            src: request.src,
            tar: request.tar,
            role: request.role,
        })
        .await?;
        let legal = self
            .legal
            .get(&request.src)
            .is_some_and(|targets| targets.contains(&request.tar));
        if !self.authorized || !legal {
            return Ok(MoveResponse::default());
        }

        let mut board = self.board.lock().await;
        board.history.push(MoveRecord {
            src: request.src,
            tar: request.tar,
            role: None,
        });
        board.turn = board.turn.opponent();
        if self.mode != Mode::Pvp {
            board.history.push(record("e7", "e5"));
            board.turn = board.turn.opponent();
        }
        board.status = self.status_after_move;
        Ok(MoveResponse {
            valid: true,
            is_being_checked: self.check_after_move,
            game_status: Some(self.status_after_move),
            turn: Some(board.turn),
        })
    }

    async fn undo(&self, _session_id: GameId) -> Result<ValidResponse, ControllerError> {
        self.enter(Call::Undo).await?;
        let mut board = self.board.lock().await;
        if board.history.pop().is_none() {
            return Ok(ValidResponse::invalid());
        }
        board.turn = board.turn.opponent();
        board.status = GameStatus::Continue;
        Ok(ValidResponse { valid: true })
    }

    async fn replay_step(
        &self,
        _session_id: GameId,
        step: u32,
    ) -> Result<ReplayStepResponse, ControllerError> {
        self.enter(Call::Replay(step)).await?;
        if !self.authorized || step > self.replay_steps {
            return Ok(ReplayStepResponse::default());
        }
        Ok(ReplayStepResponse {
            valid: true,
            fen: Some(format!("replay-{step}")),
            history: if step == 0 {
                Vec::new()
            } else {
                vec![record("a2", "a3")]
            },
        })
    }
}
