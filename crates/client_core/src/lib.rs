//! Client-side controllers for a chess game served through the gateway.
//!
//! [`InteractionController`] drives a live game: selection, move submission,
//! promotion choice and takeback. [`ReplayController`] walks a finished game
//! step by step. Both talk to the gateway through [`GameGateway`] and publish
//! [`ClientEvent`]s on a broadcast channel for whatever renders the board.

use std::collections::BTreeMap;

use shared::domain::{GameStatus, MoveRecord, Square};

pub mod error;
pub mod gateway;
pub mod interaction;
pub mod replay;
pub mod retry;
pub mod selection;

pub use error::ControllerError;
pub use gateway::{GameGateway, HttpGatewayClient, NewGame};
pub use interaction::{GameSnapshot, InteractionController, Phase};
pub use replay::{ReplayController, ReplaySnapshot};
pub use retry::RetryPolicy;
pub use selection::{highlight_map, Highlight, SelectionState};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    StateRefreshed {
        fen: String,
        last_move: Option<MoveRecord>,
    },
    SelectionChanged(BTreeMap<Square, Highlight>),
    /// The side to move is in check. A notice, not a state.
    Check,
    GameOver(GameStatus),
    MoveRejected {
        src: Square,
        tar: Square,
    },
    /// The game is not viewable by this user; leave the view.
    Redirect,
    Error(String),
}

/// What an operation did to the controller's state.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Refreshed,
    Selected {
        square: Square,
        legal_moves: Vec<Square>,
    },
    Moved {
        check: bool,
        status: GameStatus,
    },
    Rejected,
    /// Dropped because another request is in flight or nothing is loaded.
    Ignored,
    Stepped {
        step: u32,
    },
    RolledBack {
        step: u32,
    },
    Unchanged,
    /// A newer operation or `close()` superseded this one; nothing was applied.
    Stale,
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
