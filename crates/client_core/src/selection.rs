//! Click selection state and the board highlight overlay derived from it.

use std::collections::BTreeMap;

use shared::domain::{MoveRecord, Square};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SelectionState {
    #[default]
    Idle,
    PieceSelected {
        square: Square,
        legal_moves: Vec<Square>,
    },
    /// A move is in flight; further clicks are ignored until it resolves.
    Submitting { src: Square, tar: Square },
}

impl SelectionState {
    pub fn selected(&self) -> Option<Square> {
        match self {
            SelectionState::Idle => None,
            SelectionState::PieceSelected { square, .. } => Some(*square),
            SelectionState::Submitting { src, .. } => Some(*src),
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, SelectionState::Submitting { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    LastMove,
    LastMoveAndLegal,
    Selected,
    Legal,
}

/// Overlay for the board. Last-move squares come only from `last_move`, the
/// tail of the authoritative history; the selection is drawn on top.
pub fn highlight_map(
    last_move: Option<&MoveRecord>,
    selection: &SelectionState,
) -> BTreeMap<Square, Highlight> {
    let mut map = BTreeMap::new();
    if let Some(record) = last_move {
        map.insert(record.src, Highlight::LastMove);
        map.insert(record.tar, Highlight::LastMove);
    }

    match selection {
        SelectionState::Idle => {}
        SelectionState::PieceSelected {
            square,
            legal_moves,
        } => {
            for target in legal_moves {
                let mark = match map.get(target) {
                    Some(Highlight::LastMove) => Highlight::LastMoveAndLegal,
                    _ => Highlight::Legal,
                };
                map.insert(*target, mark);
            }
            map.insert(*square, Highlight::Selected);
        }
        SelectionState::Submitting { src, .. } => {
            map.insert(*src, Highlight::Selected);
        }
    }
    map
}
