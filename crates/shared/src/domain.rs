use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_newtype!(GameId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Easy,
    Advanced,
    Pvp,
}

impl Mode {
    /// Plies removed by one takeback so that the human is on move afterwards.
    pub fn undo_plies(self) -> usize {
        match self {
            Mode::Easy | Mode::Advanced => 2,
            Mode::Pvp => 1,
        }
    }

    /// Side the human plays against the engine; `None` when both sides are human.
    pub fn human_color(self) -> Option<Color> {
        match self {
            Mode::Easy | Mode::Advanced => Some(Color::White),
            Mode::Pvp => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Easy => "easy",
            Mode::Advanced => "advanced",
            Mode::Pvp => "pvp",
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Mode::Easy),
            "advanced" => Ok(Mode::Advanced),
            "pvp" => Ok(Mode::Pvp),
            other => Err(format!("unknown game mode '{other}'")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameStatus {
    Continue,
    Draw,
    WhiteLoss,
    BlackLoss,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        self != GameStatus::Continue
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            GameStatus::Continue => "Continue",
            GameStatus::Draw => "Draw",
            GameStatus::WhiteLoss => "WhiteLoss",
            GameStatus::BlackLoss => "BlackLoss",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PromotionRole {
    #[default]
    Queen,
    Rook,
    Bishop,
    Knight,
}

impl FromStr for PromotionRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queen" | "q" => Ok(PromotionRole::Queen),
            "rook" | "r" => Ok(PromotionRole::Rook),
            "bishop" | "b" => Ok(PromotionRole::Bishop),
            "knight" | "n" => Ok(PromotionRole::Knight),
            other => Err(format!("unknown promotion role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SquareParseError {
    #[error("square must be two characters, got '{0}'")]
    Length(String),
    #[error("file must be a-h, got '{0}'")]
    File(char),
    #[error("rank must be 1-8, got '{0}'")]
    Rank(char),
}

/// Board coordinate in algebraic notation, e.g. `e4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square {
    file: u8,
    rank: u8,
}

impl Square {
    /// `file` and `rank` are zero based; `None` when off the board.
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        (file < 8 && rank < 8).then_some(Self { file, rank })
    }

    pub fn file(self) -> u8 {
        self.file
    }

    pub fn rank(self) -> u8 {
        self.rank
    }
}

impl FromStr for Square {
    type Err = SquareParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (Some(file), Some(rank), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(SquareParseError::Length(s.to_string()));
        };
        let file_lower = file.to_ascii_lowercase();
        if !('a'..='h').contains(&file_lower) {
            return Err(SquareParseError::File(file));
        }
        if !('1'..='8').contains(&rank) {
            return Err(SquareParseError::Rank(rank));
        }
        Ok(Self {
            file: file_lower as u8 - b'a',
            rank: rank as u8 - b'1',
        })
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file) as char, (b'1' + self.rank) as char)
    }
}

impl Serialize for Square {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Square {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One ply as recorded by the engine. Extra engine fields (step, fen) are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub src: Square,
    pub tar: Square,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<PromotionRole>,
}
