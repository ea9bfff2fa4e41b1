use std::collections::BTreeMap;

use client_core::Highlight;
use shared::domain::Square;

/// Draws the placement field of a FEN string, rank 8 at the top.
///
/// Highlighted squares are bracketed. Returns `None` for a placement field
/// that does not describe eight ranks of eight squares.
pub fn board(fen: &str, highlights: &BTreeMap<Square, Highlight>) -> Option<String> {
    let placement = fen.split_whitespace().next()?;
    let ranks: Vec<&str> = placement.split('/').collect();
    if ranks.len() != 8 {
        return None;
    }

    let mut out = String::new();
    for (row, rank_text) in ranks.iter().enumerate() {
        let rank = 7 - row as u8;
        let mut cells = Vec::with_capacity(8);
        for ch in rank_text.chars() {
            match ch.to_digit(10) {
                Some(empty @ 1..=8) => cells.extend(std::iter::repeat('.').take(empty as usize)),
                Some(_) => return None,
                None => cells.push(ch),
            }
        }
        if cells.len() != 8 {
            return None;
        }

        out.push_str(&format!("{} ", rank + 1));
        for (file, piece) in cells.into_iter().enumerate() {
            let square = Square::new(file as u8, rank)?;
            let cell = match highlights.get(&square) {
                Some(Highlight::Selected) => format!("({piece})"),
                Some(Highlight::Legal) | Some(Highlight::LastMoveAndLegal) => format!("<{piece}>"),
                Some(Highlight::LastMove) => format!("[{piece}]"),
                None => format!(" {piece} "),
            };
            out.push_str(&cell);
        }
        out.push('\n');
    }
    out.push_str("   a  b  c  d  e  f  g  h\n");
    Some(out)
}
