//! Catalogue preparation.
//!
//! Turns the raw lichess opening files (`eco`, `name`, `pgn`, `epd`)
//! into the prepared catalogue the pipeline consumes: the display name
//! is split into family and variation and the line's half-moves are
//! counted.

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::types::OpeningRecord;

/// Move-number tokens such as `1. ` or `12. `.
static MOVE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9]+\.\s").unwrap_or_else(|e| panic!("invalid move number pattern: {e}"))
});

/// A row of a raw lichess opening file. Extra columns are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOpening {
    pub eco: String,
    pub name: String,
    pub pgn: String,
    pub epd: String,
}

impl RawOpening {
    pub fn into_record(self) -> OpeningRecord {
        let family = family_name(&self.name).to_string();
        let variation = variation_name(&self.name, &family);
        let move_count = count_moves(&self.pgn);
        OpeningRecord {
            eco: self.eco,
            family,
            variation,
            epd: self.epd,
            pgn: self.pgn,
            move_count,
        }
    }
}

/// The opening name up to the first `:`, then up to the first `,`.
pub fn family_name(full_name: &str) -> &str {
    let before_colon = full_name.split(':').next().unwrap_or(full_name);
    before_colon.split(',').next().unwrap_or(before_colon)
}

/// The name with its family prefix removed; empty when there is none.
pub fn variation_name(full_name: &str, family: &str) -> String {
    if full_name == family {
        return String::new();
    }
    full_name
        .replace(&format!("{family}: "), "")
        .replace(&format!("{family}, "), "")
}

/// Half-moves in a move-notation line: move numbers are stripped and
/// the remaining whitespace-separated tokens counted.
pub fn count_moves(pgn: &str) -> u32 {
    let moves = MOVE_NUMBER.replace_all(pgn, "");
    moves.split_whitespace().count() as u32
}
