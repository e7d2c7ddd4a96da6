//! Shared types for the opening enricher.
//!
//! These types form the data model passed between the catalogue,
//! remote, analysis and pipeline modules. Records are plain values:
//! they are cloned and transformed on the way through the pipeline,
//! never shared mutably.

use serde::{Deserialize, Serialize};
use shakmaty::Color;
use std::fmt;

// ---------------------------------------------------------------------------
// Catalogue records
// ---------------------------------------------------------------------------

/// One named opening line from the prepared catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningRecord {
    /// ECO classification code (e.g. "C50").
    pub eco: String,
    /// Opening name before the first `:` or `,`.
    pub family: String,
    /// Remainder of the name, empty when the opening has no variation.
    pub variation: String,
    /// Position reached by the line. Join key for every lookup.
    pub epd: String,
    /// Move-notation text of the line, e.g. `1. e4 e5 2. Nf3`.
    pub pgn: String,
    /// Half-moves in the line.
    pub move_count: u32,
}

/// An opening record merged with its evaluation and explorer statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub opening: OpeningRecord,
    pub eval: Evaluation,
    pub masters: SourceSummary,
    pub lichess: SourceSummary,
}

impl EnrichedRecord {
    /// A row carrying no evaluation and zero statistics. Used when a
    /// record could not be looked up at all.
    pub fn unenriched(opening: OpeningRecord) -> Self {
        Self {
            opening,
            eval: Evaluation::Failed,
            masters: SourceSummary::default(),
            lichess: SourceSummary::default(),
        }
    }

    /// Flatten into the column layout of the output table.
    pub fn to_row(&self) -> EnrichedRow {
        EnrichedRow {
            eco: self.opening.eco.clone(),
            family: self.opening.family.clone(),
            variation: self.opening.variation.clone(),
            epd: self.opening.epd.clone(),
            pgn: self.opening.pgn.clone(),
            move_count: self.opening.move_count,
            eval: self.eval.to_string(),
            master_games: self.masters.games,
            master_white_win: self.masters.white_win,
            master_black_win: self.masters.black_win,
            master_draw: self.masters.draw,
            lichess_games: self.lichess.games,
            lichess_white_win: self.lichess.white_win,
            lichess_black_win: self.lichess.black_win,
            lichess_draw: self.lichess.draw,
        }
    }
}

/// Flat output row. Field order is the column order of the enriched TSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRow {
    pub eco: String,
    pub family: String,
    pub variation: String,
    pub epd: String,
    pub pgn: String,
    pub move_count: u32,
    pub eval: String,
    pub master_games: u64,
    pub master_white_win: f64,
    pub master_black_win: f64,
    pub master_draw: f64,
    pub lichess_games: u64,
    pub lichess_white_win: f64,
    pub lichess_black_win: f64,
    pub lichess_draw: f64,
}

// ---------------------------------------------------------------------------
// Engine evaluation
// ---------------------------------------------------------------------------

/// Engine score, always from White's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Material-equivalent advantage in hundredths of a pawn.
    Centipawns(i32),
    /// Forced mate in N moves; negative when Black mates.
    Mate(i32),
    /// The given side is already checkmated.
    Mated(Color),
}

impl Score {
    /// Flip to the opposite side's point of view.
    pub fn negate(self) -> Self {
        match self {
            Score::Centipawns(cp) => Score::Centipawns(-cp),
            Score::Mate(n) => Score::Mate(-n),
            Score::Mated(side) => Score::Mated(side),
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Centipawns(cp) => write!(f, "{:.2}", f64::from(*cp) / 100.0),
            Score::Mate(n) if *n < 0 => write!(f, "-M{}", n.unsigned_abs()),
            Score::Mate(n) => write!(f, "M{n}"),
            Score::Mated(Color::White) => f.write_str("-M0"),
            Score::Mated(Color::Black) => f.write_str("M0"),
        }
    }
}

/// Outcome of evaluating one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    Score(Score),
    /// The engine could not produce a score for this position.
    Failed,
}

impl Evaluation {
    pub fn is_failed(&self) -> bool {
        matches!(self, Evaluation::Failed)
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluation::Score(score) => score.fmt(f),
            Evaluation::Failed => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Explorer statistics
// ---------------------------------------------------------------------------

/// Raw game outcome counts for one position from one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameStats {
    pub white: u64,
    pub black: u64,
    pub draws: u64,
}

impl GameStats {
    /// Saturates rather than overflowing on absurd remote counts.
    pub fn total(&self) -> u64 {
        self.white.saturating_add(self.black).saturating_add(self.draws)
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Game total plus outcome percentages for one source.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SourceSummary {
    pub games: u64,
    pub white_win: f64,
    pub black_win: f64,
    pub draw: f64,
}

impl From<GameStats> for SourceSummary {
    fn from(stats: GameStats) -> Self {
        let games = stats.total();
        Self {
            games,
            white_win: percentage(stats.white, games),
            black_win: percentage(stats.black, games),
            draw: percentage(stats.draws, games),
        }
    }
}

/// `numerator / denominator * 100`, or `0.0` when the denominator is zero.
pub fn percentage(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64 * 100.0
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Fatal errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum EnricherError {
    #[error("Catalogue error ({path}): {message}")]
    Catalogue { path: String, message: String },

    #[error("Output error ({path}): {message}")]
    Output { path: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
