//! Position evaluation.
//!
//! Defines the `PositionEvaluator` contract the pipeline depends on and
//! provides a UCI engine implementation that owns one long-lived engine
//! process for a whole batch.

pub mod uci;

use async_trait::async_trait;
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Color, Position};

use crate::types::Score;

/// Abstraction over anything that can score a position.
///
/// Evaluation is synchronous from the caller's point of view: one call,
/// one position, one score. Failures are per position; the caller is
/// expected to record them and move on.
#[async_trait]
pub trait PositionEvaluator: Send {
    /// Score the position from White's point of view.
    async fn evaluate(&mut self, epd: &str) -> Result<Score, EvalError>;
}

/// Failure to evaluate a single position.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Invalid position {epd:?}: {reason}")]
    InvalidPosition { epd: String, reason: String },

    #[error("Engine returned no score for {epd:?}")]
    NoScore { epd: String },

    #[error("Evaluation of {epd:?} exceeded {secs}s")]
    Timeout { epd: String, secs: u64 },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Failure of the engine process itself.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to start engine {path}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Engine process exited unexpectedly")]
    Exited,

    #[error("Engine did not answer {0:?} in time")]
    Unresponsive(String),
}

/// A validated position ready to hand to an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnginePosition {
    /// Full six-field FEN.
    pub fen: String,
    pub side_to_move: Color,
}

impl EnginePosition {
    /// Parse an EPD (or full FEN) and check the position is legal.
    ///
    /// Four-field EPDs get zeroed move clocks so the engine receives a
    /// complete FEN.
    pub fn from_epd(epd: &str) -> Result<Self, EvalError> {
        let epd = epd.trim();
        let invalid = |reason: String| EvalError::InvalidPosition {
            epd: epd.to_string(),
            reason,
        };

        let fen_text = match epd.split_whitespace().count() {
            4 => format!("{epd} 0 1"),
            6 => epd.to_string(),
            n => return Err(invalid(format!("expected 4 or 6 fields, found {n}"))),
        };

        let fen: Fen = fen_text.parse().map_err(|e| invalid(format!("{e}")))?;
        let position: Chess = fen
            .into_position(CastlingMode::Standard)
            .map_err(|e| invalid(format!("{e}")))?;

        Ok(Self {
            fen: fen_text,
            side_to_move: position.turn(),
        })
    }

    /// Convert a side-to-move score into White's point of view.
    ///
    /// `mate 0` means the side to move is checkmated; it carries no sign
    /// of its own, so it becomes `Score::Mated` for that side.
    pub fn white_pov(&self, score: Score) -> Score {
        match (score, self.side_to_move) {
            (Score::Mate(0), side) => Score::Mated(side),
            (score, Color::White) => score,
            (score, Color::Black) => score.negate(),
        }
    }
}
