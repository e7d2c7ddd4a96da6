//! Batch report: tallies for one enrichment run.
//!
//! Built up record by record by the orchestrator, logged once the batch
//! completes.

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::info;

use crate::types::{EnrichedRecord, SourceSummary};

/// Summary of a complete enrichment run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Rows in the input catalogue.
    pub records: usize,
    /// Records whose evaluation produced a score.
    pub evaluated: usize,
    pub eval_failures: usize,
    /// Records not looked up themselves (empty or repeated position).
    pub skipped: usize,
    /// Lookups that came back with no games.
    pub masters_empty: usize,
    pub lichess_empty: usize,
    /// Network requests issued, throttle retries included.
    pub requests_sent: u64,
    pub max_move_count: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn begin(records: usize) -> Self {
        let now = Utc::now();
        Self {
            records,
            evaluated: 0,
            eval_failures: 0,
            skipped: 0,
            masters_empty: 0,
            lichess_empty: 0,
            requests_sent: 0,
            max_move_count: 0,
            started_at: now,
            finished_at: now,
        }
    }

    /// Fold one enriched record into the tallies.
    pub fn record(&mut self, enriched: &EnrichedRecord) {
        if enriched.eval.is_failed() {
            self.eval_failures += 1;
        } else {
            self.evaluated += 1;
        }
        if is_empty(&enriched.masters) {
            self.masters_empty += 1;
        }
        if is_empty(&enriched.lichess) {
            self.lichess_empty += 1;
        }
        self.max_move_count = self.max_move_count.max(enriched.opening.move_count);
    }

    pub fn skip(&mut self, move_count: u32) {
        self.skipped += 1;
        self.max_move_count = self.max_move_count.max(move_count);
    }

    pub fn complete(&mut self, requests_sent: u64) {
        self.requests_sent = requests_sent;
        self.finished_at = Utc::now();
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Every record was either evaluated or recorded as a failure.
    pub fn is_complete(&self) -> bool {
        self.evaluated + self.eval_failures + self.skipped == self.records
    }

    pub fn log(&self) {
        info!(
            records = self.records,
            evaluated = self.evaluated,
            eval_failures = self.eval_failures,
            skipped = self.skipped,
            masters_empty = self.masters_empty,
            lichess_empty = self.lichess_empty,
            requests = self.requests_sent,
            max_move_count = self.max_move_count,
            elapsed_secs = self.elapsed().num_seconds(),
            complete = self.is_complete(),
            "Batch complete"
        );
    }
}

fn is_empty(summary: &SourceSummary) -> bool {
    summary.games == 0
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records | {} evaluated, {} failed, {} skipped | empty: {} masters, {} lichess | max moves {} | {}s",
            self.records,
            self.evaluated,
            self.eval_failures,
            self.skipped,
            self.masters_empty,
            self.lichess_empty,
            self.max_move_count,
            self.elapsed().num_seconds(),
        )
    }
}
