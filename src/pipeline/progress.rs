//! Progress reporting for long batches.

use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Receives one tick per processed record against a known total.
pub trait ProgressSink: Send {
    fn start(&mut self, total: usize);
    fn advance(&mut self);
    fn finish(&mut self);
}

/// Logs each tick with a completion percentage and a naive ETA.
#[derive(Debug, Default)]
pub struct LogProgress {
    total: usize,
    done: usize,
    started: Option<Instant>,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining time extrapolated from the average so far.
    fn eta(&self) -> Option<Duration> {
        let started = self.started?;
        if self.done == 0 {
            return None;
        }
        let per_record = started.elapsed() / self.done as u32;
        Some(per_record * self.total.saturating_sub(self.done) as u32)
    }
}

impl ProgressSink for LogProgress {
    fn start(&mut self, total: usize) {
        self.total = total;
        self.done = 0;
        self.started = Some(Instant::now());
        info!(total, "Enrichment started");
    }

    fn advance(&mut self) {
        self.done += 1;
        let pct = if self.total == 0 {
            100.0
        } else {
            self.done as f64 / self.total as f64 * 100.0
        };
        info!(
            done = self.done,
            total = self.total,
            pct = format!("{pct:.1}%"),
            eta_secs = self.eta().map(|d| d.as_secs()),
            "Progress"
        );
    }

    fn finish(&mut self) {
        let elapsed = self.started.map(|s| s.elapsed()).unwrap_or_default();
        info!(
            done = self.done,
            total = self.total,
            elapsed_secs = elapsed.as_secs(),
            "Enrichment finished"
        );
    }
}
