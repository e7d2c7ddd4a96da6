//! Enrichment orchestrator.
//!
//! Drives the batch one record at a time, in catalogue order:
//! evaluate → masters stats → lichess stats → percentages → merged row.
//! A fixed pause precedes every explorer request to stay under the
//! server's rate budget; throttling that still happens is absorbed by
//! the client. Evaluation failures are confined to their own record.

use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::progress::{LogProgress, ProgressSink};
use super::report::BatchReport;
use crate::analysis::PositionEvaluator;
use crate::remote::explorer::RemoteStatsGateway;
use crate::remote::HttpTransport;
use crate::types::{EnrichedRecord, Evaluation, OpeningRecord, SourceSummary};

/// Default pause before each explorer request.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(1001);

/// Result of enriching a batch: one row per catalogue row, plus tallies.
#[derive(Debug)]
pub struct BatchOutcome {
    pub records: Vec<EnrichedRecord>,
    pub report: BatchReport,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct EnrichmentOrchestrator<T: HttpTransport> {
    gateway: RemoteStatsGateway<T>,
    request_delay: Duration,
    progress: Box<dyn ProgressSink>,
}

impl<T: HttpTransport> EnrichmentOrchestrator<T> {
    pub fn new(gateway: RemoteStatsGateway<T>, request_delay: Duration) -> Self {
        Self {
            gateway,
            request_delay,
            progress: Box::new(LogProgress::new()),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn gateway(&self) -> &RemoteStatsGateway<T> {
        &self.gateway
    }

    /// Enrich every catalogue record and join the results back onto the
    /// catalogue. Never fails: lookups that go wrong leave zeroed fields.
    pub async fn enrich_batch<E>(&mut self, evaluator: &mut E, catalogue: &[OpeningRecord]) -> BatchOutcome
    where
        E: PositionEvaluator + ?Sized,
    {
        info!(count = catalogue.len(), "Starting batch enrichment");
        let mut report = BatchReport::begin(catalogue.len());
        self.progress.start(catalogue.len());

        let mut enriched = Vec::with_capacity(catalogue.len());
        let mut seen: HashSet<&str> = HashSet::with_capacity(catalogue.len());
        for record in catalogue {
            if record.epd.trim().is_empty() {
                warn!(eco = %record.eco, family = %record.family, "Record has no position, skipping lookups");
                report.skip(record.move_count);
                self.progress.advance();
                continue;
            }
            if !seen.insert(record.epd.as_str()) {
                debug!(epd = %record.epd, family = %record.family, "Position already enriched, reusing result");
                report.skip(record.move_count);
                self.progress.advance();
                continue;
            }

            let row = self.enrich_one(evaluator, record).await;
            report.record(&row);
            enriched.push(row);
        }

        self.progress.finish();
        report.complete(self.gateway.client().requests_sent());

        BatchOutcome {
            records: join_by_epd(catalogue, enriched),
            report,
        }
    }

    /// The fixed evaluate → masters → lichess sequence for one record.
    async fn enrich_one<E>(&mut self, evaluator: &mut E, record: &OpeningRecord) -> EnrichedRecord
    where
        E: PositionEvaluator + ?Sized,
    {
        let eval = match evaluator.evaluate(&record.epd).await {
            Ok(score) => Evaluation::Score(score),
            Err(e) => {
                warn!(epd = %record.epd, error = %e, "Evaluation failed, recording sentinel");
                Evaluation::Failed
            }
        };
        self.progress.advance();

        tokio::time::sleep(self.request_delay).await;
        let masters = self.gateway.masters_stats(&record.epd).await;

        tokio::time::sleep(self.request_delay).await;
        let lichess = self.gateway.lichess_stats(&record.epd).await;

        debug!(
            epd = %record.epd,
            eval = %eval,
            master_games = masters.total(),
            lichess_games = lichess.total(),
            "Record enriched"
        );

        EnrichedRecord {
            opening: record.clone(),
            eval,
            masters: SourceSummary::from(masters),
            lichess: SourceSummary::from(lichess),
        }
    }
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// Left-join enriched rows onto the catalogue by position.
///
/// Output has exactly one row per catalogue row, in catalogue order.
/// Catalogue rows without an enriched counterpart get a zeroed row;
/// when a position appears twice, every occurrence takes the first
/// enriched row for it.
pub fn join_by_epd(catalogue: &[OpeningRecord], enriched: Vec<EnrichedRecord>) -> Vec<EnrichedRecord> {
    let mut by_epd: HashMap<String, EnrichedRecord> = HashMap::with_capacity(enriched.len());
    for row in enriched {
        if by_epd.contains_key(&row.opening.epd) {
            warn!(epd = %row.opening.epd, "Duplicate position in batch, keeping first result");
            continue;
        }
        by_epd.insert(row.opening.epd.clone(), row);
    }

    catalogue
        .iter()
        .map(|opening| match by_epd.get(&opening.epd) {
            Some(row) => EnrichedRecord {
                opening: opening.clone(),
                ..row.clone()
            },
            None => EnrichedRecord::unenriched(opening.clone()),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
