//! Enrichment pipeline: wiring for one end-to-end run.
//!
//! Loads the catalogue, builds the explorer client stack, holds the
//! engine for exactly the duration of the batch, and writes the output
//! table once at the end.

pub mod enricher;
pub mod progress;
pub mod report;

use anyhow::{Context, Result};
use tracing::info;

use crate::analysis::uci::UciEngine;
use crate::catalogue;
use crate::config::AppConfig;
use crate::remote::client::{Identity, RateLimitedClient};
use crate::remote::explorer::RemoteStatsGateway;
use crate::remote::ReqwestTransport;
use enricher::EnrichmentOrchestrator;
use report::BatchReport;

/// Build the explorer gateway described by the configuration.
pub fn build_gateway(config: &AppConfig) -> Result<RemoteStatsGateway<ReqwestTransport>> {
    let transport = ReqwestTransport::new(
        config.api.use_http2,
        std::time::Duration::from_secs(config.api.timeout_secs),
    )?;
    let identity = Identity::new(&config.api.username, &config.api.email);

    let mut client = RateLimitedClient::with_policy(
        transport,
        &identity,
        config.rate_limit.attempts,
        config.rate_limit.cooldown(),
    );
    if let Some(token) = config.api_token()? {
        client = client.with_token(&token);
    }

    info!(user_agent = %identity.user_agent(), "Explorer client ready");
    Ok(RemoteStatsGateway::new(
        client,
        &config.endpoints.masters,
        &config.endpoints.lichess,
    ))
}

/// Enrich the configured catalogue and write the output table.
///
/// `limit` restricts the run to the first N catalogue rows.
pub async fn run_enrichment(config: &AppConfig, limit: Option<usize>) -> Result<BatchReport> {
    let mut openings = catalogue::read_openings(&config.paths.catalogue)?;
    if let Some(n) = limit {
        openings.truncate(n);
        info!(limit = n, "Catalogue truncated");
    }

    let gateway = build_gateway(config)?;
    let mut orchestrator = EnrichmentOrchestrator::new(gateway, config.rate_limit.request_delay());

    let mut engine = UciEngine::start(&config.engine)
        .await
        .with_context(|| format!("Could not start engine {}", config.engine.path.display()))?;

    let outcome = orchestrator.enrich_batch(&mut engine, &openings).await;
    engine.shutdown().await;

    catalogue::write_enriched(&config.paths.output, &outcome.records)?;

    outcome.report.log();
    Ok(outcome.report)
}
