//! Opening enricher: entry point.
//!
//! Loads configuration, initialises structured logging and runs one of
//! two batch jobs: `prepare` builds the opening catalogue from the raw
//! lichess files, `enrich` adds engine evaluations and explorer
//! statistics to it. Ctrl+C aborts a run; the engine process is torn
//! down and no output is written.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use opening_enricher::catalogue;
use opening_enricher::config::AppConfig;
use opening_enricher::pipeline;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "opening-enricher")]
#[command(about = "Enrich chess openings with engine evaluations and explorer statistics")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config.toml", env = "ENRICHER_CONFIG")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the opening catalogue from raw lichess opening files
    Prepare,
    /// Evaluate and look up every catalogue position
    Enrich {
        /// Only process the first N openings
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let args = Args::parse();
    init_logging();

    let cfg = AppConfig::load(&args.config)?;

    match args.command {
        Command::Prepare => {
            let summary = catalogue::prepare(&cfg.paths.raw_catalogues, &cfg.paths.catalogue)?;
            info!(
                openings = summary.openings,
                max_move_count = summary.max_move_count,
                path = %cfg.paths.catalogue.display(),
                "Catalogue prepared"
            );
        }
        Command::Enrich { limit } => {
            info!(
                catalogue = %cfg.paths.catalogue.display(),
                output = %cfg.paths.output.display(),
                depth = cfg.engine.depth,
                "Enrichment starting"
            );

            let shutdown = tokio::signal::ctrl_c();
            tokio::pin!(shutdown);

            tokio::select! {
                report = pipeline::run_enrichment(&cfg, limit) => {
                    let report = report?;
                    info!(summary = %report, "Enrichment finished");
                }
                _ = &mut shutdown => {
                    warn!("Shutdown signal received, abandoning run without writing output");
                }
            }
        }
    }

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("opening_enricher=info"));

    let json_logging = std::env::var("ENRICHER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
