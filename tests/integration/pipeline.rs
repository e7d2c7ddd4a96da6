//! End-to-end enrichment runs over the in-memory explorer and evaluator.

use std::time::Duration;
use tokio::time::Instant;

use opening_enricher::catalogue;
use opening_enricher::pipeline::enricher::{EnrichmentOrchestrator, DEFAULT_REQUEST_DELAY};
use opening_enricher::types::{Evaluation, GameStats, Score};

use crate::mock_services::*;

const E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq -";
const D4: &str = "rnbqkbnr/pppppppp/8/8/3P4/8/PPP1PPPP/RNBQKBNR b KQkq -";
const C4: &str = "rnbqkbnr/pppppppp/8/8/2P5/8/PP1PPPPP/RNBQKBNR b KQkq -";

#[tokio::test(start_paused = true)]
async fn test_single_record_merge() {
    let explorer = FakeExplorer::new();
    explorer.set_stats(MASTERS_URL, "X", GameStats { white: 40, black: 30, draws: 30 });
    explorer.set_stats(LICHESS_URL, "X", GameStats { white: 0, black: 0, draws: 0 });
    let mut orch = EnrichmentOrchestrator::new(gateway(&explorer), DEFAULT_REQUEST_DELAY);
    let mut evaluator = ScriptedEvaluator::default().with("X", Score::Centipawns(35));

    let outcome = orch
        .enrich_batch(&mut evaluator, &[opening("A00", "X", "1. e4", 1)])
        .await;

    let row = outcome.records[0].to_row();
    assert_eq!(row.master_games, 100);
    assert_eq!(row.master_white_win, 40.0);
    assert_eq!(row.master_black_win, 30.0);
    assert_eq!(row.master_draw, 30.0);
    assert_eq!(row.lichess_games, 0);
    assert_eq!(row.lichess_white_win, 0.0);
    assert_eq!(row.lichess_black_win, 0.0);
    assert_eq!(row.lichess_draw, 0.0);
    assert_eq!(row.eval, "0.35");
}

#[tokio::test(start_paused = true)]
async fn test_calls_follow_catalogue_order() {
    let explorer = FakeExplorer::new();
    let mut orch = EnrichmentOrchestrator::new(gateway(&explorer), DEFAULT_REQUEST_DELAY);
    let mut evaluator = ScriptedEvaluator::default()
        .with(E4, Score::Centipawns(30))
        .with(D4, Score::Centipawns(25))
        .with(C4, Score::Centipawns(20));
    let catalogue = [
        opening("B00", E4, "1. e4", 1),
        opening("A40", D4, "1. d4", 1),
        opening("A10", C4, "1. c4", 1),
    ];

    orch.enrich_batch(&mut evaluator, &catalogue).await;

    assert_eq!(evaluator.calls, vec![E4, D4, C4]);
    assert_eq!(
        explorer.urls(),
        vec![
            url_for(MASTERS_URL, E4),
            url_for(LICHESS_URL, E4),
            url_for(MASTERS_URL, D4),
            url_for(LICHESS_URL, D4),
            url_for(MASTERS_URL, C4),
            url_for(LICHESS_URL, C4),
        ]
    );
    assert!(explorer
        .user_agents()
        .iter()
        .all(|ua| ua.as_deref().is_some_and(|ua| ua.contains("username: tester; contact: tester@example.com"))));
}

#[tokio::test(start_paused = true)]
async fn test_every_record_survives_failures() {
    let explorer = FakeExplorer::new();
    explorer.set_stats(MASTERS_URL, E4, GameStats { white: 10, black: 5, draws: 5 });
    explorer.break_url(MASTERS_URL, D4);
    explorer.break_url(LICHESS_URL, D4);
    explorer.set_prelude(LICHESS_URL, C4, &[429, 429, 429]);
    let mut orch = EnrichmentOrchestrator::new(gateway(&explorer), DEFAULT_REQUEST_DELAY);
    // C4 is not scripted, so its evaluation fails.
    let mut evaluator = ScriptedEvaluator::default()
        .with(E4, Score::Centipawns(30))
        .with(D4, Score::Mate(-4));
    let catalogue = [
        opening("B00", E4, "1. e4", 1),
        opening("A40", D4, "1. d4", 1),
        opening("A10", C4, "1. c4", 1),
    ];

    let outcome = orch.enrich_batch(&mut evaluator, &catalogue).await;

    assert_eq!(outcome.records.len(), 3);
    let epds: Vec<_> = outcome.records.iter().map(|r| r.opening.epd.as_str()).collect();
    assert_eq!(epds, vec![E4, D4, C4]);

    assert_eq!(outcome.records[0].masters.games, 20);
    assert_eq!(outcome.records[0].masters.white_win, 50.0);
    assert_eq!(outcome.records[1].masters.games, 0);
    assert_eq!(outcome.records[1].eval.to_string(), "-M4");
    assert_eq!(outcome.records[2].eval, Evaluation::Failed);
    assert_eq!(outcome.records[2].lichess.games, 0);

    assert_eq!(outcome.report.eval_failures, 1);
    assert_eq!(outcome.report.masters_empty, 2);
    assert_eq!(outcome.report.lichess_empty, 3);
    // Six lookups; the throttled one used all three attempts.
    assert_eq!(outcome.report.requests_sent, 8);
    assert!(outcome.report.is_complete());
}

#[tokio::test(start_paused = true)]
async fn test_throttle_cooldown_then_recovery() {
    let explorer = FakeExplorer::new();
    explorer.set_prelude(MASTERS_URL, E4, &[429, 429]);
    explorer.set_stats(MASTERS_URL, E4, GameStats { white: 3, black: 1, draws: 0 });
    let mut orch = EnrichmentOrchestrator::new(gateway(&explorer), DEFAULT_REQUEST_DELAY);
    let mut evaluator = ScriptedEvaluator::default().with(E4, Score::Centipawns(30));

    let start = Instant::now();
    let outcome = orch
        .enrich_batch(&mut evaluator, &[opening("B00", E4, "1. e4", 1)])
        .await;

    assert_eq!(outcome.records[0].masters.games, 4);
    assert_eq!(outcome.records[0].masters.white_win, 75.0);
    assert_eq!(outcome.report.requests_sent, 4);
    assert!(!orch.gateway().client().limiter().is_limited());
    // Two proactive pauses plus two reactive cooldowns.
    assert!(start.elapsed() >= DEFAULT_REQUEST_DELAY * 2 + Duration::from_millis(60_100) * 2);
}

#[tokio::test(start_paused = true)]
async fn test_enriched_table_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let catalogue_path = dir.path().join("openings.tsv");
    let output_path = dir.path().join("enriched.tsv");
    std::fs::write(
        &catalogue_path,
        format!(
            "eco\tfamily\tvariation\tepd\tpgn\tmove_count\n\
             B00\tKing's Pawn Game\t\t{E4}\t1. e4\t1\n\
             A40\tQueen's Pawn Game\t\t{D4}\t1. d4\t1\n"
        ),
    )
    .unwrap();

    let explorer = FakeExplorer::new();
    explorer.set_stats(MASTERS_URL, D4, GameStats { white: 1, black: 1, draws: 2 });
    let mut orch = EnrichmentOrchestrator::new(gateway(&explorer), DEFAULT_REQUEST_DELAY);
    let mut evaluator = ScriptedEvaluator::default()
        .with(E4, Score::Centipawns(-30))
        .with(D4, Score::Centipawns(-15));

    let openings = catalogue::read_openings(&catalogue_path).unwrap();
    let outcome = orch.enrich_batch(&mut evaluator, &openings).await;
    catalogue::write_enriched(&output_path, &outcome.records).unwrap();

    let text = std::fs::read_to_string(&output_path).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("eco\tfamily\tvariation\tepd\tpgn\tmove_count\teval\tmaster_games"));
    assert!(lines[1].starts_with(&format!("B00\tKing's Pawn Game\t\t{E4}\t1. e4\t1\t-0.30\t0\t")));
    assert!(lines[2].contains("\t-0.15\t4\t25.0\t25.0\t50.0\t0\t0.0\t0.0\t0.0"));
}
