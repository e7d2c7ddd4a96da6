//! In-memory stand-ins for the explorer and the engine.
//!
//! `FakeExplorer` answers explorer requests from a table keyed by
//! source and position, with an optional script of leading statuses
//! (e.g. 429s) per URL. `ScriptedEvaluator` returns fixed scores per
//! position. Both record every call for assertions.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use opening_enricher::analysis::{EvalError, PositionEvaluator};
use opening_enricher::remote::client::{Identity, RateLimitedClient};
use opening_enricher::remote::explorer::RemoteStatsGateway;
use opening_enricher::remote::{HttpResponse, HttpTransport, TransportError};
use opening_enricher::types::{GameStats, OpeningRecord, Score};

pub const MASTERS_URL: &str = "https://explorer.test/masters";
pub const LICHESS_URL: &str = "https://explorer.test/lichess";

/// Explorer double serving fixed statistics.
#[derive(Clone, Default)]
pub struct FakeExplorer {
    stats: Arc<Mutex<HashMap<String, GameStats>>>,
    /// Statuses to return before serving the real answer, per URL.
    preludes: Arc<Mutex<HashMap<String, VecDeque<u16>>>>,
    /// URLs that fail at the connection level.
    broken: Arc<Mutex<Vec<String>>>,
    calls: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl FakeExplorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stats(&self, base: &str, epd: &str, stats: GameStats) {
        self.stats.lock().unwrap().insert(url_for(base, epd), stats);
    }

    pub fn set_prelude(&self, base: &str, epd: &str, statuses: &[u16]) {
        self.preludes
            .lock()
            .unwrap()
            .insert(url_for(base, epd), statuses.iter().copied().collect());
    }

    pub fn break_url(&self, base: &str, epd: &str) {
        self.broken.lock().unwrap().push(url_for(base, epd));
    }

    /// Every URL requested so far, in order.
    pub fn urls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }

    /// User-Agent values seen, in order.
    pub fn user_agents(&self) -> Vec<Option<String>> {
        self.calls.lock().unwrap().iter().map(|(_, ua)| ua.clone()).collect()
    }
}

pub fn url_for(base: &str, epd: &str) -> String {
    format!("{base}?fen={}", urlencoding::encode(epd))
}

#[async_trait]
impl HttpTransport for FakeExplorer {
    async fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse, TransportError> {
        let ua = headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.calls.lock().unwrap().push((url.to_string(), ua));

        if self.broken.lock().unwrap().iter().any(|u| u == url) {
            return Err(TransportError {
                url: url.to_string(),
                message: "connection refused".to_string(),
            });
        }

        if let Some(queue) = self.preludes.lock().unwrap().get_mut(url) {
            if let Some(status) = queue.pop_front() {
                return Ok(HttpResponse::new(StatusCode::from_u16(status).unwrap(), ""));
            }
        }

        let stats = self.stats.lock().unwrap().get(url).copied().unwrap_or_default();
        let body = json!({
            "white": stats.white,
            "black": stats.black,
            "draws": stats.draws,
            "moves": [],
            "topGames": [],
        });
        Ok(HttpResponse::new(StatusCode::OK, body.to_string()))
    }
}

/// Gateway over a shared `FakeExplorer`.
pub fn gateway(explorer: &FakeExplorer) -> RemoteStatsGateway<FakeExplorer> {
    let client = RateLimitedClient::new(explorer.clone(), &Identity::new("tester", "tester@example.com"));
    RemoteStatsGateway::new(client, MASTERS_URL, LICHESS_URL)
}

/// Evaluator double with per-position scores; unknown positions fail.
#[derive(Default)]
pub struct ScriptedEvaluator {
    scores: HashMap<String, Score>,
    pub calls: Vec<String>,
}

impl ScriptedEvaluator {
    pub fn with(mut self, epd: &str, score: Score) -> Self {
        self.scores.insert(epd.to_string(), score);
        self
    }
}

#[async_trait]
impl PositionEvaluator for ScriptedEvaluator {
    async fn evaluate(&mut self, epd: &str) -> Result<Score, EvalError> {
        self.calls.push(epd.to_string());
        self.scores.get(epd).copied().ok_or_else(|| EvalError::InvalidPosition {
            epd: epd.to_string(),
            reason: "not scripted".to_string(),
        })
    }
}

pub fn opening(eco: &str, epd: &str, pgn: &str, move_count: u32) -> OpeningRecord {
    OpeningRecord {
        eco: eco.to_string(),
        family: "Test Opening".to_string(),
        variation: String::new(),
        epd: epd.to_string(),
        pgn: pgn.to_string(),
        move_count,
    }
}
