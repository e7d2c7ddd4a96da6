//! Opening explorer statistics gateway.
//!
//! Two sources share one request/response shape: the masters database
//! (over-the-board games between titled players) and the lichess
//! community database. Both are queried by position and answer with at
//! least `white`, `black` and `draws` counters; everything else in the
//! payload is ignored.
//!
//! API: `https://explorer.lichess.ovh/{masters,lichess}?fen=<position>`

use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

use super::client::RateLimitedClient;
use super::HttpTransport;
use crate::types::GameStats;

/// Which explorer database to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsSource {
    Masters,
    Lichess,
}

impl fmt::Display for StatsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatsSource::Masters => write!(f, "masters"),
            StatsSource::Lichess => write!(f, "lichess"),
        }
    }
}

/// Typed explorer lookups over a `RateLimitedClient`.
pub struct RemoteStatsGateway<T: HttpTransport> {
    client: RateLimitedClient<T>,
    masters_url: String,
    lichess_url: String,
}

impl<T: HttpTransport> RemoteStatsGateway<T> {
    pub fn new(
        client: RateLimitedClient<T>,
        masters_url: impl Into<String>,
        lichess_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            masters_url: masters_url.into(),
            lichess_url: lichess_url.into(),
        }
    }

    pub fn client(&self) -> &RateLimitedClient<T> {
        &self.client
    }

    pub async fn masters_stats(&mut self, epd: &str) -> GameStats {
        self.fetch_stats(StatsSource::Masters, epd).await
    }

    pub async fn lichess_stats(&mut self, epd: &str) -> GameStats {
        self.fetch_stats(StatsSource::Lichess, epd).await
    }

    /// Look up outcome counts for `epd` in `source`. `{0,0,0}` means the
    /// source has no games for the position, or the lookup failed.
    pub async fn fetch_stats(&mut self, source: StatsSource, epd: &str) -> GameStats {
        let url = self.url_for(source, epd);
        let json = self.client.fetch_json(&url).await;
        let stats = extract_stats(&json);

        debug!(
            source = %source,
            epd,
            white = stats.white,
            black = stats.black,
            draws = stats.draws,
            "Explorer stats"
        );

        stats
    }

    fn url_for(&self, source: StatsSource, epd: &str) -> String {
        let base = match source {
            StatsSource::Masters => &self.masters_url,
            StatsSource::Lichess => &self.lichess_url,
        };
        format!("{base}?fen={}", urlencoding::encode(epd))
    }
}

/// Read the three outcome counters, treating missing or non-integer
/// values as zero.
fn extract_stats(json: &Map<String, Value>) -> GameStats {
    let count = |key: &str| json.get(key).and_then(Value::as_u64).unwrap_or(0);
    GameStats {
        white: count("white"),
        black: count("black"),
        draws: count("draws"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
