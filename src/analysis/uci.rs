//! UCI engine service.
//!
//! Spawns one engine process (e.g. Stockfish) and keeps it for the
//! whole batch. The process is started with `kill_on_drop`, so it is
//! torn down on every exit path; `shutdown` is the graceful route.
//!
//! Protocol subset used:
//! `uci`/`uciok`, `setoption`, `isready`/`readyok`,
//! `position fen`, `go depth`, `info ... score`, `bestmove`, `stop`, `quit`.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use super::{EngineError, EnginePosition, EvalError, PositionEvaluator};
use crate::config::EngineConfig;
use crate::types::Score;

/// How long the engine gets to answer handshake and shutdown commands.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait for `bestmove` after `stop`.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Protocol session
// ---------------------------------------------------------------------------

/// Line-oriented UCI conversation over any async reader/writer pair.
pub struct UciSession<R, W> {
    reader: R,
    writer: W,
    line: String,
}

impl<R, W> UciSession<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            line: String::new(),
        }
    }

    async fn send(&mut self, command: &str) -> Result<(), EngineError> {
        debug!(command, "uci >");
        self.writer.write_all(command.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<&str, EngineError> {
        self.line.clear();
        let n = self.reader.read_line(&mut self.line).await?;
        if n == 0 {
            return Err(EngineError::Exited);
        }
        Ok(self.line.trim_end())
    }

    /// Read until a line starting with `token`; returns that line.
    async fn wait_for(&mut self, token: &str) -> Result<String, EngineError> {
        loop {
            let line = self.read_line().await?;
            if line.starts_with(token) {
                return Ok(line.to_string());
            }
        }
    }

    /// `uci` handshake, options, and readiness check. Returns the
    /// engine's self-reported name when it gives one.
    pub async fn handshake(&mut self, threads: u32, hash_mb: u32) -> Result<Option<String>, EngineError> {
        self.send("uci").await?;
        let mut name = None;
        loop {
            let line = self.read_line().await?;
            if line == "uciok" {
                break;
            }
            if let Some(rest) = line.strip_prefix("id name ") {
                name = Some(rest.to_string());
            }
        }

        self.send(&format!("setoption name Threads value {threads}")).await?;
        self.send(&format!("setoption name Hash value {hash_mb}")).await?;
        self.send("isready").await?;
        self.wait_for("readyok").await?;
        Ok(name)
    }

    /// Search `fen` to `depth` and return the last reported score, from
    /// the side to move's point of view.
    pub async fn search(&mut self, fen: &str, depth: u32) -> Result<Option<Score>, EngineError> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;

        let mut score = None;
        loop {
            let line = self.read_line().await?;
            if line.starts_with("bestmove") {
                return Ok(score);
            }
            if let Some(s) = parse_info_score(line) {
                score = Some(s);
            }
        }
    }

    /// Abort a running search and swallow its `bestmove`.
    pub async fn stop(&mut self) -> Result<(), EngineError> {
        self.send("stop").await?;
        self.wait_for("bestmove").await?;
        Ok(())
    }

    pub async fn quit(&mut self) -> Result<(), EngineError> {
        self.send("quit").await
    }
}

/// Extract an exact `score cp N` / `score mate N` from an `info` line.
/// Bound-only scores are skipped.
fn parse_info_score(line: &str) -> Option<Score> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("info") {
        return None;
    }

    while let Some(token) = tokens.next() {
        if token != "score" {
            continue;
        }
        let kind = tokens.next()?;
        let value: i32 = tokens.next()?.parse().ok()?;
        if matches!(tokens.next(), Some("lowerbound" | "upperbound")) {
            return None;
        }
        return match kind {
            "cp" => Some(Score::Centipawns(value)),
            "mate" => Some(Score::Mate(value)),
            _ => None,
        };
    }
    None
}

// ---------------------------------------------------------------------------
// Engine service
// ---------------------------------------------------------------------------

/// A running UCI engine process, used for a whole batch.
pub struct UciEngine {
    child: Child,
    session: UciSession<BufReader<ChildStdout>, ChildStdin>,
    depth: u32,
    eval_timeout: Duration,
    /// Set when the engine stopped responding; later calls fail fast.
    broken: bool,
}

impl UciEngine {
    /// Spawn and initialise the engine. Failure here is fatal for a run.
    pub async fn start(config: &EngineConfig) -> Result<Self, EngineError> {
        let path = config.path.display().to_string();

        let mut child = Command::new(&config.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                path: path.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(EngineError::Exited);
        };
        let mut session = UciSession::new(BufReader::new(stdout), stdin);

        let name = tokio::time::timeout(CONTROL_TIMEOUT, session.handshake(config.threads, config.hash_mb))
            .await
            .map_err(|_| EngineError::Unresponsive("uci".to_string()))??;

        info!(
            path = %path,
            engine = name.as_deref().unwrap_or("unknown"),
            depth = config.depth,
            threads = config.threads,
            hash_mb = config.hash_mb,
            "Engine started"
        );

        Ok(Self {
            child,
            session,
            depth: config.depth,
            eval_timeout: config.eval_timeout(),
            broken: false,
        })
    }

    /// Ask the engine to quit and reap it, killing it if it lingers.
    pub async fn shutdown(mut self) {
        if !self.broken {
            if let Err(e) = self.session.quit().await {
                debug!(error = %e, "Engine quit command failed");
            }
        }

        match tokio::time::timeout(CONTROL_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => info!(%status, "Engine stopped"),
            Ok(Err(e)) => warn!(error = %e, "Failed to reap engine"),
            Err(_) => {
                warn!("Engine ignored quit, killing it");
                if let Err(e) = self.child.kill().await {
                    warn!(error = %e, "Failed to kill engine");
                }
            }
        }
    }
}

#[async_trait]
impl PositionEvaluator for UciEngine {
    async fn evaluate(&mut self, epd: &str) -> Result<Score, EvalError> {
        let position = EnginePosition::from_epd(epd)?;

        if self.broken {
            return Err(EngineError::Unresponsive("go".to_string()).into());
        }

        let searched = tokio::time::timeout(
            self.eval_timeout,
            self.session.search(&position.fen, self.depth),
        )
        .await;

        match searched {
            Ok(Ok(Some(score))) => Ok(position.white_pov(score)),
            Ok(Ok(None)) => Err(EvalError::NoScore { epd: epd.to_string() }),
            Ok(Err(e)) => {
                self.broken = true;
                Err(e.into())
            }
            Err(_) => {
                warn!(epd, "Search timed out, stopping engine search");
                let stopped = tokio::time::timeout(STOP_TIMEOUT, self.session.stop()).await;
                if !matches!(stopped, Ok(Ok(()))) {
                    self.broken = true;
                }
                Err(EvalError::Timeout {
                    epd: epd.to_string(),
                    secs: self.eval_timeout.as_secs(),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
