//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every tunable has a serde default so a minimal file only needs the
//! `[api]` identity fields. Secrets (the optional explorer token) are
//! referenced by env-var name and resolved at runtime.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::EnricherError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Identity presented to the explorer services.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub username: String,
    pub email: String,
    /// Name of the env var holding an optional bearer token.
    #[serde(default)]
    pub token_env: Option<String>,
    /// Allow HTTP/2 negotiation. `false` pins the client to HTTP/1.1.
    #[serde(default = "default_true")]
    pub use_http2: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    /// Attempts per request while the server keeps answering 429.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Cooldown after a 429, in seconds.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: f64,
    /// Fixed pause before every explorer request, in seconds.
    #[serde(default = "default_request_delay_secs")]
    pub request_delay_secs: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            cooldown_secs: default_cooldown_secs(),
            request_delay_secs: default_request_delay_secs(),
        }
    }
}

impl RateLimitConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_secs.max(0.0))
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_secs_f64(self.request_delay_secs.max(0.0))
    }
}

/// UCI engine process settings, passed through to the engine unchanged.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_engine_path")]
    pub path: PathBuf,
    #[serde(default = "default_depth")]
    pub depth: u32,
    #[serde(default = "default_threads")]
    pub threads: u32,
    #[serde(default = "default_hash_mb")]
    pub hash_mb: u32,
    /// Upper bound on a single evaluation, in seconds.
    #[serde(default = "default_eval_timeout_secs")]
    pub eval_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: default_engine_path(),
            depth: default_depth(),
            threads: default_threads(),
            hash_mb: default_hash_mb(),
            eval_timeout_secs: default_eval_timeout_secs(),
        }
    }
}

impl EngineConfig {
    pub fn eval_timeout(&self) -> Duration {
        Duration::from_secs(self.eval_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EndpointsConfig {
    #[serde(default = "default_masters_url")]
    pub masters: String,
    #[serde(default = "default_lichess_url")]
    pub lichess: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            masters: default_masters_url(),
            lichess: default_lichess_url(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Raw lichess opening files consumed by `prepare`.
    #[serde(default = "default_raw_catalogues")]
    pub raw_catalogues: Vec<PathBuf>,
    /// Prepared catalogue: written by `prepare`, read by `enrich`.
    #[serde(default = "default_catalogue")]
    pub catalogue: PathBuf,
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_catalogues: default_raw_catalogues(),
            catalogue: default_catalogue(),
            output: default_output(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_attempts() -> u32 {
    3
}
fn default_cooldown_secs() -> f64 {
    60.1
}
fn default_request_delay_secs() -> f64 {
    1.001
}
fn default_engine_path() -> PathBuf {
    PathBuf::from("stockfish")
}
fn default_depth() -> u32 {
    20
}
fn default_threads() -> u32 {
    4
}
fn default_hash_mb() -> u32 {
    256
}
fn default_eval_timeout_secs() -> u64 {
    120
}
fn default_masters_url() -> String {
    "https://explorer.lichess.ovh/masters".to_string()
}
fn default_lichess_url() -> String {
    "https://explorer.lichess.ovh/lichess".to_string()
}
fn default_raw_catalogues() -> Vec<PathBuf> {
    vec![PathBuf::from("resources/lichess_raw_openings.tsv")]
}
fn default_catalogue() -> PathBuf {
    PathBuf::from("resources/openings.tsv")
}
fn default_output() -> PathBuf {
    PathBuf::from("resources/openings_enriched.tsv")
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse and validate configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), EnricherError> {
        if self.api.username.trim().is_empty() || self.api.email.trim().is_empty() {
            return Err(EnricherError::Config(
                "api.username and api.email must be set".to_string(),
            ));
        }
        if self.rate_limit.attempts == 0 {
            return Err(EnricherError::Config(
                "rate_limit.attempts must be at least 1".to_string(),
            ));
        }
        for (name, secs) in [
            ("rate_limit.cooldown_secs", self.rate_limit.cooldown_secs),
            ("rate_limit.request_delay_secs", self.rate_limit.request_delay_secs),
        ] {
            if Duration::try_from_secs_f64(secs).is_err() {
                return Err(EnricherError::Config(format!(
                    "{name} must be a finite, non-negative number of seconds (got {secs})"
                )));
            }
        }
        if self.engine.depth == 0 {
            return Err(EnricherError::Config("engine.depth must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Resolve the optional explorer token. A configured but unset
    /// variable is an error; no configured variable means no token.
    pub fn api_token(&self) -> Result<Option<SecretString>> {
        match self.api.token_env.as_deref() {
            Some(env) => Ok(Some(SecretString::new(Self::resolve_env(env)?))),
            None => Ok(None),
        }
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
