//! Rate-limited JSON client for the opening explorer.
//!
//! Presents a stable identifying `User-Agent` on every request, reuses a
//! single connection, and absorbs server-side throttling: a 429 response
//! puts the client into a limited state and the next attempt waits out
//! the cooldown before going back on the wire.
//!
//! Every failure (transport, status, decode, exhausted retries) is logged
//! and degrades to an empty mapping. Callers treat empty as "no data".

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};

use super::HttpTransport;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Attempts per request while the server keeps answering 429.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Cooldown after a 429. The explorer's window is 60 s; wait a little longer.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(60_100);

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_URL: &str = env!("CARGO_PKG_REPOSITORY");

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Who is calling. Rendered into the `User-Agent` header required by the
/// explorer's usage policy.
#[derive(Debug, Clone)]
pub struct Identity {
    pub app_name: String,
    pub app_version: String,
    pub username: String,
    pub email: String,
    pub url: String,
}

impl Identity {
    /// Identity for this application on behalf of the given user.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            app_version: APP_VERSION.to_string(),
            username: username.into(),
            email: email.into(),
            url: APP_URL.to_string(),
        }
    }

    pub fn user_agent(&self) -> String {
        format!(
            "{}/{} (username: {}; contact: {}, url: {})",
            self.app_name, self.app_version, self.username, self.email, self.url
        )
    }
}

// ---------------------------------------------------------------------------
// Rate limiter
// ---------------------------------------------------------------------------

/// Reactive throttle state: Normal, or Limited since `last_throttled`.
#[derive(Debug)]
pub struct RateLimiter {
    cooldown: Duration,
    limited: bool,
    last_throttled: Option<Instant>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            limited: false,
            last_throttled: None,
        }
    }

    pub fn is_limited(&self) -> bool {
        self.limited
    }

    /// Time still to wait before the next call, zero when Normal.
    pub fn remaining(&self) -> Duration {
        match (self.limited, self.last_throttled) {
            (true, Some(at)) => self.cooldown.saturating_sub(at.elapsed()),
            _ => Duration::ZERO,
        }
    }

    /// Block out the rest of the cooldown if Limited, then return to
    /// Normal without waiting for confirmation that the limit has lifted.
    pub async fn wait_before_call(&mut self) {
        if !self.limited {
            return;
        }

        let wait = self.remaining();
        if !wait.is_zero() {
            info!(
                wait_secs = wait.as_secs_f64(),
                "Rate limit reached, code 429 received. Waiting before next request"
            );
            tokio::time::sleep(wait).await;
        }

        self.limited = false;
    }

    /// Record a 429. The cooldown is applied to the next call.
    pub fn report_throttled(&mut self) {
        info!("Rate limit reached, code 429 received. Timeout will be applied to next request");
        self.limited = true;
        self.last_throttled = Some(Instant::now());
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// GET-with-JSON client with identity headers and throttle absorption.
pub struct RateLimitedClient<T: HttpTransport> {
    transport: T,
    headers: HeaderMap,
    attempts: u32,
    limiter: RateLimiter,
    requests_sent: u64,
}

impl<T: HttpTransport> RateLimitedClient<T> {
    /// Create a client with the default retry budget and cooldown.
    pub fn new(transport: T, identity: &Identity) -> Self {
        Self::with_policy(transport, identity, DEFAULT_RETRY_ATTEMPTS, DEFAULT_COOLDOWN)
    }

    pub fn with_policy(transport: T, identity: &Identity, attempts: u32, cooldown: Duration) -> Self {
        let mut headers = HeaderMap::new();
        match HeaderValue::from_str(&identity.user_agent()) {
            Ok(value) => {
                headers.insert(USER_AGENT, value);
            }
            Err(e) => error!(error = %e, "Identity is not a valid header value, sending no User-Agent"),
        }

        Self {
            transport,
            headers,
            attempts: attempts.max(1),
            limiter: RateLimiter::new(cooldown),
            requests_sent: 0,
        }
    }

    /// Attach a bearer token to every subsequent request.
    pub fn with_token(mut self, token: &SecretString) -> Self {
        match HeaderValue::from_str(&format!("Bearer {}", token.expose_secret())) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.headers.insert(AUTHORIZATION, value);
            }
            Err(_) => error!("API token is not a valid header value, ignoring it"),
        }
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Network requests issued so far, retries included.
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }

    /// Fetch `url` and decode the body as a JSON object.
    ///
    /// Returns an empty map on any failure; never errors.
    pub async fn fetch_json(&mut self, url: &str) -> Map<String, Value> {
        let Some(body) = self.get(url).await else {
            return Map::new();
        };

        match serde_json::from_str::<Value>(&body) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                error!(url, kind = json_kind(&other), "Expected a JSON object");
                Map::new()
            }
            Err(e) => {
                error!(url, error = %e, "Could not decode JSON data");
                Map::new()
            }
        }
    }

    /// GET with 429 retries. `None` on any failure.
    async fn get(&mut self, url: &str) -> Option<String> {
        let mut last = None;

        for attempt in 1..=self.attempts {
            self.limiter.wait_before_call().await;

            debug!(url, attempt, "GET");
            self.requests_sent += 1;
            let resp = match self.transport.get(url, &self.headers).await {
                Ok(resp) => resp,
                Err(e) => {
                    error!(url, error = %e, "An error occurred while requesting");
                    return None;
                }
            };

            let throttled = resp.status == StatusCode::TOO_MANY_REQUESTS;
            last = Some(resp);
            if throttled {
                self.limiter.report_throttled();
            } else {
                break;
            }
        }

        let resp = last?;
        if resp.status != StatusCode::OK {
            error!(url, status = %resp.status, "Request failed");
            return None;
        }

        Some(resp.body)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
