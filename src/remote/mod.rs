//! Remote explorer access.
//!
//! Defines the `HttpTransport` trait (the seam between the rate-limit
//! policy and the network) and its `reqwest` implementation, plus the
//! rate-limited JSON client and the statistics gateway built on it.

pub mod client;
pub mod explorer;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// A completed HTTP exchange: status plus raw body text.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Connection-level failure: nothing usable came back from the server.
#[derive(Debug, thiserror::Error)]
#[error("request to {url} failed: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

/// Abstraction over a GET-capable HTTP connection.
///
/// Implementors issue exactly one network request per call and never
/// retry; retry policy belongs to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse, TransportError>;
}

/// `reqwest`-backed transport holding one pooled, persistent client.
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    /// Build the underlying client. `use_http2 = false` pins HTTP/1.1,
    /// otherwise HTTP/2 is negotiated when the server offers it.
    pub fn new(use_http2: bool, timeout: Duration) -> anyhow::Result<Self> {
        let mut builder = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10));
        if !use_http2 {
            builder = builder.http1_only();
        }
        let http = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build explorer HTTP client: {e}"))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse, TransportError> {
        let transport_err = |e: reqwest::Error| TransportError {
            url: url.to_string(),
            message: e.to_string(),
        };

        let resp = self
            .http
            .get(url)
            .headers(headers.clone())
            .send()
            .await
            .map_err(transport_err)?;

        let status = resp.status();
        let body = resp.text().await.map_err(transport_err)?;

        Ok(HttpResponse { status, body })
    }
}
