//! Request logging and tracing setup.
//!
//! Every inbound request runs inside a `request` span carrying a fresh
//! request id, so log lines emitted by the proxy handlers and the remote
//! client can be correlated. Secrets never reach the log: sensitive headers
//! are redacted and the `auth` query parameter is masked on any URL we print.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use http::HeaderMap;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;
use url::Url;
use uuid::Uuid;

use crate::config::LogFormat;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "firegate=info,tower_http=warn";

/// Placeholder written in place of redacted values.
pub const REDACTED: &str = "[REDACTED]";

/// Headers whose values are never logged.
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
];

/// Query parameters whose values are never logged.
const SENSITIVE_QUERY_PARAMS: &[&str] = &["auth", "access_token"];

/// Install the global tracing subscriber.
///
/// Returns an error if a subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    match format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init(),
    }
}

/// Middleware logging method, path, status and latency of each request.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "request",
        id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        tracing::debug!(headers = ?redact_headers(request.headers()), "Request received");
        let started = Instant::now();
        let response = next.run(request).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        let status = response.status();

        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), latency_ms, "Request failed");
        } else {
            tracing::info!(status = status.as_u16(), latency_ms, "Request completed");
        }
        response
    }
    .instrument(span)
    .await
}

/// Render headers as `(name, value)` pairs with sensitive values replaced.
pub fn redact_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name = name.as_str().to_owned();
            let value = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                REDACTED.to_owned()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (name, value)
        })
        .collect()
}

/// Copy of `url` with sensitive query parameter values masked.
pub fn redact_url(url: &Url) -> Url {
    if url.query().is_none() {
        return url.clone();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let value = if SENSITIVE_QUERY_PARAMS.contains(&key.as_ref()) {
                REDACTED.to_owned()
            } else {
                value.into_owned()
            };
            (key.into_owned(), value)
        })
        .collect();

    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted
}
