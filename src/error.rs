//! Proxy handler errors and their HTTP mapping.
//!
//! Every failure on a `/firebase` route ends as a plain-text response; none
//! propagate past the handler. The mapping is fixed per variant:
//!
//! | Variant | Status | Body |
//! |---|---|---|
//! | `NotConfigured` | 500 | fixed message |
//! | `NotFound` | 404 | `Not Found` |
//! | `Remote(Status)` | remote status | remote body, unchanged |
//! | everything else | 500 | error text |

use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::{StatusCode, header};
use thiserror::Error;

use crate::upstream::RemoteError;

/// Plain-text content type used for all proxy error bodies.
pub const TEXT_PLAIN: &str = "text/plain";

/// Errors surfaced by the proxy handlers.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Credentials file was missing, unreadable or incomplete.
    #[error("Firebase configuration not loaded.")]
    NotConfigured,

    /// Path under the proxy prefix that names no operation.
    #[error("Not Found")]
    NotFound,

    /// Write request without a `Content-Length` header.
    #[error("missing Content-Length header")]
    MissingContentLength,

    /// `Content-Length` did not match the bytes received.
    #[error("Content-Length is {declared} but body has {received} bytes")]
    LengthMismatch {
        /// Value of the header
        declared: usize,
        /// Bytes actually read
        received: usize,
    },

    /// Write body is not valid JSON.
    #[error("{0}")]
    InvalidBody(#[source] serde_json::Error),

    /// Remote call failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl ProxyError {
    /// Status code this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::NotFound => StatusCode::NOT_FOUND,
            ProxyError::Remote(RemoteError::Status { status, .. }) => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Build a plain-text response.
pub fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response {
    (status, [(header::CONTENT_TYPE, TEXT_PLAIN)], body.into()).into_response()
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            ProxyError::Remote(RemoteError::Status { body, .. }) => {
                tracing::warn!(status = status.as_u16(), "Remote store rejected request");
                text_response(status, body)
            }
            ProxyError::NotFound => text_response(status, "Not Found"),
            other => {
                tracing::error!(error = %other, "Proxy request failed");
                text_response(status, other.to_string())
            }
        }
    }
}
