//! Remote store operations exposed under `/firebase`.
//!
//! Both handlers check for credentials before anything else, so a server
//! started without a usable credentials file answers every remote operation
//! with the same `500`, whatever the request carries.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::{HeaderMap, StatusCode, header};
use serde_json::Value;

use crate::error::{ProxyError, text_response};
use crate::router::Route;
use crate::server::AppState;
use crate::upstream::DocumentStore;

/// Body returned after a successful write.
pub const WRITE_OK_MESSAGE: &str = "Data written successfully";

fn require_store(state: &AppState) -> Result<&Arc<dyn DocumentStore>, ProxyError> {
    state.store().ok_or(ProxyError::NotConfigured)
}

/// `GET /firebase/read`: fetch the remote document and return it as JSON.
pub async fn read(State(state): State<AppState>) -> Result<Json<Value>, ProxyError> {
    let store = require_store(&state)?;
    let document = store.read().await?;
    tracing::info!("Remote document read");
    Ok(Json(document))
}

/// `GET|POST /firebase/write`: parse the body as JSON and store it remotely.
pub async fn write(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let store = require_store(&state)?;
    let document = parse_write_body(&headers, &body)?;
    store.write(&document).await?;
    tracing::info!(bytes = body.len(), "Remote document written");
    Ok(text_response(StatusCode::OK, WRITE_OK_MESSAGE))
}

/// Validate the declared length and decode the JSON body.
pub fn parse_write_body(headers: &HeaderMap, body: &[u8]) -> Result<Value, ProxyError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<usize>().ok())
        .ok_or(ProxyError::MissingContentLength)?;

    if declared != body.len() {
        return Err(ProxyError::LengthMismatch {
            declared,
            received: body.len(),
        });
    }

    serde_json::from_slice(body).map_err(ProxyError::InvalidBody)
}

/// Fallback for every path without an explicit route.
///
/// Unknown paths under the proxy prefix get a `404`; the rest go to the
/// static file service.
pub async fn fallback(State(state): State<AppState>, request: Request) -> Response {
    match Route::classify(request.uri().path()) {
        Route::Static => state.static_files().serve(request).await,
        route => {
            tracing::debug!(?route, "No proxy operation for path");
            ProxyError::NotFound.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;

    fn headers_with_length(len: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_str(len).unwrap());
        headers
    }

    #[test]
    fn test_parse_write_body_valid() {
        let body = br#"{"x":5}"#;
        let value = parse_write_body(&headers_with_length("7"), body).unwrap();
        assert_eq!(value, json!({"x": 5}));
    }

    #[test]
    fn test_parse_write_body_requires_content_length() {
        let err = parse_write_body(&HeaderMap::new(), b"{}").unwrap_err();
        assert!(matches!(err, ProxyError::MissingContentLength));

        let err = parse_write_body(&headers_with_length("abc"), b"{}").unwrap_err();
        assert!(matches!(err, ProxyError::MissingContentLength));
    }

    #[test]
    fn test_parse_write_body_length_mismatch() {
        let err = parse_write_body(&headers_with_length("10"), b"{}").unwrap_err();
        assert!(matches!(
            err,
            ProxyError::LengthMismatch {
                declared: 10,
                received: 2
            }
        ));
    }

    #[test]
    fn test_parse_write_body_invalid_json() {
        let err = parse_write_body(&headers_with_length("4"), b"nope").unwrap_err();
        assert!(matches!(err, ProxyError::InvalidBody(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
