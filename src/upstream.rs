//! Remote document store client.
//!
//! The remote store speaks the Firebase Realtime Database REST dialect:
//! `GET <base>.json?auth=<secret>` returns the stored value and
//! `POST <base>.json?auth=<secret>` stores a JSON body. Each call is a single
//! attempt. Failures come back as a [`RemoteError`] the proxy handlers map to
//! a response.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::config::DocumentEndpoint;

/// Outcome of a failed remote call.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Remote answered with something other than `200 OK`.
    #[error("remote store returned {status}")]
    Status {
        /// Status code returned by the remote store
        status: StatusCode,
        /// Raw response body, forwarded unchanged
        body: Bytes,
    },

    /// Request could not be sent or the response could not be read.
    #[error("{0}")]
    Transport(reqwest::Error),

    /// Remote answered `200 OK` with a body that is not JSON.
    #[error("{0}")]
    Decode(serde_json::Error),
}

impl From<reqwest::Error> for RemoteError {
    /// The URL is stripped because it carries the secret.
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Transport(err.without_url())
    }
}

/// Read/write access to the remote JSON document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the stored document.
    async fn read(&self) -> Result<Value, RemoteError>;

    /// Store `document`. Only a `200 OK` counts as success.
    async fn write(&self, document: &Value) -> Result<(), RemoteError>;
}

/// [`DocumentStore`] backed by the remote REST endpoint.
#[derive(Debug, Clone)]
pub struct RestDocumentStore {
    client: reqwest::Client,
    endpoint: DocumentEndpoint,
}

impl RestDocumentStore {
    /// Create a store with its own HTTP client.
    ///
    /// `timeout` bounds each call end to end; exceeding it is a
    /// [`RemoteError::Transport`].
    pub fn new(endpoint: DocumentEndpoint, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("firegate/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, endpoint))
    }

    /// Create a store sharing an existing client.
    pub fn with_client(client: reqwest::Client, endpoint: DocumentEndpoint) -> Self {
        Self { client, endpoint }
    }
}

/// Split a response into its body on `200 OK`, or a [`RemoteError::Status`].
async fn expect_ok(response: reqwest::Response) -> Result<Bytes, RemoteError> {
    let status = response.status();
    let body = response.bytes().await?;
    if status == StatusCode::OK {
        Ok(body)
    } else {
        Err(RemoteError::Status { status, body })
    }
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    async fn read(&self) -> Result<Value, RemoteError> {
        tracing::debug!(endpoint = %self.endpoint, "Reading remote document");
        let response = self.client.get(self.endpoint.url().clone()).send().await?;
        let body = expect_ok(response).await?;
        serde_json::from_slice(&body).map_err(RemoteError::Decode)
    }

    async fn write(&self, document: &Value) -> Result<(), RemoteError> {
        tracing::debug!(endpoint = %self.endpoint, "Writing remote document");
        let response = self
            .client
            .post(self.endpoint.url().clone())
            .json(document)
            .send()
            .await?;
        expect_ok(response).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> RestDocumentStore {
        let endpoint = DocumentEndpoint::new(&format!("{}/notes", server.uri()), "k3y").unwrap();
        RestDocumentStore::new(endpoint, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_read_returns_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/notes.json"))
            .and(query_param("auth", "k3y"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"a": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let document = store_for(&server).read().await.unwrap();
        assert_eq!(document, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_read_null_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;

        assert_eq!(store_for(&server).read().await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_read_non_ok_status_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Permission denied"))
            .mount(&server)
            .await;

        match store_for(&server).read().await {
            Err(RemoteError::Status { status, body }) => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(body, Bytes::from_static(b"Permission denied"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_invalid_json_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        assert!(matches!(
            store_for(&server).read().await,
            Err(RemoteError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_write_posts_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notes.json"))
            .and(query_param("auth", "k3y"))
            .and(body_json(json!({"x": 5})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "-Nabc"})))
            .expect(1)
            .mount(&server)
            .await;

        store_for(&server).write(&json!({"x": 5})).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_created_is_not_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_string("created"))
            .mount(&server)
            .await;

        assert!(matches!(
            store_for(&server).write(&json!(1)).await,
            Err(RemoteError::Status { status, .. }) if status == StatusCode::CREATED
        ));
    }

    #[tokio::test]
    async fn test_transport_error_hides_secret() {
        // Bind then drop a listener so the port is closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let endpoint =
            DocumentEndpoint::new(&format!("http://127.0.0.1:{port}/x"), "hunter2").unwrap();
        let store = RestDocumentStore::new(endpoint, Duration::from_secs(2)).unwrap();

        let err = store.read().await.unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)));
        assert!(!err.to_string().contains("hunter2"));
    }
}
