//! In-memory stand-in for the remote document store.
//!
//! Speaks enough of the Firebase Realtime Database REST dialect to drive
//! firegate end to end without network access:
//!
//! - `GET /<path>.json?auth=<secret>` returns the value at `<path>` (or `null`).
//! - `POST /<path>.json?auth=<secret>` appends the body under a generated key
//!   and returns `{"name": "<key>"}`.
//!
//! Run with `cargo run --features mock --bin mock_store`, then point
//! `databaseURL` at `http://127.0.0.1:9000/<path>`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;

#[derive(Clone)]
struct MockState {
    secret: Arc<str>,
    root: Arc<RwLock<Value>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let secret = std::env::var("MOCK_STORE_SECRET").unwrap_or_else(|_| "secret".to_owned());
    let state = MockState {
        secret: secret.into(),
        root: Arc::new(RwLock::new(Value::Null)),
    };

    let app = Router::new()
        .route("/{*path}", get(read_value).post(push_value))
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], 9000));
    tracing::info!("Mock document store listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!("Failed to bind to {}: {}", addr, e);
        e
    })?;

    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        e
    })?;

    Ok(())
}

fn authorize(state: &MockState, query: &HashMap<String, String>) -> Result<(), Response> {
    match query.get("auth") {
        Some(auth) if auth.as_str() == &*state.secret => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Permission denied"})),
        )
            .into_response()),
    }
}

/// Split `a/b/c.json` into `["a", "b", "c"]`.
fn segments(path: &str) -> Option<Vec<String>> {
    let trimmed = path.strip_suffix(".json")?;
    Some(
        trimmed
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
    )
}

async fn read_value(
    State(state): State<MockState>,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(denied) = authorize(&state, &query) {
        return denied;
    }
    let Some(segments) = segments(&path) else {
        return (StatusCode::BAD_REQUEST, "path must end in .json").into_response();
    };

    let root = state.root.read().await;
    let value = segments
        .iter()
        .try_fold(&*root, |node, key| node.get(key))
        .cloned()
        .unwrap_or(Value::Null);
    tracing::info!(path = %path, "read");
    Json(value).into_response()
}

async fn push_value(
    State(state): State<MockState>,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(denied) = authorize(&state, &query) {
        return denied;
    }
    let Some(segments) = segments(&path) else {
        return (StatusCode::BAD_REQUEST, "path must end in .json").into_response();
    };

    let mut root = state.root.write().await;
    let mut node = ensure_object(&mut root);
    for key in &segments {
        node = ensure_object(node.entry(key.clone()).or_insert(Value::Null));
    }

    let name = format!("-{}", uuid::Uuid::new_v4().simple());
    node.insert(name.clone(), body);
    tracing::info!(path = %path, %name, "push");
    Json(json!({ "name": name })).into_response()
}

/// Replace non-object values with an empty object and borrow the map.
fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}
