//! HTTP listener and router assembly.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::get;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::{Credentials, ServerConfig};
use crate::logging_layer::log_requests;
use crate::proxy_service;
use crate::router::{READ_PATH, WRITE_PATH};
use crate::static_files::StaticFiles;
use crate::upstream::{DocumentStore, RemoteError, RestDocumentStore};

/// Listener errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Port could not be bound
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        /// Address that was requested
        addr: SocketAddr,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Listener failed while serving
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    /// Remote client could not be constructed
    #[error("Failed to build remote store client: {0}")]
    Client(#[source] RemoteError),
}

/// State shared by every request handler. Immutable once built.
#[derive(Clone)]
pub struct AppState {
    store: Option<Arc<dyn DocumentStore>>,
    static_files: Arc<StaticFiles>,
}

impl AppState {
    /// Build state from parts. `store` is `None` when credentials are missing.
    pub fn new(store: Option<Arc<dyn DocumentStore>>, static_files: StaticFiles) -> Self {
        Self {
            store,
            static_files: Arc::new(static_files),
        }
    }

    /// Build state from the process configuration and loaded credentials.
    pub fn from_config(
        config: &ServerConfig,
        credentials: &Credentials,
    ) -> Result<Self, ServerError> {
        let store = match credentials.endpoint() {
            Some(endpoint) => {
                tracing::info!(%endpoint, "Remote store configured");
                let store = RestDocumentStore::new(endpoint, config.upstream_timeout)
                    .map_err(ServerError::Client)?;
                Some(Arc::new(store) as Arc<dyn DocumentStore>)
            }
            None => {
                tracing::warn!("Remote store not configured; /firebase operations will fail");
                None
            }
        };
        Ok(Self::new(
            store,
            StaticFiles::new(&config.root, &config.index),
        ))
    }

    /// Remote store, if configured.
    pub fn store(&self) -> Option<&Arc<dyn DocumentStore>> {
        self.store.as_ref()
    }

    /// Static file service.
    pub fn static_files(&self) -> &StaticFiles {
        &self.static_files
    }
}

/// Build the application router.
///
/// Write bodies are not size-capped: the declared `Content-Length` is read in
/// full and forwarded.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(READ_PATH, get(proxy_service::read))
        .route(
            WRITE_PATH,
            get(proxy_service::write)
                .post(proxy_service::write)
                .layer(DefaultBodyLimit::disable()),
        )
        .fallback(proxy_service::fallback)
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// Bind the listening socket.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Serve `router` on `listener` until `shutdown` is cancelled.
///
/// After cancellation no new connections are accepted; the future resolves
/// once in-flight requests have completed.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Listening");
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(ServerError::Serve)?;

    tracing::info!("Listener stopped");
    Ok(())
}
