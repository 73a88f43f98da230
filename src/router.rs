//! Inbound path classification.
//!
//! The server exposes three kinds of paths:
//!
//! - `/firebase/read` and `/firebase/write`: remote store operations.
//! - Anything else starting with `/firebase`: `404 Not Found`.
//! - Everything else: static files.
//!
//! The prefix match is a plain string prefix, so `/firebase`, `/firebase/`
//! and `/firebasex` all land in the proxy namespace.

/// Prefix reserved for remote store operations.
pub const PROXY_PREFIX: &str = "/firebase";

/// Path of the read operation.
pub const READ_PATH: &str = "/firebase/read";

/// Path of the write operation.
pub const WRITE_PATH: &str = "/firebase/write";

/// Where a request path is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Proxy a read to the remote store.
    Read,
    /// Proxy a write to the remote store.
    Write,
    /// Under the proxy prefix but not a known operation.
    ProxyNotFound,
    /// Served from the static root.
    Static,
}

impl Route {
    /// Classify a request path. Query strings must already be stripped.
    pub fn classify(path: &str) -> Self {
        match path {
            READ_PATH => Route::Read,
            WRITE_PATH => Route::Write,
            p if p.starts_with(PROXY_PREFIX) => Route::ProxyNotFound,
            _ => Route::Static,
        }
    }
}
