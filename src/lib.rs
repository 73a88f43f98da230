//! Firegate - Local static file server with a Firebase Realtime Database relay.
//!
//! Serves a directory over HTTP on localhost and relays two operations to a
//! remote JSON document store authenticated with a static secret.
//!
//! # Request Paths
//!
//! - **Read (`/firebase/read`):** fetch the remote document as JSON.
//! - **Write (`/firebase/write`):** store the request body remotely.
//! - **Static (everything else):** files and directory listings from the root.
//!
//! Remote failures are passed back verbatim: the remote status code and body
//! reach the browser unchanged.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging_layer;
pub mod proxy_service;
pub mod router;
pub mod server;
pub mod static_files;
pub mod upstream;
