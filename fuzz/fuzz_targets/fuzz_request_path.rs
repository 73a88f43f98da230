#![no_main]

//! Fuzz target for request path handling.
//!
//! # Goal
//! Arbitrary request paths must never:
//! - Panic in classification or resolution
//! - Resolve to a location outside the static root
//! - Classify a `/firebase…` path as static

use std::path::{Component, Path};

use firegate::router::{PROXY_PREFIX, Route};
use firegate::static_files::resolve_path;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let path = format!("/{}", raw.trim_start_matches('/'));

    let route = Route::classify(&path);
    if path.starts_with(PROXY_PREFIX) {
        assert_ne!(route, Route::Static);
    } else {
        assert_eq!(route, Route::Static);
    }

    let root = Path::new("/srv/site");
    if let Some(resolved) = resolve_path(root, &path) {
        assert!(resolved.starts_with(root));
        assert!(
            !resolved
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        );
    }
});
