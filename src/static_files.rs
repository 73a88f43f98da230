//! Static file serving.
//!
//! Files are served by `tower-http`'s `ServeDir` (content-type inference,
//! conditional requests, ranges, directory redirects). This module adds the
//! two behaviours `ServeDir` lacks:
//!
//! - `/` is rewritten to the configured index resource when it exists.
//! - A directory without `index.html` gets an HTML listing instead of a 404.

use std::path::{Component, Path, PathBuf};

use axum::body::Body;
use axum::extract::Request;
use axum::response::{Html, IntoResponse, Response};
use http::{Method, StatusCode, Uri};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::error::text_response;

/// Characters escaped in a path segment of a listing link.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/');

/// Static content rooted at a directory.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    index_file: PathBuf,
    index_uri: String,
    serve_dir: ServeDir,
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// File or directory name
    pub name: String,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

impl StaticFiles {
    /// Serve `root`, rewriting `/` to `index` (relative to `root`) when that
    /// file exists.
    pub fn new(root: impl Into<PathBuf>, index: impl AsRef<Path>) -> Self {
        let root = root.into();
        let index = index.as_ref();
        let index_uri = index
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .fold(String::new(), |mut uri, part| {
                uri.push('/');
                uri.extend(utf8_percent_encode(&part, SEGMENT));
                uri
            });

        Self {
            index_file: root.join(index),
            serve_dir: ServeDir::new(&root),
            root,
            index_uri,
        }
    }

    /// Serve a request from the static root.
    pub async fn serve(&self, mut request: Request) -> Response {
        if request.uri().path() == "/" && is_file(&self.index_file).await {
            match self.index_uri.parse::<Uri>() {
                Ok(uri) => *request.uri_mut() = uri,
                Err(e) => tracing::warn!(error = %e, "Index path is not a valid URI"),
            }
        }

        let path = request.uri().path().to_owned();
        let readable = request.method() == Method::GET || request.method() == Method::HEAD;
        if readable && path.ends_with('/') {
            if let Some(dir) = resolve_path(&self.root, &path) {
                if is_dir(&dir).await && !is_file(&dir.join("index.html")).await {
                    return list_directory(&dir, &path).await;
                }
            }
        }

        match self.serve_dir.clone().oneshot(request).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        }
    }
}

/// Map a URL path onto the filesystem below `root`.
///
/// Returns `None` for paths that are not valid UTF-8 once decoded or that
/// would leave `root` (`..`, absolute components).
pub fn resolve_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(request_path).decode_utf8().ok()?;
    let mut resolved = root.to_path_buf();
    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

async fn list_directory(dir: &Path, request_path: &str) -> Response {
    match read_listing(dir).await {
        Ok(entries) => {
            let display_path = percent_decode_str(request_path).decode_utf8_lossy();
            Html(render_listing(&display_path, &entries)).into_response()
        }
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to list directory");
            text_response(StatusCode::NOT_FOUND, "No permission to list directory")
        }
    }
}

/// Read `dir`, sorted case-insensitively by name.
pub async fn read_listing(dir: &Path) -> std::io::Result<Vec<ListingEntry>> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        entries.push(ListingEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir,
        });
    }
    entries.sort_by_key(|e| e.name.to_lowercase());
    Ok(entries)
}

/// Render the HTML listing page for `display_path`.
pub fn render_listing(display_path: &str, entries: &[ListingEntry]) -> String {
    let title = format!("Directory listing for {}", escape_html(display_path));
    let mut html = format!(
        "<!DOCTYPE HTML>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n<hr>\n<ul>\n"
    );
    for entry in entries {
        let suffix = if entry.is_dir { "/" } else { "" };
        html.push_str(&format!(
            "<li><a href=\"{}{suffix}\">{}{suffix}</a></li>\n",
            utf8_percent_encode(&entry.name, SEGMENT),
            escape_html(&entry.name),
        ));
    }
    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    html
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}
