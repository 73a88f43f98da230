//! Process settings and remote store credentials.
//!
//! Two sources feed the server at startup:
//!
//! - [`ServerConfig`]: listener and runtime settings from CLI flags or
//!   `FIREGATE_*` environment variables.
//! - [`Credentials`]: the remote store base URL and secret, read once from a
//!   JSON file. Loading never fails; any problem is logged and yields empty
//!   credentials, which the proxy handlers report per request.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default credentials file, relative to the working directory.
pub const DEFAULT_CREDENTIALS_PATH: &str = "resources/dedede.json";

/// Default index resource served for `/`, relative to the static root.
pub const DEFAULT_INDEX: &str = "pg/index.html";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable, colored when attached to a terminal.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Listener and runtime settings.
#[derive(Debug, Clone, Parser)]
#[command(name = "firegate", version, about)]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(long, env = "FIREGATE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind the listener to.
    #[arg(long, env = "FIREGATE_BIND", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub bind: IpAddr,

    /// Directory served as static content.
    #[arg(long, env = "FIREGATE_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Index resource served for `/`, relative to the static root.
    #[arg(long, env = "FIREGATE_INDEX", default_value = DEFAULT_INDEX)]
    pub index: PathBuf,

    /// JSON file holding `databaseURL` and `databaseSecret`.
    #[arg(long, env = "FIREGATE_CREDENTIALS", default_value = DEFAULT_CREDENTIALS_PATH)]
    pub credentials: PathBuf,

    /// Total timeout for a single remote store call (e.g. `30s`, `1m`).
    #[arg(long, env = "FIREGATE_UPSTREAM_TIMEOUT", default_value = "30s", value_parser = humantime::parse_duration)]
    pub upstream_timeout: Duration,

    /// How long in-flight requests may drain after a shutdown signal.
    #[arg(long, env = "FIREGATE_SHUTDOWN_GRACE", default_value = "5s", value_parser = humantime::parse_duration)]
    pub shutdown_grace: Duration,

    /// Do not open the served page in a browser.
    #[arg(long, env = "FIREGATE_NO_BROWSER")]
    pub no_browser: bool,

    /// Log output format.
    #[arg(long, env = "FIREGATE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Socket address the listener binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// URL announced to the user and opened in the browser.
    pub fn public_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

/// Errors raised while reading the credentials file.
///
/// These never leave [`Credentials::load`]; they exist so the failure can be
/// logged with a precise cause.
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// File does not exist
    #[error("credentials file not found: {path}")]
    NotFound {
        /// Path that was not found
        path: String,
    },

    /// File exists but could not be read
    #[error("failed to read credentials file {path}: {source}")]
    Io {
        /// Path being read
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// `databaseURL` is not an absolute http(s) URL
    #[error("invalid databaseURL {url}: {reason}")]
    InvalidUrl {
        /// Value from the credentials file
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// File is not a JSON object with string values
    #[error("invalid JSON format in credentials file {path}: {source}")]
    Malformed {
        /// Path being parsed
        path: String,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(rename = "databaseURL")]
    database_url: Option<String>,
    #[serde(rename = "databaseSecret")]
    database_secret: Option<String>,
}

/// Remote store credentials. Either value may be absent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Base URL of the remote store, without the `.json` suffix.
    pub base_url: Option<String>,
    /// Access token appended as the `auth` query parameter.
    pub secret: Option<String>,
}

impl Credentials {
    /// Build credentials from raw values. Empty strings count as absent.
    pub fn new(base_url: Option<String>, secret: Option<String>) -> Self {
        Self {
            base_url: base_url.filter(|s| !s.is_empty()),
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    /// Load credentials from `path`, degrading to empty credentials on any
    /// failure.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(credentials) => {
                if !credentials.is_complete() {
                    tracing::warn!(
                        path = %path.display(),
                        "Credentials file is missing databaseURL or databaseSecret"
                    );
                }
                credentials
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load remote store credentials");
                Self::default()
            }
        }
    }

    /// Strict variant of [`Credentials::load`].
    pub fn try_load(path: &Path) -> Result<Self, CredentialsError> {
        let raw = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CredentialsError::NotFound {
                    path: path.display().to_string(),
                }
            } else {
                CredentialsError::Io {
                    path: path.display().to_string(),
                    source: e,
                }
            }
        })?;
        Self::from_json(&raw).map_err(|e| CredentialsError::Malformed {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Parse the credentials file format.
    pub fn from_json(raw: &[u8]) -> Result<Self, serde_json::Error> {
        let file: CredentialsFile = serde_json::from_slice(raw)?;
        Ok(Self::new(file.database_url, file.database_secret))
    }

    /// Returns `true` when both the base URL and the secret are present.
    pub fn is_complete(&self) -> bool {
        self.base_url.is_some() && self.secret.is_some()
    }

    /// Resolve the remote endpoint, or `None` if the credentials are
    /// incomplete or the base URL is not an absolute URL.
    pub fn endpoint(&self) -> Option<DocumentEndpoint> {
        let (base_url, secret) = (self.base_url.as_deref()?, self.secret.as_deref()?);
        match DocumentEndpoint::new(base_url, secret) {
            Ok(endpoint) => Some(endpoint),
            Err(e) => {
                tracing::error!(error = %e, "Ignoring remote store credentials");
                None
            }
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Fully resolved `<base_url>.json?auth=<secret>` URL.
///
/// `Display` and `Debug` redact the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentEndpoint {
    url: Url,
}

impl DocumentEndpoint {
    /// Build the endpoint from a base URL and secret.
    ///
    /// `.json` is appended to the URL path, so a query already present on
    /// the base URL (e.g. an emulator `?ns=` parameter) is kept.
    pub fn new(base_url: &str, secret: &str) -> Result<Self, CredentialsError> {
        let invalid = |reason: String| CredentialsError::InvalidUrl {
            url: base_url.to_owned(),
            reason,
        };
        let mut url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme `{}`", url.scheme())));
        }

        let path = format!("{}.json", url.path());
        url.set_path(&path);
        url.set_fragment(None);
        url.query_pairs_mut().append_pair("auth", secret);
        Ok(Self { url })
    }

    /// The URL including the secret. Never log this.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for DocumentEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(crate::logging_layer::redact_url(&self.url).as_str())
    }
}

impl fmt::Debug for DocumentEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentEndpoint({self})")
    }
}
