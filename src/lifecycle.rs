//! Process lifecycle: start the listener, announce it, wait for shutdown.
//!
//! The listener runs as a background task. The foreground waits for Ctrl-C
//! (or SIGTERM on Unix), then cancels the listener and gives in-flight
//! requests `shutdown_grace` to finish before aborting it.
//!
//! ```text
//! Running ──(shutdown signal)──▶ Terminated
//! ```

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{Credentials, ServerConfig};
use crate::server::{self, AppState, ServerError};

/// Lifecycle state. There is no restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Listener is accepting connections.
    Running,
    /// Listener has stopped.
    Terminated,
}

/// Opens a URL for the user.
pub trait BrowserLauncher: Send + Sync {
    /// Open `url`. Failures are reported, never fatal.
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Launches the system default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        webbrowser::open(url)
    }
}

/// Handle to a running listener.
pub struct RunningServer {
    url: String,
    shutdown: CancellationToken,
    task: JoinHandle<Result<(), ServerError>>,
    state: LifecycleState,
}

impl RunningServer {
    /// Load credentials, bind the port and spawn the listener.
    pub async fn start(config: &ServerConfig) -> Result<Self, ServerError> {
        let credentials = Credentials::load(&config.credentials);
        let state = AppState::from_config(config, &credentials)?;
        Self::start_with_state(config, state).await
    }

    /// Bind the port and spawn the listener over a prepared state.
    pub async fn start_with_state(
        config: &ServerConfig,
        state: AppState,
    ) -> Result<Self, ServerError> {
        let listener = server::bind(config.listen_addr()).await?;
        let url = match listener.local_addr() {
            Ok(addr) if config.port == 0 => format!("http://localhost:{}", addr.port()),
            _ => config.public_url(),
        };

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(server::serve(
            listener,
            server::build_router(state),
            shutdown.clone(),
        ));

        Ok(Self {
            url,
            shutdown,
            task,
            state: LifecycleState::Running,
        })
    }

    /// URL the listener is reachable at.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Stop accepting connections and wait up to `grace` for in-flight
    /// requests. The listener task is aborted if the grace period runs out.
    pub async fn stop(mut self, grace: Duration) -> Result<LifecycleState, ServerError> {
        self.shutdown.cancel();
        let abort = self.task.abort_handle();

        let result = match tokio::time::timeout(grace, &mut self.task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                tracing::error!(error = %join_err, "Listener task panicked");
                Ok(())
            }
            Err(_) => {
                tracing::warn!(?grace, "Shutdown grace period elapsed; abandoning in-flight requests");
                abort.abort();
                Ok(())
            }
        };

        self.state = LifecycleState::Terminated;
        result.map(|()| self.state)
    }
}

/// Print the running notice shown before the browser opens.
pub fn announce(url: &str) {
    println!("Localhost running on {url}");
    println!(
        "The page will open in your browser. Keep this program running while the \
         browser window is in use; press Ctrl-C to stop."
    );
}

/// Open `url` with `launcher`, logging failures.
pub fn open_browser(launcher: &dyn BrowserLauncher, url: &str) {
    match launcher.open(url) {
        Ok(()) => tracing::info!(%url, "Opened browser"),
        Err(e) => tracing::warn!(%url, error = %e, "Could not open browser"),
    }
}

/// Resolve when the process receives Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

/// Run the server until `signal` resolves.
pub async fn run_until<F>(
    config: &ServerConfig,
    launcher: &dyn BrowserLauncher,
    signal: F,
) -> Result<LifecycleState, ServerError>
where
    F: std::future::Future<Output = ()>,
{
    let server = RunningServer::start(config).await?;
    announce(server.url());
    if !config.no_browser {
        open_browser(launcher, server.url());
    }

    signal.await;
    server.stop(config.shutdown_grace).await
}

/// Run the server until Ctrl-C / SIGTERM, opening the system browser.
pub async fn run(config: &ServerConfig) -> Result<LifecycleState, ServerError> {
    run_until(config, &SystemBrowser, shutdown_signal()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBrowser {
        opened: Mutex<Vec<String>>,
    }

    impl BrowserLauncher for RecordingBrowser {
        fn open(&self, url: &str) -> std::io::Result<()> {
            self.opened.lock().unwrap().push(url.to_owned());
            Ok(())
        }
    }

    struct FailingBrowser;

    impl BrowserLauncher for FailingBrowser {
        fn open(&self, _url: &str) -> std::io::Result<()> {
            Err(std::io::Error::other("no display"))
        }
    }

    fn test_config(dir: &std::path::Path, extra: &[&str]) -> ServerConfig {
        let root = dir.to_string_lossy().into_owned();
        let creds = dir.join("absent.json").to_string_lossy().into_owned();
        let mut args = vec![
            "firegate",
            "--port",
            "0",
            "--root",
            root.as_str(),
            "--credentials",
            creds.as_str(),
            "--shutdown-grace",
            "2s",
        ];
        args.extend_from_slice(extra);
        ServerConfig::parse_from(args)
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &[]);

        let server = RunningServer::start(&config).await.unwrap();
        assert_eq!(server.state(), LifecycleState::Running);
        assert!(server.url().starts_with("http://localhost:"));
        assert_ne!(server.url(), "http://localhost:0");

        let state = server.stop(Duration::from_secs(2)).await.unwrap();
        assert_eq!(state, LifecycleState::Terminated);
    }

    #[tokio::test]
    async fn test_stop_aborts_after_grace_period() {
        use crate::config::DocumentEndpoint;
        use crate::static_files::StaticFiles;
        use crate::upstream::{DocumentStore, RestDocumentStore};
        use std::sync::Arc;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let remote = MockServer::start().await;
        Mock::given(wiremock::matchers::method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&remote)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &["--no-browser"]);
        let endpoint = DocumentEndpoint::new(&remote.uri(), "k").unwrap();
        let store = RestDocumentStore::new(endpoint, Duration::from_secs(60)).unwrap();
        let state = AppState::new(
            Some(Arc::new(store) as Arc<dyn DocumentStore>),
            StaticFiles::new(dir.path(), "pg/index.html"),
        );
        let server = RunningServer::start_with_state(&config, state).await.unwrap();

        let read_url = format!("{}/firebase/read", server.url().replace("localhost", "127.0.0.1"));
        let _pending = tokio::spawn(async move { reqwest::get(read_url).await });

        // Wait until the request is held open by the remote store.
        for _ in 0..250 {
            let seen = remote.received_requests().await.unwrap_or_default();
            if !seen.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!remote.received_requests().await.unwrap_or_default().is_empty());

        let grace = Duration::from_millis(200);
        let started = std::time::Instant::now();
        let state = server.stop(grace).await.unwrap();

        assert_eq!(state, LifecycleState::Terminated);
        assert!(started.elapsed() >= grace);
        assert!(started.elapsed() < grace + Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_run_until_opens_browser_and_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &[]);
        let browser = RecordingBrowser::default();

        let state = run_until(&config, &browser, async {}).await.unwrap();

        assert_eq!(state, LifecycleState::Terminated);
        let opened = browser.opened.lock().unwrap();
        assert_eq!(opened.len(), 1);
        assert!(opened[0].starts_with("http://localhost:"));
    }

    #[tokio::test]
    async fn test_no_browser_flag() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &["--no-browser"]);
        let browser = RecordingBrowser::default();

        run_until(&config, &browser, async {}).await.unwrap();
        assert!(browser.opened.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_browser_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &[]);

        let state = run_until(&config, &FailingBrowser, async {}).await.unwrap();
        assert_eq!(state, LifecycleState::Terminated);
    }
}
