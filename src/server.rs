//! Stub server dispatch.
//!
//! Connects the HTTP transport to the matcher and response synthesizer, and
//! owns the active configuration set.

use crate::config::load_configuration_file;
use crate::error::Result;
use crate::matcher::{select, MatchResult, RequestDescriptor};
use crate::model::ConfigurationSet;
use crate::response::{self, ConcreteResponse};
use arc_swap::ArcSwap;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::Router;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Stub Server
///
/// Answers requests from the active configuration set. The set is replaced
/// wholesale on reload; requests in flight keep the set they started with.
pub struct StubServer {
    active: ArcSwap<ConfigurationSet>,
    /// Total requests processed.
    requests_total: AtomicU64,
    /// Total requests answered by an endpoint.
    requests_matched: AtomicU64,
    /// Total requests no endpoint matched.
    requests_unmatched: AtomicU64,
}

impl StubServer {
    /// Create a stub server serving the given configuration set.
    pub fn new(set: ConfigurationSet) -> Self {
        info!(endpoints = set.len(), "Stub server initialized");

        Self {
            active: ArcSwap::from_pointee(set),
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_unmatched: AtomicU64::new(0),
        }
    }

    /// Snapshot of the configuration set currently in force.
    pub fn configuration(&self) -> Arc<ConfigurationSet> {
        self.active.load_full()
    }

    /// Get total requests processed.
    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Get total requests matched.
    pub fn total_matched(&self) -> u64 {
        self.requests_matched.load(Ordering::Relaxed)
    }

    /// Get total requests unmatched.
    pub fn total_unmatched(&self) -> u64 {
        self.requests_unmatched.load(Ordering::Relaxed)
    }

    /// Answer one request.
    pub fn handle(&self, request: &RequestDescriptor) -> ConcreteResponse {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        let set = self.active.load();

        match select(&set, request) {
            MatchResult::Matched { index, endpoint } => {
                self.requests_matched.fetch_add(1, Ordering::Relaxed);
                info!(
                    endpoint = index,
                    method = %request.method,
                    path = %request.path,
                    "Request matched endpoint"
                );
                response::build(endpoint.response())
            }
            MatchResult::NoMatch => {
                self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
                warn!(
                    method = %request.method,
                    path = %request.path,
                    "No matching endpoint found"
                );
                set.not_found()
                    .map(response::build)
                    .unwrap_or_else(response::not_found)
            }
        }
    }

    /// Atomically replace the active configuration set.
    pub fn reload(&self, set: ConfigurationSet) {
        info!(endpoints = set.len(), "Configuration reloaded");
        self.active.store(Arc::new(set));
    }

    /// Load a configuration file and make it active.
    ///
    /// On error the previous set stays active. Returns the new endpoint count.
    pub fn reload_from_file(&self, path: &Path) -> Result<usize> {
        let set = load_configuration_file(path)?;
        let count = set.len();
        self.reload(set);
        Ok(count)
    }

    /// Axum router sending every request through [`StubServer::handle`].
    pub fn router(self: Arc<Self>) -> Router {
        Router::new().fallback(dispatch).with_state(self)
    }

    /// Serve HTTP on `listener` until `shutdown` resolves.
    pub async fn serve<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!(address = %addr, "Stub server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Stub server stopped");
        Ok(())
    }

    /// Reload from `path` every time the process receives SIGHUP.
    #[cfg(unix)]
    pub fn spawn_reload_on_hangup(
        self: &Arc<Self>,
        path: PathBuf,
    ) -> std::io::Result<tokio::task::JoinHandle<()>> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangup = signal(SignalKind::hangup())?;
        let server = Arc::clone(self);

        Ok(tokio::spawn(async move {
            while hangup.recv().await.is_some() {
                info!(path = %path.display(), "SIGHUP received, reloading configuration");
                if let Err(e) = server.reload_from_file(&path) {
                    error!(
                        error = %e,
                        "Failed to reload configuration, keeping current configuration"
                    );
                }
            }
        }))
    }
}

/// Fallback handler: every request lands here.
async fn dispatch(
    State(server): State<Arc<StubServer>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> ConcreteResponse {
    debug!(method = %method, uri = %uri, body_len = body.len(), "Dispatching request");

    let request = RequestDescriptor {
        method,
        path: decode_path(uri.path()),
        headers,
        body: (!body.is_empty()).then_some(body),
    };
    server.handle(&request)
}

/// Percent-decode a request path; paths that don't decode to UTF-8 are kept raw.
fn decode_path(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Resolves on Ctrl+C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
