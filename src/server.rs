//! HTTP server and graceful shutdown.
//!
//! # Two ways down, one drain
//!
//! The server stops for exactly two reasons: the operating system asks
//! (SIGTERM from the orchestrator, Ctrl-C in development) or the
//! application asks (the dispatcher observed an integrity violation and
//! signaled shutdown). Both take the same path:
//!
//! 1. Immediately stop `listener.accept()` — no new connections are made.
//! 2. Let in-flight connection tasks run to completion, bounded by the
//!    drain timeout.
//! 3. Return from [`Server::serve`], which lets `main` exit cleanly.
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before SIGKILL. Keep the
//! drain timeout under that value and longer than your slowest request.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::BodyExt;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::app::App;
use crate::error::Error;
use crate::response::Response;
use crate::shutdown::ShutdownReceiver;

const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(20);

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    drain_timeout: Duration,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr, drain_timeout: DEFAULT_DRAIN_TIMEOUT }
    }

    /// Bounds how long in-flight requests may run after shutdown begins.
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Starts accepting connections and dispatching them through `app`.
    ///
    /// `integrity` is the receiving side of the app's shutdown channel —
    /// create both with [`shutdown_channel`](crate::shutdown_channel) and
    /// give the signaling side to [`App::new`].
    ///
    /// Returns after a full graceful shutdown: an OS signal or an
    /// integrity escalation, followed by the connection drain.
    pub async fn serve(self, app: App, mut integrity: ShutdownReceiver) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;

        // Arc so the app can be shared across concurrent connection tasks
        // without copying the route table.
        let app = Arc::new(app);

        info!(addr = %self.addr, "plinth listening");

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();

        // Pin the shutdown future so we can poll it in a loop.
        // Futures in Rust must not move in memory after the first poll — that
        // is what `Pin` enforces. `tokio::pin!` pins the future on the stack.
        let os_shutdown = shutdown_signal();
        tokio::pin!(os_shutdown);

        loop {
            tokio::select! {
                // `biased` makes select! check arms top-to-bottom instead of
                // randomly. Both shutdown sources come before accept so a
                // pending stop wins over queued connections.
                biased;

                () = &mut os_shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                reason = integrity.recv() => {
                    error!(%reason, in_flight = tasks.len(), "integrity shutdown requested, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    // TokioIo adapts tokio's AsyncRead/AsyncWrite to the hyper
                    // IO traits.
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // `service_fn` turns a plain async function into a
                        // hyper `Service`. The closure is called once per
                        // request on the connection, not once per connection.
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { handle(app, req).await }
                        });

                        // `auto::Builder` transparently handles both HTTP/1.1
                        // and HTTP/2 — whatever the client negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Drain: wait for in-flight connections, but not past the bound —
        // a stuck request must not hold the process hostage.
        let drain = async {
            while tasks.join_next().await.is_some() {}
        };
        if tokio::time::timeout(self.drain_timeout, drain).await.is_err() {
            warn!(timeout = ?self.drain_timeout, "drain timeout elapsed, aborting remaining connections");
            tasks.shutdown().await;
        }

        info!("plinth stopped");
        Ok(())
    }
}

// ── Request adaptation ────────────────────────────────────────────────────────

/// Bridges one hyper request into the dispatcher and back.
///
/// The error type is [`Infallible`](std::convert::Infallible) — all
/// failures become responses (404, 500, etc.) so hyper never sees an
/// error.
async fn handle(
    app: Arc<App>,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<http::Response<http_body_util::Full<bytes::Bytes>>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();
    let method = parts.method;
    let uri = parts.uri;
    let headers = parts.headers;

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("request body error: {e}");
            return Ok(Response::status(http::StatusCode::BAD_REQUEST).into_http());
        }
    };

    let response = app
        .dispatch(method.as_str(), uri.path(), uri.query().unwrap_or(""), headers, body)
        .await;

    Ok(response.into_http())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by `kubectl` and the
/// Kubernetes control plane) and **SIGINT** (Ctrl-C, for local dev).
/// On Windows only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    // `pending()` is a future that never resolves — on non-Unix platforms
    // the SIGTERM arm is effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
