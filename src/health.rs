//! Built-in Kubernetes health-check handlers.
//!
//! Kubernetes asks two questions. plinth answers them.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! Register them on your app:
//!
//! ```rust,no_run
//! use plinth::{App, health, shutdown_channel};
//!
//! let (signal, _receiver) = shutdown_channel();
//! let app = App::new(signal, Vec::new())
//!     .get("/healthz", health::liveness, &[])
//!     .get("/readyz", health::readiness, &[]);
//! ```
//!
//! Override `readiness` with a custom handler if you need to gate on
//! dependency availability (database connections, downstream services,
//! etc.).

use crate::error::WebError;
use crate::request::Request;
use crate::response::Response;

/// Kubernetes liveness probe handler.
///
/// Always answers `200` with the `{"status":"OK"}` envelope. If the
/// process can respond to HTTP at all, it is alive — this handler
/// intentionally has no dependencies.
pub async fn liveness(_req: Request) -> Result<Response, WebError> {
    Ok(Response::ok())
}

/// Kubernetes readiness probe handler (default implementation).
///
/// Answers `200` with the `{"status":"OK"}` envelope. Replace this with
/// your own handler if your application needs a warm-up period or must
/// verify dependency health before accepting traffic.
pub async fn readiness(_req: Request) -> Result<Response, WebError> {
    Ok(Response::ok())
}
