//! # plinth
//!
//! A small web-service foundation. Routing, middleware, error escalation,
//! signed tokens. Nothing more. Nothing less.
//!
//! ## The contract
//!
//! plinth owns the part of a service that changes least and breaks worst:
//!
//! - **Routing** — templates like `/users/:id`, compiled once at startup
//!   into segment matchers with ordered parameter extraction.
//! - **Middleware** — `Handler -> Handler` transforms composed at
//!   registration: logging, error classification, metrics, panic
//!   containment, authentication, authorization.
//! - **Error escalation** — a deliberate two-tier policy. Domain errors
//!   (bad input, not found, unauthorized) are answered and absorbed; the
//!   process keeps serving. Integrity violations escalate to a graceful
//!   shutdown, so the orchestrator replaces an instance that detects its
//!   own wiring is broken — and never one that merely saw bad input.
//! - **Tokens** — an Ed25519 authority with a kid-indexed keystore.
//!   Rotation-safe: tokens verify as long as their signing key record
//!   remains, even after the active key moves on.
//!
//! Business handlers, persistence, config files and TLS are your side of
//! the line. plinth consumes them through the handler signature and
//! constructor arguments.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use plinth::middleware::{Errors, Logger, MetricsMiddleware, Panics, Middleware};
//! use plinth::{App, Metrics, Request, Response, Server, WebError, shutdown_channel};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (signal, receiver) = shutdown_channel();
//!     let metrics = Arc::new(Metrics::new());
//!
//!     let middleware: Vec<Arc<dyn Middleware>> = vec![
//!         Arc::new(Logger),
//!         Arc::new(Errors),
//!         Arc::new(MetricsMiddleware::new(Arc::clone(&metrics))),
//!         Arc::new(Panics),
//!     ];
//!
//!     let app = App::new(signal, middleware)
//!         .get("/users/:id", get_user, &[]);
//!
//!     Server::bind("0.0.0.0:3000").serve(app, receiver).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Result<Response, WebError> {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Ok(Response::json(format!(r#"{{"id":"{id}"}}"#).into_bytes()))
//! }
//! ```

mod app;
mod auth;
mod context;
mod error;
mod handler;
mod keystore;
mod metrics;
mod method;
mod request;
mod response;
mod router;
mod server;
mod shutdown;
mod template;

pub mod health;
pub mod middleware;

pub use app::App;
pub use auth::{Auth, AuthError, Claims, ROLE_ADMIN, ROLE_USER};
pub use context::RequestContext;
pub use error::{Error, ErrorResponse, FieldError, FieldErrors, WebError};
pub use handler::Handler;
pub use keystore::{KeyStore, KeyStoreError};
pub use metrics::{Metrics, MetricsSnapshot};
pub use method::Method;
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use server::Server;
pub use shutdown::{ShutdownReceiver, ShutdownSignal, shutdown_channel};
pub use template::TemplateError;
