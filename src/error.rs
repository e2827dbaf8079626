//! Error taxonomy.
//!
//! Two kinds of failure live in this crate and they never mix:
//!
//! - [`Error`] — infrastructure failures (binding a port, accepting a
//!   connection). Surfaced from [`Server::serve`](crate::Server::serve).
//! - [`WebError`] — failures flowing out of a handler chain. The errors
//!   middleware resolves almost all of them into HTTP responses; only
//!   [`WebError::Shutdown`] is allowed past it, and the dispatcher answers
//!   that one by asking the process supervisor to stop.
//!
//! The split matters: a client sending garbage produces a `WebError` and a
//! 4xx response, and the process keeps serving. A broken framework
//! invariant produces `WebError::Shutdown` and the process drains and
//! exits, letting the orchestrator replace it.

use std::fmt;

use http::StatusCode;
use serde::Serialize;

/// Infrastructure error returned by the server's fallible operations.
///
/// Application-level failures are expressed as [`WebError`] values inside
/// the handler chain, not as `Error`s.
#[derive(Debug)]
pub struct Error(std::io::Error);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "io: {}", self.0)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self(e)
    }
}

// ── Request-pipeline errors ───────────────────────────────────────────────────

/// A single failed field in a validation error.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub error: String,
}

/// Field-level validation failures, user-correctable.
#[derive(Debug, Clone, Default)]
pub struct FieldErrors(pub Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn add(&mut self, field: impl Into<String>, error: impl Into<String>) {
        self.0.push(FieldError { field: field.into(), error: error.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Rendered as a JSON array string so it can travel inside the
        // `fields` slot of the error envelope.
        match serde_json::to_string(&self.0) {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str("[]"),
        }
    }
}

impl std::error::Error for FieldErrors {}

/// An error produced somewhere in a handler chain.
///
/// Classified by the errors middleware, in priority order: `Validation`
/// answers 400 with field detail, `Request` answers with its carried
/// status, `Shutdown` answers and then re-raises, everything else answers
/// a generic 500 without leaking internals.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Structured validation failure.
    #[error("data validation error: {0}")]
    Validation(FieldErrors),

    /// Expected domain failure carrying its own status code and a message
    /// safe to show the client.
    #[error("{message}")]
    Request { status: StatusCode, message: String },

    /// Framework-invariant violation. The only variant allowed to
    /// propagate past the errors middleware; triggers graceful shutdown.
    #[error("integrity violation: {0}")]
    Shutdown(String),

    /// A recovered panic, converted to an error so the chain keeps its
    /// no-escaping-panics guarantee. The backtrace stays server-side.
    #[error("panic: {message}")]
    Panic { message: String, backtrace: String },

    /// Anything else. Treated as an internal bug: logged in full, answered
    /// with a generic 500.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WebError {
    /// Expected domain failure with an explicit status.
    pub fn request(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Request { status, message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::request(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::request(StatusCode::FORBIDDEN, message)
    }

    /// An error that asks the framework to shut the service down
    /// gracefully. Reserved for broken invariants, never for bad input.
    pub fn shutdown(reason: impl Into<String>) -> Self {
        Self::Shutdown(reason.into())
    }

    /// Whether this error must keep propagating after being answered.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown(_))
    }
}

/// The JSON envelope used for every error answered to a client.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<String>,
}
