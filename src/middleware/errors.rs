//! Error-handling middleware.
//!
//! The one place a chain error becomes an HTTP response. Everything the
//! errors middleware absorbs stays absorbed — the dispatcher above never
//! sees it and the process keeps serving. The single exception is
//! [`WebError::Shutdown`]: it is re-raised after classification so the
//! dispatcher can answer the client and escalate.

use std::sync::Arc;

use http::StatusCode;
use tracing::error;

use crate::error::{ErrorResponse, WebError};
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::Response;

/// Classifies chain errors and answers the client in the uniform envelope.
///
/// Priority order: validation failures answer 400 with field detail;
/// request errors answer their carried status and message; shutdown
/// errors propagate (the dispatcher answers those); anything else — panics
/// included — is logged in full server-side and answered with a generic
/// 500, never leaking internals.
pub struct Errors;

impl Middleware for Errors {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        (move |req: Request| {
            let next = Arc::clone(&next);
            async move {
                let ctx = req.context_handle();

                let err = match next.call(req).await {
                    Ok(resp) => return Ok(resp),
                    Err(err) => err,
                };

                match &err {
                    WebError::Panic { message, backtrace } => error!(
                        trace_id = %ctx.trace_id(),
                        %message,
                        %backtrace,
                        "recovered panic"
                    ),
                    other => error!(trace_id = %ctx.trace_id(), error = %other, "handler error"),
                }

                if err.is_shutdown() {
                    // Answered upstream by the dispatcher, which also
                    // signals the supervisor.
                    return Err(err);
                }

                let (status, envelope) = classify(&err);
                ctx.set_status(status);
                Ok(Response::error_envelope(status, &envelope))
            }
        })
        .into_boxed_handler()
    }
}

fn classify(err: &WebError) -> (StatusCode, ErrorResponse) {
    match err {
        WebError::Validation(fields) => (
            StatusCode::BAD_REQUEST,
            ErrorResponse {
                error: "data validation error".to_owned(),
                fields: Some(fields.to_string()),
            },
        ),
        WebError::Request { status, message } => (
            *status,
            ErrorResponse { error: message.clone(), fields: None },
        ),
        WebError::Shutdown(_) | WebError::Panic { .. } | WebError::Internal(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse { error: "Internal Server Error".to_owned(), fields: None },
        ),
    }
}
