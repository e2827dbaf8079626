//! Request logging middleware.

use std::sync::Arc;

use tracing::info;

use crate::handler::{BoxedHandler, Handler};
use crate::middleware::Middleware;
use crate::request::Request;

/// Logs request start (method, path, trace id) before delegating and
/// completion (final status, elapsed time) after.
///
/// On the error path the final status comes from the context's status
/// slot, recorded by whichever layer answered the client.
pub struct Logger;

impl Middleware for Logger {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        (move |req: Request| {
            let next = Arc::clone(&next);
            async move {
                let ctx = req.context_handle();
                let method = req.method();
                let path = req.path().to_owned();

                info!(
                    trace_id = %ctx.trace_id(),
                    %method,
                    %path,
                    "request started"
                );

                let result = next.call(req).await;

                let status = match &result {
                    Ok(resp) => resp.status_code().as_u16(),
                    Err(_) => ctx.status().map_or(500, |s| s.as_u16()),
                };
                info!(
                    trace_id = %ctx.trace_id(),
                    %method,
                    %path,
                    status,
                    elapsed_ms = ctx.started_at().elapsed().as_millis() as u64,
                    "request completed"
                );

                result
            }
        })
        .into_boxed_handler()
    }
}
