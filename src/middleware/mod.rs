//! Middleware layer.
//!
//! A middleware is a `Handler -> Handler` transform: it receives the next
//! handler in the chain and returns a new handler that runs code before
//! and/or after delegating. Middleware values are stateless and composed
//! exactly once, at route registration — nothing is rebuilt per request.
//!
//! Composition order: the raw business handler is wrapped first by the
//! route-level middlewares (first-listed outermost of that group), then by
//! the app-level middlewares (same rule). On entry a request passes
//! `[app middlewares, listed order] -> [route middlewares, listed order]
//! -> handler`; on exit, the reverse.
//!
//! The app-level group this crate ships:
//!
//! - [`Logger`] — request start/completion with trace id and timing
//! - [`Errors`] — the sole converter of chain errors into responses
//! - [`MetricsMiddleware`] — request / error / panic counters
//! - [`Panics`] — unwind containment; list it **last** so it wraps
//!   everything beneath the app group
//!
//! Route-level: [`Authenticate`] and [`Authorize`].

mod auth;
mod errors;
mod logger;
mod metrics;
mod panics;

pub use auth::{Authenticate, Authorize};
pub use errors::Errors;
pub use logger::Logger;
pub use metrics::MetricsMiddleware;
pub use panics::Panics;

use std::sync::Arc;

use crate::handler::BoxedHandler;

/// A transform from one handler to another.
///
/// Implementations wrap `next` in a closure-backed handler that does its
/// work around `next.call(req)`. They promise to call `next` exactly once
/// unless short-circuiting with an error.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}

/// Wraps `handler` with `mw`, last middleware innermost, so the
/// first-listed middleware is the first to run on entry.
pub(crate) fn wrap_chain(mw: &[Arc<dyn Middleware>], mut handler: BoxedHandler) -> BoxedHandler {
    for m in mw.iter().rev() {
        handler = m.wrap(handler);
    }
    handler
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use bytes::Bytes;
    use http::HeaderMap;

    use super::*;
    use crate::context::RequestContext;
    use crate::error::WebError;
    use crate::handler::Handler;
    use crate::method::Method;
    use crate::request::Request;
    use crate::response::Response;

    /// Appends `pre:<name>` before delegating and `post:<name>` after.
    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for Recording {
        fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
            let name = self.name;
            let log = Arc::clone(&self.log);
            (move |req: Request| {
                let next = Arc::clone(&next);
                let log = Arc::clone(&log);
                async move {
                    log.lock().unwrap().push(format!("pre:{name}"));
                    let result = next.call(req).await;
                    log.lock().unwrap().push(format!("post:{name}"));
                    result
                }
            })
            .into_boxed_handler()
        }
    }

    fn request() -> Request {
        Request::new(
            Method::Get,
            "/".to_owned(),
            HeaderMap::new(),
            Bytes::new(),
            Arc::new(RequestContext::new(HashMap::new(), "")),
        )
    }

    #[tokio::test]
    async fn first_listed_runs_first_on_entry_last_on_exit() {
        let log: Arc<Mutex<Vec<String>>> = Arc::default();

        let handler = {
            let log = Arc::clone(&log);
            (move |_req: Request| {
                let log = Arc::clone(&log);
                async move {
                    log.lock().unwrap().push("H".to_owned());
                    Ok::<_, WebError>(Response::text("ok"))
                }
            })
            .into_boxed_handler()
        };

        // Route group [C] wrapped first, then app group [A, B] — the
        // composition the dispatcher performs per route.
        let route_mw: Vec<Arc<dyn Middleware>> =
            vec![Arc::new(Recording { name: "C", log: Arc::clone(&log) })];
        let app_mw: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(Recording { name: "A", log: Arc::clone(&log) }),
            Arc::new(Recording { name: "B", log: Arc::clone(&log) }),
        ];

        let composed = wrap_chain(&app_mw, wrap_chain(&route_mw, handler));
        composed.call(request()).await.unwrap();

        let recorded = log.lock().unwrap().clone();
        assert_eq!(
            recorded,
            vec!["pre:A", "pre:B", "pre:C", "H", "post:C", "post:B", "post:A"],
        );
    }
}
