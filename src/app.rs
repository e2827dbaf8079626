//! Application: route registration and request dispatch.
//!
//! [`App`] composes the pieces explicitly: it *holds* a route table, the
//! app-level middleware list and a shutdown handle — it does not inherit
//! from any of them, and it exposes only the operations defined here.
//!
//! Registration is where middleware composition happens, once per route:
//! the business handler is wrapped with the route-level group, then with
//! the app-level group, and the finished chain is stored in the table.
//! Nothing about a chain changes after startup.
//!
//! Dispatch runs the matched chain and enforces the escalation contract:
//! an error that makes it back to the dispatcher has already survived the
//! errors middleware, which absorbs every ordinary failure — whatever is
//! left indicates broken framework wiring, so the dispatcher answers the
//! client with the generic 500 envelope and asks the supervisor to begin
//! a graceful shutdown.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use tracing::error;

use crate::context::RequestContext;
use crate::error::ErrorResponse;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::{Middleware, wrap_chain};
use crate::request::Request;
use crate::response::Response;
use crate::router::{Lookup, RouteTable};
use crate::shutdown::ShutdownSignal;

/// The application: a route table, its middleware, and a shutdown handle.
///
/// Build one at startup, register routes, hand it to
/// [`Server::serve`](crate::Server::serve). Registration methods return
/// `self` so calls chain naturally.
pub struct App {
    table: RouteTable,
    middleware: Vec<Arc<dyn Middleware>>,
    not_found: BoxedHandler,
    shutdown: ShutdownSignal,
}

impl App {
    /// Creates an app with the given app-level middleware, outermost
    /// first. `shutdown` is the handle the dispatcher escalates on.
    pub fn new(shutdown: ShutdownSignal, middleware: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            table: RouteTable::new(),
            middleware,
            not_found: default_not_found(),
            shutdown,
        }
    }

    /// Registers a GET handler.
    pub fn get(self, template: &str, handler: impl Handler, mw: &[Arc<dyn Middleware>]) -> Self {
        self.handle(Method::Get, template, handler, mw)
    }

    /// Registers a POST handler.
    pub fn post(self, template: &str, handler: impl Handler, mw: &[Arc<dyn Middleware>]) -> Self {
        self.handle(Method::Post, template, handler, mw)
    }

    /// Registers a PUT handler.
    pub fn put(self, template: &str, handler: impl Handler, mw: &[Arc<dyn Middleware>]) -> Self {
        self.handle(Method::Put, template, handler, mw)
    }

    /// Registers a PATCH handler.
    pub fn patch(self, template: &str, handler: impl Handler, mw: &[Arc<dyn Middleware>]) -> Self {
        self.handle(Method::Patch, template, handler, mw)
    }

    /// Registers a DELETE handler.
    pub fn delete(self, template: &str, handler: impl Handler, mw: &[Arc<dyn Middleware>]) -> Self {
        self.handle(Method::Delete, template, handler, mw)
    }

    /// Replaces the not-found handler.
    ///
    /// It runs outside the middleware chain, for unknown paths and for
    /// known paths with an unbound method alike.
    pub fn not_found(mut self, handler: impl Handler) -> Self {
        self.not_found = handler.into_boxed_handler();
        self
    }

    /// Composes the chain for one route and stores it.
    ///
    /// Route middleware wraps the handler first, app middleware second, so
    /// app middleware runs first on entry — the errors and panic stages
    /// always bound every route-specific concern.
    ///
    /// # Panics
    ///
    /// Panics on a malformed template. Registration happens once at
    /// startup; a bad template is a programming error worth failing loudly
    /// on.
    fn handle(
        mut self,
        method: Method,
        template: &str,
        handler: impl Handler,
        mw: &[Arc<dyn Middleware>],
    ) -> Self {
        let chain = wrap_chain(&self.middleware, wrap_chain(mw, handler.into_boxed_handler()));
        self.table
            .insert(template, method, chain)
            .unwrap_or_else(|e| panic!("invalid route `{template}`: {e}"));
        self
    }

    /// A clone of the shutdown handle, for wiring and tests.
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Routes one request and produces one response.
    ///
    /// `raw_method` is the wire string; anything outside the supported
    /// five answers the default not-found envelope without consulting the
    /// table.
    pub async fn dispatch(
        &self,
        raw_method: &str,
        path: &str,
        query: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        let Ok(method) = Method::from_str(raw_method) else {
            return Response::not_found();
        };

        let (handler, params, composed) = match self.table.lookup(method, path) {
            Lookup::Matched { handler, compiled } => {
                let params: HashMap<String, String> = compiled
                    .extract(path)
                    .into_iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect();
                (Arc::clone(handler), params, true)
            }
            Lookup::NotFound => (Arc::clone(&self.not_found), HashMap::new(), false),
        };

        let ctx = Arc::new(RequestContext::new(params, query));
        let req = Request::new(method, path.to_owned(), headers, body, Arc::clone(&ctx));

        match handler.call(req).await {
            Ok(response) => {
                ctx.set_status(response.status_code());
                response
            }
            Err(err) if composed => {
                // The errors middleware absorbs every ordinary failure.
                // Reaching this point means the chain's own wiring is
                // compromised: answer the client, then escalate.
                error!(trace_id = %ctx.trace_id(), error = %err, "integrity error, requesting shutdown");
                self.shutdown.signal(err.to_string());
                ctx.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                generic_500()
            }
            Err(err) => {
                // The not-found handler runs outside any chain; its errors
                // are answered, never escalated.
                error!(trace_id = %ctx.trace_id(), error = %err, "not-found handler error");
                ctx.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                generic_500()
            }
        }
    }
}

fn default_not_found() -> BoxedHandler {
    (|_req: Request| async move { Ok::<_, crate::error::WebError>(Response::not_found()) })
        .into_boxed_handler()
}

fn generic_500() -> Response {
    Response::error_envelope(
        StatusCode::INTERNAL_SERVER_ERROR,
        &ErrorResponse { error: "Internal Server Error".to_owned(), fields: None },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WebError;
    use crate::middleware::{Errors, Logger, MetricsMiddleware, Panics};
    use crate::metrics::Metrics;
    use crate::shutdown::shutdown_channel;

    fn app_middleware(metrics: &Arc<Metrics>) -> Vec<Arc<dyn Middleware>> {
        vec![
            Arc::new(Logger),
            Arc::new(Errors),
            Arc::new(MetricsMiddleware::new(Arc::clone(metrics))),
            Arc::new(Panics),
        ]
    }

    async fn get(app: &App, path: &str) -> Response {
        app.dispatch("GET", path, "", HeaderMap::new(), Bytes::new()).await
    }

    #[tokio::test]
    async fn dispatch_extracts_params_in_template_order() {
        let (signal, _receiver) = shutdown_channel();
        let app = App::new(signal, Vec::new()).get(
            "/users/:id/ships/:type",
            |req: Request| async move {
                let id = req.param("id").unwrap_or_default().to_owned();
                let kind = req.param("type").unwrap_or_default().to_owned();
                Ok::<_, WebError>(Response::text(format!("{id}/{kind}")))
            },
            &[],
        );

        let resp = get(&app, "/users/7/ships/frigate").await;
        assert_eq!(resp.body(), b"7/frigate");
    }

    #[tokio::test]
    async fn unknown_path_and_unknown_method_answer_not_found() {
        let (signal, _receiver) = shutdown_channel();
        let app = App::new(signal, Vec::new()).get(
            "/users",
            |_req: Request| async move { Ok::<_, WebError>(Response::ok()) },
            &[],
        );

        let resp = get(&app, "/nope").await;
        assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);

        let resp = app
            .dispatch("POST", "/users", "", HeaderMap::new(), Bytes::new())
            .await;
        assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);

        let resp = app
            .dispatch("BREW", "/users", "", HeaderMap::new(), Bytes::new())
            .await;
        assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn request_error_does_not_trigger_shutdown() {
        let (signal, mut receiver) = shutdown_channel();
        let metrics = Arc::new(Metrics::new());
        let app = App::new(signal, app_middleware(&metrics)).get(
            "/teapot",
            |_req: Request| async move {
                Err::<Response, _>(WebError::request(StatusCode::IM_A_TEAPOT, "short and stout"))
            },
            &[],
        );

        let resp = get(&app, "/teapot").await;
        assert_eq!(resp.status_code(), StatusCode::IM_A_TEAPOT);

        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(20), receiver.recv())
                .await
                .is_err(),
        );
    }

    #[tokio::test]
    async fn shutdown_error_answers_client_and_signals_once() {
        let (signal, mut receiver) = shutdown_channel();
        let metrics = Arc::new(Metrics::new());
        let app = Arc::new(App::new(signal, app_middleware(&metrics)).get(
            "/broken",
            |_req: Request| async move {
                Err::<Response, _>(WebError::shutdown("request values missing"))
            },
            &[],
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let app = Arc::clone(&app);
            handles.push(tokio::spawn(async move {
                app.dispatch("GET", "/broken", "", HeaderMap::new(), Bytes::new()).await
            }));
        }
        for handle in handles {
            let resp = handle.await.unwrap();
            assert_eq!(resp.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        }

        // Exactly one signal observed, no matter how many requests raced.
        receiver.recv().await;
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(20), receiver.recv())
                .await
                .is_err(),
        );
    }

    #[tokio::test]
    async fn panicking_handler_answers_500_and_keeps_serving() {
        let (signal, mut receiver) = shutdown_channel();
        let metrics = Arc::new(Metrics::new());
        let app = App::new(signal, app_middleware(&metrics))
            .get(
                "/panic",
                |_req: Request| async move {
                    panic!("handler exploded");
                    #[allow(unreachable_code)]
                    Ok::<Response, WebError>(Response::ok())
                },
                &[],
            )
            .get(
                "/fine",
                |_req: Request| async move { Ok::<_, WebError>(Response::ok()) },
                &[],
            );

        let resp = get(&app, "/panic").await;
        assert_eq!(resp.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        // The panic was contained: no shutdown, later requests succeed.
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(20), receiver.recv())
                .await
                .is_err(),
        );
        let resp = get(&app, "/fine").await;
        assert_eq!(resp.status_code(), StatusCode::OK);
        assert_eq!(metrics.snapshot().panics, 1);
    }

    #[tokio::test]
    async fn custom_not_found_handler_is_used() {
        let (signal, _receiver) = shutdown_channel();
        let app = App::new(signal, Vec::new()).not_found(|_req: Request| async move {
            Ok::<_, WebError>(Response::builder().status(StatusCode::NOT_FOUND).text("gone"))
        });

        let resp = get(&app, "/whatever").await;
        assert_eq!(resp.body(), b"gone");
    }
}
