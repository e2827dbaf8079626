//! Metrics middleware.

use std::sync::Arc;

use crate::error::WebError;
use crate::handler::{BoxedHandler, Handler};
use crate::metrics::Metrics;
use crate::middleware::Middleware;
use crate::request::Request;

/// Counts requests, errors and recovered panics on an explicit
/// [`Metrics`] registry.
///
/// Counting can never fail a request: the counters are atomics on a
/// registry this middleware co-owns. Positioned inside the errors
/// middleware so error returns are still visible here before they are
/// absorbed into responses.
pub struct MetricsMiddleware {
    metrics: Arc<Metrics>,
}

impl MetricsMiddleware {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl Middleware for MetricsMiddleware {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let metrics = Arc::clone(&self.metrics);
        (move |req: Request| {
            let next = Arc::clone(&next);
            let metrics = Arc::clone(&metrics);
            async move {
                metrics.add_request();
                let result = next.call(req).await;
                if let Err(err) = &result {
                    metrics.add_error();
                    if matches!(err, WebError::Panic { .. }) {
                        metrics.add_panic();
                    }
                }
                result
            }
        })
        .into_boxed_handler()
    }
}
