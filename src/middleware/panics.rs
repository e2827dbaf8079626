//! Panic containment middleware.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::error::WebError;
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::Middleware;
use crate::request::Request;

/// Catches unwinds from everything beneath it and converts them into an
/// ordinary [`WebError::Panic`], so a panicking handler can never take a
/// serving task down.
///
/// List this **last** in the app-level group: it must wrap every
/// route-level middleware and the handler itself. The captured backtrace
/// is taken at the recovery site and travels server-side only — the
/// errors middleware above answers the client with a generic 500.
pub struct Panics;

impl Middleware for Panics {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        (move |req: Request| {
            let next = Arc::clone(&next);
            async move {
                match AssertUnwindSafe(next.call(req)).catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => Err(WebError::Panic {
                        message: panic_message(payload.as_ref()),
                        backtrace: Backtrace::force_capture().to_string(),
                    }),
                }
            }
        })
        .into_boxed_handler()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
