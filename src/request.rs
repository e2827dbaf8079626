//! Incoming HTTP request type.

use std::sync::Arc;

use bytes::Bytes;
use http::HeaderMap;
use http::StatusCode;
use serde::de::DeserializeOwned;

use crate::context::RequestContext;
use crate::error::WebError;
use crate::method::Method;

/// An incoming HTTP request, fully read before dispatch.
///
/// Carries the request-scoped [`RequestContext`] behind an `Arc` so a
/// middleware can keep a handle across its delegate call while the request
/// itself moves down the chain.
pub struct Request {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Bytes,
    ctx: Arc<RequestContext>,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        path: String,
        headers: HeaderMap,
        body: Bytes,
        ctx: Arc<RequestContext>,
    ) -> Self {
        Self { method, path, headers, body, ctx }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Case-insensitive header lookup; `None` for absent or non-UTF-8 values.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The request-scoped context: params, query, trace id, claims.
    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    /// A shared handle to the context, for middleware that must read it
    /// after delegating the request inward.
    pub fn context_handle(&self) -> Arc<RequestContext> {
        Arc::clone(&self.ctx)
    }

    /// Shortcut for `context().param(name)`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.ctx.param(name)
    }

    /// Decodes the body as JSON into `T`.
    ///
    /// A malformed body is the client's mistake: answered 400, never
    /// escalated.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, WebError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| WebError::request(StatusCode::BAD_REQUEST, format!("invalid json body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn request(body: &str) -> Request {
        let ctx = Arc::new(RequestContext::new(HashMap::new(), ""));
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        Request::new(
            Method::Post,
            "/users".to_owned(),
            headers,
            Bytes::copy_from_slice(body.as_bytes()),
            ctx,
        )
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = request("{}");
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert_eq!(req.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(req.header("x-missing"), None);
    }

    #[test]
    fn json_decodes_into_typed_value() {
        #[derive(serde::Deserialize)]
        struct Input {
            name: String,
        }
        let req = request(r#"{"name":"alice"}"#);
        let input: Input = req.json().unwrap();
        assert_eq!(input.name, "alice");
    }

    #[test]
    fn malformed_json_is_a_request_error() {
        let req = request("not-json");
        let err = req.json::<serde_json::Value>().unwrap_err();
        match err {
            WebError::Request { status, .. } => assert_eq!(status, StatusCode::BAD_REQUEST),
            other => panic!("expected request error, got {other:?}"),
        }
    }
}
