//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Build a [`Response`] in your handler and return it. The uniform JSON
//! envelopes (`{"status":"OK"}`, the error envelope) live here so every
//! part of the framework answers clients the same way.

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use serde::Serialize;

use crate::error::{ErrorResponse, WebError};

/// The status envelope: `{"status":"OK"}`, `{"status":"NOT FOUND"}`.
#[derive(Debug, Serialize)]
struct StatusEnvelope<'a> {
    status: &'a str,
}

/// An outgoing HTTP response.
///
/// # Shortcuts
///
/// ```rust
/// use http::StatusCode;
/// use plinth::Response;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
/// Response::ok(); // 200 {"status":"OK"}
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use http::StatusCode;
/// use plinth::Response;
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
/// ```
#[derive(Debug)]
pub struct Response {
    body: Bytes,
    headers: Vec<(String, String)>,
    status: StatusCode,
}

impl Response {
    /// `200 OK` — `application/json`. Pass bytes from your serialiser.
    pub fn json(body: Vec<u8>) -> Self {
        Self::bytes_raw("application/json", Bytes::from(body))
    }

    /// `200 OK` — `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::bytes_raw("text/plain; charset=utf-8", Bytes::from(body.into().into_bytes()))
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { body: Bytes::new(), headers: Vec::new(), status: code }
    }

    /// The success envelope: `200` with `{"status":"OK"}`.
    pub fn ok() -> Self {
        Self::envelope(StatusCode::OK, "OK")
    }

    /// The default not-found envelope: `404` with `{"status":"NOT FOUND"}`.
    pub fn not_found() -> Self {
        Self::envelope(StatusCode::NOT_FOUND, "NOT FOUND")
    }

    fn envelope(code: StatusCode, status: &str) -> Self {
        let body = serde_json::to_vec(&StatusEnvelope { status })
            .unwrap_or_else(|_| br#"{"status":"?"}"#.to_vec());
        Self { body: Bytes::from(body), headers: json_headers(), status: code }
    }

    /// Serializes `data` as a JSON body with the given status.
    ///
    /// Serialization failure is an internal bug, reported as such rather
    /// than answered with a half-written body.
    pub fn json_of<T: Serialize>(code: StatusCode, data: &T) -> Result<Self, WebError> {
        let body = serde_json::to_vec(data)
            .map_err(|e| WebError::Internal(anyhow::anyhow!("encoding response body: {e}")))?;
        Ok(Self { body: Bytes::from(body), headers: json_headers(), status: code })
    }

    /// The uniform error envelope used by the errors middleware.
    pub(crate) fn error_envelope(code: StatusCode, envelope: &ErrorResponse) -> Self {
        let body = serde_json::to_vec(envelope)
            .unwrap_or_else(|_| br#"{"error":"Internal Server Error"}"#.to_vec());
        Self { body: Bytes::from(body), headers: json_headers(), status: code }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK }
    }

    fn bytes_raw(content_type: &str, body: Bytes) -> Self {
        Self {
            body,
            headers: vec![("content-type".to_owned(), content_type.to_owned())],
            status: StatusCode::OK,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Lowers into the hyper representation for the connection driver.
    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut builder = http::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        builder
            .body(Full::new(self.body))
            // A malformed header name/value is caught here; answer 500
            // rather than tearing down the connection.
            .unwrap_or_else(|_| {
                http::Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Full::new(Bytes::new()))
                    .expect("empty 500 response is always valid")
            })
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`]. Defaults to `200 OK`; terminated by a
/// typed body method.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: Vec<u8>) -> Response {
        self.finish("application/json", body)
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish("text/plain; charset=utf-8", body.into().into_bytes())
    }

    /// Terminate with no body.
    pub fn no_body(self) -> Response {
        Response { body: Bytes::new(), headers: self.headers, status: self.status }
    }

    fn finish(self, content_type: &str, body: Vec<u8>) -> Response {
        let mut headers = vec![("content-type".to_owned(), content_type.to_owned())];
        headers.extend(self.headers);
        Response { body: Bytes::from(body), headers, status: self.status }
    }
}

fn json_headers() -> Vec<(String, String)> {
    vec![("content-type".to_owned(), "application/json".to_owned())]
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        Response::text(self)
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        Response::text(self)
    }
}

/// Return a bare [`StatusCode`] from a handler: `Ok(StatusCode::NO_CONTENT)`.
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response {
        Response::status(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope_shape() {
        let resp = Response::ok();
        assert_eq!(resp.status_code(), StatusCode::OK);
        assert_eq!(resp.body(), br#"{"status":"OK"}"#);
        assert_eq!(resp.header("content-type"), Some("application/json"));
    }

    #[test]
    fn not_found_envelope_shape() {
        let resp = Response::not_found();
        assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(resp.body(), br#"{"status":"NOT FOUND"}"#);
    }

    #[test]
    fn builder_sets_status_and_headers() {
        let resp = Response::builder()
            .status(StatusCode::CREATED)
            .header("location", "/users/42")
            .json(b"{}".to_vec());
        assert_eq!(resp.status_code(), StatusCode::CREATED);
        assert_eq!(resp.header("Location"), Some("/users/42"));
    }

    #[test]
    fn json_of_serializes_payload() {
        #[derive(Serialize)]
        struct User<'a> {
            id: u32,
            name: &'a str,
        }
        let resp = Response::json_of(StatusCode::OK, &User { id: 7, name: "alice" }).unwrap();
        assert_eq!(resp.body(), br#"{"id":7,"name":"alice"}"#);
    }

    #[test]
    fn into_http_carries_status_and_body() {
        let http = Response::text("hi").into_http();
        assert_eq!(http.status(), StatusCode::OK);
    }
}
