//! Request-scoped values.
//!
//! One [`RequestContext`] is built per dispatched request and dropped when
//! the response finishes. It is an explicit typed structure, not an
//! open-ended key-value bag: what a middleware may read or write is visible
//! in the type.
//!
//! Two slots are write-once by construction ([`std::sync::OnceLock`]):
//! the response status, recorded by whichever layer produces the final
//! response, and the authenticated [`Claims`], attached by the
//! authentication middleware. A second write to either is silently
//! ineffective.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Instant;

use http::StatusCode;
use uuid::Uuid;

use crate::auth::Claims;

/// Values scoped to a single dispatched request.
///
/// Shared across the middleware chain behind an `Arc`; never retained
/// beyond the request's lifetime.
#[derive(Debug)]
pub struct RequestContext {
    trace_id: Uuid,
    started_at: Instant,
    params: HashMap<String, String>,
    query: Vec<(String, String)>,
    status: OnceLock<StatusCode>,
    claims: OnceLock<Claims>,
}

impl RequestContext {
    pub(crate) fn new(params: HashMap<String, String>, raw_query: &str) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            started_at: Instant::now(),
            params,
            query: parse_query(raw_query),
            status: OnceLock::new(),
            claims: OnceLock::new(),
        }
    }

    /// The generated per-request trace identifier.
    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    /// When dispatch began.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// A named path parameter, extracted from the matched template.
    ///
    /// For a route `/users/:id`, `ctx.param("id")` on `/users/42` returns
    /// `Some("42")`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// The first query value for `key`, percent-decoded.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All query values for `key`, in order of appearance.
    pub fn query_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> {
        self.query
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Records the response status. First write wins.
    pub fn set_status(&self, status: StatusCode) {
        let _ = self.status.set(status);
    }

    /// The recorded response status, if a response has been written.
    pub fn status(&self) -> Option<StatusCode> {
        self.status.get().copied()
    }

    /// Attaches authenticated claims. First write wins.
    pub fn set_claims(&self, claims: Claims) {
        let _ = self.claims.set(claims);
    }

    /// The claims attached by the authentication middleware, if any.
    pub fn claims(&self) -> Option<&Claims> {
        self.claims.get()
    }
}

/// Splits `a=1&b=two` into decoded pairs. Keys without `=` get an empty
/// value; `+` and `%xx` escapes are decoded in both keys and values.
fn parse_query(raw: &str) -> Vec<(String, String)> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (percent_decode(k), percent_decode(v)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => match hex_pair(bytes.get(i + 1).copied(), bytes.get(i + 2).copied()) {
                Some(b) => {
                    out.push(b);
                    i += 3;
                }
                None => {
                    out.push(b'%');
                    i += 1;
                }
            },
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_pair(hi: Option<u8>, lo: Option<u8>) -> Option<u8> {
    let hi = (hi? as char).to_digit(16)? as u8;
    let lo = (lo? as char).to_digit(16)? as u8;
    Some(hi << 4 | lo)
}
