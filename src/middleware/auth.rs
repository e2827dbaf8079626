//! Authentication and authorization middleware.
//!
//! Token transport is the `Authorization: Bearer <token>` header,
//! exclusively — there is no cookie fallback. One transport, checked one
//! way, at one boundary.

use std::sync::Arc;

use crate::auth::Auth;
use crate::error::WebError;
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::Middleware;
use crate::request::Request;

/// Validates the bearer token and attaches its [`Claims`](crate::Claims)
/// to the request context.
///
/// Absent, malformed or invalid tokens answer 401 without reaching the
/// handler.
pub struct Authenticate {
    auth: Arc<Auth>,
}

impl Authenticate {
    pub fn new(auth: Arc<Auth>) -> Self {
        Self { auth }
    }
}

impl Middleware for Authenticate {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let auth = Arc::clone(&self.auth);
        (move |req: Request| {
            let next = Arc::clone(&next);
            let auth = Arc::clone(&auth);
            async move {
                let token = bearer_token(&req).ok_or_else(|| {
                    WebError::unauthorized("expecting authorization header format: Bearer <token>")
                })?;

                let claims = auth
                    .validate_token(token)
                    .map_err(|e| WebError::unauthorized(e.to_string()))?;

                req.context().set_claims(claims);
                next.call(req).await
            }
        })
        .into_boxed_handler()
    }
}

/// Extracts the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively per RFC 9110 §11.1; the header
/// must be exactly two whitespace-separated parts.
fn bearer_token(req: &Request) -> Option<&str> {
    let header = req.header("authorization")?;
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Some(token),
        _ => None,
    }
}

/// Requires at least one of `roles` on the context's claims.
///
/// Claims must already be attached — a missing set means [`Authenticate`]
/// was skipped, which is a chain-ordering bug; answered 403 either way.
pub struct Authorize {
    roles: Vec<String>,
}

impl Authorize {
    pub fn new(roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { roles: roles.into_iter().map(Into::into).collect() }
    }
}

impl Middleware for Authorize {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let roles = self.roles.clone();
        (move |req: Request| {
            let next = Arc::clone(&next);
            let roles = roles.clone();
            async move {
                let required: Vec<&str> = roles.iter().map(String::as_str).collect();

                // A missing claim set means Authenticate never ran on this
                // chain — an ordering bug, but answered like any denial.
                let granted = match req.context().claims() {
                    None => {
                        return Err(WebError::forbidden(
                            "you are not authorized for that action, no claims",
                        ));
                    }
                    Some(claims) => claims.authorized(&required),
                };
                if !granted {
                    return Err(WebError::forbidden(format!(
                        "you are not authorized for that action, roles{required:?}"
                    )));
                }

                next.call(req).await
            }
        })
        .into_boxed_handler()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use bytes::Bytes;
    use chrono::Duration;
    use http::{HeaderMap, StatusCode};

    use super::*;
    use crate::auth::{Claims, ROLE_ADMIN, ROLE_USER};
    use crate::context::RequestContext;
    use crate::keystore::KeyStore;
    use crate::method::Method;
    use crate::response::Response;

    fn authority() -> Arc<Auth> {
        let keystore = Arc::new(KeyStore::new());
        keystore.generate("kid-1");
        Arc::new(Auth::new("kid-1", keystore, "plinth-test").unwrap())
    }

    fn request_with_header(value: Option<&str>) -> Request {
        let mut headers = HeaderMap::new();
        if let Some(value) = value {
            headers.insert("authorization", value.parse().unwrap());
        }
        Request::new(
            Method::Get,
            "/".to_owned(),
            headers,
            Bytes::new(),
            Arc::new(RequestContext::new(HashMap::new(), "")),
        )
    }

    fn ok_handler() -> BoxedHandler {
        (|_req: Request| async move { Ok::<_, WebError>(Response::ok()) }).into_boxed_handler()
    }

    fn assert_status(err: WebError, expected: StatusCode) {
        match err {
            WebError::Request { status, .. } => assert_eq!(status, expected),
            other => panic!("expected request error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn valid_bearer_token_attaches_claims() {
        let auth = authority();
        let claims = auth.claims("user-7", [ROLE_USER], Duration::hours(1));
        let token = auth.generate_token(&claims).unwrap();

        let seen: Arc<std::sync::Mutex<Option<Claims>>> = Arc::default();
        let inner = {
            let seen = Arc::clone(&seen);
            (move |req: Request| {
                let seen = Arc::clone(&seen);
                async move {
                    *seen.lock().unwrap() = req.context().claims().cloned();
                    Ok::<_, WebError>(Response::ok())
                }
            })
            .into_boxed_handler()
        };

        let chain = Authenticate::new(auth).wrap(inner);
        let req = request_with_header(Some(&format!("Bearer {token}")));
        chain.call(req).await.unwrap();

        let claims = seen.lock().unwrap().clone().expect("claims attached");
        assert_eq!(claims.sub, "user-7");
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let chain = Authenticate::new(authority()).wrap(ok_handler());
        let err = chain.call(request_with_header(None)).await.unwrap_err();
        assert_status(err, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_header_is_unauthorized() {
        let chain = Authenticate::new(authority()).wrap(ok_handler());
        for bad in ["Basic abc", "Bearer", "Bearer a b"] {
            let err = chain
                .call(request_with_header(Some(bad)))
                .await
                .unwrap_err();
            assert_status(err, StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn invalid_token_is_unauthorized() {
        let chain = Authenticate::new(authority()).wrap(ok_handler());
        let err = chain
            .call(request_with_header(Some("Bearer not.a.token")))
            .await
            .unwrap_err();
        assert_status(err, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn authorize_grants_on_role_intersection() {
        let chain = Authorize::new([ROLE_ADMIN]).wrap(ok_handler());
        let req = request_with_header(None);
        req.context().set_claims(Claims::new(
            "u",
            [ROLE_ADMIN, ROLE_USER],
            "iss",
            Duration::hours(1),
        ));
        assert!(chain.call(req).await.is_ok());
    }

    #[tokio::test]
    async fn authorize_denies_disjoint_roles() {
        let chain = Authorize::new([ROLE_ADMIN]).wrap(ok_handler());
        let req = request_with_header(None);
        req.context()
            .set_claims(Claims::new("u", [ROLE_USER], "iss", Duration::hours(1)));
        let err = chain.call(req).await.unwrap_err();
        assert_status(err, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn authorize_without_claims_is_forbidden() {
        let chain = Authorize::new([ROLE_ADMIN]).wrap(ok_handler());
        let err = chain.call(request_with_header(None)).await.unwrap_err();
        assert_status(err, StatusCode::FORBIDDEN);
    }
}
