//! Minimal plinth example — JSON endpoints, auth, and health checks.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/healthz
//!   curl http://localhost:3000/users/42
//!   TOKEN=$(curl -s -X POST http://localhost:3000/login | jq -r .token)
//!   curl -H "authorization: Bearer $TOKEN" http://localhost:3000/admin/users/42
//!   curl -X DELETE http://localhost:3000/users/42

use std::sync::Arc;

use chrono::Duration;
use http::StatusCode;
use plinth::middleware::{
    Authenticate, Authorize, Errors, Logger, MetricsMiddleware, Middleware, Panics,
};
use plinth::{
    App, Auth, KeyStore, Metrics, Request, Response, ROLE_ADMIN, ROLE_USER, Server, WebError,
    health, shutdown_channel,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    // Key material would come from a secrets manager in production; a
    // generated key is enough to demo issue/verify/rotate.
    let keystore = Arc::new(KeyStore::new());
    keystore.generate("demo-key");
    let auth = Arc::new(Auth::new("demo-key", Arc::clone(&keystore), "plinth-demo").unwrap());

    let metrics = Arc::new(Metrics::new());
    let (signal, receiver) = shutdown_channel();

    // App-level middleware, outermost first. Panics goes last so it wraps
    // everything beneath the app group.
    let middleware: Vec<Arc<dyn Middleware>> = vec![
        Arc::new(Logger),
        Arc::new(Errors),
        Arc::new(MetricsMiddleware::new(Arc::clone(&metrics))),
        Arc::new(Panics),
    ];

    let authenticated: Vec<Arc<dyn Middleware>> = vec![
        Arc::new(Authenticate::new(Arc::clone(&auth))),
        Arc::new(Authorize::new([ROLE_ADMIN])),
    ];

    let login_auth = Arc::clone(&auth);
    let app = App::new(signal, middleware)
        .get("/healthz", health::liveness, &[])
        .get("/readyz", health::readiness, &[])
        .get("/users/:id", get_user, &[])
        .delete("/users/:id", delete_user, &[])
        .post(
            "/login",
            move |req: Request| login(Arc::clone(&login_auth), req),
            &[],
        )
        .get("/admin/users/:id", get_user, &authenticated);

    Server::bind("0.0.0.0:3000")
        .serve(app, receiver)
        .await
        .expect("server error");
}

// GET /users/:id
async fn get_user(req: Request) -> Result<Response, WebError> {
    let id = req.param("id").unwrap_or("unknown");
    Ok(Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#).into_bytes()))
}

// DELETE /users/:id → 204 No Content
async fn delete_user(_req: Request) -> Result<Response, WebError> {
    Ok(Response::status(StatusCode::NO_CONTENT))
}

// POST /login — issues a demo token carrying both roles.
async fn login(auth: Arc<Auth>, _req: Request) -> Result<Response, WebError> {
    let claims = auth.claims("demo-user", [ROLE_ADMIN, ROLE_USER], Duration::hours(1));
    let token = auth
        .generate_token(&claims)
        .map_err(|e| WebError::Internal(anyhow::anyhow!("issuing token: {e}")))?;
    Ok(Response::json(format!(r#"{{"token":"{token}"}}"#).into_bytes()))
}
