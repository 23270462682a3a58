//! # Integration Tests for turnstile-api
//!
//! Drives the demo router and purpose-built routers through
//! `tower::ServiceExt::oneshot`: token issuance, protected routes, role
//! gates, optional authentication, content checks, backend failures, and
//! responder dispatch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use turnstile_api::demo::{self, DemoConfig, TokenResponse};
use turnstile_api::{Authenticated, Bundler, ErrorBody, JsonResponder};
use turnstile_core::{async_trait, ErrorResponder, Identity, Rejection, RoutePolicy, Scheme, SchemeError, SchemeRegistry};
use turnstile_schemes::{JwtScheme, Principal};

const SECRET: &[u8] = b"integration-test-secret";

/// Helper: build the demo app for `alice`.
fn demo_app() -> Router {
    demo::router(DemoConfig::new(SECRET, "alice")).unwrap()
}

/// Helper: read response body as string.
async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Helper: read response body as JSON.
async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn fetch_token(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::post("/token")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let token: TokenResponse = serde_json::from_slice(&bytes).unwrap();
    token.token
}

fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::get(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let response = demo_app()
        .oneshot(Request::get("/health/liveness").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_readiness_probe() {
    let response = demo_app()
        .oneshot(Request::get("/health/readiness").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ready");
}

// -- Demo: token issuance and /me ---------------------------------------------

#[tokio::test]
async fn test_token_then_me() {
    let app = demo_app();
    let token = fetch_token(&app).await;

    let response = app.oneshot(get_with_bearer("/me", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["username"], "alice");
    assert_eq!(body["roles"], serde_json::json!(["user"]));
}

#[tokio::test]
async fn test_token_without_body_is_allowed() {
    let response = demo_app()
        .oneshot(Request::post("/token").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_token_with_disallowed_content_type() {
    let response = demo_app()
        .oneshot(
            Request::post("/token")
                .header(CONTENT_TYPE, "text/plain")
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_token_with_non_ascii_content_type() {
    let response = demo_app()
        .oneshot(
            Request::post("/token")
                .header(CONTENT_TYPE, HeaderValue::from_bytes(b"application/json\xff").unwrap())
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_me_without_token() {
    let response = demo_app()
        .oneshot(Request::get("/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.error.code, "UNAUTHORIZED");
}

#[tokio::test]
async fn test_me_with_foreign_signature() {
    let foreign = demo::router(DemoConfig::new(b"some-other-secret".to_vec(), "alice")).unwrap();
    let token = fetch_token(&foreign).await;

    let response = demo_app().oneshot(get_with_bearer("/me", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_with_unknown_user() {
    let bob = demo::router(DemoConfig::new(SECRET, "bob")).unwrap();
    let token = fetch_token(&bob).await;

    let response = demo_app().oneshot(get_with_bearer("/me", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_with_garbage_token() {
    let response = demo_app()
        .oneshot(get_with_bearer("/me", "not.a.jwt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_metrics_count_outcomes() {
    let app = demo_app();
    let token = fetch_token(&app).await;
    app.clone().oneshot(get_with_bearer("/me", &token)).await.unwrap();
    app.clone()
        .oneshot(Request::get("/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let response = app
        .oneshot(Request::get("/health/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    // /token and the first /me
    assert_eq!(body["allowed"], 2);
    assert_eq!(body["unauthorized"], 1);
    assert_eq!(body["forbidden"], 0);
}

// -- Custom routers -----------------------------------------------------------

/// Reads `x-user` and comma-separated `x-roles`; `x-user: down` simulates an
/// unreachable backend.
struct HeaderScheme;

#[async_trait]
impl Scheme for HeaderScheme {
    async fn verify(&self, request: &Parts) -> Result<Arc<dyn Identity>, SchemeError> {
        let user = request
            .headers
            .get("x-user")
            .ok_or(SchemeError::MissingCredentials)?
            .to_str()
            .map_err(|e| SchemeError::Malformed(e.to_string()))?;
        if user == "down" {
            return Err(SchemeError::Unavailable("user directory unreachable".into()));
        }
        let roles = request
            .headers
            .get("x-roles")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let principal = Principal::new(user).with_roles(roles.split(',').filter(|r| !r.is_empty()));
        Ok(Arc::new(principal))
    }

    fn description(&self) -> &str {
        "test header scheme"
    }
}

/// Wraps [`JsonResponder`] and counts calls.
#[derive(Clone, Default)]
struct CountingResponder {
    calls: Arc<AtomicUsize>,
}

impl CountingResponder {
    fn bump(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl ErrorResponder for CountingResponder {
    type Response = Response;

    fn unauthorized(&self, request: &Parts, error: &Rejection) -> Response {
        self.bump();
        JsonResponder::new().unauthorized(request, error)
    }

    fn forbidden(&self, request: &Parts, error: &Rejection) -> Response {
        self.bump();
        JsonResponder::new().forbidden(request, error)
    }

    fn bad_request(&self, request: &Parts, error: &Rejection) -> Response {
        self.bump();
        JsonResponder::new().bad_request(request, error)
    }

    fn server_error(&self, request: &Parts, error: &Rejection) -> Response {
        self.bump();
        JsonResponder::new().server_error(request, error)
    }
}

struct Harness {
    app: Router,
    handler_hits: Arc<AtomicUsize>,
    responder_calls: Arc<AtomicUsize>,
}

async fn whoami(creds: Option<Authenticated>) -> String {
    match creds {
        Some(creds) => creds.identity().subject().unwrap_or("-").to_string(),
        None => "anonymous".to_string(),
    }
}

fn harness(policy: RoutePolicy) -> Harness {
    let registry = SchemeRegistry::new().with_scheme("header", HeaderScheme);
    let responder = CountingResponder::default();
    let responder_calls = Arc::clone(&responder.calls);
    let bundler = Bundler::new(registry, responder);

    let handler_hits = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&handler_hits);
    let app = Router::new()
        .route(
            "/guarded",
            get(move |creds: Option<Authenticated>| {
                hits.fetch_add(1, Ordering::SeqCst);
                whoami(creds)
            }),
        )
        .route_layer(bundler.layer(policy).unwrap());

    Harness {
        app,
        handler_hits,
        responder_calls,
    }
}

fn guarded(headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::get("/guarded");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_required_allows_and_injects_identity() {
    let h = harness(RoutePolicy::required().scheme("header"));
    let response = h.app.oneshot(guarded(&[("x-user", "carol")])).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "carol");
    assert_eq!(h.handler_hits.load(Ordering::SeqCst), 1);
    assert_eq!(h.responder_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rejection_calls_responder_once_and_skips_handler() {
    let h = harness(RoutePolicy::required().scheme("header"));
    let response = h.app.oneshot(guarded(&[])).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(h.handler_hits.load(Ordering::SeqCst), 0);
    assert_eq!(h.responder_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_role_is_forbidden() {
    let h = harness(RoutePolicy::required().scheme("header").roles(["admin", "ops"]));
    let response = h
        .app
        .oneshot(guarded(&[("x-user", "carol"), ("x-roles", "user")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(h.handler_hits.load(Ordering::SeqCst), 0);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_any_listed_role_is_enough() {
    let h = harness(RoutePolicy::required().scheme("header").roles(["admin", "ops"]));
    let response = h
        .app
        .oneshot(guarded(&[("x-user", "carol"), ("x-roles", "user,ops")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_optional_without_credentials_is_anonymous() {
    let h = harness(RoutePolicy::optional().scheme("header"));
    let response = h.app.oneshot(guarded(&[])).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "anonymous");
    assert_eq!(h.responder_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_optional_with_credentials_still_checks_roles() {
    let h = harness(RoutePolicy::optional().scheme("header").role("admin"));
    let response = h.app.oneshot(guarded(&[("x-user", "carol")])).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_backend_failure_is_server_error_without_detail() {
    let h = harness(RoutePolicy::required().scheme("header"));
    let response = h.app.oneshot(guarded(&[("x-user", "down")])).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_string(response).await;
    assert!(!body.contains("unreachable"), "leaked internal detail: {body}");
    assert_eq!(h.handler_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_none_mode_ignores_credentials() {
    let h = harness(RoutePolicy::none());
    let response = h.app.oneshot(guarded(&[("x-user", "carol")])).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "anonymous");
}

#[tokio::test]
async fn test_first_successful_scheme_wins() {
    let jwt = JwtScheme::new(SECRET);
    let token = jwt
        .issue_for(&Principal::new("dave"), chrono::Duration::minutes(5))
        .unwrap();

    let mut registry = SchemeRegistry::new();
    registry.register("jwt", jwt).register("header", HeaderScheme);
    let bundler = Bundler::new(registry, JsonResponder::new());
    let app = Router::new()
        .route(
            "/guarded",
            get(|Authenticated(creds): Authenticated| async move { creds.scheme().to_string() }),
        )
        .route_layer(bundler.layer(RoutePolicy::required().schemes(["jwt", "header"])).unwrap());

    // JWT fails (absent), header succeeds.
    let response = app.clone().oneshot(guarded(&[("x-user", "carol")])).await.unwrap();
    assert_eq!(body_string(response).await, "header");

    // Both present: jwt is listed first.
    let request = Request::get("/guarded")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .header("x-user", "carol")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(body_string(response).await, "jwt");
}

#[tokio::test]
async fn test_reregistration_replaces_scheme() {
    let mut registry = SchemeRegistry::new();
    registry.register("auth", JwtScheme::new(SECRET));
    registry.register("auth", HeaderScheme);
    let bundler = Bundler::new(registry, JsonResponder::new());
    let app = Router::new()
        .route("/guarded", get(whoami))
        .route_layer(bundler.layer(RoutePolicy::required().scheme("auth")).unwrap());

    let response = app.oneshot(guarded(&[("x-user", "erin")])).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "erin");
}
