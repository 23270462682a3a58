//! # Demo Server
//!
//! A small JWT-protected API showing Turnstile wired into Axum.
//!
//! | Route | Policy | Response |
//! |---|---|---|
//! | `GET /health/liveness` | none | `ok` |
//! | `GET /health/readiness` | none | `ready` |
//! | `GET /health/metrics` | none | admission counters |
//! | `POST /token` | `none`, allow `application/json` | `{"token": "..."}` for the demo user |
//! | `GET /me` | `required`, roles `[user]`, schemes `[jwt]` | `{"username", "roles"}` |

use std::fmt;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use turnstile_core::{ConfigError, Identity, RoutePolicy, SchemeError, SchemeRegistry};
use turnstile_schemes::jwt::Claims;
use turnstile_schemes::JwtScheme;
use zeroize::Zeroizing;

use crate::bundler::Bundler;
use crate::error::ApiError;
use crate::extractors::Authenticated;
use crate::metrics::{AdmissionMetrics, MetricsSnapshot};
use crate::responder::JsonResponder;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_USER: &str = "alice";
const EPHEMERAL_SECRET_LEN: usize = 64;

/// Demo server configuration.
pub struct DemoConfig {
    /// Listen port.
    pub port: u16,
    /// HMAC key for issued and verified tokens.
    pub jwt_secret: Zeroizing<Vec<u8>>,
    /// The one user tokens are issued for.
    pub user: String,
    /// Lifetime of issued tokens.
    pub token_ttl: Duration,
}

impl DemoConfig {
    /// Configuration for `user` with an explicit secret.
    pub fn new(secret: impl Into<Vec<u8>>, user: impl Into<String>) -> Self {
        Self {
            port: DEFAULT_PORT,
            jwt_secret: Zeroizing::new(secret.into()),
            user: user.into(),
            token_ttl: Duration::hours(1),
        }
    }

    /// Read `PORT`, `TURNSTILE_JWT_SECRET` and `TURNSTILE_DEMO_USER`.
    ///
    /// Without a configured secret an ephemeral one is generated, so tokens
    /// do not survive a restart.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from `lookup`, which maps a variable name to
    /// its value. Missing, empty, or unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, default = DEFAULT_PORT, "invalid PORT, using default");
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let jwt_secret = match lookup("TURNSTILE_JWT_SECRET") {
            Some(secret) if !secret.is_empty() => Zeroizing::new(secret.into_bytes()),
            _ => {
                tracing::warn!("TURNSTILE_JWT_SECRET not set, generating an ephemeral signing key");
                ephemeral_secret()
            }
        };

        let user = lookup("TURNSTILE_DEMO_USER")
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_USER.to_string());

        Self {
            port,
            jwt_secret,
            user,
            token_ttl: Duration::hours(1),
        }
    }
}

impl fmt::Debug for DemoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemoConfig")
            .field("port", &self.port)
            .field("jwt_secret", &"[REDACTED]")
            .field("user", &self.user)
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

fn ephemeral_secret() -> Zeroizing<Vec<u8>> {
    let mut secret = Zeroizing::new(vec![0u8; EPHEMERAL_SECRET_LEN]);
    OsRng.fill_bytes(&mut secret);
    secret
}

/// Identity produced for the demo user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoUser {
    pub username: String,
    pub roles: Vec<String>,
}

impl Identity for DemoUser {
    fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    fn subject(&self) -> Option<&str> {
        Some(&self.username)
    }
}

/// Response body of `POST /token`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Clone)]
struct DemoState {
    jwt: Arc<JwtScheme>,
    user: Arc<str>,
    ttl: Duration,
    metrics: AdmissionMetrics,
}

/// Assemble the demo router.
///
/// Fails only if a route policy does not resolve against the registry.
pub fn router(config: DemoConfig) -> Result<Router, ConfigError> {
    let user: Arc<str> = Arc::from(config.user.as_str());
    let jwt = Arc::new(JwtScheme::new(config.jwt_secret.as_slice()).with_validator({
        let user = Arc::clone(&user);
        move |claims: &Claims| lookup_user(&user, claims)
    }));

    let mut registry = SchemeRegistry::new();
    registry.register_arc("jwt", jwt.clone());
    registry.set_default("jwt")?;

    let bundler = Bundler::new(registry, JsonResponder::new());
    let state = DemoState {
        jwt,
        user,
        ttl: config.token_ttl,
        metrics: bundler.metrics().clone(),
    };

    let api = Router::new()
        .route(
            "/token",
            post(issue_token).route_layer(bundler.layer(RoutePolicy::none().allow(["application/json"]))?),
        )
        .route(
            "/me",
            get(me).route_layer(bundler.layer(RoutePolicy::required().scheme("jwt").role("user"))?),
        );

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/health/metrics", get(metrics));

    Ok(Router::new()
        .merge(health)
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

fn lookup_user(user: &str, claims: &Claims) -> Result<Arc<dyn Identity>, SchemeError> {
    let username = claims
        .get("username")
        .and_then(Value::as_str)
        .ok_or_else(|| SchemeError::Malformed("token has no username claim".into()))?;
    if username != user {
        return Err(SchemeError::Invalid("user not found".into()));
    }
    Ok(Arc::new(DemoUser {
        username: username.to_string(),
        roles: vec!["user".to_string()],
    }))
}

async fn issue_token(State(state): State<DemoState>) -> Result<Json<TokenResponse>, ApiError> {
    let now = Utc::now();
    let claims = json!({
        "username": &*state.user,
        "iat": now.timestamp(),
        "exp": (now + state.ttl).timestamp(),
    });
    let token = state
        .jwt
        .issue(&claims)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    tracing::info!(user = %state.user, "issued token");
    Ok(Json(TokenResponse { token }))
}

async fn me(Authenticated(creds): Authenticated) -> Result<Json<DemoUser>, ApiError> {
    creds
        .downcast_ref::<DemoUser>()
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::Internal(format!("unexpected identity from scheme {}", creds.scheme())))
}

/// Liveness probe. Always 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe.
async fn readiness() -> &'static str {
    "ready"
}

async fn metrics(State(state): State<DemoState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
