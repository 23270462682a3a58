//! JSON rendering of rejected requests.

use axum::http::header::WWW_AUTHENTICATE;
use axum::http::request::Parts;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use turnstile_core::{ErrorResponder, Rejection};

use crate::error::ApiError;

/// Renders rejections as [`ApiError`] JSON bodies.
///
/// 401 responses carry a `WWW-Authenticate` challenge, `Bearer` unless
/// overridden with [`JsonResponder::with_challenge`].
#[derive(Debug, Clone)]
pub struct JsonResponder {
    challenge: HeaderValue,
}

impl JsonResponder {
    /// Create a responder issuing the `Bearer` challenge.
    pub fn new() -> Self {
        Self {
            challenge: HeaderValue::from_static("Bearer"),
        }
    }

    /// Replace the `WWW-Authenticate` challenge sent with 401 responses.
    pub fn with_challenge(mut self, challenge: HeaderValue) -> Self {
        self.challenge = challenge;
        self
    }
}

impl Default for JsonResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorResponder for JsonResponder {
    type Response = Response;

    fn unauthorized(&self, _request: &Parts, error: &Rejection) -> Response {
        let mut response = ApiError::from(error).into_response();
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, self.challenge.clone());
        response
    }

    fn forbidden(&self, _request: &Parts, error: &Rejection) -> Response {
        ApiError::from(error).into_response()
    }

    fn bad_request(&self, _request: &Parts, error: &Rejection) -> Response {
        ApiError::from(error).into_response()
    }

    fn server_error(&self, request: &Parts, error: &Rejection) -> Response {
        tracing::error!(
            method = %request.method,
            path = request.uri.path(),
            reason = error.message(),
            "authentication backend failure"
        );
        ApiError::from(error).into_response()
    }
}
