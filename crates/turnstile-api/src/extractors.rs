//! # Credential Extractors
//!
//! Handlers behind an [`AuthLayer`](crate::AuthLayer) read the admitted
//! identity with [`Authenticated`]:
//!
//! ```ignore
//! async fn me(Authenticated(creds): Authenticated) -> Result<Json<Me>, ApiError> {
//!     let user = creds.downcast_ref::<User>().ok_or_else(|| ...)?;
//!     ...
//! }
//! ```
//!
//! `Option<Authenticated>` never rejects and is the natural choice on
//! `optional` routes.

use std::convert::Infallible;
use std::ops::Deref;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use turnstile_core::Credentials;

use crate::error::ApiError;

/// Credentials of the admitted request.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Credentials);

impl Authenticated {
    /// Unwrap the inner credentials.
    pub fn into_inner(self) -> Credentials {
        self.0
    }
}

impl Deref for Authenticated {
    type Target = Credentials;

    fn deref(&self) -> &Credentials {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Credentials::from_extensions(&parts.extensions)
            .cloned()
            .map(Self)
            .ok_or_else(|| ApiError::Unauthorized("request carries no credentials".into()))
    }
}

impl<S> OptionalFromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Option<Self>, Self::Rejection> {
        Ok(Credentials::from_extensions(&parts.extensions).cloned().map(Self))
    }
}
