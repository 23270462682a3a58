//! # JWT Scheme
//!
//! Verifies HMAC-signed JWTs presented as `Authorization: Bearer <token>`.
//!
//! Decoded claims are turned into an identity by a validate callback. The
//! default callback builds a [`Principal`] from `sub`/`username` and `roles`;
//! applications that keep their own user records install one with
//! [`JwtScheme::with_validator`] and may return any [`Identity`] type.
//!
//! `exp` and `nbf` are enforced when present. Tokens without them are
//! accepted, as is usual for HMAC session tokens.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use http::request::Parts;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use turnstile_core::{Identity, Scheme, SchemeError};
use zeroize::Zeroizing;

use crate::bearer::bearer_token;
use crate::principal::Principal;

/// Decoded JWT claims.
pub type Claims = Map<String, Value>;

/// Maps decoded claims to an identity.
pub type ValidateFn = dyn Fn(&Claims) -> Result<Arc<dyn Identity>, SchemeError> + Send + Sync;

/// Token signing failed.
#[derive(Error, Debug)]
#[error("failed to sign token: {0}")]
pub struct IssueError(#[from] jsonwebtoken::errors::Error);

/// HMAC algorithm family accepted by [`JwtScheme`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HmacAlgorithm {
    /// HMAC-SHA256.
    #[default]
    Hs256,
    /// HMAC-SHA384.
    Hs384,
    /// HMAC-SHA512.
    Hs512,
}

impl From<HmacAlgorithm> for Algorithm {
    fn from(alg: HmacAlgorithm) -> Self {
        match alg {
            HmacAlgorithm::Hs256 => Algorithm::HS256,
            HmacAlgorithm::Hs384 => Algorithm::HS384,
            HmacAlgorithm::Hs512 => Algorithm::HS512,
        }
    }
}

/// HMAC JWT bearer-token scheme.
pub struct JwtScheme {
    algorithm: HmacAlgorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    validator: Arc<ValidateFn>,
}

impl JwtScheme {
    /// Create a scheme verifying HS256 tokens signed with `secret`.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = Zeroizing::new(secret.as_ref().to_vec());
        let algorithm = HmacAlgorithm::default();
        Self {
            algorithm,
            encoding: EncodingKey::from_secret(&secret),
            decoding: DecodingKey::from_secret(&secret),
            validation: base_validation(algorithm),
            validator: Arc::new(default_validator),
        }
    }

    /// Use a different HMAC algorithm for both signing and verification.
    pub fn with_algorithm(mut self, algorithm: HmacAlgorithm) -> Self {
        let leeway = self.validation.leeway;
        let audience = self.validation.aud.clone();
        self.algorithm = algorithm;
        self.validation = base_validation(algorithm);
        self.validation.leeway = leeway;
        if let Some(aud) = audience {
            self.validation.aud = Some(aud);
            self.validation.validate_aud = true;
        }
        self
    }

    /// Clock skew tolerated on `exp` and `nbf`, in seconds.
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.validation.leeway = seconds;
        self
    }

    /// Require the `aud` claim to contain `audience`.
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self
    }

    /// Install the callback that maps claims to an identity.
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Claims) -> Result<Arc<dyn Identity>, SchemeError> + Send + Sync + 'static,
    {
        self.validator = Arc::new(validator);
        self
    }

    /// Sign `claims` with this scheme's key.
    pub fn issue<T: Serialize>(&self, claims: &T) -> Result<String, IssueError> {
        let header = Header::new(self.algorithm.into());
        Ok(encode(&header, claims, &self.encoding)?)
    }

    /// Sign a token for `principal` valid for `ttl`.
    pub fn issue_for(&self, principal: &Principal, ttl: Duration) -> Result<String, IssueError> {
        let now = Utc::now();
        let mut claims = principal.claims.clone();
        claims.insert("sub".into(), json!(principal.subject));
        claims.insert("roles".into(), json!(principal.roles));
        claims.insert("iat".into(), json!(now.timestamp()));
        claims.insert("exp".into(), json!((now + ttl).timestamp()));
        self.issue(&claims)
    }

    fn decode(&self, token: &str) -> Result<Claims, SchemeError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                    SchemeError::Malformed(err.to_string())
                }
                ErrorKind::ExpiredSignature => SchemeError::Invalid("token expired".into()),
                ErrorKind::ImmatureSignature => SchemeError::Invalid("token not yet valid".into()),
                _ => SchemeError::Invalid(err.to_string()),
            })
    }
}

#[async_trait]
impl Scheme for JwtScheme {
    async fn verify(&self, request: &Parts) -> Result<Arc<dyn Identity>, SchemeError> {
        let token = bearer_token(request)?;
        let claims = self.decode(token)?;
        (self.validator)(&claims)
    }

    fn description(&self) -> &str {
        "HMAC JWT bearer token"
    }
}

impl fmt::Debug for JwtScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtScheme")
            .field("algorithm", &self.algorithm)
            .field("key", &"[REDACTED]")
            .field("leeway", &self.validation.leeway)
            .finish()
    }
}

fn base_validation(algorithm: HmacAlgorithm) -> Validation {
    let mut validation = Validation::new(algorithm.into());
    validation.required_spec_claims = HashSet::new();
    validation.validate_nbf = true;
    validation.validate_aud = false;
    validation
}

fn default_validator(claims: &Claims) -> Result<Arc<dyn Identity>, SchemeError> {
    Ok(Arc::new(Principal::from_claims(claims)?))
}
