//! # Scheme Contract
//!
//! A scheme is a named, pluggable verifier. It inspects the request head and
//! either produces an [`Identity`] or explains why it could not.
//!
//! Schemes are shared across every concurrent request, so implementations
//! must be `Send + Sync` and keep no per-request mutable state. `verify` is
//! async: a scheme that calls a remote credential store awaits it instead of
//! blocking the runtime.

use std::sync::Arc;

use async_trait::async_trait;
use http::request::Parts;
use thiserror::Error;

use crate::identity::Identity;

/// Why a scheme did not produce an identity.
///
/// Every variant except [`Unavailable`] counts as a failed attempt; the
/// evaluator moves on to the next scheme. [`Unavailable`]
/// means the scheme could not decide at all and ends evaluation with a
/// server error.
///
/// [`Unavailable`]: SchemeError::Unavailable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemeError {
    /// The request carries no credential this scheme understands.
    #[error("no credentials presented")]
    MissingCredentials,

    /// A credential was presented but is wrong, expired, or revoked.
    #[error("invalid credentials: {0}")]
    Invalid(String),

    /// A credential was presented but could not be parsed.
    #[error("malformed credentials: {0}")]
    Malformed(String),

    /// Verification did not finish before the evaluator's deadline.
    #[error("verification timed out")]
    TimedOut,

    /// The scheme's backing infrastructure failed.
    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}

impl SchemeError {
    /// Whether this failure should end evaluation with a server error.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// A credential verifier.
#[async_trait]
pub trait Scheme: Send + Sync {
    /// Verify the credentials carried by `request`.
    async fn verify(&self, request: &Parts) -> Result<Arc<dyn Identity>, SchemeError>;

    /// Short description for logs.
    fn description(&self) -> &str {
        "authentication scheme"
    }
}
