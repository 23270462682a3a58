//! # Error Hierarchy
//!
//! Two families of errors with different lifetimes:
//!
//! - [`ConfigError`] is raised while routes are being set up. It must stop
//!   the server from starting and is never deferred to request handling.
//! - [`Rejection`] is the terminal outcome of one request's evaluation. It is
//!   handed to an [`ErrorResponder`](crate::ErrorResponder) and never
//!   propagated past the evaluator.

use std::fmt;

use thiserror::Error;

use crate::policy::AuthMode;

/// Setup-time configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A policy or `set_default` call named a scheme that is not registered.
    #[error("unknown authentication scheme: \"{name}\"")]
    UnknownScheme {
        /// The scheme name that failed to resolve.
        name: String,
    },

    /// A scheme name was the empty string.
    #[error("authentication scheme names must not be empty")]
    EmptySchemeName,

    /// The route lists no schemes and the registry has no default.
    #[error("route requires authentication (mode \"{mode}\") but names no schemes and no default scheme is set")]
    NoSchemes {
        /// The route's authentication mode.
        mode: AuthMode,
    },

    /// The route disables authentication but still declares required roles.
    #[error("route disables authentication but requires roles {roles:?}")]
    RolesWithoutAuthentication {
        /// The roles that could never be checked.
        roles: Vec<String>,
    },

    /// An `allow` entry is not a `type/subtype` media range.
    #[error("invalid content type in allow list: \"{value}\" (expected type/subtype)")]
    InvalidContentType {
        /// The offending entry.
        value: String,
    },

    /// An authentication mode string did not parse.
    #[error("invalid auth mode: \"{value}\" (expected none, optional, or required)")]
    InvalidAuthMode {
        /// The offending input.
        value: String,
    },
}

/// The kind of a request's terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The wrapped handler runs.
    Allowed,
    /// No scheme produced an identity on a route that requires one.
    Unauthorized,
    /// An identity was produced but holds none of the required roles.
    Forbidden,
    /// The request was malformed before any scheme was consulted.
    BadRequest,
    /// A verifier or its infrastructure failed.
    ServerError,
}

impl Outcome {
    /// Return the snake_case label of this outcome, suitable for log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::BadRequest => "bad_request",
            Self::ServerError => "server_error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request that the evaluator refused to admit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Every scheme failed on a route with [`AuthMode::Required`].
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The verified identity holds none of the route's roles.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The request was malformed before verification.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A scheme could not reach its backing infrastructure.
    #[error("server error: {0}")]
    ServerError(String),
}

impl Rejection {
    /// Return the outcome kind of this rejection.
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Unauthorized(_) => Outcome::Unauthorized,
            Self::Forbidden(_) => Outcome::Forbidden,
            Self::BadRequest(_) => Outcome::BadRequest,
            Self::ServerError(_) => Outcome::ServerError,
        }
    }

    /// Return the message without the outcome prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Unauthorized(m) | Self::Forbidden(m) | Self::BadRequest(m) | Self::ServerError(m) => m,
        }
    }
}
