#![deny(missing_docs)]

//! # turnstile-core: Scheme Dispatch & Route Policy Engine
//!
//! Decides whether an HTTP request may reach its handler. The crate is
//! framework-agnostic: it works on [`http::request::Parts`] and leaves
//! response rendering to an injected [`ErrorResponder`].
//!
//! ## Pieces
//!
//! - [`Scheme`]: a named, pluggable verifier producing an [`Identity`].
//! - [`SchemeRegistry`]: name → scheme map plus a default name. Built
//!   during setup, then frozen.
//! - [`RoutePolicy`]: per-route mode (`none` / `optional` / `required`),
//!   ordered scheme list, role gate, accepted media types.
//! - [`Evaluator`]: a policy bound to its schemes; runs the admission
//!   algorithm and yields [`Credentials`] or a [`Rejection`].
//!
//! ## Crate Policy
//!
//! - Configuration mistakes are [`ConfigError`]s raised when an
//!   [`Evaluator`] is built, never per request.
//! - No global state. Several registries can coexist in one process.
//! - Schemes tell credential failures apart from infrastructure failures
//!   through [`SchemeError`]; only the latter become server errors.

pub mod content;
pub mod error;
pub mod evaluator;
pub mod identity;
pub mod policy;
pub mod registry;
pub mod responder;
pub mod scheme;

pub use content::MediaRange;
pub use error::{ConfigError, Outcome, Rejection};
pub use evaluator::Evaluator;
pub use identity::{AsAny, Credentials, Identity};
pub use policy::{AuthMode, ResolvedPolicy, RoutePolicy};
pub use registry::SchemeRegistry;
pub use responder::ErrorResponder;
pub use scheme::{Scheme, SchemeError};

/// Re-exported so scheme implementations need not depend on it directly.
pub use async_trait::async_trait;
