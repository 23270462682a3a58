//! # turnstile-api: Axum Integration for Turnstile
//!
//! Attaches [`turnstile_core`] route policies to Axum routes.
//!
//! ## Pieces
//!
//! | Type | Module | Role |
//! |---|---|---|
//! | [`Bundler`] | [`bundler`] | Frozen registry + responder; builds one layer per route |
//! | [`AuthLayer`] / [`AuthService`] | [`layer`] | Evaluates, then calls the handler or the responder |
//! | [`JsonResponder`] | [`responder`] | Renders rejections as JSON [`ApiError`]s |
//! | [`Authenticated`] | [`extractors`] | Handler access to the admitted credentials |
//! | [`AdmissionMetrics`] | [`metrics`] | Outcome counters shared by a bundler's layers |
//!
//! ## Request flow
//!
//! ```text
//! TraceLayer → AuthLayer (content check → schemes → roles) → Handler
//!                  └─ rejected → ErrorResponder (401 / 403 / 400 / 500)
//! ```

pub mod bundler;
pub mod demo;
pub mod error;
pub mod extractors;
pub mod layer;
pub mod metrics;
pub mod responder;

pub use bundler::Bundler;
pub use error::{ApiError, ErrorBody, ErrorDetail};
pub use extractors::Authenticated;
pub use layer::{AuthLayer, AuthService};
pub use metrics::{AdmissionMetrics, MetricsSnapshot};
pub use responder::JsonResponder;
