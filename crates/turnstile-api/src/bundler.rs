//! # Bundler
//!
//! Owns the frozen [`SchemeRegistry`], the [`ErrorResponder`], and the
//! shared [`AdmissionMetrics`]. Routes are protected by calling
//! [`Bundler::layer`] once per route at router build time; policy errors
//! surface there, before the server starts.
//!
//! ```ignore
//! let bundler = Bundler::new(registry, JsonResponder::new());
//! let app = Router::new().route(
//!     "/me",
//!     get(me).route_layer(bundler.layer(RoutePolicy::required().role("user"))?),
//! );
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::response::Response;
use tracing::info;
use turnstile_core::{ConfigError, ErrorResponder, Evaluator, RoutePolicy, SchemeRegistry};

use crate::layer::{AuthLayer, RouteGuard};
use crate::metrics::AdmissionMetrics;

/// Builds per-route [`AuthLayer`]s against one registry and responder.
pub struct Bundler<R> {
    registry: Arc<SchemeRegistry>,
    responder: Arc<R>,
    metrics: AdmissionMetrics,
    verify_timeout: Option<Duration>,
}

impl<R> Bundler<R>
where
    R: ErrorResponder<Response = Response> + 'static,
{
    /// Freeze `registry` and pair it with `responder`.
    pub fn new(registry: SchemeRegistry, responder: R) -> Self {
        Self::from_frozen(registry.freeze(), responder)
    }

    /// Use an already frozen registry, e.g. one shared by several bundlers.
    pub fn from_frozen(registry: Arc<SchemeRegistry>, responder: R) -> Self {
        Self {
            registry,
            responder: Arc::new(responder),
            metrics: AdmissionMetrics::new(),
            verify_timeout: None,
        }
    }

    /// Bound every scheme verification in layers built afterwards.
    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = Some(timeout);
        self
    }

    /// Record outcomes into `metrics` instead of a private instance.
    pub fn with_metrics(mut self, metrics: AdmissionMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// The frozen registry.
    pub fn registry(&self) -> &SchemeRegistry {
        &self.registry
    }

    /// Counters shared by every layer this bundler builds.
    pub fn metrics(&self) -> &AdmissionMetrics {
        &self.metrics
    }

    /// Build the evaluator for `policy` without wrapping it in a layer.
    pub fn evaluator(&self, policy: &RoutePolicy) -> Result<Evaluator, ConfigError> {
        let evaluator = Evaluator::new(&self.registry, policy)?;
        Ok(match self.verify_timeout {
            Some(timeout) => evaluator.with_verify_timeout(timeout),
            None => evaluator,
        })
    }

    /// Validate `policy` and return the layer enforcing it.
    pub fn layer(&self, policy: RoutePolicy) -> Result<AuthLayer<R>, ConfigError> {
        let evaluator = self.evaluator(&policy)?;
        let resolved = evaluator.policy();
        info!(
            mode = %resolved.mode,
            schemes = ?resolved.schemes,
            roles = ?resolved.roles,
            "route policy attached"
        );
        Ok(AuthLayer::new(RouteGuard {
            evaluator,
            responder: Arc::clone(&self.responder),
            metrics: self.metrics.clone(),
        }))
    }
}
