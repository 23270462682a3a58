//! # Authentication Layer
//!
//! Tower [`Layer`] wrapping a single route. The wrapped service only runs
//! when the route's [`Evaluator`] admits the request; otherwise the bundler's
//! [`ErrorResponder`] renders the response and the inner service is never
//! called.

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use tower::{Layer, Service};
use turnstile_core::{ErrorResponder, Evaluator, Outcome};

use crate::metrics::AdmissionMetrics;

type BoxFuture<T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'static>>;

pub(crate) struct RouteGuard<R> {
    pub(crate) evaluator: Evaluator,
    pub(crate) responder: Arc<R>,
    pub(crate) metrics: AdmissionMetrics,
}

/// Layer produced by [`Bundler::layer`](crate::Bundler::layer).
pub struct AuthLayer<R> {
    guard: Arc<RouteGuard<R>>,
}

impl<R> AuthLayer<R> {
    pub(crate) fn new(guard: RouteGuard<R>) -> Self {
        Self {
            guard: Arc::new(guard),
        }
    }

    /// Return the evaluator guarding this route.
    pub fn evaluator(&self) -> &Evaluator {
        &self.guard.evaluator
    }
}

impl<R> Clone for AuthLayer<R> {
    fn clone(&self) -> Self {
        Self {
            guard: Arc::clone(&self.guard),
        }
    }
}

impl<R> fmt::Debug for AuthLayer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthLayer")
            .field("evaluator", &self.guard.evaluator)
            .finish_non_exhaustive()
    }
}

impl<S, R> Layer<S> for AuthLayer<R> {
    type Service = AuthService<S, R>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            guard: Arc::clone(&self.guard),
        }
    }
}

/// Service produced by [`AuthLayer`].
pub struct AuthService<S, R> {
    inner: S,
    guard: Arc<RouteGuard<R>>,
}

impl<S: Clone, R> Clone for AuthService<S, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            guard: Arc::clone(&self.guard),
        }
    }
}

impl<S, R> Service<Request<Body>> for AuthService<S, R>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    R: ErrorResponder<Response = Response> + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // The clone may not be ready; keep the one that was polled.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let guard = Arc::clone(&self.guard);

        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            match guard.evaluator.admit(&mut parts).await {
                Ok(_) => {
                    guard.metrics.record(Outcome::Allowed);
                    inner.call(Request::from_parts(parts, body)).await
                }
                Err(rejection) => {
                    guard.metrics.record(rejection.outcome());
                    Ok(guard.responder.respond(&parts, &rejection))
                }
            }
        })
    }
}
