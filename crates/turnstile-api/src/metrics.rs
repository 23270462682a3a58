//! # Admission Metrics
//!
//! In-process atomic counters, one per admission outcome. Every layer a
//! [`Bundler`](crate::Bundler) produces shares one instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use turnstile_core::Outcome;

#[derive(Debug, Default)]
struct Counters {
    allowed: AtomicU64,
    unauthorized: AtomicU64,
    forbidden: AtomicU64,
    bad_request: AtomicU64,
    server_error: AtomicU64,
}

/// Shared admission counters.
#[derive(Debug, Clone, Default)]
pub struct AdmissionMetrics {
    counters: Arc<Counters>,
}

/// Point-in-time copy of [`AdmissionMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub allowed: u64,
    pub unauthorized: u64,
    pub forbidden: u64,
    pub bad_request: u64,
    pub server_error: u64,
}

impl MetricsSnapshot {
    /// Total number of evaluated requests.
    pub fn total(&self) -> u64 {
        self.allowed + self.unauthorized + self.forbidden + self.bad_request + self.server_error
    }
}

impl AdmissionMetrics {
    /// Create a zeroed metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request with the given outcome.
    pub fn record(&self, outcome: Outcome) {
        self.counter(outcome).fetch_add(1, Ordering::Relaxed);
    }

    /// Return the count for `outcome`.
    pub fn count(&self, outcome: Outcome) -> u64 {
        self.counter(outcome).load(Ordering::Relaxed)
    }

    /// Return current allowed count.
    pub fn allowed(&self) -> u64 {
        self.count(Outcome::Allowed)
    }

    /// Return current unauthorized count.
    pub fn unauthorized(&self) -> u64 {
        self.count(Outcome::Unauthorized)
    }

    /// Return current forbidden count.
    pub fn forbidden(&self) -> u64 {
        self.count(Outcome::Forbidden)
    }

    /// Return current bad-request count.
    pub fn bad_request(&self) -> u64 {
        self.count(Outcome::BadRequest)
    }

    /// Return current server-error count.
    pub fn server_error(&self) -> u64 {
        self.count(Outcome::ServerError)
    }

    /// Copy all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            allowed: self.allowed(),
            unauthorized: self.unauthorized(),
            forbidden: self.forbidden(),
            bad_request: self.bad_request(),
            server_error: self.server_error(),
        }
    }

    fn counter(&self, outcome: Outcome) -> &AtomicU64 {
        let c = &self.counters;
        match outcome {
            Outcome::Allowed => &c.allowed,
            Outcome::Unauthorized => &c.unauthorized,
            Outcome::Forbidden => &c.forbidden,
            Outcome::BadRequest => &c.bad_request,
            Outcome::ServerError => &c.server_error,
        }
    }
}
