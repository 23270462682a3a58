//! # Evaluator: Admission Algorithm
//!
//! Applies one route's policy to one request:
//!
//! ```text
//! Init ─► ContentChecked ─┬─ mode none ─────────────────────────► Allowed (anonymous)
//!    │                    └─► try schemes in order ─┬─ success ─► RoleChecked ─► Allowed
//!    │                                              │                   └──────► Forbidden
//!    │                                              ├─ unavailable ────────────► ServerError
//!    │                                              └─► SchemesExhausted ─┬─ optional ─► Allowed (anonymous)
//!    │                                                                    └─ required ─► Unauthorized
//!    └─ content type refused ─────────────────────────────────────────────────────────► BadRequest
//! ```
//!
//! The first scheme that succeeds wins; later schemes are not consulted.
//! No state is revisited and nothing is retried within one evaluation.
//!
//! Evaluation holds no lock and spawns no task. Dropping the returned future
//! cancels whichever `verify` call is in flight.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::request::Parts;
use tracing::{debug, error, warn};

use crate::content::check_content_type;
use crate::error::{ConfigError, Outcome, Rejection};
use crate::identity::{Credentials, Identity};
use crate::policy::{AuthMode, ResolvedPolicy, RoutePolicy};
use crate::registry::SchemeRegistry;
use crate::scheme::{Scheme, SchemeError};

/// A route's policy bound to the schemes it will call.
#[derive(Clone)]
pub struct Evaluator {
    policy: ResolvedPolicy,
    schemes: Vec<(Arc<str>, Arc<dyn Scheme>)>,
    verify_timeout: Option<Duration>,
}

impl Evaluator {
    /// Check `policy` against `registry` and bind it to its schemes.
    ///
    /// Every configuration mistake is reported here, never per request.
    pub fn new(registry: &SchemeRegistry, policy: &RoutePolicy) -> Result<Self, ConfigError> {
        let policy = policy.resolve(registry)?;
        let schemes = policy
            .schemes
            .iter()
            .map(|name| Ok((Arc::from(name.as_str()), registry.lookup(name)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self {
            policy,
            schemes,
            verify_timeout: None,
        })
    }

    /// Bound each `verify` call. A call that overruns counts as a failed
    /// attempt.
    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = Some(timeout);
        self
    }

    /// The resolved policy.
    pub fn policy(&self) -> &ResolvedPolicy {
        &self.policy
    }

    /// The route's authentication mode.
    pub fn mode(&self) -> AuthMode {
        self.policy.mode
    }

    /// Decide whether `request` is admitted.
    ///
    /// `Ok(Some(_))` carries the winning scheme's credentials, `Ok(None)` an
    /// anonymous admission.
    pub async fn evaluate(&self, request: &Parts) -> Result<Option<Credentials>, Rejection> {
        let result = self.run(request).await;
        match &result {
            Ok(Some(creds)) => debug!(
                method = %request.method,
                path = request.uri.path(),
                scheme = creds.scheme(),
                subject = creds.identity().subject().unwrap_or("-"),
                outcome = %Outcome::Allowed,
                "request admitted"
            ),
            Ok(None) => debug!(
                method = %request.method,
                path = request.uri.path(),
                mode = %self.policy.mode,
                outcome = %Outcome::Allowed,
                "request admitted without credentials"
            ),
            Err(rejection @ Rejection::ServerError(_)) => error!(
                method = %request.method,
                path = request.uri.path(),
                outcome = %rejection.outcome(),
                reason = rejection.message(),
                "request evaluation failed"
            ),
            Err(rejection) => warn!(
                method = %request.method,
                path = request.uri.path(),
                outcome = %rejection.outcome(),
                reason = rejection.message(),
                "request rejected"
            ),
        }
        result
    }

    /// Evaluate `request` and record the result in its extensions.
    ///
    /// On admission, credentials left by anything upstream are replaced, or
    /// removed when the admission is anonymous.
    pub async fn admit(&self, request: &mut Parts) -> Result<Option<Credentials>, Rejection> {
        let admitted = self.evaluate(request).await?;
        match &admitted {
            Some(creds) => creds.clone().insert_into(&mut request.extensions),
            None => {
                request.extensions.remove::<Credentials>();
            }
        }
        Ok(admitted)
    }

    async fn run(&self, request: &Parts) -> Result<Option<Credentials>, Rejection> {
        check_content_type(&self.policy.allow, &request.headers)?;

        if self.policy.mode == AuthMode::None {
            return Ok(None);
        }

        let mut failures = Vec::with_capacity(self.schemes.len());
        for (name, scheme) in &self.schemes {
            match self.verify(scheme.as_ref(), request).await {
                Ok(identity) => {
                    let creds = Credentials::new(identity, Arc::clone(name));
                    self.check_roles(&creds)?;
                    return Ok(Some(creds));
                }
                Err(SchemeError::Unavailable(reason)) => {
                    return Err(Rejection::ServerError(format!(
                        "scheme \"{name}\" unavailable: {reason}"
                    )));
                }
                Err(err) => {
                    debug!(scheme = %name, error = %err, "scheme did not verify request");
                    failures.push(Failure {
                        scheme: Arc::clone(name),
                        error: err,
                    });
                }
            }
        }

        match self.policy.mode {
            AuthMode::Optional => Ok(None),
            _ => Err(Rejection::Unauthorized(FailureList(&failures).to_string())),
        }
    }

    async fn verify(
        &self,
        scheme: &dyn Scheme,
        request: &Parts,
    ) -> Result<Arc<dyn Identity>, SchemeError> {
        match self.verify_timeout {
            Some(limit) => tokio::time::timeout(limit, scheme.verify(request))
                .await
                .unwrap_or(Err(SchemeError::TimedOut)),
            None => scheme.verify(request).await,
        }
    }

    fn check_roles(&self, creds: &Credentials) -> Result<(), Rejection> {
        let roles = &self.policy.roles;
        if roles.is_empty() || roles.iter().any(|role| creds.has_role(role)) {
            return Ok(());
        }
        Err(Rejection::Forbidden(format!(
            "requires one of roles [{}]",
            roles.join(", ")
        )))
    }
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("policy", &self.policy)
            .field("verify_timeout", &self.verify_timeout)
            .finish()
    }
}

struct Failure {
    scheme: Arc<str>,
    error: SchemeError,
}

struct FailureList<'a>(&'a [Failure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("no scheme accepted the request")?;
        for (i, failure) in self.0.iter().enumerate() {
            let sep = if i == 0 { " (" } else { "; " };
            write!(f, "{sep}{}: {}", failure.scheme, failure.error)?;
        }
        if !self.0.is_empty() {
            f.write_str(")")?;
        }
        Ok(())
    }
}
