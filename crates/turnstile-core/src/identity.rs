//! # Identity & Credentials
//!
//! An [`Identity`] is whatever a scheme produces on successful verification:
//! a user record, a token's claims, a service account. The evaluator only
//! needs one capability from it, role membership.
//!
//! [`Credentials`] is the request-scoped handle the evaluator stores in the
//! request's extensions after admission. Handlers read it back through
//! [`Credentials::from_extensions`] and recover their concrete identity type
//! with [`Credentials::downcast_ref`], which returns `None` on a type
//! mismatch instead of panicking.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use http::Extensions;

/// Upcast helper so `dyn Identity` can be downcast to its concrete type.
///
/// Implemented for every `'static` type; never implement it by hand.
pub trait AsAny {
    /// Return `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A verified principal.
pub trait Identity: AsAny + fmt::Debug + Send + Sync {
    /// Whether this identity holds `role`.
    fn has_role(&self, role: &str) -> bool;

    /// Stable identifier of the principal, when the scheme has one. Used in
    /// log fields only.
    fn subject(&self) -> Option<&str> {
        None
    }
}

/// Verified credentials attached to an admitted request.
#[derive(Clone)]
pub struct Credentials {
    identity: Arc<dyn Identity>,
    scheme: Arc<str>,
}

impl Credentials {
    /// Wrap an identity produced by the scheme registered as `scheme`.
    pub fn new(identity: Arc<dyn Identity>, scheme: impl Into<Arc<str>>) -> Self {
        Self {
            identity,
            scheme: scheme.into(),
        }
    }

    /// Name of the scheme that produced this identity.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The identity as a trait object.
    pub fn identity(&self) -> &dyn Identity {
        self.identity.as_ref()
    }

    /// Shared handle to the identity.
    pub fn identity_arc(&self) -> Arc<dyn Identity> {
        Arc::clone(&self.identity)
    }

    /// Whether the identity holds `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.identity.has_role(role)
    }

    /// The identity as its concrete type, or `None` if it is some other type.
    pub fn downcast_ref<T: Identity + 'static>(&self) -> Option<&T> {
        let any: &dyn Any = AsAny::as_any(self.identity.as_ref());
        any.downcast_ref::<T>()
    }

    /// Look up the credentials an evaluator stored in `extensions`.
    ///
    /// Returns `None` when the route's mode was `none`, or `optional` and no
    /// scheme succeeded.
    pub fn from_extensions(extensions: &Extensions) -> Option<&Credentials> {
        extensions.get::<Credentials>()
    }

    /// Store these credentials in `extensions`, replacing any earlier value.
    pub fn insert_into(self, extensions: &mut Extensions) {
        extensions.insert(self);
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("scheme", &self.scheme)
            .field("identity", &self.identity)
            .finish()
    }
}
