//! # Error Responder Contract
//!
//! The evaluator decides; a responder renders. Each rejected request is
//! handed to exactly one of the four methods below, which owns the whole
//! response (status, headers, body). The same evaluator can back a JSON API
//! or an HTML app by swapping the responder.

use http::request::Parts;

use crate::error::Rejection;

/// Renders rejected requests.
pub trait ErrorResponder: Send + Sync {
    /// The response type produced for the host framework.
    type Response;

    /// No scheme produced an identity on a route that requires one.
    fn unauthorized(&self, request: &Parts, error: &Rejection) -> Self::Response;

    /// The identity holds none of the route's roles.
    fn forbidden(&self, request: &Parts, error: &Rejection) -> Self::Response;

    /// The request was malformed before verification.
    fn bad_request(&self, request: &Parts, error: &Rejection) -> Self::Response;

    /// A verifier or its infrastructure failed.
    fn server_error(&self, request: &Parts, error: &Rejection) -> Self::Response;

    /// Dispatch `rejection` to its method.
    fn respond(&self, request: &Parts, rejection: &Rejection) -> Self::Response {
        match rejection {
            Rejection::Unauthorized(_) => self.unauthorized(request, rejection),
            Rejection::Forbidden(_) => self.forbidden(request, rejection),
            Rejection::BadRequest(_) => self.bad_request(request, rejection),
            Rejection::ServerError(_) => self.server_error(request, rejection),
        }
    }
}
