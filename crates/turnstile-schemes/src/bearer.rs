//! `Authorization: Bearer` extraction shared by token schemes.

use http::header::AUTHORIZATION;
use http::request::Parts;
use turnstile_core::SchemeError;

/// Return the bearer token carried by `request`.
///
/// A missing header is [`SchemeError::MissingCredentials`]; any other
/// authorization scheme or an empty token is [`SchemeError::Malformed`].
pub fn bearer_token(request: &Parts) -> Result<&str, SchemeError> {
    let value = request
        .headers
        .get(AUTHORIZATION)
        .ok_or(SchemeError::MissingCredentials)?
        .to_str()
        .map_err(|_| SchemeError::Malformed("authorization header is not valid ASCII".into()))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| SchemeError::Malformed("authorization header must use Bearer scheme".into()))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(SchemeError::Malformed(
            "authorization header must use Bearer scheme".into(),
        ));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(SchemeError::Malformed("empty bearer token".into()));
    }
    Ok(token)
}
