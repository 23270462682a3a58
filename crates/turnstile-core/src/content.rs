//! # Content-Type Gate
//!
//! Routes may restrict the media types their request bodies use. The check
//! runs before any scheme and only looks at headers, so a request rejected
//! here never reaches a verifier.

use std::fmt;
use std::str::FromStr;

use http::header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use http::HeaderMap;

use crate::error::{ConfigError, Rejection};

/// A `type/subtype` media range where either part may be `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaRange {
    ty: String,
    subtype: String,
}

impl MediaRange {
    /// Whether the media type `ty/subtype` falls inside this range.
    pub fn matches(&self, ty: &str, subtype: &str) -> bool {
        (self.ty == "*" || self.ty.eq_ignore_ascii_case(ty))
            && (self.subtype == "*" || self.subtype.eq_ignore_ascii_case(subtype))
    }
}

impl FromStr for MediaRange {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidContentType { value: s.to_string() };
        let (ty, subtype) = split_media_type(s).ok_or_else(invalid)?;
        if ty == "*" && subtype != "*" {
            return Err(invalid());
        }
        Ok(Self {
            ty: ty.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
        })
    }
}

impl fmt::Display for MediaRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ty, self.subtype)
    }
}

/// Split `type/subtype; params` into its type and subtype.
fn split_media_type(value: &str) -> Option<(&str, &str)> {
    let essence = value.split(';').next()?.trim();
    let (ty, subtype) = essence.split_once('/')?;
    let (ty, subtype) = (ty.trim(), subtype.trim());
    let token = |t: &str| !t.is_empty() && t.bytes().all(|b| b.is_ascii_graphic() && b != b'/');
    if token(ty) && token(subtype) {
        Some((ty, subtype))
    } else {
        None
    }
}

/// Whether the request head announces a body.
fn declares_body(headers: &HeaderMap) -> bool {
    if headers.contains_key(TRANSFER_ENCODING) {
        return true;
    }
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(false, |len| len > 0)
}

/// Check the request's `Content-Type` against `allow`.
///
/// An empty `allow` accepts everything. A body-less request without a
/// `Content-Type` passes.
pub fn check_content_type(allow: &[MediaRange], headers: &HeaderMap) -> Result<(), Rejection> {
    if allow.is_empty() {
        return Ok(());
    }

    let Some(value) = headers.get(CONTENT_TYPE) else {
        if declares_body(headers) {
            return Err(Rejection::BadRequest("missing content type".into()));
        }
        return Ok(());
    };

    let value = value
        .to_str()
        .map_err(|_| Rejection::BadRequest("content type is not valid ASCII".into()))?;
    let (ty, subtype) = split_media_type(value)
        .ok_or_else(|| Rejection::BadRequest(format!("malformed content type \"{value}\"")))?;

    if allow.iter().any(|range| range.matches(ty, subtype)) {
        Ok(())
    } else {
        Err(Rejection::BadRequest(format!(
            "content type \"{ty}/{subtype}\" is not accepted by this route"
        )))
    }
}
