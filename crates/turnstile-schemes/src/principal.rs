//! # Principal
//!
//! The identity both bundled schemes produce: a subject, a role set, and the
//! claims the credential carried.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use turnstile_core::{Identity, SchemeError};

/// A verified subject with roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Subject identifier, e.g. a username or key owner.
    pub subject: String,
    /// Roles held by the subject.
    #[serde(default)]
    pub roles: BTreeSet<String>,
    /// Remaining claims from the credential.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub claims: Map<String, Value>,
}

impl Principal {
    /// Create a principal with no roles.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            roles: BTreeSet::new(),
            claims: Map::new(),
        }
    }

    /// Grant a role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Grant several roles.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Attach a claim.
    pub fn with_claim(mut self, key: impl Into<String>, value: Value) -> Self {
        self.claims.insert(key.into(), value);
        self
    }

    /// Build a principal from decoded token claims.
    ///
    /// The subject comes from `sub`, falling back to `username`. Roles come
    /// from `roles`, either a string array or a space-separated string.
    pub fn from_claims(claims: &Map<String, Value>) -> Result<Self, SchemeError> {
        let subject = ["sub", "username"]
            .iter()
            .find_map(|key| claims.get(*key).and_then(Value::as_str).filter(|s| !s.is_empty()))
            .ok_or_else(|| SchemeError::Invalid("token carries no subject".into()))?;

        let roles = match claims.get("roles") {
            None | Some(Value::Null) => BTreeSet::new(),
            Some(Value::String(s)) => s.split_whitespace().map(String::from).collect(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(String::from)
                        .ok_or_else(|| SchemeError::Malformed("roles must be strings".into()))
                })
                .collect::<Result<BTreeSet<String>, SchemeError>>()?,
            Some(_) => {
                return Err(SchemeError::Malformed(
                    "roles must be a string or an array of strings".into(),
                ))
            }
        };

        Ok(Self {
            subject: subject.to_string(),
            roles,
            claims: claims.clone(),
        })
    }
}

impl Identity for Principal {
    fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    fn subject(&self) -> Option<&str> {
        Some(&self.subject)
    }
}
