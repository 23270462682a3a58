//! # Route Policy
//!
//! Per-route authentication configuration: the [`AuthMode`], the ordered
//! list of schemes to try, the roles that gate access, and the media types
//! the route accepts.
//!
//! A policy is plain data. It is checked against a registry when an
//! [`Evaluator`](crate::Evaluator) is built from it, so every
//! configuration mistake surfaces at route registration.
//!
//! Policies deserialize from YAML or JSON:
//!
//! ```yaml
//! mode: required
//! schemes: [jwt, apikey]
//! roles: [admin]
//! allow: [application/json]
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::content::MediaRange;
use crate::error::ConfigError;
use crate::registry::SchemeRegistry;

/// How strictly a route requires authentication.
///
/// Parsed case-insensitively, from `FromStr` and from config files alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum AuthMode {
    /// Skip verification entirely.
    None,
    /// Try to verify; admit anonymously if every scheme fails.
    Optional,
    /// Verification must succeed.
    #[default]
    Required,
}

impl AuthMode {
    /// Return the lowercase name of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Optional => "optional",
            Self::Required => "required",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "optional" => Ok(Self::Optional),
            "required" => Ok(Self::Required),
            _ => Err(ConfigError::InvalidAuthMode { value: s.to_string() }),
        }
    }
}

impl TryFrom<String> for AuthMode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Authentication requirements for one route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoutePolicy {
    /// Authentication mode. Defaults to [`AuthMode::Required`].
    pub mode: AuthMode,
    /// Schemes to try, in order. Empty means the registry's default.
    pub schemes: Vec<String>,
    /// Roles of which the identity must hold at least one. Empty disables
    /// the role gate.
    pub roles: Vec<String>,
    /// Accepted request media types. Empty accepts any.
    pub allow: Vec<String>,
}

impl RoutePolicy {
    /// A policy with the given mode and nothing else set.
    pub fn new(mode: AuthMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// A policy that requires authentication.
    pub fn required() -> Self {
        Self::new(AuthMode::Required)
    }

    /// A policy that attempts authentication but admits anonymous callers.
    pub fn optional() -> Self {
        Self::new(AuthMode::Optional)
    }

    /// A policy that disables authentication.
    pub fn none() -> Self {
        Self::new(AuthMode::None)
    }

    /// Append a scheme to try.
    pub fn scheme(mut self, name: impl Into<String>) -> Self {
        self.schemes.push(name.into());
        self
    }

    /// Append several schemes to try, in order.
    pub fn schemes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schemes.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add an accepted role.
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Add several accepted roles.
    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Add accepted request media types.
    pub fn allow<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow.extend(types.into_iter().map(Into::into));
        self
    }

    /// Validate this policy against `registry` and resolve its defaults.
    pub fn resolve(&self, registry: &SchemeRegistry) -> Result<ResolvedPolicy, ConfigError> {
        let allow = self
            .allow
            .iter()
            .map(|s| s.parse::<MediaRange>())
            .collect::<Result<Vec<_>, _>>()?;
        let roles = dedup(&self.roles);

        if self.mode == AuthMode::None {
            if !roles.is_empty() {
                return Err(ConfigError::RolesWithoutAuthentication { roles });
            }
            // Named schemes are never consulted, but a typo is still a typo.
            for name in &self.schemes {
                registry.lookup(name)?;
            }
            return Ok(ResolvedPolicy {
                mode: self.mode,
                schemes: Vec::new(),
                roles,
                allow,
            });
        }

        let schemes = if self.schemes.is_empty() {
            match registry.default_scheme() {
                Some(name) => vec![name.to_string()],
                None => return Err(ConfigError::NoSchemes { mode: self.mode }),
            }
        } else {
            dedup(&self.schemes)
        };
        for name in &schemes {
            registry.lookup(name)?;
        }

        Ok(ResolvedPolicy {
            mode: self.mode,
            schemes,
            roles,
            allow,
        })
    }
}

/// A policy whose scheme list has been resolved and checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPolicy {
    /// Authentication mode.
    pub mode: AuthMode,
    /// Effective schemes in try order; empty only for [`AuthMode::None`].
    pub schemes: Vec<String>,
    /// Accepted roles, duplicates removed.
    pub roles: Vec<String>,
    /// Accepted media ranges.
    pub allow: Vec<MediaRange>,
}

/// Drop repeated entries, keeping first occurrences in order.
fn dedup(items: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::scheme::{Scheme, SchemeError};
    use async_trait::async_trait;
    use http::request::Parts;
    use std::sync::Arc;

    struct Never;

    #[async_trait]
    impl Scheme for Never {
        async fn verify(&self, _request: &Parts) -> Result<Arc<dyn Identity>, SchemeError> {
            Err(SchemeError::MissingCredentials)
        }
    }

    fn registry_with_default() -> SchemeRegistry {
        SchemeRegistry::new()
            .with_scheme("jwt", Never)
            .with_scheme("apikey", Never)
            .with_default("jwt")
            .unwrap()
    }

    #[test]
    fn auth_mode_parsing() {
        assert_eq!("none".parse::<AuthMode>().unwrap(), AuthMode::None);
        assert_eq!(" Optional ".parse::<AuthMode>().unwrap(), AuthMode::Optional);
        assert_eq!("REQUIRED".parse::<AuthMode>().unwrap(), AuthMode::Required);
        assert_eq!(
            "sometimes".parse::<AuthMode>(),
            Err(ConfigError::InvalidAuthMode { value: "sometimes".into() })
        );
    }

    #[test]
    fn default_mode_is_required() {
        assert_eq!(AuthMode::default(), AuthMode::Required);
        assert_eq!(RoutePolicy::default().mode, AuthMode::Required);
    }

    #[test]
    fn empty_schemes_fall_back_to_default() {
        let resolved = RoutePolicy::required().resolve(&registry_with_default()).unwrap();
        assert_eq!(resolved.schemes, vec!["jwt"]);
    }

    #[test]
    fn explicit_schemes_keep_order() {
        let resolved = RoutePolicy::optional()
            .schemes(["apikey", "jwt", "apikey"])
            .resolve(&registry_with_default())
            .unwrap();
        assert_eq!(resolved.schemes, vec!["apikey", "jwt"]);
    }

    #[test]
    fn no_default_and_no_schemes_is_config_error() {
        let registry = SchemeRegistry::new().with_scheme("jwt", Never);
        assert_eq!(
            RoutePolicy::required().resolve(&registry),
            Err(ConfigError::NoSchemes { mode: AuthMode::Required })
        );
        assert_eq!(
            RoutePolicy::optional().resolve(&registry),
            Err(ConfigError::NoSchemes { mode: AuthMode::Optional })
        );
    }

    #[test]
    fn none_mode_needs_no_schemes() {
        let resolved = RoutePolicy::none().resolve(&SchemeRegistry::new()).unwrap();
        assert!(resolved.schemes.is_empty());
    }

    #[test]
    fn none_mode_with_roles_is_config_error() {
        assert_eq!(
            RoutePolicy::none().role("admin").resolve(&registry_with_default()),
            Err(ConfigError::RolesWithoutAuthentication { roles: vec!["admin".into()] })
        );
    }

    #[test]
    fn unknown_scheme_is_config_error() {
        assert_eq!(
            RoutePolicy::required().scheme("saml").resolve(&registry_with_default()),
            Err(ConfigError::UnknownScheme { name: "saml".into() })
        );
        assert_eq!(
            RoutePolicy::none().scheme("saml").resolve(&registry_with_default()),
            Err(ConfigError::UnknownScheme { name: "saml".into() })
        );
    }

    #[test]
    fn empty_scheme_name_is_config_error() {
        assert_eq!(
            RoutePolicy::required().scheme("").resolve(&registry_with_default()),
            Err(ConfigError::EmptySchemeName)
        );
    }

    #[test]
    fn invalid_allow_entry_is_config_error() {
        assert_eq!(
            RoutePolicy::none().allow(["json"]).resolve(&registry_with_default()),
            Err(ConfigError::InvalidContentType { value: "json".into() })
        );
    }

    #[test]
    fn roles_deduplicated() {
        let resolved = RoutePolicy::required()
            .roles(["user", "admin", "user"])
            .resolve(&registry_with_default())
            .unwrap();
        assert_eq!(resolved.roles, vec!["user", "admin"]);
    }

    #[test]
    fn policy_from_yaml() {
        let yaml = "mode: optional\nschemes: [apikey]\nroles: [admin]\nallow: [application/json]\n";
        let policy: RoutePolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            policy,
            RoutePolicy::optional()
                .scheme("apikey")
                .role("admin")
                .allow(["application/json"])
        );
    }

    #[test]
    fn policy_from_json_defaults() {
        let policy: RoutePolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy, RoutePolicy::required());

        let err = serde_json::from_str::<RoutePolicy>(r#"{"mode": "sometimes"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn config_mode_matches_from_str() {
        let policy: RoutePolicy = serde_yaml::from_str("mode: Required\n").unwrap();
        assert_eq!(policy.mode, AuthMode::Required);
        let policy: RoutePolicy = serde_json::from_str(r#"{"mode": " OPTIONAL "}"#).unwrap();
        assert_eq!(policy.mode, AuthMode::Optional);

        let err = serde_yaml::from_str::<RoutePolicy>("mode: sometimes\n").unwrap_err();
        assert!(err.to_string().contains("sometimes"), "got: {err}");
    }
}
