//! # Scheme Registry
//!
//! Maps scheme names to verifiers and designates one name as the default.
//!
//! The registry is built during setup and then frozen: an
//! [`Evaluator`](crate::Evaluator) takes it by `Arc`, after which nothing can
//! mutate it. Request handling reads it without locking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::error::ConfigError;
use crate::scheme::Scheme;

/// Name → scheme mapping with an optional default.
#[derive(Default)]
pub struct SchemeRegistry {
    schemes: HashMap<String, Arc<dyn Scheme>>,
    default: Option<String>,
}

impl SchemeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `scheme` under `name`, replacing any scheme already there.
    ///
    /// Names are case-sensitive.
    pub fn register<S: Scheme + 'static>(&mut self, name: impl Into<String>, scheme: S) -> &mut Self {
        self.register_arc(name, Arc::new(scheme))
    }

    /// Register an already shared scheme under `name`.
    pub fn register_arc(&mut self, name: impl Into<String>, scheme: Arc<dyn Scheme>) -> &mut Self {
        let name = name.into();
        info!(
            scheme = %name,
            description = scheme.description(),
            replaced = self.schemes.contains_key(&name),
            "registered authentication scheme"
        );
        self.schemes.insert(name, scheme);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_scheme<S: Scheme + 'static>(mut self, name: impl Into<String>, scheme: S) -> Self {
        self.register(name, scheme);
        self
    }

    /// Designate the scheme used by routes that name none.
    pub fn set_default(&mut self, name: &str) -> Result<(), ConfigError> {
        if name.is_empty() {
            return Err(ConfigError::EmptySchemeName);
        }
        if !self.schemes.contains_key(name) {
            return Err(ConfigError::UnknownScheme { name: name.to_string() });
        }
        info!(scheme = %name, "default authentication scheme set");
        self.default = Some(name.to_string());
        Ok(())
    }

    /// Builder-style [`set_default`](Self::set_default).
    pub fn with_default(mut self, name: &str) -> Result<Self, ConfigError> {
        self.set_default(name)?;
        Ok(self)
    }

    /// Resolve `name` to its scheme.
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Scheme>, ConfigError> {
        if name.is_empty() {
            return Err(ConfigError::EmptySchemeName);
        }
        self.schemes
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownScheme { name: name.to_string() })
    }

    /// Whether a scheme is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.schemes.contains_key(name)
    }

    /// The default scheme name, if one was set.
    pub fn default_scheme(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Registered scheme names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered schemes.
    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    /// Whether no scheme is registered.
    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }

    /// Freeze the registry for serving.
    pub fn freeze(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl fmt::Debug for SchemeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeRegistry")
            .field("schemes", &self.names())
            .field("default", &self.default)
            .finish()
    }
}
