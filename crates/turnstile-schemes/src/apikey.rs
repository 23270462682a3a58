//! # API Key Scheme
//!
//! Reads an API key from a request header, hashes it with SHA-256, and
//! resolves the digest through an [`ApiKeyStore`]. Plaintext keys are never
//! stored.
//!
//! A store that cannot be reached reports [`StoreError::Unavailable`], which
//! the evaluator turns into a server error rather than an unauthorized
//! response.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::header::HeaderName;
use http::request::Parts;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::debug;
use turnstile_core::{Identity, Scheme, SchemeError};

use crate::principal::Principal;

/// Default header carrying the key.
pub const DEFAULT_HEADER: &str = "x-api-key";

/// SHA-256 digest of an API key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyDigest([u8; 32]);

impl KeyDigest {
    /// Digest a plaintext key.
    pub fn of(key: &str) -> Self {
        Self(Sha256::digest(key.as_bytes()).into())
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    fn ct_eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl fmt::Debug for KeyDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyDigest({})", &self.to_hex()[..12])
    }
}

/// What a store knows about one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    /// Public identifier of the key, safe to log.
    pub key_id: String,
    /// Principal the key acts as.
    pub owner: String,
    /// Roles granted to requests bearing the key.
    #[serde(default)]
    pub roles: BTreeSet<String>,
    /// Revoked keys are refused.
    #[serde(default)]
    pub revoked: bool,
    /// Keys past this instant are refused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiKeyRecord {
    /// Create an active, non-expiring record.
    pub fn new(key_id: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            owner: owner.into(),
            roles: BTreeSet::new(),
            revoked: false,
            expires_at: None,
        }
    }

    /// Grant roles.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Set an expiry.
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    fn is_expired(&self) -> bool {
        self.expires_at.map_or(false, |exp| exp <= Utc::now())
    }
}

/// Key store failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or answered with an error.
    #[error("api key store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for SchemeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => SchemeError::Unavailable(reason),
        }
    }
}

/// Backend resolving key digests to records.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Look up `digest`. `Ok(None)` means the key is unknown.
    async fn find(&self, digest: &KeyDigest) -> Result<Option<ApiKeyRecord>, StoreError>;

    /// Short description for logs.
    fn description(&self) -> &str {
        "api key store"
    }
}

/// Process-local key store.
#[derive(Default)]
pub struct InMemoryApiKeyStore {
    keys: RwLock<Vec<(KeyDigest, ApiKeyRecord)>>,
}

impl InMemoryApiKeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record` under the digest of `key`, replacing an earlier entry.
    pub fn insert(&self, key: &str, record: ApiKeyRecord) {
        let digest = KeyDigest::of(key);
        let mut keys = self.keys.write();
        keys.retain(|(d, _)| !d.ct_eq(&digest));
        keys.push((digest, record));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_key(self, key: &str, record: ApiKeyRecord) -> Self {
        self.insert(key, record);
        self
    }

    /// Mark the key with id `key_id` revoked. Returns whether it existed.
    pub fn revoke(&self, key_id: &str) -> bool {
        let mut keys = self.keys.write();
        let mut found = false;
        for (_, record) in keys.iter_mut().filter(|(_, r)| r.key_id == key_id) {
            record.revoked = true;
            found = true;
        }
        found
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

#[async_trait]
impl ApiKeyStore for InMemoryApiKeyStore {
    async fn find(&self, digest: &KeyDigest) -> Result<Option<ApiKeyRecord>, StoreError> {
        let keys = self.keys.read();
        // Compare against every entry so lookup time does not depend on position.
        let mut found = None;
        for (candidate, record) in keys.iter() {
            if candidate.ct_eq(digest) {
                found = Some(record.clone());
            }
        }
        Ok(found)
    }

    fn description(&self) -> &str {
        "in-memory api key store"
    }
}

/// Header-borne API key scheme.
#[derive(Clone)]
pub struct ApiKeyScheme {
    header: HeaderName,
    store: Arc<dyn ApiKeyStore>,
}

impl ApiKeyScheme {
    /// Read keys from `X-API-Key` and resolve them through `store`.
    pub fn new<S: ApiKeyStore + 'static>(store: S) -> Self {
        Self::from_arc(Arc::new(store))
    }

    /// Like [`new`](Self::new) with an already shared store.
    pub fn from_arc(store: Arc<dyn ApiKeyStore>) -> Self {
        Self {
            header: HeaderName::from_static(DEFAULT_HEADER),
            store,
        }
    }

    /// Read keys from `header` instead.
    pub fn with_header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }
}

#[async_trait]
impl Scheme for ApiKeyScheme {
    async fn verify(&self, request: &Parts) -> Result<Arc<dyn Identity>, SchemeError> {
        let key = request
            .headers
            .get(&self.header)
            .ok_or(SchemeError::MissingCredentials)?
            .to_str()
            .map_err(|_| SchemeError::Malformed("api key is not valid ASCII".into()))?
            .trim();
        if key.is_empty() {
            return Err(SchemeError::Malformed("empty api key".into()));
        }

        let record = self
            .store
            .find(&KeyDigest::of(key))
            .await?
            .ok_or_else(|| SchemeError::Invalid("unknown api key".into()))?;

        if record.revoked {
            debug!(key_id = %record.key_id, "revoked api key presented");
            return Err(SchemeError::Invalid("api key revoked".into()));
        }
        if record.is_expired() {
            debug!(key_id = %record.key_id, "expired api key presented");
            return Err(SchemeError::Invalid("api key expired".into()));
        }

        let principal = Principal::new(record.owner)
            .with_roles(record.roles)
            .with_claim("key_id", serde_json::Value::String(record.key_id));
        Ok(Arc::new(principal))
    }

    fn description(&self) -> &str {
        self.store.description()
    }
}

impl fmt::Debug for ApiKeyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyScheme")
            .field("header", &self.header)
            .field("store", &self.store.description())
            .finish()
    }
}
