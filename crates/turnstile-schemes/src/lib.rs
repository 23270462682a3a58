//! # turnstile-schemes: Bundled Authentication Schemes
//!
//! Concrete [`Scheme`](turnstile_core::Scheme) implementations to register
//! with a [`SchemeRegistry`](turnstile_core::SchemeRegistry):
//!
//! | Scheme | Credential | Identity |
//! |---|---|---|
//! | [`JwtScheme`] | `Authorization: Bearer <HMAC JWT>` | [`Principal`] or a custom type via [`JwtScheme::with_validator`] |
//! | [`ApiKeyScheme`] | `X-API-Key: <key>` (header configurable) | [`Principal`] with the key's roles |
//!
//! ```ignore
//! use turnstile_core::SchemeRegistry;
//! use turnstile_schemes::{ApiKeyScheme, InMemoryApiKeyStore, JwtScheme};
//!
//! let mut registry = SchemeRegistry::new();
//! registry.register("jwt", JwtScheme::new(secret));
//! registry.register("apikey", ApiKeyScheme::new(InMemoryApiKeyStore::new()));
//! registry.set_default("jwt")?;
//! ```

pub mod apikey;
pub mod bearer;
pub mod jwt;
pub mod principal;

pub use apikey::{ApiKeyRecord, ApiKeyScheme, ApiKeyStore, InMemoryApiKeyStore, KeyDigest, StoreError};
pub use bearer::bearer_token;
pub use jwt::{Claims, HmacAlgorithm, IssueError, JwtScheme};
pub use principal::Principal;
