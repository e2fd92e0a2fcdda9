//! Credential storage abstraction.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`SecretStore`] - Trait for credential storage backends
//! - [`MemoryStore`] - In-memory implementation for testing
//! - [`KeyringStore`] - OS keyring implementation (with `keyring-store` feature)
//! - [`open_store`] - Opens the backend selected in the configuration
//!
//! # Storage Keys
//!
//! Every value lives under a single service namespace (`mailkey` by default)
//! and is addressed by one of the fixed keys in [`keys`].
//!
//! # Example
//!
//! ```rust,ignore
//! use mailkey_core::store::{keys, MemoryStore, Secret, SecretStore};
//!
//! let store = MemoryStore::new();
//! store.set(keys::REFRESH_TOKEN, &Secret::new("0.AAA...")).await?;
//!
//! let retrieved = store.get(keys::REFRESH_TOKEN).await?;
//! assert_eq!(retrieved.unwrap().expose(), "0.AAA...");
//! ```

use async_trait::async_trait;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::StoreBackend;

mod memory;
#[cfg(feature = "keyring-store")]
mod keyring;

pub use memory::MemoryStore;
#[cfg(feature = "keyring-store")]
pub use keyring::KeyringStore;

/// Keys used inside the credential namespace.
pub mod keys {
    /// Long-lived refresh token obtained by authentication.
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// Custom OAuth2 client id.
    pub const CLIENT_ID: &str = "client_id";
    /// Redirect URI paired with the custom client id.
    pub const REDIRECT_URI: &str = "redirect_uri";
}

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the buffer is zeroed when the secret is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for credential store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested entry does not exist.
    ///
    /// Only returned by [`SecretStore::delete`]; `get` reports absence as `Ok(None)`.
    #[error("no stored entry for key: {key}")]
    NotFound { key: String },

    /// Access to the entry was denied.
    #[error("access denied to entry: {key}")]
    AccessDenied { key: String },

    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// The keyring backend is not available.
    #[error("keyring not available: {message}")]
    KeyringUnavailable { message: String },
}

impl StoreError {
    /// Whether this error only reports a missing entry.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Abstraction over credential storage backends.
///
/// All keys share one service namespace chosen when the backend is built.
/// The process runs one operation at a time, so implementations need no
/// cross-key locking.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Retrieve a value by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError>;

    /// Store a value at the given key, overwriting any existing value.
    async fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError>;

    /// Delete a value by key.
    ///
    /// Returns [`StoreError::NotFound`] if the key didn't exist.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Check if a key exists without handing out the value.
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }
}

#[async_trait]
impl<S: SecretStore + ?Sized> SecretStore for Box<S> {
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError> {
        (**self).set(key, secret).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }
}

/// Open the configured credential store.
///
/// - [`StoreBackend::Memory`] always yields a [`MemoryStore`].
/// - [`StoreBackend::Keyring`] yields a [`KeyringStore`] under `service`, or
///   [`StoreError::KeyringUnavailable`] when the keyring cannot be reached or
///   the `keyring-store` feature is disabled. There is no silent fallback:
///   a refresh token written to memory would be lost when the process exits.
pub fn open_store(backend: StoreBackend, service: &str) -> Result<Box<dyn SecretStore>, StoreError> {
    match backend {
        StoreBackend::Memory => {
            tracing::debug!("Using in-memory credential storage");
            Ok(Box::new(MemoryStore::new()))
        }
        #[cfg(feature = "keyring-store")]
        StoreBackend::Keyring => {
            let store = KeyringStore::try_new(service)?;
            tracing::debug!(service, "Using OS keyring for credential storage");
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "keyring-store"))]
        StoreBackend::Keyring => Err(StoreError::KeyringUnavailable {
            message: format!(
                "keyring storage requested for {service} but the keyring-store feature is not enabled"
            ),
        }),
    }
}
