//! Top-level error types for mailkey.

use thiserror::Error;

use crate::config::ConfigError;
use crate::identity::IdentityError;
use crate::manager::CredentialError;
use crate::store::StoreError;

/// Top-level error type encompassing all mailkey errors.
#[derive(Debug, Error)]
pub enum MailkeyError {
    /// Error from a credential lifecycle operation.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Error from client identity handling.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Error from secret storage operations.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reading the git credential request failed.
    #[error("failed to read credential request: {0}")]
    Io(#[from] std::io::Error),
}
