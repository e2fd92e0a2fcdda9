//! Token types and the token endpoint's result envelope.
//!
//! This module provides:
//! - [`TokenResponse`] - The raw JSON body returned by the token endpoint
//! - [`TokenSet`] - A successful grant result
//! - [`ProviderError`] - The provider's OAuth2 error envelope
//! - [`ExchangeError`] - Everything an exchange can fail with
//!
//! The token endpoint answers every grant with the same JSON shape, which
//! carries either tokens or an `error`/`error_description` pair. Callers never
//! read tokens out of that body directly: [`TokenResponse::into_result`] turns
//! it into `Ok(TokenSet)` or `Err(ProviderError)` first.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::Secret;

/// The provider's OAuth2 error envelope.
///
/// Displays as the provider's own description, falling back to the error code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderError {
    pub error: String,
    pub error_description: Option<String>,
}

impl ProviderError {
    pub fn new(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            error_description: Some(description.into()),
        }
    }

    /// The provider's description, or the bare error code when absent.
    pub fn description(&self) -> &str {
        self.error_description.as_deref().unwrap_or(&self.error)
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

impl std::error::Error for ProviderError {}

/// Error type for token endpoint exchanges.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The provider answered with an OAuth2 error envelope.
    #[error("{0}")]
    Provider(ProviderError),

    /// The request never got a usable answer.
    #[error("network error: {message}")]
    Transport { message: String },

    /// The answer was not a token response.
    #[error("unexpected response from token endpoint: {message}")]
    InvalidResponse { message: String },

    /// Endpoint or client configuration is unusable.
    #[error("invalid OAuth configuration: {message}")]
    Configuration { message: String },
}

impl ExchangeError {
    /// The provider envelope, if the provider rejected the request.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            ExchangeError::Provider(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProviderError> for ExchangeError {
    fn from(e: ProviderError) -> Self {
        ExchangeError::Provider(e)
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(e: reqwest::Error) -> Self {
        ExchangeError::Transport {
            message: e.to_string(),
        }
    }
}

/// Raw token endpoint body.
///
/// Success and failure share this shape; only `into_result` should read it.
#[derive(Debug, Default, Deserialize)]
pub struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenResponse {
    /// Split the envelope into tokens or the provider's error.
    ///
    /// The `error` field is checked first; a body with neither an error nor an
    /// access token is reported as an `invalid_response` provider error.
    pub fn into_result(self) -> Result<TokenSet, ProviderError> {
        if let Some(error) = self.error {
            return Err(ProviderError {
                error,
                error_description: self.error_description,
            });
        }

        let Some(access_token) = self.access_token else {
            return Err(ProviderError::new(
                "invalid_response",
                "token endpoint response carried no access_token",
            ));
        };

        Ok(TokenSet {
            access_token: Secret::new(access_token),
            refresh_token: self.refresh_token.map(Secret::new),
            expires_in: self.expires_in,
            obtained_at: Utc::now(),
        })
    }
}

/// Tokens returned by a successful grant.
///
/// Only `refresh_token` is ever persisted; the access token is emitted once.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: Secret,
    pub refresh_token: Option<Secret>,
    /// Access token lifetime in seconds, as reported by the provider.
    pub expires_in: Option<u64>,
    pub obtained_at: DateTime<Utc>,
}

impl TokenSet {
    /// When the access token stops being valid, if the provider said.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .map(|secs| self.obtained_at + Duration::seconds(secs))
    }
}
