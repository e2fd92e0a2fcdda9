//! Token endpoint exchanges.
//!
//! This module provides:
//! - [`TokenExchange`] - The grants the helper needs, as a trait
//! - [`HttpTokenExchange`] - The implementation against the provider's endpoints
//! - [`authorization_code`] - Authorization URL building and redirect code extraction
//! - [`device_code`] - Device Authorization Grant request and polling
//!
//! Every exchange yields `Result<TokenSet, ExchangeError>`. A provider-side
//! rejection is always [`ExchangeError::Provider`] carrying the provider's
//! envelope, so callers have one condition to check before using tokens.

pub mod authorization_code;
pub mod device_code;

use async_trait::async_trait;

use crate::identity::ClientIdentity;
use crate::provider::{ProviderConfig, scope_string};
use crate::store::Secret;
use crate::token::{ExchangeError, TokenResponse, TokenSet};

pub use authorization_code::{AuthorizationRequest, extract_code};
pub use device_code::DeviceFlowHandle;

/// The OAuth2 grants used by the credential helper.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Build an authorization URL (with PKCE) for the code flows.
    fn authorization_request(
        &self,
        identity: &ClientIdentity,
    ) -> Result<AuthorizationRequest, ExchangeError>;

    /// Start a device-code grant.
    async fn request_device_code(
        &self,
        identity: &ClientIdentity,
    ) -> Result<DeviceFlowHandle, ExchangeError>;

    /// Wait for the user to finish the device-code grant and collect the tokens.
    async fn by_device_flow_completion(
        &self,
        identity: &ClientIdentity,
        handle: &DeviceFlowHandle,
    ) -> Result<TokenSet, ExchangeError>;

    /// Redeem an authorization code.
    async fn by_authorization_code(
        &self,
        identity: &ClientIdentity,
        code: &str,
        redirect_uri: &str,
        pkce_verifier: Option<&Secret>,
    ) -> Result<TokenSet, ExchangeError>;

    /// Trade a refresh token for a fresh access token.
    async fn by_refresh_token(
        &self,
        identity: &ClientIdentity,
        refresh_token: &Secret,
    ) -> Result<TokenSet, ExchangeError>;
}

/// [`TokenExchange`] over HTTP against a [`ProviderConfig`].
///
/// Requests carry no timeout and are never retried.
#[derive(Debug, Clone)]
pub struct HttpTokenExchange {
    provider: ProviderConfig,
    http: reqwest::Client,
}

impl HttpTokenExchange {
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            http: reqwest::Client::new(),
        }
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    async fn post_token(&self, form: &[(&str, &str)]) -> Result<TokenSet, ExchangeError> {
        tracing::debug!(url = %self.provider.token_url, "POST token request");

        let response = self
            .http
            .post(&self.provider.token_url)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| ExchangeError::InvalidResponse {
                message: format!("HTTP {}: {}", status, e),
            })?;

        Ok(parsed.into_result()?)
    }
}

#[async_trait]
impl TokenExchange for HttpTokenExchange {
    fn authorization_request(
        &self,
        identity: &ClientIdentity,
    ) -> Result<AuthorizationRequest, ExchangeError> {
        authorization_code::build_authorization_request(&self.provider, identity)
    }

    async fn request_device_code(
        &self,
        identity: &ClientIdentity,
    ) -> Result<DeviceFlowHandle, ExchangeError> {
        device_code::request_device_code(&self.http, &self.provider, identity).await
    }

    async fn by_device_flow_completion(
        &self,
        identity: &ClientIdentity,
        handle: &DeviceFlowHandle,
    ) -> Result<TokenSet, ExchangeError> {
        device_code::poll_for_token(&self.http, &self.provider, identity, handle).await
    }

    async fn by_authorization_code(
        &self,
        identity: &ClientIdentity,
        code: &str,
        redirect_uri: &str,
        pkce_verifier: Option<&Secret>,
    ) -> Result<TokenSet, ExchangeError> {
        let scope = scope_string();
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("client_id", identity.client_id.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("scope", scope.as_str()),
        ];
        if let Some(verifier) = pkce_verifier {
            form.push(("code_verifier", verifier.expose()));
        }

        self.post_token(&form).await
    }

    async fn by_refresh_token(
        &self,
        identity: &ClientIdentity,
        refresh_token: &Secret,
    ) -> Result<TokenSet, ExchangeError> {
        let scope = scope_string();
        self.post_token(&[
            ("grant_type", "refresh_token"),
            ("client_id", identity.client_id.as_str()),
            ("refresh_token", refresh_token.expose()),
            ("scope", scope.as_str()),
        ])
        .await
    }
}
