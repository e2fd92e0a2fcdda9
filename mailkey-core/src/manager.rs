//! Refresh token lifecycle.
//!
//! [`TokenLifecycleManager`] is the entry point for the binary. It owns the
//! credential store and the token exchange, and exposes the three operations
//! the helper performs: authenticate, issue an access token, forget.
//!
//! Only the refresh token is persisted. Access tokens are never cached: every
//! call to [`issue_access_token`](TokenLifecycleManager::issue_access_token)
//! redeems the stored refresh token again.

use thiserror::Error;

use crate::flow::{AuthorizationFlowOrchestrator, FlowChoice, FlowError, FlowKind};
use crate::identity::{
    BuiltinClient, ClientChoice, ClientIdentity, ClientIdentityManager, IdentityError,
};
use crate::interaction::{InteractiveBrowser, QrRenderer, UserInteraction};
use crate::oauth::TokenExchange;
use crate::store::{Secret, SecretStore, StoreError, keys};
use crate::token::{ExchangeError, ProviderError};

/// Error type for credential lifecycle operations.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No refresh token is stored, so no access token can be issued.
    #[error("not authenticated: run with --authenticate first")]
    Unauthenticated,

    /// No refresh token is stored, so there is nothing to forget.
    #[error("no refresh token is stored")]
    NotAuthenticated,

    /// The provider refused the stored refresh token, or could not be reached.
    #[error("token refresh failed: {0}")]
    RefreshFailed(ExchangeError),

    /// The authorization flow did not produce tokens.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(FlowError),

    /// The provider issued tokens without a refresh token.
    #[error("authentication failed: provider returned no refresh token")]
    NoRefreshToken,

    /// Client identity handling failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The credential store failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl CredentialError {
    /// The provider's error envelope behind this failure, if any.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            CredentialError::RefreshFailed(e) => e.provider_error(),
            CredentialError::AuthenticationFailed(FlowError::Exchange(e)) => e.provider_error(),
            _ => None,
        }
    }
}

/// Interactive collaborators needed only by [`TokenLifecycleManager::authenticate`].
pub struct FlowEnvironment<'a> {
    pub interaction: &'a dyn UserInteraction,
    pub browser: &'a dyn InteractiveBrowser,
    pub qr: Option<&'a dyn QrRenderer>,
}

/// Snapshot reported by [`TokenLifecycleManager::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    pub identity: ClientIdentity,
    /// Built-in client matching the resolved id, if any.
    pub builtin: Option<BuiltinClient>,
    /// Whether the identity comes from the store rather than the default.
    pub custom: bool,
    pub authenticated: bool,
}

/// Coordinates identity resolution, authorization flows and refresh token storage.
pub struct TokenLifecycleManager<S: SecretStore, E: TokenExchange> {
    store: S,
    exchange: E,
}

impl<S: SecretStore, E: TokenExchange> TokenLifecycleManager<S, E> {
    pub fn new(store: S, exchange: E) -> Self {
        Self { store, exchange }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    pub fn identities(&self) -> ClientIdentityManager<'_, S> {
        ClientIdentityManager::new(&self.store)
    }

    /// Run an authorization flow and persist the resulting refresh token.
    ///
    /// Nothing is written unless the flow yields a refresh token.
    pub async fn authenticate(
        &self,
        choice: FlowChoice,
        env: FlowEnvironment<'_>,
    ) -> Result<FlowKind, CredentialError> {
        let identity = self.identities().resolve().await?;
        tracing::debug!(client_id = %identity.client_id, "Authenticating");

        let mut flow =
            AuthorizationFlowOrchestrator::new(&self.exchange, env.interaction, env.browser);
        if let Some(qr) = env.qr {
            flow = flow.with_qr(qr);
        }

        let tokens = flow
            .run(&identity, choice)
            .await
            .map_err(CredentialError::AuthenticationFailed)?;

        let refresh_token = tokens
            .refresh_token
            .as_ref()
            .ok_or(CredentialError::NoRefreshToken)?;
        self.store.set(keys::REFRESH_TOKEN, refresh_token).await?;

        let kind = flow
            .attempted()
            .last()
            .copied()
            .unwrap_or(FlowKind::ManualBrowser);
        tracing::info!(flow = %kind, "Stored refresh token");
        Ok(kind)
    }

    /// Redeem the stored refresh token for a fresh access token.
    ///
    /// A refresh token rotated by the provider is not written back; the
    /// originally stored one is reused on every call.
    pub async fn issue_access_token(&self) -> Result<Secret, CredentialError> {
        let refresh_token = self
            .store
            .get(keys::REFRESH_TOKEN)
            .await?
            .ok_or(CredentialError::Unauthenticated)?;
        let identity = self.identities().resolve().await?;

        let tokens = self
            .exchange
            .by_refresh_token(&identity, &refresh_token)
            .await
            .map_err(CredentialError::RefreshFailed)?;

        if tokens
            .refresh_token
            .as_ref()
            .is_some_and(|rotated| *rotated != refresh_token)
        {
            tracing::debug!("Provider rotated the refresh token; keeping the stored one");
        }
        if let Some(expires_at) = tokens.expires_at() {
            tracing::debug!(%expires_at, "Issued access token");
        }

        Ok(tokens.access_token)
    }

    /// Delete the stored refresh token.
    pub async fn forget(&self) -> Result<(), CredentialError> {
        match self.store.delete(keys::REFRESH_TOKEN).await {
            Ok(()) => {
                tracing::info!("Deleted refresh token");
                Ok(())
            }
            Err(e) if e.is_not_found() => Err(CredentialError::NotAuthenticated),
            Err(e) => Err(e.into()),
        }
    }

    /// Store a client choice.
    pub async fn configure_client(
        &self,
        choice: &ClientChoice,
    ) -> Result<ClientIdentity, CredentialError> {
        Ok(self.identities().set_custom(choice).await?)
    }

    /// Remove the stored client choice.
    pub async fn clear_client(&self) -> Result<(), CredentialError> {
        Ok(self.identities().clear().await?)
    }

    /// Which identity is in effect and whether a refresh token is stored.
    pub async fn status(&self) -> Result<CredentialStatus, CredentialError> {
        let identities = self.identities();
        let identity = identities.resolve().await?;
        Ok(CredentialStatus {
            builtin: BuiltinClient::from_client_id(&identity.client_id),
            custom: identities.is_custom().await?,
            authenticated: self.store.exists(keys::REFRESH_TOKEN).await?,
            identity,
        })
    }
}
