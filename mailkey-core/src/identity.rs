//! OAuth2 client identity resolution.
//!
//! The helper presents one registered application identity to the provider.
//! Two well-known desktop mail clients are built in; a custom pair can be
//! stored in the credential store and takes precedence until cleared.

use std::fmt;

use thiserror::Error;

use crate::store::{Secret, SecretStore, StoreError, keys};

/// Redirect URI registered for generic native (public) clients.
pub const NATIVE_CLIENT_REDIRECT_URI: &str =
    "https://login.microsoftonline.com/common/oauth2/nativeclient";

/// Error type for identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// No custom identity is stored, so there is nothing to clear.
    #[error("no custom client is configured")]
    NotConfigured,

    /// The credential store failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// A registered application identity: client id plus redirect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub client_id: String,
    pub redirect_uri: String,
}

impl ClientIdentity {
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
        }
    }
}

/// The built-in identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinClient {
    /// Mozilla Thunderbird. The default.
    Thunderbird,
    /// Microsoft Outlook desktop.
    Outlook,
}

impl BuiltinClient {
    pub const DEFAULT: BuiltinClient = BuiltinClient::Thunderbird;

    pub fn identity(self) -> ClientIdentity {
        match self {
            BuiltinClient::Thunderbird => ClientIdentity::new(
                "9e5f94bc-e8a4-4e73-b8be-63364c29d753",
                "https://localhost",
            ),
            BuiltinClient::Outlook => ClientIdentity::new(
                "d3590ed6-52b3-4102-aeff-aad2292ab01c",
                "urn:ietf:wg:oauth:2.0:oob",
            ),
        }
    }

    /// Find the built-in whose client id matches, if any.
    pub fn from_client_id(client_id: &str) -> Option<Self> {
        [BuiltinClient::Thunderbird, BuiltinClient::Outlook]
            .into_iter()
            .find(|b| b.identity().client_id == client_id)
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltinClient::Thunderbird => "thunderbird",
            BuiltinClient::Outlook => "outlook",
        }
    }
}

impl fmt::Display for BuiltinClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the user asked to configure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientChoice {
    Builtin(BuiltinClient),
    /// User-supplied pair, stored as given (empty strings included).
    Custom(ClientIdentity),
}

impl ClientChoice {
    fn identity(&self) -> ClientIdentity {
        match self {
            ClientChoice::Builtin(builtin) => builtin.identity(),
            ClientChoice::Custom(identity) => identity.clone(),
        }
    }
}

/// Resolves, stores and clears the client identity.
///
/// Holds no cached identity: every [`resolve`](Self::resolve) reads the store.
pub struct ClientIdentityManager<'a, S: SecretStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: SecretStore + ?Sized> ClientIdentityManager<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Resolve the identity to use for this invocation.
    ///
    /// - nothing stored: the default built-in identity;
    /// - client id stored without a redirect URI: that client id with
    ///   [`NATIVE_CLIENT_REDIRECT_URI`], even when the id is a built-in one.
    pub async fn resolve(&self) -> Result<ClientIdentity, IdentityError> {
        let Some(client_id) = self.store.get(keys::CLIENT_ID).await? else {
            tracing::debug!("No custom client stored, using {}", BuiltinClient::DEFAULT);
            return Ok(BuiltinClient::DEFAULT.identity());
        };

        let redirect_uri = match self.store.get(keys::REDIRECT_URI).await? {
            Some(uri) => uri.expose().to_string(),
            None => {
                tracing::debug!("Custom client has no redirect URI, using native client URI");
                NATIVE_CLIENT_REDIRECT_URI.to_string()
            }
        };

        Ok(ClientIdentity::new(client_id.expose(), redirect_uri))
    }

    /// Persist a client choice (both fields).
    pub async fn set_custom(&self, choice: &ClientChoice) -> Result<ClientIdentity, IdentityError> {
        let identity = choice.identity();
        self.store
            .set(keys::CLIENT_ID, &Secret::new(identity.client_id.as_str()))
            .await?;
        self.store
            .set(keys::REDIRECT_URI, &Secret::new(identity.redirect_uri.as_str()))
            .await?;
        tracing::info!(client_id = %identity.client_id, "Stored client identity");
        Ok(identity)
    }

    /// Delete both stored fields.
    ///
    /// Each field is deleted independently; a field that is already absent is
    /// skipped. Fails with [`IdentityError::NotConfigured`] only when neither
    /// field was present.
    pub async fn clear(&self) -> Result<(), IdentityError> {
        let mut removed = false;
        for key in [keys::CLIENT_ID, keys::REDIRECT_URI] {
            match self.store.delete(key).await {
                Ok(()) => removed = true,
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }

        if removed {
            tracing::info!("Cleared custom client identity");
            Ok(())
        } else {
            Err(IdentityError::NotConfigured)
        }
    }

    /// Whether a custom identity is stored.
    pub async fn is_custom(&self) -> Result<bool, IdentityError> {
        Ok(self.store.exists(keys::CLIENT_ID).await?)
    }
}
