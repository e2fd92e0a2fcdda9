//! # mailkey Core
//!
//! OAuth2 credential lifecycle for a mail credential helper.
//!
//! This crate provides:
//! - Client identity resolution (built-in or stored custom client)
//! - Device-code, embedded-browser and manual-browser authorization flows
//! - Refresh token persistence behind a [`SecretStore`]
//! - Access token issuance and the git credential helper output line
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mailkey_core::{Config, HttpTokenExchange, TokenLifecycleManager, open_store};
//!
//! async fn password() -> Result<String, mailkey_core::MailkeyError> {
//!     let config = Config::load()?;
//!     let store = open_store(config.store_backend, &config.keyring_service)?;
//!     let manager = TokenLifecycleManager::new(store, HttpTokenExchange::new(config.provider()));
//!     let token = manager.issue_access_token().await?;
//!     Ok(mailkey_core::protocol::password_line(&token))
//! }
//! ```

pub mod config;
pub mod error;
pub mod flow;
pub mod identity;
pub mod interaction;
pub mod manager;
pub mod oauth;
pub mod protocol;
pub mod provider;
pub mod store;
pub mod token;

#[cfg(test)]
mod testing;

pub use config::{Config, ConfigError, StoreBackend};

pub use error::MailkeyError;

pub use flow::{AuthorizationFlowOrchestrator, FlowChoice, FlowError, FlowKind, FlowState};

pub use identity::{BuiltinClient, ClientChoice, ClientIdentity, ClientIdentityManager, IdentityError};

pub use interaction::{
    ConsoleInteraction,
    HttpQrRenderer,
    InteractiveBrowser,
    NoEmbeddedBrowser,
    QrRenderer,
    UserInteraction,
};

pub use manager::{CredentialError, CredentialStatus, FlowEnvironment, TokenLifecycleManager};

pub use oauth::{HttpTokenExchange, TokenExchange};

pub use provider::ProviderConfig;

pub use store::{
    Secret,
    SecretStore,
    StoreError,
    MemoryStore,
    open_store,
};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;

pub use token::{ExchangeError, ProviderError, TokenSet};
