//! Integration tests for the credential lifecycle.
//!
//! These tests drive `TokenLifecycleManager` against a mock token endpoint and
//! an in-memory store, and verify that:
//! - Access tokens are issued from the stored refresh token without rewriting it
//! - Missing credentials fail before any network call
//! - Provider errors surface with the provider's description and leave the store alone
//! - A manual browser sign-in persists exactly one refresh token

use async_trait::async_trait;
use mailkey_core::{
    CredentialError, FlowChoice, FlowEnvironment, FlowKind, HttpTokenExchange, MemoryStore,
    NoEmbeddedBrowser, ProviderConfig, SecretStore, TokenLifecycleManager, UserInteraction,
    interaction::InteractionError, oauth::DeviceFlowHandle, store::keys,
};
use url::Url;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, method, path},
};

const TOKEN_PATH: &str = "/common/oauth2/v2.0/token";

fn manager_for(
    server: &MockServer,
    store: MemoryStore,
) -> TokenLifecycleManager<MemoryStore, HttpTokenExchange> {
    let provider = ProviderConfig::from_authority(format!("{}/common", server.uri()));
    TokenLifecycleManager::new(store, HttpTokenExchange::new(provider))
}

async fn stored_refresh_token(
    manager: &TokenLifecycleManager<MemoryStore, HttpTokenExchange>,
) -> Option<String> {
    manager
        .store()
        .get(keys::REFRESH_TOKEN)
        .await
        .unwrap()
        .map(|s| s.expose().to_string())
}

/// Answers the paste-back prompt with a fixed redirect URL.
struct PasteRedirect(&'static str);

#[async_trait]
impl UserInteraction for PasteRedirect {
    fn show_device_code(&self, _handle: &DeviceFlowHandle) {}

    fn show_authorization_url(&self, _url: &Url) {}

    fn show_qr(&self, _rendered: &str) {}

    async fn prompt_redirect_url(&self) -> Result<String, InteractionError> {
        Ok(self.0.to_string())
    }
}

#[tokio::test]
async fn test_refresh_does_not_persist_rotated_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=R"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
            "access_token": "fresh-access",
            "refresh_token": "rotated-refresh",
            "expires_in": 3599
        })))
        .expect(2)
        .mount(&server)
        .await;

    let manager = manager_for(&server, MemoryStore::with_entries([(keys::REFRESH_TOKEN, "R")]));

    let first = manager.issue_access_token().await.unwrap();
    let second = manager.issue_access_token().await.unwrap();

    assert_eq!(first.expose(), "fresh-access");
    assert_eq!(second.expose(), "fresh-access");
    assert_eq!(stored_refresh_token(&manager).await.as_deref(), Some("R"));
}

#[tokio::test]
async fn test_unauthenticated_never_calls_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let manager = manager_for(&server, MemoryStore::new());
    let err = manager.issue_access_token().await.unwrap_err();

    assert!(matches!(err, CredentialError::Unauthenticated));
    assert!(err.to_string().contains("--authenticate"));
}

#[tokio::test]
async fn test_refresh_provider_error_leaves_store_unmodified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "AADSTS50173: The provided grant has expired."
        })))
        .mount(&server)
        .await;

    let manager = manager_for(&server, MemoryStore::with_entries([(keys::REFRESH_TOKEN, "R")]));
    let err = manager.issue_access_token().await.unwrap_err();

    let provider = err.provider_error().unwrap();
    assert_eq!(provider.error, "invalid_grant");
    assert_eq!(
        provider.description(),
        "AADSTS50173: The provided grant has expired."
    );
    assert_eq!(manager.store().len(), 1);
    assert_eq!(stored_refresh_token(&manager).await.as_deref(), Some("R"));
}

#[tokio::test]
async fn test_manual_sign_in_then_forget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=XYZ"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "at",
            "refresh_token": "signed-in-refresh",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server, MemoryStore::new());
    assert!(matches!(
        manager.forget().await,
        Err(CredentialError::NotAuthenticated)
    ));

    let interaction = PasteRedirect("https://localhost/?code=XYZ&state=abc");
    let kind = manager
        .authenticate(
            FlowChoice::ExternalBrowser,
            FlowEnvironment {
                interaction: &interaction,
                browser: &NoEmbeddedBrowser,
                qr: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(kind, FlowKind::ManualBrowser);
    assert_eq!(
        stored_refresh_token(&manager).await.as_deref(),
        Some("signed-in-refresh")
    );

    manager.forget().await.unwrap();
    assert!(matches!(
        manager.forget().await,
        Err(CredentialError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn test_failed_sign_in_persists_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("code=&"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_request",
            "error_description": "AADSTS900144: The request body must contain the following parameter: 'code'."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server, MemoryStore::new());
    let interaction = PasteRedirect("https://localhost/?error=access_denied");

    let err = manager
        .authenticate(
            FlowChoice::ExternalBrowser,
            FlowEnvironment {
                interaction: &interaction,
                browser: &NoEmbeddedBrowser,
                qr: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CredentialError::AuthenticationFailed(_)));
    assert!(err.to_string().contains("AADSTS900144"));
    assert!(manager.store().is_empty());
}
