//! Authorization Code flow with PKCE (Proof Key for Code Exchange).
//!
//! # Flow Overview
//!
//! 1. Generate PKCE code verifier and challenge
//! 2. Build authorization URL with state and PKCE challenge
//! 3. User authorizes in a browser and lands on the redirect URI
//! 4. The `code` query parameter is extracted from that final URL
//! 5. The code is exchanged for tokens together with the PKCE verifier

use oauth2::{
    AuthUrl, ClientId, CsrfToken, PkceCodeChallenge, RedirectUrl, Scope, TokenUrl,
    basic::BasicClient,
};
use url::Url;

use crate::identity::ClientIdentity;
use crate::provider::{ProviderConfig, SCOPES};
use crate::store::Secret;
use crate::token::ExchangeError;

/// Everything needed to send the user to the provider and later redeem the code.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// URL the user must visit.
    pub url: Url,

    /// CSRF state embedded in the URL.
    pub csrf_state: String,

    /// PKCE verifier to send with the code exchange.
    pub pkce_verifier: Secret,
}

/// Build the authorization URL for a public client.
pub fn build_authorization_request(
    provider: &ProviderConfig,
    identity: &ClientIdentity,
) -> Result<AuthorizationRequest, ExchangeError> {
    let auth_url = AuthUrl::new(provider.auth_url.clone()).map_err(|e| {
        ExchangeError::Configuration {
            message: format!("invalid auth URL: {}", e),
        }
    })?;
    let token_url = TokenUrl::new(provider.token_url.clone()).map_err(|e| {
        ExchangeError::Configuration {
            message: format!("invalid token URL: {}", e),
        }
    })?;
    let redirect_url = RedirectUrl::new(identity.redirect_uri.clone()).map_err(|e| {
        ExchangeError::Configuration {
            message: format!("invalid redirect URI {:?}: {}", identity.redirect_uri, e),
        }
    })?;

    let client = BasicClient::new(
        ClientId::new(identity.client_id.clone()),
        None,
        auth_url,
        Some(token_url),
    )
    .set_redirect_uri(redirect_url);

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (url, csrf_state) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(SCOPES.iter().map(|s| Scope::new((*s).to_string())))
        .set_pkce_challenge(pkce_challenge)
        .url();

    Ok(AuthorizationRequest {
        url,
        csrf_state: csrf_state.secret().to_string(),
        pkce_verifier: Secret::new(pkce_verifier.secret().as_str()),
    })
}

/// Extract the authorization code from a redirect URL.
///
/// Takes the first `code` query value. Returns an empty string when the URL
/// does not parse or has no `code` parameter; the exchange then fails at the
/// provider instead of here.
pub fn extract_code(redirect: &str) -> String {
    let Ok(url) = Url::parse(redirect.trim()) else {
        tracing::debug!("Redirect URL did not parse, using empty code");
        return String::new();
    };

    url.query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

/// Whether a navigated URL carries an authorization code.
pub fn has_code(url: &str) -> bool {
    Url::parse(url)
        .map(|u| u.query_pairs().any(|(key, _)| key == "code"))
        .unwrap_or(false)
}
