//! Identity provider endpoints and the fixed scope set.
//!
//! The helper talks to exactly one identity provider. Its endpoints are derived
//! from an authority base URL, which defaults to the Microsoft identity
//! platform's multi-tenant authority and can be overridden in the config file.

use serde::{Deserialize, Serialize};

/// Default authority for the Microsoft identity platform.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/common";

/// Scopes requested by every grant, in order: POP, IMAP, SMTP.
pub const SCOPES: [&str; 3] = [
    "https://outlook.office.com/POP.AccessAsUser.All",
    "https://outlook.office.com/IMAP.AccessAsUser.All",
    "https://outlook.office.com/SMTP.Send",
];

/// Scopes joined with spaces, as sent in form-encoded requests.
pub fn scope_string() -> String {
    SCOPES.join(" ")
}

/// Endpoints of the identity provider.
///
/// # Example
///
/// ```
/// use mailkey_core::provider::ProviderConfig;
///
/// let provider = ProviderConfig::from_authority("https://login.microsoftonline.com/common");
/// assert_eq!(
///     provider.token_url,
///     "https://login.microsoftonline.com/common/oauth2/v2.0/token"
/// );
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Authority base URL the endpoints hang off.
    pub authority: String,

    /// OAuth authorization endpoint URL.
    pub auth_url: String,

    /// OAuth token endpoint URL.
    pub token_url: String,

    /// Device authorization endpoint URL.
    pub device_code_url: String,
}

impl ProviderConfig {
    /// Derive the v2.0 endpoints from an authority URL.
    ///
    /// A trailing slash on the authority is ignored.
    pub fn from_authority(authority: impl Into<String>) -> Self {
        let authority = authority.into();
        let base = authority.trim_end_matches('/').to_string();
        Self {
            auth_url: format!("{base}/oauth2/v2.0/authorize"),
            token_url: format!("{base}/oauth2/v2.0/token"),
            device_code_url: format!("{base}/oauth2/v2.0/devicecode"),
            authority: base,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::from_authority(DEFAULT_AUTHORITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints() {
        let config = ProviderConfig::default();
        assert_eq!(config.authority, DEFAULT_AUTHORITY);
        assert_eq!(
            config.auth_url,
            "https://login.microsoftonline.com/common/oauth2/v2.0/authorize"
        );
        assert_eq!(
            config.device_code_url,
            "https://login.microsoftonline.com/common/oauth2/v2.0/devicecode"
        );
    }

    #[test]
    fn test_trailing_slash_ignored() {
        let config = ProviderConfig::from_authority("http://127.0.0.1:9000/tenant/");
        assert_eq!(config.token_url, "http://127.0.0.1:9000/tenant/oauth2/v2.0/token");
    }

    #[test]
    fn test_scope_order() {
        assert_eq!(
            scope_string(),
            "https://outlook.office.com/POP.AccessAsUser.All \
             https://outlook.office.com/IMAP.AccessAsUser.All \
             https://outlook.office.com/SMTP.Send"
        );
    }
}
