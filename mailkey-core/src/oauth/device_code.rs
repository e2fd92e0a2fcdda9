//! Device Authorization Grant flow (RFC 8628).
//!
//! # Flow Overview
//!
//! 1. Request device and user codes from the authorization server
//! 2. Display the user code and verification URL to the user
//! 3. User visits the URL on another device and enters the code
//! 4. Poll the token endpoint until the user authorizes, denies, or the code expires
//!
//! Polling doubles as the exchange: the token endpoint answers the last poll
//! with the token set itself.

use serde::Deserialize;
use std::time::Duration;
use tokio::time::{Instant, sleep};

use crate::identity::ClientIdentity;
use crate::provider::{ProviderConfig, scope_string};
use crate::token::{ExchangeError, ProviderError, TokenResponse, TokenSet};

/// Grant type used when polling the token endpoint.
pub const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Extra delay added to the polling interval on `slow_down`.
const SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

/// Interval used when the provider omits one.
const DEFAULT_INTERVAL_SECS: u64 = 5;

/// Lifetime assumed when the provider omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: u64 = 900;

/// Device authorization response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFlowHandle {
    /// The device verification code (keep this secret).
    pub device_code: String,

    /// The user verification code to display to the user.
    pub user_code: String,

    /// The URI where the user should go to authorize.
    pub verification_uri: String,

    /// Seconds until the device code expires.
    pub expires_in: u64,

    /// Minimum seconds between polling requests.
    pub polling_interval: u64,

    /// Ready-made instruction text, when the provider sends one.
    pub message: Option<String>,
}

/// Raw device authorization body; success and error share the shape.
#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: Option<String>,
    user_code: Option<String>,
    verification_uri: Option<String>,
    expires_in: Option<u64>,
    interval: Option<u64>,
    message: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl DeviceCodeResponse {
    fn into_result(self) -> Result<DeviceFlowHandle, ProviderError> {
        if let Some(error) = self.error {
            return Err(ProviderError {
                error,
                error_description: self.error_description,
            });
        }

        match (self.device_code, self.user_code, self.verification_uri) {
            (Some(device_code), Some(user_code), Some(verification_uri)) => Ok(DeviceFlowHandle {
                device_code,
                user_code,
                verification_uri,
                expires_in: self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
                polling_interval: self.interval.unwrap_or(DEFAULT_INTERVAL_SECS),
                message: self.message,
            }),
            _ => Err(ProviderError::new(
                "invalid_response",
                "device authorization response is missing required fields",
            )),
        }
    }
}

/// Request device and user codes for the fixed scope set.
pub async fn request_device_code(
    http: &reqwest::Client,
    provider: &ProviderConfig,
    identity: &ClientIdentity,
) -> Result<DeviceFlowHandle, ExchangeError> {
    tracing::debug!(url = %provider.device_code_url, "Requesting device code");

    let scope = scope_string();
    let response = http
        .post(&provider.device_code_url)
        .form(&[
            ("client_id", identity.client_id.as_str()),
            ("scope", scope.as_str()),
        ])
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    let parsed: DeviceCodeResponse =
        serde_json::from_str(&body).map_err(|e| ExchangeError::InvalidResponse {
            message: format!("HTTP {}: {}", status, e),
        })?;

    Ok(parsed.into_result()?)
}

/// Poll the token endpoint until the user authorizes or the code expires.
///
/// # Errors
///
/// Returns [`ExchangeError::Provider`] if:
/// - The user declines the request
/// - The device code expires (reported by the provider or detected locally)
/// - The authorization server returns any other error
pub async fn poll_for_token(
    http: &reqwest::Client,
    provider: &ProviderConfig,
    identity: &ClientIdentity,
    handle: &DeviceFlowHandle,
) -> Result<TokenSet, ExchangeError> {
    let mut interval = Duration::from_secs(handle.polling_interval);
    let deadline = polling_deadline(Instant::now(), handle.expires_in);

    loop {
        if Instant::now() >= deadline {
            return Err(ProviderError::new("expired_token", "device code expired").into());
        }

        sleep(interval).await;

        let response = http
            .post(&provider.token_url)
            .form(&[
                ("grant_type", DEVICE_CODE_GRANT),
                ("client_id", identity.client_id.as_str()),
                ("device_code", handle.device_code.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| ExchangeError::InvalidResponse {
                message: format!("HTTP {}: {}", status, e),
            })?;

        match parsed.into_result() {
            Ok(token_set) => return Ok(token_set),
            Err(e) if e.error == "authorization_pending" => {
                tracing::debug!("Authorization pending, continuing to poll...");
            }
            Err(e) if e.error == "slow_down" => {
                tracing::warn!("Polling too fast, slowing down...");
                interval += SLOW_DOWN_INCREMENT;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// When polling gives up. A lifetime too large to represent falls back to the default.
fn polling_deadline(start: Instant, expires_in: u64) -> Instant {
    start
        .checked_add(Duration::from_secs(expires_in))
        .unwrap_or_else(|| start + Duration::from_secs(DEFAULT_EXPIRES_IN_SECS))
}
