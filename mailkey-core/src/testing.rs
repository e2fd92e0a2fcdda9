//! Scripted fakes for the flow and manager seams.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use url::Url;

use crate::identity::ClientIdentity;
use crate::interaction::{
    BrowserError, InteractionError, InteractiveBrowser, QrError, QrRenderer, UserInteraction,
};
use crate::oauth::{AuthorizationRequest, DeviceFlowHandle, TokenExchange};
use crate::store::Secret;
use crate::token::{ExchangeError, ProviderError, TokenSet};

pub fn token_set(access: &str, refresh: Option<&str>) -> TokenSet {
    TokenSet {
        access_token: Secret::new(access),
        refresh_token: refresh.map(Secret::new),
        expires_in: Some(3600),
        obtained_at: Utc::now(),
    }
}

pub fn handle() -> DeviceFlowHandle {
    DeviceFlowHandle {
        device_code: "DC".to_string(),
        user_code: "ABCD-EFGH".to_string(),
        verification_uri: "https://microsoft.com/devicelogin".to_string(),
        expires_in: 900,
        polling_interval: 5,
        message: None,
    }
}

/// Exchange whose answers are fixed up front; records every call.
pub struct FakeExchange {
    pub device_start: Result<DeviceFlowHandle, ProviderError>,
    pub device_result: Result<TokenSet, ProviderError>,
    pub code_result: Result<TokenSet, ProviderError>,
    pub refresh_result: Result<TokenSet, ProviderError>,
    pub calls: Mutex<Vec<String>>,
}

impl Default for FakeExchange {
    fn default() -> Self {
        Self {
            device_start: Ok(handle()),
            device_result: Ok(token_set("device-access", Some("device-refresh"))),
            code_result: Ok(token_set("code-access", Some("code-refresh"))),
            refresh_result: Ok(token_set("refreshed-access", Some("rotated-refresh"))),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeExchange {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl TokenExchange for FakeExchange {
    fn authorization_request(
        &self,
        identity: &ClientIdentity,
    ) -> Result<AuthorizationRequest, ExchangeError> {
        self.record("authorization_request".to_string());
        let url = Url::parse(&format!(
            "https://login.example/authorize?client_id={}",
            identity.client_id
        ))
        .map_err(|e| ExchangeError::Configuration {
            message: e.to_string(),
        })?;
        Ok(AuthorizationRequest {
            url,
            csrf_state: "state".to_string(),
            pkce_verifier: Secret::new("verifier"),
        })
    }

    async fn request_device_code(
        &self,
        _identity: &ClientIdentity,
    ) -> Result<DeviceFlowHandle, ExchangeError> {
        self.record("request_device_code".to_string());
        self.device_start.clone().map_err(ExchangeError::Provider)
    }

    async fn by_device_flow_completion(
        &self,
        _identity: &ClientIdentity,
        handle: &DeviceFlowHandle,
    ) -> Result<TokenSet, ExchangeError> {
        self.record(format!("by_device_flow_completion:{}", handle.device_code));
        self.device_result.clone().map_err(ExchangeError::Provider)
    }

    async fn by_authorization_code(
        &self,
        _identity: &ClientIdentity,
        code: &str,
        redirect_uri: &str,
        pkce_verifier: Option<&Secret>,
    ) -> Result<TokenSet, ExchangeError> {
        self.record(format!(
            "by_authorization_code:{}:{}:{}",
            code,
            redirect_uri,
            pkce_verifier.map(|v| v.expose()).unwrap_or("-")
        ));
        self.code_result.clone().map_err(ExchangeError::Provider)
    }

    async fn by_refresh_token(
        &self,
        _identity: &ClientIdentity,
        refresh_token: &Secret,
    ) -> Result<TokenSet, ExchangeError> {
        self.record(format!("by_refresh_token:{}", refresh_token.expose()));
        self.refresh_result.clone().map_err(ExchangeError::Provider)
    }
}

/// Interaction that pastes a fixed URL and records what was shown.
#[derive(Default)]
pub struct FakeInteraction {
    pub pasted: String,
    pub shown: Mutex<Vec<String>>,
}

impl FakeInteraction {
    pub fn pasting(url: &str) -> Self {
        Self {
            pasted: url.to_string(),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().clone()
    }
}

#[async_trait]
impl UserInteraction for FakeInteraction {
    fn show_device_code(&self, handle: &DeviceFlowHandle) {
        self.shown.lock().push(format!("device:{}", handle.user_code));
    }

    fn show_authorization_url(&self, url: &Url) {
        self.shown.lock().push(format!("url:{url}"));
    }

    fn show_qr(&self, rendered: &str) {
        self.shown.lock().push(format!("qr:{rendered}"));
    }

    async fn prompt_redirect_url(&self) -> Result<String, InteractionError> {
        self.shown.lock().push("prompt".to_string());
        Ok(self.pasted.clone())
    }
}

/// Embedded browser that walks through a fixed list of navigations.
pub struct FakeBrowser {
    pub available: bool,
    pub navigations: Vec<String>,
}

#[async_trait]
impl InteractiveBrowser for FakeBrowser {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn drive_login(
        &self,
        _url: &Url,
        on_navigate: &(dyn for<'a> Fn(&'a str) -> bool + Send + Sync),
    ) -> Result<(), BrowserError> {
        for url in &self.navigations {
            if on_navigate(url) {
                return Ok(());
            }
        }
        Err(BrowserError::Cancelled)
    }
}

pub struct FailingQr;

#[async_trait]
impl QrRenderer for FailingQr {
    async fn render(&self, _data: &str) -> Result<String, QrError> {
        Err(QrError {
            message: "service unavailable".to_string(),
        })
    }
}

pub struct StaticQr;

#[async_trait]
impl QrRenderer for StaticQr {
    async fn render(&self, data: &str) -> Result<String, QrError> {
        Ok(format!("[{data}]"))
    }
}
