//! Authorization flow orchestration.
//!
//! Drives the user through one of three flows to obtain a token set:
//!
//! - **Device flow**: show a user code, poll the token endpoint.
//! - **Embedded browser flow**: an in-process browser reports the redirect.
//! - **Manual browser flow**: the user visits the URL anywhere and pastes
//!   the final redirected URL back.
//!
//! # Selection
//!
//! | choice            | embedded browser | flow                                   |
//! |-------------------|------------------|----------------------------------------|
//! | `Device`          | any              | device (failures are final)            |
//! | `ExternalBrowser` | any              | manual browser                         |
//! | `Auto`            | available        | embedded browser                       |
//! | `Auto`            | unavailable      | device, manual browser if start fails  |
//!
//! Flows run one after another, never concurrently.

use std::fmt;

use parking_lot::Mutex;
use thiserror::Error;

use crate::identity::ClientIdentity;
use crate::interaction::{
    BrowserError, InteractionError, InteractiveBrowser, QrRenderer, UserInteraction,
};
use crate::oauth::authorization_code::has_code;
use crate::oauth::{AuthorizationRequest, TokenExchange, extract_code};
use crate::token::{ExchangeError, TokenSet};

/// Error type for flow runs.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The provider rejected a request or could not be reached.
    #[error("{0}")]
    Exchange(#[from] ExchangeError),

    /// The embedded browser was closed or failed.
    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// The user's answer could not be read.
    #[error(transparent)]
    Interaction(#[from] InteractionError),
}

/// What the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowChoice {
    /// No explicit flag: pick by environment.
    #[default]
    Auto,
    /// `--device`
    Device,
    /// `--external-auth`
    ExternalBrowser,
}

/// A concrete flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    /// `interactive` is set when the device flow was picked by default and
    /// may hand over to the manual browser flow if it cannot start.
    Device { interactive: bool },
    EmbeddedBrowser,
    ManualBrowser,
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowKind::Device { .. } => f.write_str("device code"),
            FlowKind::EmbeddedBrowser => f.write_str("embedded browser"),
            FlowKind::ManualBrowser => f.write_str("manual browser"),
        }
    }
}

/// States of one authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    SelectingFlow,
    AwaitingUser(FlowKind),
    Exchanging(FlowKind),
    Succeeded,
    Failed,
}

/// Pick the first flow to run.
pub fn select_flow(choice: FlowChoice, embedded_available: bool) -> FlowKind {
    match choice {
        FlowChoice::Device => FlowKind::Device { interactive: false },
        FlowChoice::ExternalBrowser => FlowKind::ManualBrowser,
        FlowChoice::Auto if embedded_available => FlowKind::EmbeddedBrowser,
        FlowChoice::Auto => FlowKind::Device { interactive: true },
    }
}

/// Runs one authentication attempt and records its state transitions.
pub struct AuthorizationFlowOrchestrator<'a, E: TokenExchange + ?Sized> {
    exchange: &'a E,
    interaction: &'a dyn UserInteraction,
    browser: &'a dyn InteractiveBrowser,
    qr: Option<&'a dyn QrRenderer>,
    state: FlowState,
    history: Vec<FlowState>,
    attempted: Vec<FlowKind>,
}

impl<'a, E: TokenExchange + ?Sized> AuthorizationFlowOrchestrator<'a, E> {
    pub fn new(
        exchange: &'a E,
        interaction: &'a dyn UserInteraction,
        browser: &'a dyn InteractiveBrowser,
    ) -> Self {
        Self {
            exchange,
            interaction,
            browser,
            qr: None,
            state: FlowState::Idle,
            history: vec![FlowState::Idle],
            attempted: Vec::new(),
        }
    }

    /// Render URLs as QR codes too (best effort).
    pub fn with_qr(mut self, qr: &'a dyn QrRenderer) -> Self {
        self.qr = Some(qr);
        self
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[FlowState] {
        &self.history
    }

    /// Flows started so far, in order.
    pub fn attempted(&self) -> &[FlowKind] {
        &self.attempted
    }

    /// Obtain a token set for `identity`.
    ///
    /// Nothing is persisted here; the caller decides what to keep.
    pub async fn run(
        &mut self,
        identity: &ClientIdentity,
        choice: FlowChoice,
    ) -> Result<TokenSet, FlowError> {
        self.transition(FlowState::SelectingFlow);
        let flow = select_flow(choice, self.browser.is_available());
        tracing::debug!(?choice, %flow, "Selected authorization flow");

        let result = match flow {
            FlowKind::Device { interactive } => self.device_flow(identity, interactive).await,
            FlowKind::EmbeddedBrowser => self.embedded_browser_flow(identity).await,
            FlowKind::ManualBrowser => self.manual_browser_flow(identity).await,
        };

        match &result {
            Ok(_) => self.transition(FlowState::Succeeded),
            Err(e) => {
                tracing::debug!("Authorization failed: {}", e);
                self.transition(FlowState::Failed);
            }
        }
        result
    }

    async fn device_flow(
        &mut self,
        identity: &ClientIdentity,
        interactive: bool,
    ) -> Result<TokenSet, FlowError> {
        let kind = FlowKind::Device { interactive };
        self.attempted.push(kind);

        let handle = match self.exchange.request_device_code(identity).await {
            Ok(handle) => handle,
            Err(e) if interactive => {
                tracing::warn!("Device code flow unavailable ({}), using manual browser flow", e);
                return self.manual_browser_flow(identity).await;
            }
            Err(e) => return Err(e.into()),
        };

        self.transition(FlowState::AwaitingUser(kind));
        self.interaction.show_device_code(&handle);
        self.render_qr(&handle.verification_uri).await;

        // Polling is the exchange for this flow.
        Ok(self
            .exchange
            .by_device_flow_completion(identity, &handle)
            .await?)
    }

    async fn embedded_browser_flow(
        &mut self,
        identity: &ClientIdentity,
    ) -> Result<TokenSet, FlowError> {
        let kind = FlowKind::EmbeddedBrowser;
        self.attempted.push(kind);

        let request = self.exchange.authorization_request(identity)?;
        self.transition(FlowState::AwaitingUser(kind));

        let captured: Mutex<Option<String>> = Mutex::new(None);
        let on_navigate = |url: &str| {
            if has_code(url) {
                *captured.lock() = Some(extract_code(url));
                true
            } else {
                false
            }
        };
        self.browser.drive_login(&request.url, &on_navigate).await?;

        let code = captured.into_inner().ok_or(BrowserError::Cancelled)?;
        self.exchange_code(kind, identity, &code, &request).await
    }

    async fn manual_browser_flow(
        &mut self,
        identity: &ClientIdentity,
    ) -> Result<TokenSet, FlowError> {
        let kind = FlowKind::ManualBrowser;
        self.attempted.push(kind);

        let request = self.exchange.authorization_request(identity)?;
        self.transition(FlowState::AwaitingUser(kind));
        self.interaction.show_authorization_url(&request.url);
        self.render_qr(request.url.as_str()).await;

        let pasted = self.interaction.prompt_redirect_url().await?;
        let code = extract_code(&pasted);
        if code.is_empty() {
            tracing::warn!("No authorization code in the pasted URL");
        }

        self.exchange_code(kind, identity, &code, &request).await
    }

    async fn exchange_code(
        &mut self,
        kind: FlowKind,
        identity: &ClientIdentity,
        code: &str,
        request: &AuthorizationRequest,
    ) -> Result<TokenSet, FlowError> {
        self.transition(FlowState::Exchanging(kind));
        Ok(self
            .exchange
            .by_authorization_code(
                identity,
                code,
                &identity.redirect_uri,
                Some(&request.pkce_verifier),
            )
            .await?)
    }

    async fn render_qr(&self, data: &str) {
        let Some(qr) = self.qr else {
            return;
        };
        match qr.render(data).await {
            Ok(rendered) => self.interaction.show_qr(&rendered),
            Err(e) => tracing::debug!("{}", e),
        }
    }

    fn transition(&mut self, next: FlowState) {
        tracing::trace!(from = ?self.state, to = ?next, "flow transition");
        self.state = next;
        self.history.push(next);
    }
}
