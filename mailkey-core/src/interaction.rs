//! User-facing collaborators of the authorization flows.
//!
//! This module provides:
//! - [`UserInteraction`] - Instructions, browser launch and the paste-back prompt
//! - [`InteractiveBrowser`] - Optional embedded browser capability
//! - [`QrRenderer`] - Best-effort terminal QR rendering
//! - Console implementations of each for the binary
//!
//! Everything here writes to stderr; stdout belongs to the credential protocol.

use std::io::{BufRead, IsTerminal, Write};

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::oauth::DeviceFlowHandle;

/// Error type for interactive prompts.
#[derive(Debug, Error)]
pub enum InteractionError {
    /// Reading the user's answer failed.
    #[error("failed to read input: {message}")]
    Input { message: String },
}

/// Error type for the embedded browser capability.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The user closed the window before the redirect arrived.
    #[error("login window closed before authorization completed")]
    Cancelled,

    /// No embedded browser exists in this environment.
    #[error("no embedded browser available")]
    Unavailable,

    /// The renderer failed.
    #[error("embedded browser failed: {message}")]
    Failed { message: String },
}

/// Error type for QR rendering.
#[derive(Debug, Error)]
#[error("QR rendering failed: {message}")]
pub struct QrError {
    pub message: String,
}

/// Terminal-side interaction used by the flows.
#[async_trait]
pub trait UserInteraction: Send + Sync {
    /// Tell the user where to go and which code to enter.
    fn show_device_code(&self, handle: &DeviceFlowHandle);

    /// Send the user to the authorization URL (open a browser and/or print it).
    fn show_authorization_url(&self, url: &Url);

    /// Display a pre-rendered QR code.
    fn show_qr(&self, rendered: &str);

    /// Ask for the final redirected URL and return what the user pasted.
    async fn prompt_redirect_url(&self) -> Result<String, InteractionError>;
}

/// Embedded browser capability.
///
/// `drive_login` navigates to the URL and reports every navigation to
/// `on_navigate`; it must close the window and return once `on_navigate`
/// returns `true`.
#[async_trait]
pub trait InteractiveBrowser: Send + Sync {
    /// Environment probe; called once per flow selection.
    fn is_available(&self) -> bool;

    async fn drive_login(
        &self,
        url: &Url,
        on_navigate: &(dyn for<'a> Fn(&'a str) -> bool + Send + Sync),
    ) -> Result<(), BrowserError>;
}

/// Renders data as a terminal QR code.
#[async_trait]
pub trait QrRenderer: Send + Sync {
    async fn render(&self, data: &str) -> Result<String, QrError>;
}

/// The capability used when no embedded renderer is compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEmbeddedBrowser;

#[async_trait]
impl InteractiveBrowser for NoEmbeddedBrowser {
    fn is_available(&self) -> bool {
        false
    }

    async fn drive_login(
        &self,
        _url: &Url,
        _on_navigate: &(dyn for<'a> Fn(&'a str) -> bool + Send + Sync),
    ) -> Result<(), BrowserError> {
        Err(BrowserError::Unavailable)
    }
}

/// QR rendering through a qrenco.de-style HTTP service.
///
/// `GET {service}/{data}` is expected to return a text rendering.
#[derive(Debug, Clone)]
pub struct HttpQrRenderer {
    service_url: String,
    http: reqwest::Client,
}

impl HttpQrRenderer {
    pub fn new(service_url: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl QrRenderer for HttpQrRenderer {
    async fn render(&self, data: &str) -> Result<String, QrError> {
        let encoded: String = url::form_urlencoded::byte_serialize(data.as_bytes()).collect();
        let url = format!("{}/{}", self.service_url, encoded);
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::USER_AGENT, "curl")
            .send()
            .await
            .map_err(|e| QrError {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(QrError {
                message: format!("service answered {}", response.status()),
            });
        }

        response.text().await.map_err(|e| QrError {
            message: e.to_string(),
        })
    }
}

/// Console implementation of [`UserInteraction`].
#[derive(Debug, Default, Clone)]
pub struct ConsoleInteraction {
    /// Skip launching a browser and only print URLs.
    pub print_only: bool,
}

#[async_trait]
impl UserInteraction for ConsoleInteraction {
    fn show_device_code(&self, handle: &DeviceFlowHandle) {
        match &handle.message {
            Some(message) => eprintln!("{message}"),
            None => eprintln!(
                "To sign in, open {} and enter the code {}",
                handle.verification_uri, handle.user_code
            ),
        }
        eprintln!("Waiting for authorization...");
    }

    fn show_authorization_url(&self, url: &Url) {
        if !self.print_only {
            if let Err(e) = open::that(url.as_str()) {
                tracing::debug!("Could not open browser: {}", e);
            }
        }
        eprintln!("Sign in by visiting this URL in a browser:\n\n{url}\n");
        eprintln!("After signing in you will land on a page that may fail to load.");
        eprintln!("Copy that page's full URL from the address bar.");
    }

    fn show_qr(&self, rendered: &str) {
        eprintln!("{rendered}");
    }

    async fn prompt_redirect_url(&self) -> Result<String, InteractionError> {
        tokio::task::spawn_blocking(read_redirect_url)
            .await
            .map_err(|e| InteractionError::Input {
                message: e.to_string(),
            })?
    }
}

fn read_redirect_url() -> Result<String, InteractionError> {
    if std::io::stdin().is_terminal() {
        return dialoguer::Input::<String>::new()
            .with_prompt("Redirected URL")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| InteractionError::Input {
                message: e.to_string(),
            });
    }

    eprint!("Redirected URL: ");
    let _ = std::io::stderr().flush();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| InteractionError::Input {
            message: e.to_string(),
        })?;
    Ok(line.trim().to_string())
}
