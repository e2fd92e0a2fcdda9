//! mailkey git credential helper
//!
//! Issues OAuth2 access tokens for IMAP/POP/SMTP and hands them to git (or
//! any caller speaking the git credential protocol) as the password.
//!
//! # Usage
//!
//! ```bash
//! # One-time sign in (device code flow by default)
//! git-credential-mailkey --authenticate
//!
//! # What git runs; prints password=<access token>
//! git-credential-mailkey get
//!
//! # Use the Outlook client id instead of the Thunderbird one
//! git-credential-mailkey --configure outlook
//! ```

use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgGroup, CommandFactory, Parser, ValueEnum, error::ErrorKind};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

use mailkey_core::protocol::{self, CredentialRequest, EXIT_FAILURE, GitOperation};
use mailkey_core::{
    BuiltinClient, ClientChoice, ClientIdentity, Config, ConsoleInteraction, FlowChoice,
    FlowEnvironment, HttpQrRenderer, HttpTokenExchange, MailkeyError, NoEmbeddedBrowser,
    QrRenderer, SecretStore, TokenLifecycleManager, open_store,
};

#[derive(Parser)]
#[command(name = "git-credential-mailkey")]
#[command(about = "Git credential helper providing OAuth2 access tokens for mail")]
#[command(version)]
#[command(group(
    ArgGroup::new("action")
        .args(["authenticate", "device", "external_auth", "delete_token", "configure", "delete_config", "status"])
))]
struct Cli {
    /// Git credential operation; store and erase are accepted and ignored
    #[arg(value_enum)]
    operation: Option<Operation>,

    /// Sign in and store a refresh token
    #[arg(long)]
    authenticate: bool,

    /// Sign in with the device code flow
    #[arg(long)]
    device: bool,

    /// Sign in by pasting the redirected URL from an external browser
    #[arg(long)]
    external_auth: bool,

    /// Delete the stored refresh token
    #[arg(long)]
    delete_token: bool,

    /// Select the OAuth2 client identity to use
    #[arg(long, value_enum, value_name = "CLIENT")]
    configure: Option<ClientKind>,

    /// Client id for `--configure custom` (required there)
    #[arg(long, requires = "configure", required_if_eq("configure", "custom"))]
    client_id: Option<String>,

    /// Redirect URI for `--configure custom` (required there)
    #[arg(long, requires = "configure", required_if_eq("configure", "custom"))]
    redirect_uri: Option<String>,

    /// Delete the configured client identity
    #[arg(long)]
    delete_config: bool,

    /// Show the client identity in use and whether a token is stored
    #[arg(long)]
    status: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Operation {
    Get,
    Store,
    Erase,
}

impl From<Operation> for GitOperation {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Get => GitOperation::Get,
            Operation::Store => GitOperation::Store,
            Operation::Erase => GitOperation::Erase,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ClientKind {
    Thunderbird,
    Outlook,
    Custom,
}

type Manager = TokenLifecycleManager<Box<dyn SecretStore>, HttpTokenExchange>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let (message, code) = match err.downcast_ref::<MailkeyError>() {
                Some(e) => (protocol::failure_message(e), protocol::exit_code(e)),
                None => (format!("{err:#}"), EXIT_FAILURE),
            };
            eprintln!("git-credential-mailkey: {message}");
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    init_logging(&config.log_level, cli.verbose);

    if let Some(path) = &config.config_path {
        debug!("Loaded configuration from {:?}", path);
    }

    let store = open_store(config.store_backend, &config.keyring_service)
        .map_err(MailkeyError::from)?;
    let manager = TokenLifecycleManager::new(store, HttpTokenExchange::new(config.provider()));

    if let Some(kind) = cli.configure {
        let choice = client_choice(kind, cli.client_id, cli.redirect_uri);
        return configure(&manager, &choice).await;
    }
    if cli.delete_config {
        manager.clear_client().await.map_err(MailkeyError::from)?;
        println!("Client configuration deleted");
        return Ok(());
    }
    if cli.delete_token {
        manager.forget().await.map_err(MailkeyError::from)?;
        println!("Refresh token deleted");
        return Ok(());
    }
    if cli.status {
        let status = manager.status().await.map_err(MailkeyError::from)?;
        for line in protocol::status_lines(&status) {
            println!("{line}");
        }
        return Ok(());
    }

    let flow = if cli.device {
        Some(FlowChoice::Device)
    } else if cli.external_auth {
        Some(FlowChoice::ExternalBrowser)
    } else if cli.authenticate {
        Some(FlowChoice::Auto)
    } else {
        None
    };
    if let Some(choice) = flow {
        return authenticate(&manager, &config, choice).await;
    }

    let operation = cli.operation.map(GitOperation::from);
    match operation.unwrap_or_default() {
        GitOperation::Get => issue_password(&manager, operation.is_some()).await,
        other => {
            debug!(operation = %other, "Ignoring credential operation");
            Ok(())
        }
    }
}

fn init_logging(level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn client_choice(
    kind: ClientKind,
    client_id: Option<String>,
    redirect_uri: Option<String>,
) -> ClientChoice {
    match kind {
        ClientKind::Thunderbird => ClientChoice::Builtin(BuiltinClient::Thunderbird),
        ClientKind::Outlook => ClientChoice::Builtin(BuiltinClient::Outlook),
        ClientKind::Custom => {
            let (Some(client_id), Some(redirect_uri)) = (client_id, redirect_uri) else {
                Cli::command()
                    .error(
                        ErrorKind::MissingRequiredArgument,
                        "--configure custom requires --client-id and --redirect-uri",
                    )
                    .exit()
            };
            ClientChoice::Custom(ClientIdentity::new(client_id, redirect_uri))
        }
    }
}

async fn configure(manager: &Manager, choice: &ClientChoice) -> Result<()> {
    let identity = manager
        .configure_client(choice)
        .await
        .map_err(MailkeyError::from)?;
    match choice {
        ClientChoice::Builtin(builtin) => println!("Configured client: {builtin}"),
        ClientChoice::Custom(_) => println!("Configured client: custom"),
    }
    println!("client_id: {}", identity.client_id);
    println!("redirect_uri: {}", identity.redirect_uri);
    println!("Run with --authenticate to sign in with this client");
    Ok(())
}

async fn authenticate(manager: &Manager, config: &Config, choice: FlowChoice) -> Result<()> {
    let interaction = ConsoleInteraction::default();
    let browser = NoEmbeddedBrowser;
    let qr = HttpQrRenderer::new(config.qr_service.as_str());

    let env = FlowEnvironment {
        interaction: &interaction,
        browser: &browser,
        qr: config.qr_codes.then_some(&qr as &dyn QrRenderer),
    };

    let flow = manager
        .authenticate(choice, env)
        .await
        .map_err(MailkeyError::from)?;
    info!(%flow, "Authentication complete");
    println!("Authentication successful");
    Ok(())
}

async fn issue_password(manager: &Manager, from_git: bool) -> Result<()> {
    if from_git && !std::io::stdin().is_terminal() {
        let request = CredentialRequest::read_from(std::io::stdin().lock())
            .map_err(MailkeyError::from)?;
        debug!(
            protocol = request.protocol().unwrap_or("-"),
            host = request.host().unwrap_or("-"),
            username = request.username().unwrap_or("-"),
            "Credential request"
        );
    }

    let token = manager
        .issue_access_token()
        .await
        .map_err(MailkeyError::from)?;
    protocol::write_password(std::io::stdout().lock(), &token)
        .context("Failed to write password line")?;
    Ok(())
}
