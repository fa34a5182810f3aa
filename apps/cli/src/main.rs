//! DMFlow CLI
//!
//! Connects a merchant account from the terminal: the system browser stands
//! in for the popup and a loopback page delivers the provider's result.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use dmflow_connect::{ConnectionOrchestrator, HttpConnectBackend, MessageChannel};
use dmflow_core::{branding, ConnectConfig};
use tracing::{info, warn};

mod browser;
mod callback_server;

use browser::SystemBrowserPopup;
use callback_server::CallbackServer;

#[derive(Parser, Debug)]
#[command(name = "dmflow-cli", version)]
#[command(about = "Connect a social account to DMFlow")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one OAuth connect attempt in the system browser
    Connect(ConnectArgs),
}

#[derive(Args, Debug)]
struct ConnectArgs {
    /// Provider to connect (overrides DMFLOW_PROVIDER)
    #[arg(long)]
    provider: Option<String>,

    /// Dashboard API base URL (overrides DMFLOW_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Preferred port for the loopback callback page
    #[arg(long, default_value_t = branding::DEFAULT_LOOPBACK_PORT)]
    port: u16,

    /// Seconds to wait for the provider; 0 waits forever
    #[arg(long)]
    timeout_secs: Option<u64>,
}

fn get_logs_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(branding::LOG_PREFIX)
        .join("logs")
}

/// Initialize tracing with console and file logging
///
/// - Console: colored, compact format
/// - File: daily rotation in the local data directory
fn init_tracing() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let logs_dir = get_logs_dir();
    if let Err(e) = std::fs::create_dir_all(&logs_dir) {
        eprintln!("Warning: Failed to create logs directory: {}", e);
    }

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(branding::LOG_PREFIX)
        .filename_suffix("log")
        .build(&logs_dir)
        .context("Failed to create log file appender")?;
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG takes precedence
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,dmflow_core=debug,dmflow_connect=debug,dmflow_cli=debug")
    });

    let console_layer = fmt::layer()
        .with_ansi(true)
        .compact()
        .with_line_number(false)
        .with_file(false)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Dropping the guard stops file logging
    let _log_guard = init_tracing()?;
    info!(
        "Starting {} CLI v{}",
        branding::DISPLAY_NAME,
        env!("CARGO_PKG_VERSION")
    );

    match cli.command {
        Command::Connect(args) => connect(args).await,
    }
}

async fn connect(args: ConnectArgs) -> Result<()> {
    let mut config = ConnectConfig::from_env().context("Invalid DMFLOW_* configuration")?;
    if let Some(provider) = args.provider {
        config = config.with_provider(provider);
    }
    if let Some(api_url) = args.api_url {
        config.api_base_url = api_url;
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_callback_timeout((secs > 0).then(|| Duration::from_secs(secs)));
    }

    let messages = MessageChannel::new();
    let server = CallbackServer::start(messages.clone(), args.port).await?;
    // The loopback page is the only window that can report back
    config.trusted_origin = server.origin().to_string();
    info!("Provider redirect must target {}", server.redirect_url());

    let backend = Arc::new(HttpConnectBackend::new(&config)?);
    let popup = Arc::new(SystemBrowserPopup::new());
    let orchestrator = ConnectionOrchestrator::new(config, backend, popup, messages)?;
    let _status = orchestrator.on_status_change(|event| {
        info!("[OAuth] Status: {}", event.status.label());
    });

    let result = tokio::select! {
        result = orchestrator.connect() => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling connection attempt");
            orchestrator.cancel();
            bail!("Connection cancelled");
        }
    };

    if result.connected {
        println!(
            "Connected {} account {}",
            orchestrator.config().provider,
            result.account_handle.as_deref().unwrap_or("(unknown handle)")
        );
        return Ok(());
    }

    let message = result.user_message().unwrap_or("Connection failed.");
    match &result.error {
        Some(error) => bail!("{} ({})", message, error),
        None => bail!("{}", message),
    }
}
