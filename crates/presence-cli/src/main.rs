//! presence CLI
//!
//! Single binary for all presence roles:
//! - `serve`: aggregate agent connections and answer status queries
//! - `join`: keep this computer counted while the user is at it
//! - `status`: ask whether the person is online
//! - `keygen`: create the key pair shared by the person's computers

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use presence_cli::commands::{self, JoinArgs, KeygenArgs, ServeArgs, StatusArgs};
use presence_cli::output::print_error;

#[derive(Parser)]
#[command(name = "presence")]
#[command(author, version, about = "Is this person online? Presence across all of one person's computers")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the presence server: accept agents and serve the status endpoint
    Serve(ServeArgs),

    /// Run the agent: keep this computer's presence connection open
    Join(JoinArgs),

    /// Ask a status endpoint whether the person is online
    /// (exit code 0 = online, 1 = offline, 2 = no answer)
    Status(StatusArgs),

    /// Generate the key pair shared by all of the person's computers
    Keygen(KeygenArgs),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = match (&cli.log_level, cli.verbose) {
        (Some(level), _) => level.clone(),
        (None, 0) => "info".to_string(),
        (None, 1) => "debug".to_string(),
        (None, _) => "trace".to_string(),
    };

    // Logs go to stderr so `presence status` output stays scriptable
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or(log_level),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Serve(args) => {
            let file = commands::load_config_file(cli.config.as_deref())?;
            let config = args.apply(file.server);
            commands::serve_command(config, shutdown_token()).await?;
        }

        Commands::Join(args) => {
            let file = commands::load_config_file(cli.config.as_deref())?;
            let config = args.apply(file.agent);
            commands::join_command(config, shutdown_token()).await?;
        }

        Commands::Status(args) => {
            return Ok(match commands::status_command(&args).await {
                Ok(presence) if presence.is_online() => ExitCode::SUCCESS,
                Ok(_) => ExitCode::from(1),
                Err(e) => {
                    print_error(&e.to_string());
                    ExitCode::from(2)
                }
            });
        }

        Commands::Keygen(args) => {
            commands::keygen_command(&args)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Token cancelled on Ctrl+C or SIGTERM
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel_clone.cancel();
    });

    cancel
}
