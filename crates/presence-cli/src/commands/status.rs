//! `presence status`
//!
//! Asks a server's status endpoint whether the person is online. The
//! answer goes to stdout as `ONLINE` or `OFFLINE` and is mirrored in the
//! exit code so shell scripts can branch on it.

use std::time::Duration;

use clap::Args;
use thiserror::Error;

use presence_core::config::DEFAULT_STATUS_PORT;
use presence_core::Presence;

use super::{ensure_port, with_port};

#[derive(Debug, Clone, Args)]
pub struct StatusArgs {
    /// Status endpoint: a URL, or a host with optional port
    pub target: String,

    /// Status port, when `target` is a bare host
    #[arg(short = 's', long)]
    pub status_port: Option<u16>,

    /// Give up after this many seconds
    #[arg(short, long, default_value_t = 5)]
    pub timeout: u64,
}

/// Failure to obtain a presence answer
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server answered with HTTP {0}")]
    UnexpectedStatus(reqwest::StatusCode),

    #[error("Server answered with unexpected body {0:?}")]
    UnexpectedBody(String),
}

/// Build the URL to query from what the user typed
pub fn status_url(target: &str, status_port: Option<u16>) -> String {
    if let Some(rest) = target
        .strip_prefix("http://")
        .or_else(|| target.strip_prefix("https://"))
    {
        if rest.trim_end_matches('/').contains('/') {
            return target.to_string();
        }
        return format!("{}/status", target.trim_end_matches('/'));
    }

    let address = match status_port {
        Some(port) => with_port(target, port),
        None => ensure_port(target, DEFAULT_STATUS_PORT),
    };
    format!("http://{}/status", address)
}

/// Fetch and parse one status answer
pub async fn query_status(url: &str, timeout: Duration) -> Result<Presence, StatusError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(StatusError::UnexpectedStatus(status));
    }

    let body = response.text().await?;
    body.parse::<Presence>()
        .map_err(|_| StatusError::UnexpectedBody(body.trim().to_string()))
}

/// Query the endpoint and print the answer
pub async fn status_command(args: &StatusArgs) -> Result<Presence, StatusError> {
    let url = status_url(&args.target, args.status_port);
    tracing::debug!("Querying {}", url);

    let presence = query_status(&url, Duration::from_secs(args.timeout)).await?;
    println!("{}", presence);
    Ok(presence)
}
