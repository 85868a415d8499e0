//! CLI command implementations

mod join;
mod keygen;
mod serve;
mod status;

pub use join::{join_command, JoinArgs};
pub use keygen::{keygen_command, KeygenArgs};
pub use serve::{serve_command, ServeArgs};
pub use status::{query_status, status_command, status_url, StatusArgs, StatusError};

use std::path::Path;

use anyhow::{Context, Result};

use presence_core::config::{self, ConfigFile};

/// Load the configuration file.
///
/// An explicit path must exist and parse. Without one, the default
/// location is used if present and built-in defaults otherwise.
pub fn load_config_file(path: Option<&Path>) -> Result<ConfigFile> {
    if let Some(path) = path {
        return config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path));
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        config::load_config(&default_path)
            .with_context(|| format!("Failed to load config from {:?}", default_path))
    } else {
        tracing::debug!("No config file at {:?}, using defaults", default_path);
        Ok(ConfigFile::default())
    }
}

/// Split `host:port`; IPv6 literals keep their brackets
fn split_host_port(address: &str) -> (&str, Option<&str>) {
    match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && (!host.contains(':') || host.ends_with(']')) => {
            (host, Some(port))
        }
        _ => (address, None),
    }
}

/// Replace (or add) the port of an address
pub(crate) fn with_port(address: &str, port: u16) -> String {
    let (host, _) = split_host_port(address);
    format!("{}:{}", host, port)
}

/// Replace the host of an address, keeping its port
pub(crate) fn with_host(address: &str, host: &str, default_port: u16) -> String {
    let port = split_host_port(address)
        .1
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(default_port);
    format!("{}:{}", host, port)
}

/// Add `default_port` when the address has none
pub(crate) fn ensure_port(address: &str, default_port: u16) -> String {
    match split_host_port(address) {
        (_, Some(_)) => address.to_string(),
        (host, None) => format!("{}:{}", host, default_port),
    }
}
