//! `presence keygen`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use presence_core::config::default_config_dir;
use presence_core::keys::{fingerprint, generate_keypair, public_key_path};

use crate::output::{print_info, print_success, print_warning};

#[derive(Debug, Clone, Default, Args)]
pub struct KeygenArgs {
    /// Where to write the private key; the public key gets a `.pub` suffix
    pub path: Option<PathBuf>,

    /// Overwrite existing key files
    #[arg(short, long)]
    pub force: bool,
}

/// Generate the key pair shared by all of one person's computers
pub fn keygen_command(args: &KeygenArgs) -> Result<PathBuf> {
    let path = args
        .path
        .clone()
        .unwrap_or_else(|| default_config_dir().join("presence_key"));

    let replaced = args.force && (path.exists() || public_key_path(&path).exists());

    let key = generate_keypair(&path, args.force)
        .with_context(|| format!("Failed to generate key pair at {:?}", path))?;

    if replaced {
        print_warning(
            "Replaced the existing key pair; computers holding the old key must be updated",
        );
    }
    print_success(&format!("Private key written to {}", path.display()));
    print_success(&format!(
        "Public key written to {}",
        public_key_path(&path).display()
    ));
    print_info(&format!("Fingerprint: {}", fingerprint(key.public_key())));
    print_info("Copy the private key to each computer; give the server the public key");

    Ok(path)
}
