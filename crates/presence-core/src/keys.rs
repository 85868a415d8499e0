//! Key file handling
//!
//! All computers belonging to one person share a single Ed25519 key pair
//! stored in OpenSSH format. The server reads the public half, every agent
//! reads the private half. Both are loaded once at startup.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use presence_protocol::{Nonce, SIGNATURE_NAMESPACE};
use rand::rngs::OsRng;
use ssh_key::{Algorithm, HashAlg, LineEnding, PrivateKey, PublicKey};

use crate::error::KeyError;

/// Load the trust anchor public key (`ssh-ed25519 AAAA... comment`)
pub fn load_public_key(path: &Path) -> Result<PublicKey, KeyError> {
    if !path.exists() {
        return Err(KeyError::NotFound(path.to_path_buf()));
    }

    let key = PublicKey::read_openssh_file(path).map_err(|source| KeyError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    ensure_ed25519(path, key.algorithm())?;

    tracing::debug!("Loaded public key {} from {:?}", fingerprint(&key), path);
    Ok(key)
}

/// Load the signing key shared by the person's computers
pub fn load_private_key(path: &Path) -> Result<PrivateKey, KeyError> {
    if !path.exists() {
        return Err(KeyError::NotFound(path.to_path_buf()));
    }

    let key = PrivateKey::read_openssh_file(path).map_err(|source| KeyError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if key.is_encrypted() {
        return Err(KeyError::Encrypted(path.to_path_buf()));
    }
    ensure_ed25519(path, key.algorithm())?;

    tracing::debug!(
        "Loaded private key for {} from {:?}",
        fingerprint(key.public_key()),
        path
    );
    Ok(key)
}

/// Generate a new key pair, writing `path` and `path.pub`.
///
/// The private key file is created with mode 0600 on unix. Existing files
/// are only replaced when `force` is set.
pub fn generate_keypair(path: &Path, force: bool) -> Result<PrivateKey, KeyError> {
    let pub_path = public_key_path(path);
    if !force {
        for existing in [path, pub_path.as_path()] {
            if existing.exists() {
                return Err(KeyError::AlreadyExists(existing.to_path_buf()));
            }
        }
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| KeyError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).map_err(KeyError::Generate)?;
    let private_pem = key.to_openssh(LineEnding::LF).map_err(KeyError::Generate)?;
    let public_line = key.public_key().to_openssh().map_err(KeyError::Generate)?;

    write_file(path, private_pem.as_bytes(), true)?;
    write_file(&pub_path, format!("{}\n", public_line).as_bytes(), false)?;

    tracing::info!(
        "Generated key {} at {:?}",
        fingerprint(key.public_key()),
        path
    );
    Ok(key)
}

/// Sign a challenge nonce, producing the PEM-armored SSHSIG sent in
/// `Message::Response`
pub fn sign_nonce(key: &PrivateKey, nonce: &Nonce) -> Result<String, ssh_key::Error> {
    key.sign(SIGNATURE_NAMESPACE, HashAlg::Sha512, nonce.as_bytes())?
        .to_pem(LineEnding::LF)
}

/// Conventional location of the public half of `private_path`
pub fn public_key_path(private_path: &Path) -> PathBuf {
    let mut name = private_path.as_os_str().to_owned();
    name.push(".pub");
    PathBuf::from(name)
}

/// SHA256 fingerprint as printed by `ssh-keygen -l`
pub fn fingerprint(key: &PublicKey) -> String {
    key.fingerprint(HashAlg::Sha256).to_string()
}

fn ensure_ed25519(path: &Path, algorithm: Algorithm) -> Result<(), KeyError> {
    if algorithm == Algorithm::Ed25519 {
        Ok(())
    } else {
        Err(KeyError::UnsupportedAlgorithm {
            path: path.to_path_buf(),
            algorithm: algorithm.to_string(),
        })
    }
}

fn write_file(path: &Path, contents: &[u8], secret: bool) -> Result<(), KeyError> {
    let io_err = |source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(if secret { 0o600 } else { 0o644 });
    }
    #[cfg(not(unix))]
    let _ = secret;

    let mut file = options.open(path).map_err(io_err)?;
    file.write_all(contents).map_err(io_err)?;
    Ok(())
}
