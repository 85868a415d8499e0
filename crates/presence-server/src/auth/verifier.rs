//! Challenge/response identity verification

use std::path::Path;

use rand::rngs::OsRng;
use rand::RngCore;
use ssh_key::{PublicKey, SshSig};

use presence_core::error::KeyError;
use presence_core::keys;
use presence_protocol::{Nonce, NONCE_LEN, SIGNATURE_NAMESPACE};

/// A nonce issued for exactly one handshake.
///
/// `IdentityVerifier::verify` consumes the challenge, so a nonce can be
/// checked against at most one signature. Every connection gets a new
/// challenge, which is what makes replaying an old signature useless.
#[derive(Debug)]
pub struct Challenge {
    nonce: Nonce,
}

impl Challenge {
    /// Nonce to send to the agent
    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }
}

/// Outcome of a handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// Checks signatures against the single configured public key.
///
/// Read-only after construction; share it freely behind an `Arc`.
#[derive(Debug)]
pub struct IdentityVerifier {
    public_key: PublicKey,
    fingerprint: String,
}

impl IdentityVerifier {
    /// Create a verifier trusting `public_key`
    pub fn new(public_key: PublicKey) -> Self {
        let fingerprint = keys::fingerprint(&public_key);
        Self {
            public_key,
            fingerprint,
        }
    }

    /// Create a verifier from an OpenSSH public key file
    pub fn from_file(path: &Path) -> Result<Self, KeyError> {
        keys::load_public_key(path).map(Self::new)
    }

    /// Fingerprint of the trusted key
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Issue a fresh challenge from the OS random source
    pub fn challenge(&self) -> Challenge {
        let mut bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut bytes);
        Challenge {
            nonce: Nonce::from_bytes(bytes),
        }
    }

    /// Check `signature` (PEM-armored SSHSIG) over the challenge nonce.
    ///
    /// Malformed input is just another rejection; the reason is logged at
    /// debug level and never reported to the peer.
    pub fn verify(&self, challenge: Challenge, signature: &str) -> Verdict {
        let sig = match SshSig::from_pem(signature) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::debug!("Unparseable signature for {}: {}", challenge.nonce, e);
                return Verdict::Rejected;
            }
        };

        match self
            .public_key
            .verify(SIGNATURE_NAMESPACE, challenge.nonce.as_bytes(), &sig)
        {
            Ok(()) => Verdict::Accepted,
            Err(e) => {
                tracing::debug!("Signature rejected for {}: {}", challenge.nonce, e);
                Verdict::Rejected
            }
        }
    }
}
