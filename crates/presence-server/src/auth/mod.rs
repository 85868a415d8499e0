//! Agent authentication
//!
//! Agents prove possession of the person's private key by signing a
//! fresh random nonce. There is exactly one trusted public key.

mod verifier;

pub use verifier::{Challenge, IdentityVerifier, Verdict};
