//! presence-cli: the `presence` binary
//!
//! One executable for every role: `serve` on the machine that answers
//! status queries, `join` on each of the person's computers, `status` for
//! anyone who wants to ask, and `keygen` to create the shared key pair.

pub mod commands;
pub mod output;
