//! presence-protocol: Wire protocol for presence reporting
//!
//! This crate defines the framed binary protocol spoken between the
//! presence agent running on each computer and the presence server.

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod nonce;

pub use codec::FrameCodec;
pub use error::ProtocolError;
pub use frame::{FrameHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use message::{is_compatible_version, Message, MessageType, PROTOCOL_VERSION, SIGNATURE_NAMESPACE};
pub use nonce::{Nonce, NONCE_LEN};
