//! Outbound connection to the presence server
//!
//! Opens the TCP transport and answers the server's challenge.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use ssh_key::PrivateKey;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use presence_core::config::AgentConfig;
use presence_core::error::{ConnectionError, KeyError};
use presence_core::keys::{load_private_key, sign_nonce};
use presence_protocol::{is_compatible_version, FrameCodec, Message, PROTOCOL_VERSION};

use super::session::Link;

/// Framed transport to the server
pub type Transport = Framed<TcpStream, FrameCodec>;

/// Establishes authenticated connections to the presence server
pub struct Connector {
    /// Agent configuration
    config: AgentConfig,
    /// Private half of the person's key pair
    key: Arc<PrivateKey>,
}

impl Connector {
    /// Create a connector, loading the private key named in `config`
    pub fn new(config: AgentConfig) -> Result<Self, KeyError> {
        let key = load_private_key(&config.private_key_path)?;
        Ok(Self::with_key(config, key))
    }

    /// Create a connector around an already loaded key
    pub fn with_key(config: AgentConfig, key: PrivateKey) -> Self {
        Self {
            config,
            key: Arc::new(key),
        }
    }

    /// Get the agent configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Open the TCP transport, bounded by `connect_timeout`
    pub async fn open_transport(&self) -> Result<Transport, ConnectionError> {
        let address = &self.config.server_address;
        tracing::debug!("Connecting to {}", address);

        let stream = timeout(self.config.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| {
                ConnectionError::ConnectionRefused(format!(
                    "timed out connecting to {} after {:?}",
                    address, self.config.connect_timeout
                ))
            })?
            .map_err(|e| ConnectionError::ConnectionRefused(format!("{}: {}", address, e)))?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY: {}", e);
        }

        Ok(Framed::new(stream, FrameCodec::new()))
    }

    /// Answer the server's challenge, bounded by `auth_timeout`
    pub async fn authenticate(&self, transport: &mut Transport) -> Result<(), ConnectionError> {
        let limit = self.config.auth_timeout;
        timeout(limit, self.handshake(transport))
            .await
            .map_err(|_| ConnectionError::AuthenticationTimeout(limit))?
    }

    /// Open a transport and authenticate on it
    pub async fn connect(&self) -> Result<Link, ConnectionError> {
        let mut transport = self.open_transport().await?;
        self.authenticate(&mut transport).await?;
        Ok(Link::new(transport))
    }

    async fn handshake(&self, transport: &mut Transport) -> Result<(), ConnectionError> {
        let nonce = match next_message(transport).await? {
            Message::Challenge { nonce, version } => {
                if !is_compatible_version(&version) {
                    return Err(ConnectionError::VersionMismatch {
                        server: version,
                        ours: PROTOCOL_VERSION.to_string(),
                    });
                }
                nonce
            }
            other => {
                return Err(ConnectionError::HandshakeFailed(format!(
                    "expected Challenge, got {:?}",
                    other.message_type()
                )))
            }
        };
        tracing::trace!("Received challenge {}", nonce);

        let signature = sign_nonce(&self.key, &nonce).map_err(|e| {
            ConnectionError::HandshakeFailed(format!("failed to sign challenge: {}", e))
        })?;
        transport.send(Message::Response { signature }).await?;

        match next_message(transport).await? {
            Message::AuthResult { accepted: true } => Ok(()),
            Message::AuthResult { accepted: false } => Err(ConnectionError::AuthenticationFailed),
            other => Err(ConnectionError::HandshakeFailed(format!(
                "expected AuthResult, got {:?}",
                other.message_type()
            ))),
        }
    }
}

async fn next_message(transport: &mut Transport) -> Result<Message, ConnectionError> {
    match transport.next().await {
        Some(result) => Ok(result?),
        None => Err(ConnectionError::ConnectionLost(
            "server closed the connection".to_string(),
        )),
    }
}
