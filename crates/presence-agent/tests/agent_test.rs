//! Agent tests against a scripted server

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::rngs::OsRng;
use ssh_key::{Algorithm, PrivateKey, PublicKey, SshSig};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use presence_agent::{AlwaysPresent, Connector, DisconnectReason, LivenessLoop, PresenceGate};
use presence_core::config::{AgentConfig, BackoffConfig};
use presence_core::error::ConnectionError;
use presence_core::ClientState;
use presence_protocol::{FrameCodec, Message, Nonce, PROTOCOL_VERSION, SIGNATURE_NAMESPACE};

type ServerSide = Framed<TcpStream, FrameCodec>;

fn test_key() -> PrivateKey {
    PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap()
}

fn test_config(addr: SocketAddr) -> AgentConfig {
    AgentConfig {
        server_address: addr.to_string(),
        heartbeat_interval: Duration::from_millis(50),
        server_timeout: Duration::from_millis(300),
        connect_timeout: Duration::from_secs(1),
        auth_timeout: Duration::from_millis(300),
        backoff: BackoffConfig {
            initial: Duration::from_millis(20),
            max: Duration::from_millis(100),
            multiplier: 2.0,
            jitter: 0.0,
        },
        ..Default::default()
    }
}

/// Accept connections forever, running `script` on each one
async fn scripted_server<F, Fut>(script: F) -> SocketAddr
where
    F: Fn(ServerSide) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(script(Framed::new(socket, FrameCodec::new())));
        }
    });
    addr
}

/// Issue a challenge and check the answer against `public_key`
async fn challenge(transport: &mut ServerSide, public_key: &PublicKey) -> bool {
    let nonce = Nonce::from_bytes(rand::random());
    transport
        .send(Message::Challenge {
            nonce,
            version: PROTOCOL_VERSION.to_string(),
        })
        .await
        .unwrap();

    let signature = match transport.next().await {
        Some(Ok(Message::Response { signature })) => signature,
        _ => return false,
    };
    let accepted = SshSig::from_pem(&signature)
        .map(|sig| {
            public_key
                .verify(SIGNATURE_NAMESPACE, nonce.as_bytes(), &sig)
                .is_ok()
        })
        .unwrap_or(false);

    let _ = transport.send(Message::AuthResult { accepted }).await;
    accepted
}

/// A well-behaved server: verify, then acknowledge heartbeats and report
/// every message it sees
async fn honest_server(public_key: PublicKey) -> (SocketAddr, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let addr = scripted_server(move |mut transport| {
        let public_key = public_key.clone();
        let tx = tx.clone();
        async move {
            if !challenge(&mut transport, &public_key).await {
                return;
            }
            while let Some(Ok(message)) = transport.next().await {
                if let Message::Heartbeat { timestamp } = message {
                    let _ = transport.send(Message::HeartbeatAck { timestamp }).await;
                }
                let _ = tx.send(message);
            }
        }
    })
    .await;
    (addr, rx)
}

async fn wait_for_state(rx: &mut tokio::sync::watch::Receiver<ClientState>, want: ClientState) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == want))
        .await
        .expect("timed out waiting for state")
        .unwrap();
}

struct ToggleGate(AtomicBool);

impl PresenceGate for ToggleGate {
    fn is_present(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn test_connect_and_heartbeat() {
    let key = test_key();
    let (addr, mut seen) = honest_server(key.public_key().clone()).await;

    let connector = Connector::with_key(test_config(addr), key);
    let link = connector.connect().await.unwrap();

    let cancel = CancellationToken::new();
    let held = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            link.hold(
                Duration::from_secs(10),
                Duration::from_secs(30),
                &AlwaysPresent,
                &cancel,
            )
            .await
        })
    };

    // First heartbeat goes out without waiting a full interval
    let first = tokio::time::timeout(Duration::from_secs(2), seen.recv())
        .await
        .unwrap();
    assert!(matches!(first, Some(Message::Heartbeat { .. })));

    cancel.cancel();
    assert_eq!(held.await.unwrap(), DisconnectReason::Cancelled);

    let mut last = None;
    while let Ok(Some(message)) =
        tokio::time::timeout(Duration::from_millis(500), seen.recv()).await
    {
        last = Some(message);
    }
    assert_eq!(last, Some(Message::Goodbye));
}

#[tokio::test]
async fn test_wrong_key_is_rejected() {
    let (addr, _seen) = honest_server(test_key().public_key().clone()).await;

    let connector = Connector::with_key(test_config(addr), test_key());
    let err = connector.connect().await.err().unwrap();
    assert!(matches!(err, ConnectionError::AuthenticationFailed));
}

#[tokio::test]
async fn test_incompatible_version() {
    let addr = scripted_server(|mut transport| async move {
        let _ = transport
            .send(Message::Challenge {
                nonce: Nonce::from_bytes([1; 32]),
                version: "2.0".to_string(),
            })
            .await;
        let _ = transport.next().await;
    })
    .await;

    let connector = Connector::with_key(test_config(addr), test_key());
    match connector.connect().await.err().unwrap() {
        ConnectionError::VersionMismatch { server, ours } => {
            assert_eq!(server, "2.0");
            assert_eq!(ours, PROTOCOL_VERSION);
        }
        other => panic!("Expected VersionMismatch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_silent_server_times_out_handshake() {
    let addr = scripted_server(|mut transport| async move {
        // Accept the socket, never send a challenge
        let _ = transport.next().await;
    })
    .await;

    let connector = Connector::with_key(test_config(addr), test_key());
    let err = connector.connect().await.err().unwrap();
    assert!(matches!(err, ConnectionError::AuthenticationTimeout(_)));
}

#[tokio::test]
async fn test_unexpected_handshake_message() {
    let addr = scripted_server(|mut transport| async move {
        let _ = transport.send(Message::HeartbeatAck { timestamp: 0 }).await;
        let _ = transport.next().await;
    })
    .await;

    let connector = Connector::with_key(test_config(addr), test_key());
    let err = connector.connect().await.err().unwrap();
    assert!(matches!(err, ConnectionError::HandshakeFailed(_)));
}

#[tokio::test]
async fn test_connector_uses_key_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("presence_key");
    let key = presence_core::keys::generate_keypair(&path, false).unwrap();
    let (addr, _seen) = honest_server(key.public_key().clone()).await;

    let config = AgentConfig {
        private_key_path: path,
        ..test_config(addr)
    };
    Connector::new(config).unwrap().connect().await.unwrap();
}

#[tokio::test]
async fn test_nothing_listening() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let connector = Connector::with_key(test_config(addr), test_key());
    let err = connector.connect().await.err().unwrap();
    assert!(matches!(err, ConnectionError::ConnectionRefused(_)));
}

#[tokio::test]
async fn test_unacknowledged_heartbeats_end_link() {
    let key = test_key();
    let public_key = key.public_key().clone();
    let addr = scripted_server(move |mut transport| {
        let public_key = public_key.clone();
        async move {
            if challenge(&mut transport, &public_key).await {
                // Swallow heartbeats without acknowledging them
                while let Some(Ok(_)) = transport.next().await {}
            }
        }
    })
    .await;

    let connector = Connector::with_key(test_config(addr), key);
    let link = connector.connect().await.unwrap();
    let reason = link
        .hold(
            Duration::from_millis(50),
            Duration::from_millis(200),
            &AlwaysPresent,
            &CancellationToken::new(),
        )
        .await;
    assert!(matches!(reason, DisconnectReason::ServerSilent(_)));
}

#[tokio::test]
async fn test_liveness_loop_connects_and_says_goodbye() {
    let key = test_key();
    let (addr, mut seen) = honest_server(key.public_key().clone()).await;

    let agent = Arc::new(LivenessLoop::new(
        Connector::with_key(test_config(addr), key),
        Arc::new(AlwaysPresent),
    ));
    let mut states = agent.subscribe();
    assert_eq!(agent.state(), ClientState::Disconnected);

    let cancel = CancellationToken::new();
    let running = {
        let agent = Arc::clone(&agent);
        let cancel = cancel.clone();
        tokio::spawn(async move { agent.run(cancel).await })
    };

    wait_for_state(&mut states, ClientState::Connected).await;
    assert!(matches!(seen.recv().await, Some(Message::Heartbeat { .. })));

    cancel.cancel();
    running.await.unwrap();
    assert_eq!(agent.state(), ClientState::Disconnected);

    let mut got_goodbye = false;
    while let Ok(Some(message)) =
        tokio::time::timeout(Duration::from_millis(500), seen.recv()).await
    {
        got_goodbye |= message == Message::Goodbye;
    }
    assert!(got_goodbye);
}

#[tokio::test]
async fn test_liveness_loop_retries_after_rejection() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let server_key = test_key().public_key().clone();
    let addr = {
        let attempts = Arc::clone(&attempts);
        scripted_server(move |mut transport| {
            let attempts = Arc::clone(&attempts);
            let server_key = server_key.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                challenge(&mut transport, &server_key).await;
            }
        })
        .await
    };

    let agent = Arc::new(LivenessLoop::new(
        Connector::with_key(test_config(addr), test_key()),
        Arc::new(AlwaysPresent),
    ));

    let cancel = CancellationToken::new();
    let running = {
        let agent = Arc::clone(&agent);
        let cancel = cancel.clone();
        tokio::spawn(async move { agent.run(cancel).await })
    };

    // Keeps coming back with backoff, never reaching Connected
    for _ in 0..200 {
        assert_ne!(agent.state(), ClientState::Connected);
        if attempts.load(Ordering::SeqCst) >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(attempts.load(Ordering::SeqCst) >= 3);

    cancel.cancel();
    running.await.unwrap();
    assert_eq!(agent.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn test_absent_user_does_not_connect() {
    let key = test_key();
    let (addr, mut seen) = honest_server(key.public_key().clone()).await;
    let gate = Arc::new(ToggleGate(AtomicBool::new(false)));

    let agent = Arc::new(LivenessLoop::new(
        Connector::with_key(test_config(addr), key),
        Arc::clone(&gate) as Arc<dyn PresenceGate>,
    ));
    let mut states = agent.subscribe();

    let cancel = CancellationToken::new();
    let running = {
        let agent = Arc::clone(&agent);
        let cancel = cancel.clone();
        tokio::spawn(async move { agent.run(cancel).await })
    };

    // Locked: nothing reaches the server
    let quiet = tokio::time::timeout(Duration::from_millis(200), seen.recv()).await;
    assert!(quiet.is_err());
    assert_eq!(agent.state(), ClientState::Disconnected);

    // Unlocked: connects
    gate.0.store(true, Ordering::SeqCst);
    wait_for_state(&mut states, ClientState::Connected).await;

    // Locked again: leaves with Goodbye
    gate.0.store(false, Ordering::SeqCst);
    wait_for_state(&mut states, ClientState::Disconnected).await;
    let mut got_goodbye = false;
    while let Ok(Some(message)) =
        tokio::time::timeout(Duration::from_millis(300), seen.recv()).await
    {
        got_goodbye |= message == Message::Goodbye;
    }
    assert!(got_goodbye);

    cancel.cancel();
    running.await.unwrap();
}
