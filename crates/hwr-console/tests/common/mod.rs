//! Common test utilities for integration tests
//!
//! An in-memory connector whose transports are driven by the test acting
//! as the training service.

#![allow(dead_code)]

use async_trait::async_trait;
use hwr_console::config::{ChannelConfig, ReconnectPolicy};
use hwr_console::protocol::{EnginePacket, Handshake, SocketPacket};
use hwr_console::transport::{Connector, Transport, TransportError, TransportKind};
use hwr_console::{ConnectionState, TrainingChannel};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Handshake with the given heartbeat parameters in milliseconds
pub fn handshake(ping_interval: u64, ping_timeout: u64) -> Handshake {
    Handshake {
        sid: "test-sid".to_string(),
        upgrades: Vec::new(),
        ping_interval,
        ping_timeout,
        max_payload: 1_000_000,
    }
}

/// Channel config with fast reconnects
pub fn channel_config(max_attempts: u32) -> ChannelConfig {
    ChannelConfig {
        connect_timeout_ms: 2000,
        reconnection: ReconnectPolicy {
            enabled: true,
            delay_ms: 10,
            max_attempts,
        },
        ..ChannelConfig::default()
    }
}

// =============================================================================
// Server Side
// =============================================================================

/// The training service's end of one mock transport
pub struct ServerSide {
    to_client: mpsc::UnboundedSender<EnginePacket>,
    from_client: mpsc::UnboundedReceiver<EnginePacket>,
}

impl ServerSide {
    pub fn send(&self, packet: EnginePacket) {
        self.to_client.send(packet).expect("client transport dropped");
    }

    pub fn send_socket(&self, packet: SocketPacket) {
        self.send(EnginePacket::Message(packet.encode()));
    }

    /// Emit a named event with one payload argument
    pub fn emit(&self, name: &str, payload: Value) {
        self.send_socket(SocketPacket::event(name, vec![payload]));
    }

    /// Next packet from the client
    pub async fn next(&mut self) -> EnginePacket {
        tokio::time::timeout(TIMEOUT, self.from_client.recv())
            .await
            .expect("timed out waiting for the client")
            .expect("client transport closed")
    }

    /// Next Socket.IO packet from the client, skipping engine-level traffic
    pub async fn next_socket(&mut self) -> SocketPacket {
        loop {
            if let EnginePacket::Message(text) = self.next().await {
                return SocketPacket::decode(&text).expect("client sent an undecodable packet");
            }
        }
    }

    /// Answer the client's namespace connect
    pub async fn accept(&mut self) {
        let request = self.next_socket().await;
        assert!(
            matches!(request, SocketPacket::Connect { .. }),
            "expected namespace connect, got {:?}",
            request
        );
        self.send_socket(SocketPacket::Connect {
            namespace: "/".to_string(),
            data: Some(json!({"sid": "socket-sid"})),
        });
    }
}

// =============================================================================
// Mock Transport / Connector
// =============================================================================

pub struct MockTransport {
    handshake: Handshake,
    inbound: mpsc::UnboundedReceiver<EnginePacket>,
    outbound: mpsc::UnboundedSender<EnginePacket>,
}

#[async_trait]
impl Transport for MockTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Websocket
    }

    fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    async fn send(&mut self, packet: EnginePacket) -> Result<(), TransportError> {
        self.outbound.send(packet).map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Result<Option<EnginePacket>, TransportError> {
        Ok(self.inbound.recv().await)
    }

    async fn close(&mut self) {
        self.inbound.close();
    }
}

/// Connector handing every opened transport's server side to the test
pub struct MockConnector {
    handshake: Handshake,
    sessions: mpsc::UnboundedSender<ServerSide>,
    failures_left: AtomicU32,
    opens: AtomicU32,
}

impl MockConnector {
    pub fn new(handshake: Handshake) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerSide>) {
        Self::failing(handshake, 0)
    }

    /// Connector whose first `failures` opens are refused
    pub fn failing(
        handshake: Handshake,
        failures: u32,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerSide>) {
        let (sessions, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            handshake,
            sessions,
            failures_left: AtomicU32::new(failures),
            opens: AtomicU32::new(0),
        });
        (connector, rx)
    }

    /// Number of open attempts so far
    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self) -> Result<Box<dyn Transport>, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Closed);
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        self.sessions
            .send(ServerSide {
                to_client,
                from_client,
            })
            .map_err(|_| TransportError::Closed)?;

        Ok(Box::new(MockTransport {
            handshake: self.handshake.clone(),
            inbound,
            outbound,
        }))
    }
}

// =============================================================================
// Harness
// =============================================================================

/// A channel wired to a mock connector
pub struct Harness {
    pub channel: TrainingChannel,
    pub connector: Arc<MockConnector>,
    sessions: mpsc::UnboundedReceiver<ServerSide>,
}

impl Harness {
    pub fn new() -> Self {
        let (connector, sessions) = MockConnector::new(handshake(25_000, 20_000));
        Self::with_connector(connector, sessions, channel_config(3))
    }

    pub fn with_connector(
        connector: Arc<MockConnector>,
        sessions: mpsc::UnboundedReceiver<ServerSide>,
        config: ChannelConfig,
    ) -> Self {
        let channel = TrainingChannel::with_connector(config, connector.clone());
        Self {
            channel,
            connector,
            sessions,
        }
    }

    /// Server side of the next transport the channel opens
    pub async fn next_session(&mut self) -> ServerSide {
        tokio::time::timeout(TIMEOUT, self.sessions.recv())
            .await
            .expect("timed out waiting for a transport")
            .expect("connector dropped")
    }

    /// Make every further open attempt fail
    pub fn stop_accepting(&mut self) {
        self.sessions.close();
    }

    /// Connect and complete the namespace handshake
    pub async fn connect(&mut self) -> ServerSide {
        self.channel.connect();
        let mut server = self.next_session().await;
        server.accept().await;
        self.wait_for(ConnectionState::Connected).await;
        server
    }

    pub async fn wait_for(&self, state: ConnectionState) {
        assert!(
            self.channel.wait_for_state(state, TIMEOUT).await,
            "channel never reached {}",
            state
        );
    }

    /// Wait until the connector has seen `count` open attempts
    pub async fn wait_for_opens(&self, count: u32) {
        tokio::time::timeout(TIMEOUT, async {
            while self.connector.opens() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for connect attempts");
    }
}

pub fn progress_payload(epoch: u32) -> Value {
    json!({
        "epoch": epoch,
        "train_loss": 1.0 / f64::from(epoch),
        "train_acc": 0.8 + f64::from(epoch) / 100.0,
        "val_loss": 0.9 / f64::from(epoch),
        "val_acc": 0.85 + f64::from(epoch) / 100.0
    })
}
