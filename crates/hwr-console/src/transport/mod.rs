//! Transports for the training event channel
//!
//! A [`Transport`] moves Engine.IO packets over one physical connection. A
//! [`Connector`] opens transports; [`NegotiatingConnector`] tries the
//! configured transports in order of preference, WebSocket first and HTTP
//! long-polling as the fallback.

pub mod polling;
pub mod websocket;

pub use polling::PollingTransport;
pub use websocket::WebSocketTransport;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::ChannelConfig;
use crate::protocol::engineio::PROTOCOL_VERSION;
use crate::protocol::{EnginePacket, Handshake, ProtocolError};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server returned status {0}")]
    Status(u16),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Handshake failed: {0}")]
    Handshake(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Connection closed")]
    Closed,
    #[error("No transport configured")]
    NoTransport,
}

// =============================================================================
// Transport Kinds
// =============================================================================

/// Physical transport flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Websocket,
    Polling,
}

impl TransportKind {
    /// Value of the `transport` query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Websocket => "websocket",
            Self::Polling => "polling",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the Engine.IO URL for a transport
pub fn engine_url(endpoint: &Url, path: &str, kind: TransportKind) -> Result<Url, TransportError> {
    let mut url = endpoint
        .join(path)
        .map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;

    if kind == TransportKind::Websocket {
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|()| TransportError::InvalidEndpoint(format!("cannot use {} with {}", scheme, endpoint)))?;
    }

    url.query_pairs_mut()
        .append_pair("EIO", &PROTOCOL_VERSION.to_string())
        .append_pair("transport", kind.as_str());

    Ok(url)
}

// =============================================================================
// Traits
// =============================================================================

/// One open Engine.IO connection
#[async_trait]
pub trait Transport: Send {
    fn kind(&self) -> TransportKind;

    /// Parameters from the server's open packet
    fn handshake(&self) -> &Handshake;

    async fn send(&mut self, packet: EnginePacket) -> Result<(), TransportError>;

    /// Next inbound packet, `Ok(None)` once the peer has gone away.
    ///
    /// Must be cancel-safe: the session loop races it against outbound
    /// commands and the heartbeat deadline.
    async fn recv(&mut self) -> Result<Option<EnginePacket>, TransportError>;

    async fn close(&mut self);
}

/// Opens transports to the training service
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Transport>, TransportError>;
}

// =============================================================================
// Negotiating Connector
// =============================================================================

/// Tries each configured transport in order until one completes the handshake
pub struct NegotiatingConnector {
    endpoint: Url,
    path: String,
    kinds: Vec<TransportKind>,
    timeout: Duration,
    http: reqwest::Client,
}

impl NegotiatingConnector {
    pub fn new(config: &ChannelConfig) -> Result<Self, TransportError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{}: {}", config.endpoint, e)))?;

        Ok(Self {
            endpoint,
            path: config.path.clone(),
            kinds: config.transports.clone(),
            timeout: config.connect_timeout(),
            http: reqwest::Client::new(),
        })
    }

    async fn open_kind(&self, kind: TransportKind) -> Result<Box<dyn Transport>, TransportError> {
        let url = engine_url(&self.endpoint, &self.path, kind)?;
        match kind {
            TransportKind::Websocket => Ok(Box::new(WebSocketTransport::connect(&url).await?)),
            TransportKind::Polling => {
                Ok(Box::new(PollingTransport::connect(self.http.clone(), url).await?))
            }
        }
    }
}

#[async_trait]
impl Connector for NegotiatingConnector {
    async fn open(&self) -> Result<Box<dyn Transport>, TransportError> {
        let mut last_error = None;

        for &kind in &self.kinds {
            match tokio::time::timeout(self.timeout, self.open_kind(kind)).await {
                Ok(Ok(transport)) => {
                    debug!(transport = %kind, sid = %transport.handshake().sid, "Transport opened");
                    return Ok(transport);
                }
                Ok(Err(e)) => {
                    debug!(transport = %kind, error = %e, "Transport failed, trying next");
                    last_error = Some(e);
                }
                Err(_) => {
                    debug!(transport = %kind, "Transport timed out, trying next");
                    last_error = Some(TransportError::Timeout(self.timeout));
                }
            }
        }

        Err(last_error.unwrap_or(TransportError::NoTransport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_url_websocket() {
        let endpoint = Url::parse("http://localhost:5897").unwrap();
        let url = engine_url(&endpoint, "/socket.io/", TransportKind::Websocket).unwrap();
        assert_eq!(
            url.as_str(),
            "ws://localhost:5897/socket.io/?EIO=4&transport=websocket"
        );

        let secure = Url::parse("https://trainer.example.com").unwrap();
        let url = engine_url(&secure, "/socket.io/", TransportKind::Websocket).unwrap();
        assert_eq!(url.scheme(), "wss");
    }

    #[test]
    fn test_engine_url_polling() {
        let endpoint = Url::parse("http://localhost:5897/ignored").unwrap();
        let url = engine_url(&endpoint, "/socket.io/", TransportKind::Polling).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5897/socket.io/?EIO=4&transport=polling"
        );
    }

    #[test]
    fn test_transport_kind_serde() {
        let kinds: Vec<TransportKind> = serde_json::from_str(r#"["websocket","polling"]"#).unwrap();
        assert_eq!(kinds, vec![TransportKind::Websocket, TransportKind::Polling]);
        assert_eq!(TransportKind::Polling.to_string(), "polling");
    }

    #[test]
    fn test_connector_rejects_bad_endpoint() {
        let config = ChannelConfig {
            endpoint: "::not a url".to_string(),
            ..ChannelConfig::default()
        };
        assert!(matches!(
            NegotiatingConnector::new(&config),
            Err(TransportError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_connector_reports_failure_when_nothing_listens() {
        // Bind then drop to get a port with nothing behind it
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = ChannelConfig {
            endpoint: format!("http://127.0.0.1:{}", port),
            connect_timeout_ms: 2000,
            ..ChannelConfig::default()
        };
        let connector = NegotiatingConnector::new(&config).unwrap();
        assert!(connector.open().await.is_err());
    }
}
