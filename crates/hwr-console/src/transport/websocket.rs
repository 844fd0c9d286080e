//! WebSocket transport
//!
//! One Engine.IO packet per text frame. A reader task drains the socket into
//! a channel so that [`Transport::recv`] stays cancel-safe.

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{trace, warn};

use super::{Transport, TransportError, TransportKind};
use crate::protocol::{EnginePacket, Handshake};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Engine.IO over a WebSocket
pub struct WebSocketTransport {
    sink: WsSink,
    inbound: mpsc::Receiver<Result<EnginePacket, TransportError>>,
    reader: JoinHandle<()>,
    handshake: Handshake,
}

impl WebSocketTransport {
    /// Connect and wait for the server's open packet
    pub async fn connect(url: &Url) -> Result<Self, TransportError> {
        let (socket, _response) = connect_async(url.as_str()).await?;
        let (sink, mut stream) = socket.split();
        let (tx, mut inbound) = mpsc::channel(64);

        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let item = match frame {
                    Ok(Message::Text(text)) => {
                        trace!(frame = %text, "ws <-");
                        match EnginePacket::decode(&text) {
                            Ok(packet) => Ok(packet),
                            Err(e) => {
                                warn!(error = %e, "Skipping undecodable frame");
                                continue;
                            }
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    // Control frames are answered by tungstenite itself
                    Ok(_) => continue,
                    Err(e) => Err(TransportError::from(e)),
                };

                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
        });

        let handshake = match inbound.recv().await {
            Some(Ok(EnginePacket::Open(handshake))) => handshake,
            Some(Ok(other)) => {
                reader.abort();
                return Err(TransportError::Handshake(format!(
                    "expected open packet, got {:?}",
                    other
                )));
            }
            Some(Err(e)) => {
                reader.abort();
                return Err(e);
            }
            None => {
                reader.abort();
                return Err(TransportError::Closed);
            }
        };

        Ok(Self {
            sink,
            inbound,
            reader,
            handshake,
        })
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Websocket
    }

    fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    async fn send(&mut self, packet: EnginePacket) -> Result<(), TransportError> {
        let frame = packet.encode();
        trace!(frame = %frame, "ws ->");
        self.sink.send(Message::Text(frame)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<EnginePacket>, TransportError> {
        match self.inbound.recv().await {
            Some(Ok(packet)) => Ok(Some(packet)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    async fn close(&mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
        self.reader.abort();
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
