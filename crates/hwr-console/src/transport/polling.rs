//! HTTP long-polling transport
//!
//! The fallback when the WebSocket transport cannot be established. A poller
//! task keeps one GET outstanding and forwards every packet of each response;
//! outbound packets are POSTed to the same session URL.

use async_trait::async_trait;
use reqwest::{Client, Url};
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use super::{Transport, TransportError, TransportKind};
use crate::protocol::engineio::{decode_payload_lossy, encode_payload};
use crate::protocol::{EnginePacket, Handshake};

/// Engine.IO over HTTP long-polling
pub struct PollingTransport {
    http: Client,
    url: Url,
    pending: VecDeque<EnginePacket>,
    inbound: mpsc::Receiver<Result<EnginePacket, TransportError>>,
    poller: JoinHandle<()>,
    handshake: Handshake,
}

async fn poll_once(http: &Client, url: &Url) -> Result<Vec<EnginePacket>, TransportError> {
    let response = http.get(url.clone()).send().await?;
    if !response.status().is_success() {
        return Err(TransportError::Status(response.status().as_u16()));
    }
    let body = response.text().await?;
    trace!(body = %body, "poll <-");
    Ok(decode_payload_lossy(&body))
}

impl PollingTransport {
    /// Perform the opening GET and start polling
    pub async fn connect(http: Client, base_url: Url) -> Result<Self, TransportError> {
        let mut packets = poll_once(&http, &base_url).await?.into_iter();

        let handshake = match packets.next() {
            Some(EnginePacket::Open(handshake)) => handshake,
            Some(other) => {
                return Err(TransportError::Handshake(format!(
                    "expected open packet, got {:?}",
                    other
                )))
            }
            None => return Err(TransportError::Handshake("empty handshake response".to_string())),
        };
        let pending: VecDeque<EnginePacket> = packets.collect();

        let mut url = base_url;
        url.query_pairs_mut().append_pair("sid", &handshake.sid);

        let (tx, inbound) = mpsc::channel(64);
        let poller = {
            let http = http.clone();
            let url = url.clone();
            tokio::spawn(async move {
                loop {
                    match poll_once(&http, &url).await {
                        Ok(packets) => {
                            for packet in packets {
                                let closed = packet == EnginePacket::Close;
                                if tx.send(Ok(packet)).await.is_err() || closed {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                }
            })
        };

        Ok(Self {
            http,
            url,
            pending,
            inbound,
            poller,
            handshake,
        })
    }

    async fn post(&self, packets: &[EnginePacket]) -> Result<(), TransportError> {
        let body = encode_payload(packets);
        trace!(body = %body, "poll ->");
        let response = self
            .http
            .post(self.url.clone())
            .header("Content-Type", "text/plain;charset=UTF-8")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for PollingTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Polling
    }

    fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    async fn send(&mut self, packet: EnginePacket) -> Result<(), TransportError> {
        self.post(std::slice::from_ref(&packet)).await
    }

    async fn recv(&mut self) -> Result<Option<EnginePacket>, TransportError> {
        if let Some(packet) = self.pending.pop_front() {
            return Ok(Some(packet));
        }
        match self.inbound.recv().await {
            Some(Ok(packet)) => Ok(Some(packet)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    async fn close(&mut self) {
        let _ = self.post(&[EnginePacket::Close]).await;
        self.poller.abort();
    }
}

impl Drop for PollingTransport {
    fn drop(&mut self) {
        self.poller.abort();
    }
}
