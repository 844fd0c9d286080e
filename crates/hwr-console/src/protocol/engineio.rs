//! Engine.IO v4 packet codec
//!
//! Engine.IO is the framing layer under the training event channel. Every
//! frame is a single ASCII type digit followed by an optional text payload.
//! Over HTTP long-polling several packets share one body, separated by the
//! record separator `0x1E`.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use super::ProtocolError;

/// Protocol revision sent in the `EIO` query parameter
pub const PROTOCOL_VERSION: u8 = 4;

/// Separator between packets in a long-polling payload
pub const RECORD_SEPARATOR: char = '\u{1e}';

// =============================================================================
// Handshake
// =============================================================================

/// Session parameters announced by the server in the `open` packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default = "default_max_payload")]
    pub max_payload: u64,
}

fn default_max_payload() -> u64 {
    1_000_000
}

impl Handshake {
    /// Longest silence tolerated before the session is considered lost
    pub fn heartbeat_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval + self.ping_timeout)
    }
}

// =============================================================================
// Packets
// =============================================================================

/// A single Engine.IO packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(Option<String>),
    Pong(Option<String>),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    /// Encode into a text frame
    pub fn encode(&self) -> String {
        match self {
            Self::Open(handshake) => {
                // Handshake only holds strings and integers
                let body = serde_json::to_string(handshake).unwrap_or_default();
                format!("0{}", body)
            }
            Self::Close => "1".to_string(),
            Self::Ping(data) => format!("2{}", data.as_deref().unwrap_or("")),
            Self::Pong(data) => format!("3{}", data.as_deref().unwrap_or("")),
            Self::Message(data) => format!("4{}", data),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        }
    }

    /// Decode a text frame
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(ProtocolError::EmptyFrame)?;
        let rest = chars.as_str();

        let packet = match kind {
            '0' => Self::Open(serde_json::from_str(rest).map_err(|e| {
                ProtocolError::InvalidHandshake(e.to_string())
            })?),
            '1' => Self::Close,
            '2' => Self::Ping(non_empty(rest)),
            '3' => Self::Pong(non_empty(rest)),
            '4' => Self::Message(rest.to_string()),
            '5' => Self::Upgrade,
            '6' => Self::Noop,
            other => return Err(ProtocolError::UnknownPacketType(other)),
        };

        Ok(packet)
    }
}

fn non_empty(data: &str) -> Option<String> {
    if data.is_empty() {
        None
    } else {
        Some(data.to_string())
    }
}

// =============================================================================
// Long-polling payloads
// =============================================================================

/// Join packets into one long-polling request body
pub fn encode_payload(packets: &[EnginePacket]) -> String {
    packets
        .iter()
        .map(EnginePacket::encode)
        .collect::<Vec<_>>()
        .join(&RECORD_SEPARATOR.to_string())
}

/// Split a long-polling response body into packets
pub fn decode_payload(body: &str) -> Result<Vec<EnginePacket>, ProtocolError> {
    if body.is_empty() {
        return Ok(Vec::new());
    }
    body.split(RECORD_SEPARATOR).map(EnginePacket::decode).collect()
}

/// Split a long-polling response body, skipping packets that fail to decode
pub fn decode_payload_lossy(body: &str) -> Vec<EnginePacket> {
    if body.is_empty() {
        return Vec::new();
    }
    body.split(RECORD_SEPARATOR)
        .filter_map(|frame| match EnginePacket::decode(frame) {
            Ok(packet) => Some(packet),
            Err(e) => {
                warn!(error = %e, "Skipping undecodable packet");
                None
            }
        })
        .collect()
}
