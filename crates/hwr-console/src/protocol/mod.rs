//! Wire protocol of the training event channel
//!
//! Two layers: [`engineio`] frames packets on the transport, [`socketio`]
//! carries named events inside Engine.IO messages.

pub mod engineio;
pub mod socketio;

pub use engineio::{EnginePacket, Handshake};
pub use socketio::SocketPacket;

use thiserror::Error;

/// Errors raised while decoding protocol frames
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Empty frame")]
    EmptyFrame,
    #[error("Unknown packet type '{0}'")]
    UnknownPacketType(char),
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Binary packets are not supported")]
    BinaryUnsupported,
}
