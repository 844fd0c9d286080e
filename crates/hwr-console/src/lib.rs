//! HWR Console - client library for the handwriting-recognition training platform
//!
//! The centre of the crate is [`TrainingChannel`], a long-lived Socket.IO
//! connection to the training service that issues start/stop commands and
//! dispatches live training events. Around it sit the REST clients of the
//! platform's other services, the session store with its navigation guard,
//! and configuration loading.
//!
//! # Modules
//! - [`channel`] - training event channel client
//! - [`protocol`] - Engine.IO / Socket.IO v4 packet codecs
//! - [`transport`] - WebSocket and HTTP long-polling transports
//! - [`training`] - training requests, events and run tracking
//! - [`api`] - REST clients for auth, datasets, models, logs and training
//! - [`session`] - session storage and route guard
//! - [`config`] - TOML configuration
//!
//! @version 0.1.0

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod channel;
pub mod config;
pub mod protocol;
pub mod session;
pub mod training;
pub mod transport;

pub use api::{ApiError, ConsoleServices};
pub use channel::{ChannelError, ConnectionState, ListenerId, TrainingChannel};
pub use config::{ChannelConfig, ConfigError, ConsoleConfig, ReconnectPolicy, ServicesConfig};
pub use protocol::ProtocolError;
pub use session::{guard, Navigation, Route, Session, SessionError, SessionStore};
pub use training::{
    CanonicalTrainingRequest, EventKind, RunPhase, RunTracker, TrainingComplete, TrainingEvent,
    TrainingProgress, TrainingRequest, TrainingStarted,
};
pub use transport::{Connector, Transport, TransportError, TransportKind};
