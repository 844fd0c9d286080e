//! Training event channel
//!
//! [`TrainingChannel`] is the client side of the real-time link to the
//! training service. It sends the `start_training` and `stop_training`
//! commands and dispatches the five training events to registered
//! listeners.
//!
//! ```no_run
//! # use hwr_console::{ChannelConfig, TrainingChannel, TrainingRequest};
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = TrainingChannel::new(ChannelConfig::default())?;
//! channel.on_training_progress(|p| println!("epoch {} loss {:.4}", p.epoch, p.train_loss));
//! channel.connect();
//!
//! channel.wait_for_state(hwr_console::ConnectionState::Connected, std::time::Duration::from_secs(5)).await;
//! channel.start_training(&TrainingRequest::new("CNN", 64, 0.001, "Adam", "交叉熵"))?;
//! # Ok(())
//! # }
//! ```

mod dispatcher;
mod session;

pub use dispatcher::{Dispatcher, Listener, ListenerId};

use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ChannelConfig;
use crate::protocol::SocketPacket;
use crate::training::{
    EventKind, InvalidRequest, TrainingComplete, TrainingEvent, TrainingProgress, TrainingRequest,
    TrainingStarted, START_TRAINING, STOP_TRAINING,
};
use crate::transport::{Connector, NegotiatingConnector, TransportError};
use session::{Control, SessionContext, SharedState};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Not connected to the training service")]
    NotConnected,
    #[error(transparent)]
    InvalidRequest(#[from] InvalidRequest),
    #[error("Failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Connection state as observed by the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Training Channel
// =============================================================================

struct SessionHandle {
    control: mpsc::UnboundedSender<Control>,
    task: JoinHandle<()>,
    /// Closed when the session task exits
    ended: watch::Receiver<()>,
}

/// Client of the training service's event channel.
///
/// All methods take `&self`; share the channel behind an `Arc`. Listeners
/// survive reconnects and `disconnect()`/`connect()` cycles.
pub struct TrainingChannel {
    config: ChannelConfig,
    connector: Arc<dyn Connector>,
    shared: Arc<SharedState>,
    dispatcher: Dispatcher,
    session: Mutex<Option<SessionHandle>>,
}

impl TrainingChannel {
    /// Create a channel that negotiates WebSocket or long-polling transports
    pub fn new(config: ChannelConfig) -> Result<Self, TransportError> {
        let connector = NegotiatingConnector::new(&config)?;
        Ok(Self::with_connector(config, Arc::new(connector)))
    }

    /// Create a channel over a custom connector
    pub fn with_connector(config: ChannelConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            shared: Arc::new(SharedState::new()),
            dispatcher: Dispatcher::new(),
            session: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    fn session(&self) -> MutexGuard<'_, Option<SessionHandle>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin establishing the link in the background.
    ///
    /// Returns immediately; watch [`state`](Self::state) or
    /// [`watch_state`](Self::watch_state) for the outcome. A no-op while a
    /// session is connecting, connected or reconnecting. Must be called
    /// inside a Tokio runtime.
    pub fn connect(&self) {
        let mut session = self.session();
        if let Some(handle) = session.as_ref() {
            if !handle.task.is_finished() {
                debug!("connect() ignored, session already active");
                return;
            }
        }

        let generation = self.shared.advance();
        let (control, commands) = mpsc::unbounded_channel();
        let ctx = SessionContext {
            connector: self.connector.clone(),
            policy: self.config.reconnection.clone(),
            connect_timeout: self.config.connect_timeout(),
            shared: self.shared.clone(),
            dispatcher: self.dispatcher.clone(),
            generation,
        };

        info!(endpoint = %self.config.endpoint, "Connecting to training service");
        let (ended_tx, ended) = watch::channel(());
        let task = tokio::spawn(async move {
            let _ended = ended_tx;
            session::run(ctx, commands).await;
        });
        *session = Some(SessionHandle {
            control,
            task,
            ended,
        });
    }

    /// Close the link. The state is `Disconnected` when this returns; no-op
    /// when already disconnected.
    pub fn disconnect(&self) {
        let handle = self.session().take();
        self.shared.invalidate();

        if let Some(handle) = handle {
            // The task may already be gone
            let _ = handle.control.send(Control::Close);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.current()
    }

    /// Receiver notified on every state change
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.subscribe()
    }

    /// Resolves once the current session is over for good: closed by either
    /// side, or abandoned after the reconnect policy ran out of attempts.
    ///
    /// Returns immediately when no session was started or after
    /// [`disconnect`](Self::disconnect).
    pub async fn session_ended(&self) {
        let ended = self.session().as_ref().map(|handle| handle.ended.clone());
        if let Some(mut ended) = ended {
            while ended.changed().await.is_ok() {}
        }
    }

    /// Wait until the channel reaches `target`; `false` on timeout
    pub async fn wait_for_state(&self, target: ConnectionState, timeout: Duration) -> bool {
        let mut state = self.watch_state();
        let reached = tokio::time::timeout(timeout, async {
            state.wait_for(|current| *current == target).await.is_ok()
        })
        .await;
        matches!(reached, Ok(true))
    }

    fn emit(&self, name: &str, args: Vec<Value>) -> Result<(), ChannelError> {
        let session = self.session();
        let handle = session.as_ref().ok_or(ChannelError::NotConnected)?;
        handle
            .control
            .send(Control::Emit(SocketPacket::event(name, args)))
            .map_err(|_| ChannelError::NotConnected)
    }

    /// Send `start_training` with the canonical form of `request`.
    ///
    /// Fails with [`ChannelError::NotConnected`] before anything is sent
    /// when the link is down.
    pub fn start_training(&self, request: &TrainingRequest) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }

        let canonical = request.canonicalize()?;
        info!(
            architecture = %canonical.model_architecture,
            dataset = %canonical.dataset_name,
            save_as = %canonical.save_model_name,
            epochs = canonical.epochs,
            "Starting training"
        );
        self.emit(START_TRAINING, vec![serde_json::to_value(&canonical)?])
    }

    /// Send `stop_training`
    pub fn stop_training(&self) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }

        info!("Stopping training");
        self.emit(STOP_TRAINING, Vec::new())
    }

    pub fn on_training_started<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&TrainingStarted) + Send + Sync + 'static,
    {
        self.dispatcher.on_started(listener)
    }

    pub fn on_training_progress<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&TrainingProgress) + Send + Sync + 'static,
    {
        self.dispatcher.on_progress(listener)
    }

    pub fn on_training_complete<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&TrainingComplete) + Send + Sync + 'static,
    {
        self.dispatcher.on_complete(listener)
    }

    pub fn on_training_error<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&String) + Send + Sync + 'static,
    {
        self.dispatcher.on_error(listener)
    }

    pub fn on_training_stopped<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&String) + Send + Sync + 'static,
    {
        self.dispatcher.on_stopped(listener)
    }

    /// Remove one listener, or every listener of `kind` when `listener` is `None`
    pub fn off(&self, kind: EventKind, listener: Option<ListenerId>) -> usize {
        self.dispatcher.off(kind, listener)
    }

    /// Every inbound event, in arrival order
    pub fn events(&self) -> broadcast::Receiver<TrainingEvent> {
        self.dispatcher.subscribe()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

impl Drop for TrainingChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}
