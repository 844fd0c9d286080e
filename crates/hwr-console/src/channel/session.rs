//! Session driver
//!
//! One spawned task per `connect()`. It opens a transport, joins the main
//! namespace, then pumps inbound packets to the dispatcher and outbound
//! commands to the transport until the session ends. Lost sessions are
//! re-established according to the reconnect policy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::dispatcher::Dispatcher;
use super::ConnectionState;
use crate::config::ReconnectPolicy;
use crate::protocol::socketio::DEFAULT_NAMESPACE;
use crate::protocol::{EnginePacket, SocketPacket};
use crate::training::TrainingEvent;
use crate::transport::{Connector, Transport, TransportError};

/// Upper bound on the graceful close of a transport
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Commands from the channel facade to its session task
#[derive(Debug)]
pub(crate) enum Control {
    Emit(SocketPacket),
    Close,
}

/// Connection state shared between the facade and its session tasks.
///
/// Every session task carries the generation it was spawned with. Updates
/// from a task whose generation is no longer current are discarded.
pub(crate) struct SharedState {
    state: watch::Sender<ConnectionState>,
    generation: AtomicU64,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub(crate) fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Start a new generation; returns its number
    pub(crate) fn advance(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Supersede every running task and report `Disconnected`
    pub(crate) fn invalidate(&self) {
        self.advance();
        self.state.send_if_modified(|current| {
            let changed = *current != ConnectionState::Disconnected;
            *current = ConnectionState::Disconnected;
            changed
        });
    }

    fn publish(&self, generation: u64, next: ConnectionState) {
        // The generation check runs under the watch lock so it cannot interleave with invalidate()
        self.state.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation || *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

/// Everything a session task needs
pub(crate) struct SessionContext {
    pub connector: Arc<dyn Connector>,
    pub policy: ReconnectPolicy,
    pub connect_timeout: Duration,
    pub shared: Arc<SharedState>,
    pub dispatcher: Dispatcher,
    pub generation: u64,
}

impl SessionContext {
    fn publish(&self, state: ConnectionState) {
        self.shared.publish(self.generation, state);
    }
}

#[derive(Debug)]
enum SessionEnd {
    ClosedByClient,
    ClosedByServer,
    Lost(String),
}

/// Drive sessions until the client closes, the server closes, or the
/// reconnect policy gives up
pub(crate) async fn run(ctx: SessionContext, mut control: mpsc::UnboundedReceiver<Control>) {
    let mut failures: u32 = 0;

    loop {
        ctx.publish(ConnectionState::Connecting);

        let attempt = tokio::select! {
            result = establish(&ctx) => result,
            () = closed(&mut control) => {
                ctx.publish(ConnectionState::Disconnected);
                debug!("Connect attempt abandoned");
                return;
            }
        };

        match attempt {
            Ok(transport) => {
                failures = 0;
                info!(
                    transport = %transport.kind(),
                    sid = %transport.handshake().sid,
                    "Training service connected"
                );
                ctx.publish(ConnectionState::Connected);

                let end = drive(&ctx, transport, &mut control).await;
                ctx.publish(ConnectionState::Disconnected);

                match end {
                    SessionEnd::ClosedByClient => {
                        info!("Training service disconnected");
                        return;
                    }
                    SessionEnd::ClosedByServer => {
                        info!("Training service closed the session");
                        return;
                    }
                    SessionEnd::Lost(reason) => {
                        warn!(reason = %reason, "Training service connection lost");
                        if !ctx.policy.enabled {
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                ctx.publish(ConnectionState::Disconnected);
                failures += 1;
                warn!(error = %e, attempt = failures, "Training service connection failed");

                if !ctx.policy.enabled {
                    return;
                }
                if failures > ctx.policy.max_attempts {
                    warn!(attempts = failures, "Giving up on the training service");
                    return;
                }
            }
        }

        let delay = tokio::time::sleep(ctx.policy.delay());
        tokio::pin!(delay);
        tokio::select! {
            () = &mut delay => {}
            () = closed(&mut control) => return,
        }
        debug!("Reconnecting to the training service");
    }
}

/// Resolves once the facade asks to close or goes away; commands that
/// arrive while no session is up are dropped
async fn closed(control: &mut mpsc::UnboundedReceiver<Control>) {
    while let Some(command) = control.recv().await {
        match command {
            Control::Emit(packet) => debug!(?packet, "Dropping command, no session"),
            Control::Close => return,
        }
    }
}

/// Open a transport and join the main namespace
async fn establish(ctx: &SessionContext) -> Result<Box<dyn Transport>, TransportError> {
    let mut transport = ctx.connector.open().await?;
    transport
        .send(EnginePacket::Message(SocketPacket::connect().encode()))
        .await?;

    match tokio::time::timeout(ctx.connect_timeout, await_connect_reply(transport.as_mut())).await {
        Ok(Ok(())) => Ok(transport),
        Ok(Err(e)) => {
            close_quietly(transport.as_mut()).await;
            Err(e)
        }
        Err(_) => {
            close_quietly(transport.as_mut()).await;
            Err(TransportError::Timeout(ctx.connect_timeout))
        }
    }
}

async fn await_connect_reply(transport: &mut dyn Transport) -> Result<(), TransportError> {
    loop {
        match transport.recv().await? {
            Some(EnginePacket::Message(text)) => match SocketPacket::decode(&text)? {
                other if other.namespace() != DEFAULT_NAMESPACE => {
                    debug!(namespace = other.namespace(), "Ignoring packet for another namespace");
                }
                SocketPacket::Connect { .. } => return Ok(()),
                SocketPacket::ConnectError { message, .. } => {
                    return Err(TransportError::Handshake(message))
                }
                other => debug!(?other, "Ignoring packet before namespace connect"),
            },
            Some(EnginePacket::Ping(data)) => transport.send(EnginePacket::Pong(data)).await?,
            Some(EnginePacket::Close) | None => return Err(TransportError::Closed),
            Some(_) => {}
        }
    }
}

async fn drive(
    ctx: &SessionContext,
    mut transport: Box<dyn Transport>,
    control: &mut mpsc::UnboundedReceiver<Control>,
) -> SessionEnd {
    let window = transport.handshake().heartbeat_window();
    let heartbeat = tokio::time::sleep(window);
    tokio::pin!(heartbeat);

    loop {
        tokio::select! {
            inbound = transport.recv() => {
                heartbeat.as_mut().reset(Instant::now() + window);
                let packet = match inbound {
                    Ok(Some(packet)) => packet,
                    Ok(None) => return SessionEnd::Lost("transport closed".to_string()),
                    Err(e) => return SessionEnd::Lost(e.to_string()),
                };
                if let Some(end) = handle_packet(ctx, transport.as_mut(), packet).await {
                    close_quietly(transport.as_mut()).await;
                    return end;
                }
            }
            command = control.recv() => match command {
                Some(Control::Emit(packet)) => {
                    debug!(?packet, "Emitting");
                    if let Err(e) = transport.send(EnginePacket::Message(packet.encode())).await {
                        return SessionEnd::Lost(e.to_string());
                    }
                }
                Some(Control::Close) | None => {
                    let goodbye = EnginePacket::Message(SocketPacket::disconnect().encode());
                    let _ = tokio::time::timeout(CLOSE_GRACE, transport.send(goodbye)).await;
                    close_quietly(transport.as_mut()).await;
                    return SessionEnd::ClosedByClient;
                }
            },
            () = &mut heartbeat => {
                close_quietly(transport.as_mut()).await;
                return SessionEnd::Lost(format!("no heartbeat within {:?}", window));
            }
        }
    }
}

async fn handle_packet(
    ctx: &SessionContext,
    transport: &mut dyn Transport,
    packet: EnginePacket,
) -> Option<SessionEnd> {
    match packet {
        EnginePacket::Ping(data) => {
            if let Err(e) = transport.send(EnginePacket::Pong(data)).await {
                return Some(SessionEnd::Lost(e.to_string()));
            }
        }
        EnginePacket::Message(text) => match SocketPacket::decode(&text) {
            Ok(other) if other.namespace() != DEFAULT_NAMESPACE => {
                debug!(namespace = other.namespace(), "Ignoring packet for another namespace");
            }
            Ok(SocketPacket::Event { name, args, .. }) => dispatch_event(&ctx.dispatcher, &name, &args),
            Ok(SocketPacket::Disconnect { .. }) => return Some(SessionEnd::ClosedByServer),
            Ok(SocketPacket::ConnectError { message, .. }) => return Some(SessionEnd::Lost(message)),
            Ok(other) => debug!(?other, "Ignoring packet"),
            Err(e) => warn!(error = %e, "Undecodable message from training service"),
        },
        EnginePacket::Close => {
            return Some(SessionEnd::Lost("server closed the transport".to_string()))
        }
        other => debug!(?other, "Ignoring engine packet"),
    }
    None
}

fn dispatch_event(dispatcher: &Dispatcher, name: &str, args: &[serde_json::Value]) {
    match TrainingEvent::from_wire(name, args) {
        Ok(Some(event)) => {
            debug!(event_name = name, "Training event");
            dispatcher.dispatch(&event);
        }
        Ok(None) => debug!(event_name = name, "Ignoring unknown event"),
        Err(e) => warn!(event_name = name, error = %e, "Malformed training event"),
    }
}

async fn close_quietly(transport: &mut dyn Transport) {
    if tokio::time::timeout(CLOSE_GRACE, transport.close()).await.is_err() {
        debug!("Transport close timed out");
    }
}
