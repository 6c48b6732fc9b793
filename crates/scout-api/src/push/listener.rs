// Push listener: one persistent connection, per-location subscriptions,
// and ordered handler fan-out.
//
// All mutable state (socket id, subscribed locations, handler registries)
// lives in a single spawned task. The public handle marshals every
// operation onto that task through a command channel, so transport
// callbacks and callers on other tasks never touch listener state
// directly.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::protocol::{self, InboundFrame};
use super::transport::{self, ReconnectConfig};
use crate::error::Error;
use crate::models::{Device, ModeEvent};
use crate::session::Session;

/// Vendor push application key (fixed, not account-specific).
const APP_KEY: &str = "baf06f5a867d462e09d4";

/// Vendor push host.
const PUSH_HOST: &str = "ws.pusherapp.com";

const COMMAND_CHANNEL_SIZE: usize = 32;
const INBOUND_CHANNEL_SIZE: usize = 256;
const OUTBOUND_CHANNEL_SIZE: usize = 64;

/// Callback invoked for every pushed mode change, in registration order.
pub type ModeHandler = Box<dyn Fn(&ModeEvent) + Send + Sync + 'static>;

/// Callback invoked for every pushed device change, in registration order.
pub type DeviceHandler = Box<dyn Fn(&Device) + Send + Sync + 'static>;

enum Command {
    Connect {
        done: oneshot::Sender<String>,
    },
    AddLocation {
        location_id: String,
        done: oneshot::Sender<Result<(), Error>>,
    },
    OnModeChange(ModeHandler),
    OnDeviceChange(DeviceHandler),
}

/// Everything the real websocket transport needs to start. Held until
/// [`Listener::connect`] so construction never dials out.
struct TransportStart {
    url: Url,
    inbound_tx: mpsc::Sender<InboundFrame>,
    outbound_rx: mpsc::Receiver<String>,
    reconnect: ReconnectConfig,
}

/// Handle to the push listener task.
///
/// Maintains exactly one logical push connection. On every handshake --
/// the first connect and every transport-level reconnect -- previously
/// added locations are re-subscribed, because the server forgets
/// subscriptions when the underlying connection drops.
pub struct Listener {
    command_tx: mpsc::Sender<Command>,
    transport_start: Mutex<Option<TransportStart>>,
    cancel: CancellationToken,
}

impl Listener {
    /// Create the listener task. Does not dial out -- call
    /// [`connect`](Self::connect) for that. Must be called from within a
    /// Tokio runtime.
    pub fn new(session: Arc<Session>) -> Result<Self, Error> {
        let url = protocol::connection_url(PUSH_HOST, APP_KEY)?;
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_SIZE);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_SIZE);

        let listener = Self::spawn_task(session, inbound_rx, outbound_tx);
        *listener.transport_start.lock().unwrap() = Some(TransportStart {
            url,
            inbound_tx,
            outbound_rx,
            reconnect: ReconnectConfig::default(),
        });
        Ok(listener)
    }

    /// Wire the listener task to caller-supplied channels instead of a
    /// real transport. Used by tests to drive frames directly.
    #[cfg(test)]
    fn with_channels(
        session: Arc<Session>,
        inbound_rx: mpsc::Receiver<InboundFrame>,
        outbound_tx: mpsc::Sender<String>,
    ) -> Self {
        Self::spawn_task(session, inbound_rx, outbound_tx)
    }

    fn spawn_task(
        session: Arc<Session>,
        inbound_rx: mpsc::Receiver<InboundFrame>,
        outbound_tx: mpsc::Sender<String>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let cancel = CancellationToken::new();

        let task = ListenerTask {
            session,
            outbound_tx,
            socket_id: None,
            locations: Vec::new(),
            mode_handlers: Vec::new(),
            device_handlers: Vec::new(),
            pending_connects: Vec::new(),
        };
        tokio::spawn(task.run(command_rx, inbound_rx, cancel.clone()));

        Self {
            command_tx,
            transport_start: Mutex::new(None),
            cancel,
        }
    }

    /// Establish the push connection; resolves with the socket id once
    /// the handshake completes.
    pub async fn connect(&self) -> Result<String, Error> {
        if let Some(start) = self.transport_start.lock().unwrap().take() {
            tokio::spawn(transport::run(
                start.url,
                start.inbound_tx,
                start.outbound_rx,
                start.reconnect,
                self.cancel.clone(),
            ));
        }

        let (tx, rx) = oneshot::channel();
        self.send(Command::Connect { done: tx }).await?;
        rx.await.map_err(|_| Error::ListenerClosed)
    }

    /// Record a location and subscribe to its private channel.
    ///
    /// The location is remembered for handshake replay: every reconnect
    /// re-subscribes all locations added so far.
    pub async fn add_location(&self, location_id: &str) -> Result<(), Error> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::AddLocation {
            location_id: location_id.to_owned(),
            done: tx,
        })
        .await?;
        rx.await.map_err(|_| Error::ListenerClosed)?
    }

    /// Register a mode change handler. Handlers run in registration order
    /// for every event; there is no unregistration.
    pub async fn on_mode_change(
        &self,
        handler: impl Fn(&ModeEvent) + Send + Sync + 'static,
    ) -> Result<(), Error> {
        self.send(Command::OnModeChange(Box::new(handler))).await
    }

    /// Register a device change handler.
    pub async fn on_device_change(
        &self,
        handler: impl Fn(&Device) + Send + Sync + 'static,
    ) -> Result<(), Error> {
        self.send(Command::OnDeviceChange(Box::new(handler))).await
    }

    /// Tear down the listener task and the transport.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn send(&self, command: Command) -> Result<(), Error> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| Error::ListenerClosed)
    }
}

// ── Listener task ────────────────────────────────────────────────────

struct ListenerTask {
    session: Arc<Session>,
    outbound_tx: mpsc::Sender<String>,
    socket_id: Option<String>,
    locations: Vec<String>,
    mode_handlers: Vec<ModeHandler>,
    device_handlers: Vec<DeviceHandler>,
    pending_connects: Vec<oneshot::Sender<String>>,
}

impl ListenerTask {
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<Command>,
        mut inbound_rx: mpsc::Receiver<InboundFrame>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                command = command_rx.recv() => {
                    let Some(command) = command else { break };
                    self.handle_command(command).await;
                }
                frame = inbound_rx.recv() => {
                    let Some(frame) = frame else { break };
                    self.handle_frame(frame).await;
                }
            }
        }
        debug!("push listener task exiting");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { done } => match self.socket_id.as_ref() {
                Some(socket_id) => {
                    let _ = done.send(socket_id.clone());
                }
                None => self.pending_connects.push(done),
            },
            Command::AddLocation { location_id, done } => {
                if !self.locations.contains(&location_id) {
                    self.locations.push(location_id.clone());
                }
                let result = self.subscribe(&location_id).await;
                let _ = done.send(result);
            }
            Command::OnModeChange(handler) => {
                self.mode_handlers.push(handler);
                debug!(total = self.mode_handlers.len(), "mode handler registered");
            }
            Command::OnDeviceChange(handler) => {
                self.device_handlers.push(handler);
                debug!(total = self.device_handlers.len(), "device handler registered");
            }
        }
    }

    async fn handle_frame(&mut self, frame: InboundFrame) {
        match frame {
            InboundFrame::ConnectionEstablished { socket_id } => {
                info!(socket_id = %socket_id, "push handshake complete");
                self.socket_id = Some(socket_id.clone());

                // Re-subscribe everything: the server dropped all channel
                // subscriptions along with the previous connection.
                let locations = self.locations.clone();
                for location_id in &locations {
                    if let Err(e) = self.subscribe(location_id).await {
                        warn!(location_id = %location_id, error = %e, "re-subscription failed");
                    }
                }

                for done in self.pending_connects.drain(..) {
                    let _ = done.send(socket_id.clone());
                }
            }
            InboundFrame::ChannelEvent {
                event, payload, ..
            } => match event.as_str() {
                protocol::EVENT_MODE => match serde_json::from_str::<ModeEvent>(&payload) {
                    Ok(mode_event) => {
                        debug!(mode_id = %mode_event.mode_id, "mode changed");
                        for handler in &self.mode_handlers {
                            handler(&mode_event);
                        }
                    }
                    Err(e) => debug!(error = %e, payload = %payload, "undecodable mode event"),
                },
                protocol::EVENT_DEVICE => match serde_json::from_str::<Device>(&payload) {
                    Ok(device) => {
                        debug!(device_id = %device.id, "device changed");
                        for handler in &self.device_handlers {
                            handler(&device);
                        }
                    }
                    Err(e) => debug!(error = %e, payload = %payload, "undecodable device event"),
                },
                other => debug!(event = other, "unhandled channel event"),
            },
            InboundFrame::SubscriptionSucceeded { channel } => {
                debug!(channel = %channel, "subscription confirmed");
            }
            InboundFrame::ProtocolError { message } => {
                warn!(message = %message, "push protocol error");
            }
            InboundFrame::Ping => {
                // answered at the transport layer
            }
        }
    }

    /// Subscribe to one location's private channel. Before the first
    /// handshake there is no socket id yet; the location is already
    /// recorded, so the handshake replay will pick it up.
    async fn subscribe(&self, location_id: &str) -> Result<(), Error> {
        let Some(socket_id) = self.socket_id.clone() else {
            debug!(location_id = %location_id, "subscription deferred until handshake");
            return Ok(());
        };

        let channel = protocol::location_channel(location_id);
        debug!(channel = %channel, "subscribing");

        let auth = self.session.channel_token(&socket_id, &channel).await?;
        self.outbound_tx
            .send(protocol::encode_subscribe(&channel, &auth))
            .await
            .map_err(|_| Error::ListenerClosed)?;

        debug!(channel = %channel, "subscribed");
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
