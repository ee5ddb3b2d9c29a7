//! Resilient duplex channel between the local event bus and a remote session.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::{EventBus, EventSubscription};
use crate::logs::{LogSink, LogStreamEntry};

use super::config::RemoteConfig;
use super::protocol;
use super::session::{Connection, Frame, RemoteSession};

const LOG_QUEUE_CAPACITY: usize = 1024;

/// Lifecycle of the event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No remote session is configured. Terminal.
    NoRemote,
    Connecting,
    Connected,
    /// Waiting before reconnect attempt `attempt`.
    Retrying { attempt: u32 },
    /// The retry budget is spent. Terminal.
    GivenUp,
    /// Shut down by the process. Terminal.
    Stopped,
}

impl ChannelState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChannelState::NoRemote | ChannelState::GivenUp | ChannelState::Stopped
        )
    }
}

/// Handle to the channel supervisor.
///
/// Outbound traffic is best effort: anything raised while the channel is not
/// connected is dropped and never replayed.
#[derive(Clone)]
pub struct EventChannel {
    state: watch::Receiver<ChannelState>,
    logs: Option<mpsc::Sender<LogStreamEntry>>,
    cancel: CancellationToken,
    supervisor: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl EventChannel {
    /// A channel for processes without a remote session.
    pub fn disabled() -> Self {
        let (_, state) = watch::channel(ChannelState::NoRemote);
        Self {
            state,
            logs: None,
            cancel: CancellationToken::new(),
            supervisor: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts the supervisor task, or returns a disabled channel when
    /// `config` does not name a session.
    pub fn start(session: Arc<dyn RemoteSession>, config: RemoteConfig, bus: EventBus) -> Self {
        let Some(session_id) = config.session_id.clone().filter(|_| config.is_enabled()) else {
            tracing::info!("No remote session configured");
            return Self::disabled();
        };

        let (state_tx, state) = watch::channel(ChannelState::Connecting);
        let (logs_tx, logs_rx) = mpsc::channel(LOG_QUEUE_CAPACITY);
        let cancel = CancellationToken::new();

        let supervisor = Supervisor {
            session,
            session_id,
            config,
            events: bus.subscribe(),
            bus,
            logs: logs_rx,
            state: state_tx,
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(supervisor.run());

        Self {
            state,
            logs: Some(logs_tx),
            cancel,
            supervisor: Arc::new(Mutex::new(Some(handle))),
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// Watches state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    /// Queues a log line for the remote session. Returns `false` if it was
    /// dropped.
    pub fn send_log(&self, entry: LogStreamEntry) -> bool {
        if !self.is_connected() {
            return false;
        }
        match &self.logs {
            Some(logs) => logs.try_send(entry).is_ok(),
            None => false,
        }
    }

    /// Stops the supervisor and closes the connection, if any.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.supervisor.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Event channel supervisor panicked");
            }
        }
    }
}

impl LogSink for EventChannel {
    fn offer(&self, entry: LogStreamEntry) -> bool {
        self.send_log(entry)
    }
}

enum PumpExit {
    Closed,
    Cancelled,
}

/// Owns the connection and the retry counter. Only this task mutates them,
/// so reconnects are strictly sequential.
struct Supervisor {
    session: Arc<dyn RemoteSession>,
    session_id: String,
    config: RemoteConfig,
    bus: EventBus,
    events: EventSubscription,
    logs: mpsc::Receiver<LogStreamEntry>,
    state: watch::Sender<ChannelState>,
    cancel: CancellationToken,
}

impl Supervisor {
    async fn run(mut self) {
        let mut retries: u32 = 0;

        loop {
            self.set_state(ChannelState::Connecting);
            let connected = tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.set_state(ChannelState::Stopped);
                    return;
                }
                result = self.session.connect(&self.session_id) => result,
            };

            match connected {
                Ok(mut connection) => {
                    tracing::info!(session = %self.session_id, "Connected to remote session");
                    self.discard_pending();
                    self.set_state(ChannelState::Connected);

                    match self.pump(connection.as_mut()).await {
                        PumpExit::Cancelled => {
                            if let Err(e) = connection.close().await {
                                tracing::debug!(error = %e, "Failed to close remote connection");
                            }
                            self.set_state(ChannelState::Stopped);
                            return;
                        }
                        PumpExit::Closed => {
                            tracing::info!(session = %self.session_id, "Remote session closed");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        session = %self.session_id,
                        attempt = retries,
                        error = %e,
                        "Failed to connect to remote session"
                    );
                }
            }

            if retries >= self.config.max_retries {
                tracing::warn!(
                    session = %self.session_id,
                    retries,
                    "Giving up on remote session, continuing without it"
                );
                self.set_state(ChannelState::GivenUp);
                return;
            }

            retries += 1;
            self.set_state(ChannelState::Retrying { attempt: retries });
            let delay = self.config.backoff_for(retries);
            tracing::info!(
                session = %self.session_id,
                attempt = retries,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting to remote session"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.set_state(ChannelState::Stopped);
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Moves traffic until the connection closes or the process shuts down.
    async fn pump(&mut self, connection: &mut dyn Connection) -> PumpExit {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return PumpExit::Cancelled,
                frame = connection.recv() => match frame {
                    Some(Ok(Frame::Text(text))) => self.handle_inbound(&text),
                    Some(Ok(Frame::Ping(data))) => {
                        if let Err(e) = connection.send(Frame::Pong(data)).await {
                            tracing::warn!(error = %e, "Failed to answer ping");
                        }
                    }
                    Some(Ok(Frame::Pong(_))) => {}
                    Some(Ok(Frame::Close)) | None => return PumpExit::Closed,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Remote connection error");
                    }
                },
                Some(event) = self.events.recv() => {
                    match protocol::encode_event(&event) {
                        Ok(text) => Self::send_text(connection, text).await,
                        Err(e) => tracing::warn!(event = %event.name, error = %e, "Failed to encode event"),
                    }
                }
                Some(entry) = self.logs.recv() => {
                    match protocol::encode_log(&entry) {
                        Ok(text) => Self::send_text(connection, text).await,
                        Err(e) => tracing::warn!(service = %entry.service_name, error = %e, "Failed to encode log entry"),
                    }
                }
            }
        }
    }

    fn handle_inbound(&self, text: &str) {
        match protocol::decode_inbound(text) {
            Some(event) => {
                tracing::debug!(event = %event.name, "Received remote command");
                self.bus.emit(event.name, event.payload);
            }
            None => tracing::trace!("Ignoring unrecognized remote message"),
        }
    }

    async fn send_text(connection: &mut dyn Connection, text: String) {
        if let Err(e) = connection.send(Frame::Text(text)).await {
            tracing::warn!(error = %e, "Failed to send to remote session");
        }
    }

    /// Drops whatever queued up while disconnected.
    fn discard_pending(&mut self) {
        self.events.skip_pending();
        while self.logs.try_recv().is_ok() {}
    }

    fn set_state(&self, state: ChannelState) {
        self.state.send_replace(state);
    }
}
