//! Connection state machine.
//!
//! [`Connection`] owns the negotiated protocol version, the keepalive
//! statistics and, while connected, the outbound [`Transport`]. It does no
//! I/O scheduling of its own: the driver feeds it socket events
//! (`handle_open`, `handle_text`, `handle_pong`, `handle_error`,
//! `handle_closed`) and collects the resulting [`ConnectionEvent`]s with
//! [`Connection::next_event`].
//!
//! ```text
//! Disconnected --connect()--> Connecting --handle_open()--> Connected
//!      ^                          |                              |
//!      +------ error / close -----+------------------------------+
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use url::Url;

use m4e_protocol::{ConnectionStatus, PROTOCOL_VERSION, Packet, ProtocolError};

use crate::config::ConnectionConfig;
use crate::error::{CommError, CommResult};
use crate::keepalive::Keepalive;
use crate::session::SessionCredentials;
use crate::transport::{Transport, write_all_text};

/// Lifecycle state of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No socket.
    #[default]
    Disconnected,
    /// Socket requested, waiting for the open event.
    Connecting,
    /// Socket open.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Events produced by the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The socket opened.
    Connected,
    /// The connection went back to `Disconnected`.
    Disconnected,
    /// A packet arrived after the handshake.
    PacketReceived(Packet),
    /// The transport reported a failure.
    ConnectionError(String),
}

/// What the driver needs to open the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// WebSocket endpoint.
    pub url: Url,
    /// Extra request headers (the session cookie).
    pub headers: Vec<(String, String)>,
}

/// One persistent connection to the server.
pub struct Connection {
    config: ConnectionConfig,
    credentials: Option<SessionCredentials>,
    state: ConnectionState,
    transport: Option<Box<dyn Transport>>,
    protocol_version: Option<String>,
    keepalive: Keepalive,
    events: VecDeque<ConnectionEvent>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("server_url", &self.config.server_url)
            .field("state", &self.state)
            .field("protocol_version", &self.protocol_version)
            .field("pending_events", &self.events.len())
            .finish()
    }
}

impl Connection {
    /// Creates a disconnected connection.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            credentials: None,
            state: ConnectionState::Disconnected,
            transport: None,
            protocol_version: None,
            keepalive: Keepalive::new(),
            events: VecDeque::new(),
        }
    }

    /// Builder: set the session credentials.
    pub fn with_credentials(mut self, credentials: SessionCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Replaces the session credentials, e.g. after signing in again.
    pub fn set_credentials(&mut self, credentials: Option<SessionCredentials>) {
        self.credentials = credentials;
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Returns the current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns true while the socket is open.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Protocol version announced by the server, once the handshake is done.
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Time of the last pong.
    pub fn last_life_sign(&self) -> Option<DateTime<Utc>> {
        self.keepalive.last_life_sign()
    }

    /// Smoothed ping round-trip time in milliseconds.
    pub fn ping_average(&self) -> f64 {
        self.keepalive.ping_average_ms()
    }

    /// Pops the oldest pending event.
    pub fn next_event(&mut self) -> Option<ConnectionEvent> {
        self.events.pop_front()
    }

    /// Prepares a connection to `server_url`.
    ///
    /// Any existing connection is closed first. Fails without touching the
    /// network when the URL is unusable or no session cookie is available;
    /// otherwise the state becomes `Connecting` and the returned request
    /// tells the driver what to open.
    pub fn connect(&mut self, server_url: &str) -> CommResult<ConnectRequest> {
        if self.state != ConnectionState::Disconnected {
            debug!(state = %self.state, "closing existing connection before reconnecting");
            self.close();
        }

        self.config.server_url = server_url.to_string();
        let url = self.config.endpoint()?;

        let credentials = match &self.credentials {
            Some(credentials) if credentials.is_usable() => credentials,
            _ => {
                warn!(url = %url, "cannot open the connection without a prior sign-in");
                return Err(CommError::MissingSession);
            }
        };

        let headers = vec![("Cookie".to_string(), credentials.cookie_header())];
        self.state = ConnectionState::Connecting;
        debug!(url = %url, "connecting");

        Ok(ConnectRequest { url, headers })
    }

    /// The socket opened.
    pub fn handle_open(&mut self, mut transport: Box<dyn Transport>) {
        if self.state != ConnectionState::Connecting {
            warn!(state = %self.state, "ignoring unexpected open event");
            transport.close();
            return;
        }

        info!(url = %self.config.server_url, "connection established");
        self.transport = Some(transport);
        self.state = ConnectionState::Connected;
        self.protocol_version = None;
        self.keepalive.stop();
        self.events.push_back(ConnectionEvent::Connected);
    }

    /// A text message arrived.
    ///
    /// The first well-formed message after opening is the server's
    /// connection status and is consumed here; every later one is decoded as
    /// a packet and emitted.
    pub fn handle_text(&mut self, text: &str) {
        if !self.is_connected() {
            debug!(state = %self.state, "ignoring message while not connected");
            return;
        }

        if self.protocol_version.is_none() {
            match ConnectionStatus::from_json(text) {
                Ok(status) => {
                    if !status.is_ok() {
                        warn!(
                            status = %status.status,
                            description = %status.description,
                            "server reported a connection problem"
                        );
                    }
                    if !status.is_supported() {
                        warn!(
                            expected = PROTOCOL_VERSION,
                            found = %status.protocol_version,
                            "server protocol version differs"
                        );
                    }
                    info!(version = %status.protocol_version, "server protocol version");
                    self.protocol_version = Some(status.protocol_version);
                }
                Err(e) => warn!(error = %e, content = %text, "invalid handshake message received"),
            }
            return;
        }

        match Packet::from_json(text) {
            Ok(packet) => self.events.push_back(ConnectionEvent::PacketReceived(packet)),
            Err(ProtocolError::EmptyMessage) => debug!("ignoring empty message"),
            Err(e) => warn!(error = %e, content = %text, "invalid packet received"),
        }
    }

    /// A pong frame arrived.
    pub fn handle_pong(&mut self, payload: &[u8]) {
        if let Some(average) = self
            .keepalive
            .record_pong(payload, Instant::now(), Utc::now())
        {
            debug!(average_ms = average, "keepalive round trip");
        }
    }

    /// The transport failed; the connection is dropped.
    pub fn handle_error(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(reason = %reason, state = %self.state, "connection problem");
        self.events.push_back(ConnectionEvent::ConnectionError(reason));
        self.shutdown_transport(false);
    }

    /// The peer closed the socket.
    pub fn handle_closed(&mut self) {
        if self.state != ConnectionState::Disconnected {
            info!("disconnected from server");
        }
        self.shutdown_transport(false);
    }

    /// Sends a packet, stamping it with the current time if it has none.
    ///
    /// Returns false when not connected, when the packet encodes to nothing,
    /// or when the write fails. A failed write drops the connection.
    pub fn send(&mut self, packet: Packet) -> bool {
        match self.try_send(packet) {
            Ok(bytes) => {
                debug!(bytes, "packet sent");
                true
            }
            Err(CommError::Transport(e)) => {
                self.handle_error(e.to_string());
                false
            }
            Err(e) => {
                debug!(error = %e, "packet not sent");
                false
            }
        }
    }

    /// Like [`Connection::send`] but reports why nothing was sent.
    pub fn try_send(&mut self, mut packet: Packet) -> CommResult<usize> {
        if !self.is_connected() {
            return Err(CommError::NotConnected);
        }
        let transport = self.transport.as_mut().ok_or(CommError::NotConnected)?;

        packet.ensure_time(Utc::now());
        let text = packet.to_json();
        if text.is_empty() {
            return Err(CommError::EmptyMessage);
        }

        Ok(write_all_text(&mut **transport, &text)?)
    }

    /// Sends a keepalive ping if enabled and connected.
    ///
    /// Returns true if a ping went out.
    pub fn ping(&mut self) -> bool {
        if !self.config.ping_enabled || !self.is_connected() {
            return false;
        }
        let Some(transport) = self.transport.as_mut() else {
            return false;
        };

        let payload = self.keepalive.begin_ping(Instant::now());
        match transport.send_ping(payload) {
            Ok(()) => true,
            Err(e) => {
                self.handle_error(e.to_string());
                false
            }
        }
    }

    /// Closes the connection and forgets the negotiated protocol version.
    pub fn close(&mut self) {
        self.shutdown_transport(true);
    }

    fn shutdown_transport(&mut self, graceful: bool) {
        if let Some(mut transport) = self.transport.take()
            && graceful
        {
            transport.close();
        }

        let was = self.state;
        self.state = ConnectionState::Disconnected;
        self.protocol_version = None;
        self.keepalive.stop();

        if was != ConnectionState::Disconnected {
            self.events.push_back(ConnectionEvent::Disconnected);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            transport.close();
        }
    }
}
