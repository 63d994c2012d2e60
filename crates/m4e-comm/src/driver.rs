//! Async driver that owns the socket and the router.
//!
//! The driver runs as a single task. It reads frames, feeds them into the
//! [`Connection`](crate::Connection), dispatches the resulting events through
//! the [`ChannelRouter`] and ticks the keepalive timer while connected. Other
//! tasks talk to it through a cloneable [`RouterHandle`].

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use m4e_protocol::Packet;

use crate::connection::ConnectionState;
use crate::error::{CommError, CommResult};
use crate::router::ChannelRouter;
use crate::session::SessionCredentials;
use crate::ws::{self, WsFrame, WsReader};

/// Snapshot of the connection, for status displays.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStats {
    pub state: ConnectionState,
    pub protocol_version: Option<String>,
    pub last_life_sign: Option<DateTime<Utc>>,
    pub ping_average_ms: f64,
}

enum Command {
    Connect {
        server_url: String,
        reply: oneshot::Sender<CommResult<()>>,
    },
    Publish {
        packet: Packet,
        reply: oneshot::Sender<bool>,
    },
    SetCredentials(Option<SessionCredentials>),
    Stats(oneshot::Sender<ConnectionStats>),
    Close,
    Shutdown,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connect { .. } => "Connect",
            Self::Publish { .. } => "Publish",
            Self::SetCredentials(_) => "SetCredentials",
            Self::Stats(_) => "Stats",
            Self::Close => "Close",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Cloneable handle to a running [`ConnectionDriver`].
#[derive(Debug, Clone)]
pub struct RouterHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl RouterHandle {
    fn send(&self, command: Command) -> CommResult<()> {
        self.commands
            .send(command)
            .map_err(|_| CommError::DriverStopped)
    }

    /// Connects to `server_url`, closing any existing connection first.
    ///
    /// Resolves once the socket is open or the attempt failed.
    pub async fn connect(&self, server_url: impl Into<String>) -> CommResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Connect {
            server_url: server_url.into(),
            reply,
        })?;
        rx.await.map_err(|_| CommError::DriverStopped)?
    }

    /// Sends a packet. Returns false when it could not be sent.
    pub async fn publish(&self, packet: Packet) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.send(Command::Publish { packet, reply }).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Replaces the session credentials used by the next connect.
    pub fn set_credentials(&self, credentials: Option<SessionCredentials>) -> CommResult<()> {
        self.send(Command::SetCredentials(credentials))
    }

    /// Returns the current connection state and keepalive statistics.
    pub async fn stats(&self) -> CommResult<ConnectionStats> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stats(reply))?;
        rx.await.map_err(|_| CommError::DriverStopped)
    }

    /// Closes the connection. The driver keeps running.
    pub fn close(&self) {
        let _ = self.send(Command::Close);
    }

    /// Closes the connection and stops the driver.
    pub fn shutdown(&self) {
        let _ = self.send(Command::Shutdown);
    }
}

/// Task owning the router and the socket.
pub struct ConnectionDriver {
    router: ChannelRouter,
    commands: mpsc::UnboundedReceiver<Command>,
    reader: Option<WsReader>,
    keepalive: Option<Interval>,
    generation: u64,
    writer_errors_tx: mpsc::UnboundedSender<(u64, String)>,
    writer_errors: mpsc::UnboundedReceiver<(u64, String)>,
    writer: Option<JoinHandle<()>>,
}

impl ConnectionDriver {
    /// Creates a driver and the handle controlling it.
    pub fn new(router: ChannelRouter) -> (Self, RouterHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (writer_errors_tx, writer_errors) = mpsc::unbounded_channel();
        let driver = Self {
            router,
            commands: rx,
            reader: None,
            keepalive: None,
            generation: 0,
            writer_errors_tx,
            writer_errors,
            writer: None,
        };
        (driver, RouterHandle { commands: tx })
    }

    /// Spawns the driver on the current runtime.
    ///
    /// The task yields the router back once the driver stops.
    pub fn spawn(router: ChannelRouter) -> (JoinHandle<ChannelRouter>, RouterHandle) {
        let (driver, handle) = Self::new(router);
        (tokio::spawn(driver.run()), handle)
    }

    /// Runs until [`RouterHandle::shutdown`] or until every handle is dropped.
    pub async fn run(mut self) -> ChannelRouter {
        debug!("connection driver started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(command) => self.handle_command(command).await,
                },
                frame = next_frame(&mut self.reader), if self.reader.is_some() => {
                    self.handle_frame(frame);
                }
                Some((generation, reason)) = self.writer_errors.recv() => {
                    if generation == self.generation {
                        self.router.connection_mut().handle_error(reason);
                    }
                }
                _ = tick(&mut self.keepalive), if self.keepalive.is_some() => {
                    self.router.connection_mut().ping();
                }
            }

            self.router.pump();
            if !self.router.connection().is_connected() {
                self.reader = None;
                self.keepalive = None;
            }
        }

        self.router.connection_mut().close();
        self.router.pump();
        if let Some(writer) = self.writer.take() {
            let _ = writer.await;
        }
        debug!("connection driver stopped");
        self.router
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { server_url, reply } => {
                let result = self.connect(&server_url).await;
                let _ = reply.send(result);
            }
            Command::Publish { packet, reply } => {
                let _ = reply.send(self.router.publish(packet));
            }
            Command::SetCredentials(credentials) => {
                self.router.connection_mut().set_credentials(credentials);
            }
            Command::Stats(reply) => {
                let connection = self.router.connection();
                let _ = reply.send(ConnectionStats {
                    state: connection.state(),
                    protocol_version: connection.protocol_version().map(str::to_string),
                    last_life_sign: connection.last_life_sign(),
                    ping_average_ms: connection.ping_average(),
                });
            }
            Command::Close => self.router.connection_mut().close(),
            Command::Shutdown => {}
        }
    }

    async fn connect(&mut self, server_url: &str) -> CommResult<()> {
        self.reader = None;
        self.keepalive = None;

        let request = self.router.connection_mut().connect(server_url)?;
        // Events of the closed connection go out before the new one opens.
        self.router.pump();

        let (writer, reader) = match ws::open(&request).await {
            Ok(halves) => halves,
            Err(e) => {
                self.router.connection_mut().handle_error(e.to_string());
                return Err(e);
            }
        };

        self.generation += 1;
        let (transport, task) =
            ws::spawn_writer(writer, self.generation, self.writer_errors_tx.clone());
        self.writer = Some(task);
        self.reader = Some(reader);

        let connection = self.router.connection_mut();
        connection.handle_open(Box::new(transport));

        let config = connection.config();
        if config.keepalive_active() {
            let period = config.keepalive_interval;
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.keepalive = Some(interval);
        }

        Ok(())
    }

    fn handle_frame(&mut self, frame: Option<CommResult<WsFrame>>) {
        let connection = self.router.connection_mut();
        match frame {
            Some(Ok(WsFrame::Text(text))) => connection.handle_text(&text),
            Some(Ok(WsFrame::Pong(payload))) => connection.handle_pong(&payload),
            Some(Ok(WsFrame::Close { code, reason })) => {
                info!(code, reason = %reason, "server closed the connection");
                connection.handle_closed();
            }
            Some(Err(e)) => {
                warn!(error = %e, "WebSocket read failed");
                connection.handle_error(e.to_string());
            }
            None => connection.handle_closed(),
        }
    }
}

async fn next_frame(reader: &mut Option<WsReader>) -> Option<CommResult<WsFrame>> {
    match reader {
        Some(reader) => reader.next_frame().await,
        None => std::future::pending().await,
    }
}

async fn tick(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
