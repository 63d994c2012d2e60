//! Per-channel fan-out over a single connection.
//!
//! The router owns the [`Connection`]. Inbound packets are handed to the
//! handlers registered for the packet's channel, synchronously and in
//! registration order; outbound packets from any subsystem go through
//! [`ChannelRouter::publish`]. Packets on the same channel reach handlers in
//! wire order.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use m4e_protocol::{Channel, Packet};

use crate::connection::{Connection, ConnectionEvent};

/// Handler for packets of one channel.
pub type PacketHandler = Box<dyn FnMut(&Packet) + Send>;

/// Handler for connection lifecycle events.
pub type EventHandler = Box<dyn FnMut(&ConnectionEvent) + Send>;

/// Demultiplexes inbound packets by channel.
pub struct ChannelRouter {
    connection: Connection,
    handlers: HashMap<Channel, Vec<PacketHandler>>,
    listeners: Vec<EventHandler>,
    dropped: u64,
}

impl fmt::Debug for ChannelRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut channels: Vec<_> = self.handlers.keys().map(Channel::as_str).collect();
        channels.sort_unstable();
        f.debug_struct("ChannelRouter")
            .field("connection", &self.connection)
            .field("channels", &channels)
            .field("listeners", &self.listeners.len())
            .field("dropped", &self.dropped)
            .finish()
    }
}

impl ChannelRouter {
    /// Creates a router around a connection.
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            handlers: HashMap::new(),
            listeners: Vec::new(),
            dropped: 0,
        }
    }

    /// Returns the connection.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Returns the connection for feeding socket events.
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }

    /// Number of inbound packets nobody handled.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Registers a handler for one channel.
    pub fn subscribe<F>(&mut self, channel: Channel, handler: F)
    where
        F: FnMut(&Packet) + Send + 'static,
    {
        debug!(channel = %channel, "subscribing to channel");
        self.handlers
            .entry(channel)
            .or_default()
            .push(Box::new(handler));
    }

    /// Registers a queue that receives a copy of every packet on `channel`.
    pub fn subscribe_channel(&mut self, channel: Channel) -> mpsc::UnboundedReceiver<Packet> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe(channel, move |packet| {
            // The receiver going away just means nobody listens any more.
            let _ = tx.send(packet.clone());
        });
        rx
    }

    /// Registers a handler for connection lifecycle events.
    pub fn on_connection_event<F>(&mut self, handler: F)
    where
        F: FnMut(&ConnectionEvent) + Send + 'static,
    {
        self.listeners.push(Box::new(handler));
    }

    /// Sends a packet over the connection.
    pub fn publish(&mut self, packet: Packet) -> bool {
        trace!(channel = %packet.channel(), "publishing packet");
        self.connection.send(packet)
    }

    /// Delivers one inbound packet to the handlers of its channel.
    ///
    /// Returns false when nobody handles the channel; the packet is dropped.
    pub fn dispatch(&mut self, packet: &Packet) -> bool {
        match self.handlers.get_mut(packet.channel()) {
            Some(handlers) if !handlers.is_empty() => {
                for handler in handlers.iter_mut() {
                    handler(packet);
                }
                true
            }
            _ => {
                self.dropped += 1;
                if packet.channel().is_other() {
                    warn!(channel = %packet.channel(), "dropping packet on unknown channel");
                } else {
                    debug!(channel = %packet.channel(), "dropping packet, channel has no subscribers");
                }
                false
            }
        }
    }

    /// Drains pending connection events, dispatching packets and notifying
    /// lifecycle listeners.
    ///
    /// Returns the number of events processed.
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        while let Some(event) = self.connection.next_event() {
            processed += 1;
            for listener in self.listeners.iter_mut() {
                listener(&event);
            }
            if let ConnectionEvent::PacketReceived(packet) = &event {
                self.dispatch(packet);
            }
        }
        processed
    }
}
