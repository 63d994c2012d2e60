//! Real-time connection to the Meet4Eat server.
//!
//! One persistent WebSocket connection carries every real-time packet. The
//! pieces, bottom-up:
//!
//! - [`Transport`]: outbound seam; [`ws::WsTransport`] in production.
//! - [`Connection`]: synchronous state machine handling the handshake,
//!   packet decoding, paged sends and keepalive statistics.
//! - [`ChannelRouter`]: demultiplexes inbound packets to per-channel
//!   subscribers and accepts outbound packets from any subsystem.
//! - [`ConnectionDriver`]: tokio task owning the socket and the router,
//!   controlled through a [`RouterHandle`].
//!
//! ```no_run
//! use m4e_comm::{ChannelRouter, Connection, ConnectionConfig, ConnectionDriver, SessionCredentials};
//! use m4e_protocol::Channel;
//!
//! # async fn demo() -> Result<(), m4e_comm::CommError> {
//! let connection = Connection::new(ConnectionConfig::default())
//!     .with_credentials(SessionCredentials::new("JSESSIONID", "token"));
//! let mut router = ChannelRouter::new(connection);
//! let mut chat = router.subscribe_channel(Channel::Chat);
//!
//! let (_task, handle) = ConnectionDriver::spawn(router);
//! handle.connect("https://meet4eat.example.com").await?;
//! while let Some(packet) = chat.recv().await {
//!     println!("{}", packet.data());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod keepalive;
pub mod router;
pub mod session;
pub mod transport;
pub mod ws;

pub use config::{ConnectionConfig, DEFAULT_RESOURCE_PATH, keepalive_interval_from_minutes, ws_url};
pub use connection::{ConnectRequest, Connection, ConnectionEvent, ConnectionState};
pub use driver::{ConnectionDriver, ConnectionStats, RouterHandle};
pub use error::{CommError, CommResult, TransportError, TransportResult};
pub use keepalive::Keepalive;
pub use router::ChannelRouter;
pub use session::SessionCredentials;
pub use transport::Transport;
