//! Wire types for the m4e real-time connection.
//!
//! Every message exchanged over the WebSocket connection is a [`Packet`]
//! encoded as a single JSON object:
//!
//! ```text
//! {"channel":"chat","sourceId":"17","source":"alice","time":1700000000000,"data":{...}}
//! ```
//!
//! The `channel` tag selects the logical sub-protocol ([`Channel`]); `data`
//! is opaque to the transport and interpreted by whoever subscribes to that
//! channel. The first message the server sends after the socket opens is a
//! [`ConnectionStatus`] carrying the server's protocol version.
//!
//! # Example
//!
//! ```rust
//! use m4e_protocol::{Channel, Packet};
//!
//! let packet = Packet::new(Channel::Chat, "17", serde_json::json!({"text": "hi"}));
//! let text = packet.to_json();
//! let decoded = Packet::from_json(&text).unwrap();
//! assert_eq!(decoded, packet);
//! ```

mod channel;
mod error;
mod packet;
mod status;

pub use channel::Channel;
pub use error::{ProtocolError, ProtocolResult};
pub use packet::Packet;
pub use status::{ConnectionStatus, UNKNOWN_PROTOCOL_VERSION};

/// Protocol version this client was written against.
pub const PROTOCOL_VERSION: &str = "1.0.0";
