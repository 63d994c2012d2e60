//! Seam between the connection state machine and the socket.
//!
//! [`Connection`](crate::Connection) only ever talks to a `Transport`. The
//! WebSocket driver plugs in a channel-backed implementation that forwards to
//! the socket's writer task; tests plug in a recorder.

use crate::error::{TransportError, TransportResult};

/// Outbound half of an open connection.
pub trait Transport: Send {
    /// Offers text to the transport.
    ///
    /// Returns how many bytes were accepted, which may be fewer than offered.
    /// The count must fall on a character boundary of `text`.
    fn send_text(&mut self, text: &str) -> TransportResult<usize>;

    /// Sends a low-level ping frame.
    fn send_ping(&mut self, payload: Vec<u8>) -> TransportResult<()>;

    /// Starts a graceful close. Further writes may fail.
    fn close(&mut self);
}

/// Writes all of `text`, calling the transport until every byte is accepted.
///
/// Returns the byte count on success.
pub(crate) fn write_all_text(transport: &mut dyn Transport, text: &str) -> TransportResult<usize> {
    let total = text.len();
    let mut sent = 0;

    while sent < total {
        let accepted = transport.send_text(&text[sent..])?;
        if accepted == 0 {
            return Err(TransportError::Stalled { sent, total });
        }
        sent += accepted.min(total - sent);
        if !text.is_char_boundary(sent) {
            return Err(TransportError::SplitCharacter(sent));
        }
    }

    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Chunked {
        chunk: usize,
        received: Vec<String>,
    }

    impl Transport for Chunked {
        fn send_text(&mut self, text: &str) -> TransportResult<usize> {
            let mut n = self.chunk.min(text.len());
            while !text.is_char_boundary(n) {
                n -= 1;
            }
            self.received.push(text[..n].to_string());
            Ok(n)
        }

        fn send_ping(&mut self, _payload: Vec<u8>) -> TransportResult<()> {
            Ok(())
        }

        fn close(&mut self) {}
    }

    #[test]
    fn partial_writes_are_retried() {
        let mut transport = Chunked {
            chunk: 4,
            received: Vec::new(),
        };
        let sent = write_all_text(&mut transport, "0123456789").unwrap();

        assert_eq!(sent, 10);
        assert_eq!(transport.received, vec!["0123", "4567", "89"]);
        assert_eq!(transport.received.concat(), "0123456789");
    }

    #[test]
    fn multibyte_text_is_not_split() {
        let mut transport = Chunked {
            chunk: 3,
            received: Vec::new(),
        };
        let text = "größe";
        write_all_text(&mut transport, text).unwrap();
        assert_eq!(transport.received.concat(), text);
    }

    #[test]
    fn stalled_transport_is_an_error() {
        let mut transport = Chunked {
            chunk: 0,
            received: Vec::new(),
        };
        let result = write_all_text(&mut transport, "abc");
        assert!(matches!(
            result,
            Err(TransportError::Stalled { sent: 0, total: 3 })
        ));
    }

    #[test]
    fn over_reporting_transport_is_clamped() {
        struct Liar;
        impl Transport for Liar {
            fn send_text(&mut self, text: &str) -> TransportResult<usize> {
                Ok(text.len() * 2)
            }
            fn send_ping(&mut self, _payload: Vec<u8>) -> TransportResult<()> {
                Ok(())
            }
            fn close(&mut self) {}
        }

        assert_eq!(write_all_text(&mut Liar, "abc").unwrap(), 3);
    }
}
