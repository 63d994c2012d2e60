//! WebSocket plumbing on top of `tokio-tungstenite`.
//!
//! [`open`] performs the upgrade request for a [`ConnectRequest`] and splits
//! the socket. The write half runs in its own task fed by a queue, so the
//! synchronous [`Transport`] handed to the connection never blocks.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use rustls::crypto::CryptoProvider;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::connection::ConnectRequest;
use crate::error::{CommError, CommResult, TransportError, TransportResult};
use crate::transport::Transport;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Frame received from the server, reduced to what the connection handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsFrame {
    /// UTF-8 text frame.
    Text(String),
    /// Pong frame with payload.
    Pong(Vec<u8>),
    /// Close frame.
    Close {
        /// Close code, 1005 when the peer sent none.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// Write half of an open socket.
pub struct WsWriter {
    sink: SplitSink<WsStream, Message>,
}

/// Read half of an open socket.
pub struct WsReader {
    stream: SplitStream<WsStream>,
}

impl WsReader {
    /// Receives the next frame, `None` once the stream has ended.
    ///
    /// Binary and ping frames are skipped; pings are answered by the library.
    pub async fn next_frame(&mut self) -> Option<CommResult<WsFrame>> {
        loop {
            let frame = match self.stream.next().await? {
                Ok(Message::Text(text)) => WsFrame::Text(text),
                Ok(Message::Pong(payload)) => WsFrame::Pong(payload),
                Ok(Message::Close(frame)) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.to_string()))
                        .unwrap_or((1005, String::new()));
                    WsFrame::Close { code, reason }
                }
                Ok(Message::Binary(data)) => {
                    debug!(bytes = data.len(), "ignoring binary frame");
                    continue;
                }
                Ok(Message::Ping(_)) | Ok(Message::Frame(_)) => continue,
                Err(e) => return Some(Err(e.into())),
            };
            return Some(Ok(frame));
        }
    }
}

/// Installs the process-wide TLS crypto provider unless one is set.
fn install_crypto_provider() {
    if CryptoProvider::get_default().is_none() {
        // Err means another thread installed one first.
        let _ = rustls::crypto::ring::default_provider().install_default();
    }
}

/// Opens the socket described by `request`.
pub async fn open(request: &ConnectRequest) -> CommResult<(WsWriter, WsReader)> {
    if request.url.scheme() == "wss" {
        install_crypto_provider();
    }

    let mut upgrade = request.url.as_str().into_client_request()?;

    for (name, value) in &request.headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| CommError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| CommError::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        upgrade.headers_mut().insert(header_name, header_value);
    }

    let (socket, response) = tokio_tungstenite::connect_async(upgrade).await?;
    debug!(url = %request.url, status = %response.status(), "WebSocket upgrade complete");

    let (sink, stream) = socket.split();
    Ok((WsWriter { sink }, WsReader { stream }))
}

/// Starts the writer task and returns the transport feeding it.
///
/// A failed write is reported once on `errors`, tagged with `generation` so
/// the driver can ignore failures of sockets it already replaced.
pub fn spawn_writer(
    writer: WsWriter,
    generation: u64,
    errors: mpsc::UnboundedSender<(u64, String)>,
) -> (WsTransport, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(write_loop(writer.sink, rx, generation, errors));
    (WsTransport { outbound: tx }, task)
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    generation: u64,
    errors: mpsc::UnboundedSender<(u64, String)>,
) {
    while let Some(message) = outbound.recv().await {
        let closing = message.is_close();
        if let Err(e) = sink.send(message).await {
            let _ = errors.send((generation, e.to_string()));
            return;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
    trace!(generation, "writer finished");
}

/// [`Transport`] that queues frames for the writer task.
#[derive(Debug, Clone)]
pub struct WsTransport {
    outbound: mpsc::UnboundedSender<Message>,
}

impl WsTransport {
    fn enqueue(&self, message: Message) -> TransportResult<()> {
        self.outbound
            .send(message)
            .map_err(|_| TransportError::Closed)
    }
}

impl Transport for WsTransport {
    fn send_text(&mut self, text: &str) -> TransportResult<usize> {
        self.enqueue(Message::Text(text.to_string()))?;
        Ok(text.len())
    }

    fn send_ping(&mut self, payload: Vec<u8>) -> TransportResult<()> {
        self.enqueue(Message::Ping(payload))
    }

    fn close(&mut self) {
        let _ = self.enqueue(Message::Close(None));
    }
}
