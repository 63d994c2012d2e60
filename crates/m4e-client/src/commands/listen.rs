//! `m4e listen`: print incoming packets.

use tokio::sync::mpsc;
use tracing::{info, warn};

use m4e_comm::{ConnectionDriver, ConnectionEvent};
use m4e_protocol::{Channel, Packet};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Channels to subscribe to; all known channels when none are given.
pub fn channels(names: &[String]) -> Vec<Channel> {
    if names.is_empty() {
        Channel::KNOWN.to_vec()
    } else {
        names.iter().map(|name| Channel::from(name.as_str())).collect()
    }
}

/// Connects and prints every packet on the selected channels as JSON.
///
/// Returns after `count` packets, on Ctrl-C, or with an error once the
/// connection is lost.
pub async fn run(config: &ClientConfig, names: &[String], count: Option<usize>) -> ClientResult<()> {
    let mut router = super::router(config)?;

    let (packets_tx, mut packets) = mpsc::unbounded_channel::<Packet>();
    for channel in channels(names) {
        let tx = packets_tx.clone();
        router.subscribe(channel, move |packet| {
            let _ = tx.send(packet.clone());
        });
    }

    let (lost_tx, mut lost) = mpsc::unbounded_channel::<String>();
    router.on_connection_event(move |event| match event {
        ConnectionEvent::ConnectionError(reason) => {
            let _ = lost_tx.send(reason.clone());
        }
        ConnectionEvent::Disconnected => {
            let _ = lost_tx.send("connection closed".to_string());
        }
        _ => {}
    });

    let (task, handle) = ConnectionDriver::spawn(router);
    handle.connect(&config.server.url).await?;
    info!(url = %config.server.url, "listening");

    let mut received = 0usize;
    let result = loop {
        tokio::select! {
            Some(packet) = packets.recv() => {
                println!("{}", packet.to_json());
                received += 1;
                if count.is_some_and(|limit| received >= limit) {
                    break Ok(());
                }
            }
            Some(reason) = lost.recv() => {
                warn!(reason = %reason, "connection lost");
                break Err(ClientError::Connection(reason));
            }
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };

    handle.shutdown();
    let _ = task.await;
    result
}
