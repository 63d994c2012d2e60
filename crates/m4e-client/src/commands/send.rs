//! `m4e send`: publish one packet.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::debug;

use m4e_comm::{ConnectionDriver, ConnectionState, RouterHandle};
use m4e_protocol::{Channel, Packet};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

const HANDSHAKE_POLL: Duration = Duration::from_millis(50);

/// Builds the packet from command-line arguments.
pub fn build_packet(
    channel: &str,
    data: &str,
    source_id: &str,
    recipient: Option<&str>,
) -> ClientResult<Packet> {
    let data: serde_json::Value = serde_json::from_str(data)?;
    let packet = Packet::new(Channel::from(channel), source_id, data);
    Ok(match recipient {
        Some(recipient) => packet.with_recipient(recipient),
        None => packet,
    })
}

/// Connects, waits for the server handshake and publishes `packet`.
pub async fn run(config: &ClientConfig, packet: Packet, timeout: Duration) -> ClientResult<()> {
    let router = super::router(config)?;
    let (task, handle) = ConnectionDriver::spawn(router);

    let result = publish(&handle, &config.server.url, packet, timeout).await;

    handle.shutdown();
    let _ = task.await;
    result
}

async fn publish(
    handle: &RouterHandle,
    url: &str,
    packet: Packet,
    timeout: Duration,
) -> ClientResult<()> {
    handle.connect(url).await?;

    let deadline = Instant::now() + timeout;
    loop {
        let stats = handle.stats().await?;
        if stats.state != ConnectionState::Connected {
            return Err(ClientError::Connection("connection closed".to_string()));
        }
        if let Some(version) = stats.protocol_version {
            debug!(version = %version, "handshake complete");
            break;
        }
        if Instant::now() >= deadline {
            return Err(ClientError::Timeout(
                "server did not send its connection status".to_string(),
            ));
        }
        sleep(HANDSHAKE_POLL).await;
    }

    let channel = packet.channel().clone();
    if !handle.publish(packet).await {
        return Err(ClientError::Connection("packet could not be sent".to_string()));
    }
    println!("sent packet on channel {}", channel);
    Ok(())
}
