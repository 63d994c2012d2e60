//! Subcommand implementations.

pub mod cache;
pub mod config;
pub mod listen;
pub mod send;

use m4e_comm::{ChannelRouter, Connection};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Builds a router over a connection carrying the configured session cookie.
pub(crate) fn router(config: &ClientConfig) -> ClientResult<ChannelRouter> {
    let credentials = config.credentials().map_err(ClientError::Config)?.ok_or_else(|| {
        ClientError::SessionRequired(format!(
            "no session cookie configured. Add to {}:\n  \
             [session]\n  \
             cookie_value = \"env::M4E_SESSION\"",
            ClientConfig::default_path().display()
        ))
    })?;

    let connection = Connection::new(config.connection_config()).with_credentials(credentials);
    Ok(ChannelRouter::new(connection))
}
