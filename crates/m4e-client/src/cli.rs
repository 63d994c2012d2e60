//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;

use m4e_core::TracingConfig;

/// m4e - Meet4Eat real-time connection and document cache tool
#[derive(Debug, Parser)]
#[command(name = "m4e")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "M4E_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Log as JSON, one object per line
    #[arg(long)]
    pub json_logs: bool,

    /// Server URL, overrides the configuration
    #[arg(long, env = "M4E_SERVER")]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Picks the logging setup from the flags and the config file's `debug`.
    ///
    /// `--json-logs` selects the log-shipper preset; otherwise debug output is
    /// compact and normal runs only show warnings.
    pub fn tracing_config(&self, config_debug: bool) -> TracingConfig {
        let debug = self.debug || config_debug;
        match (self.json_logs, debug) {
            (true, true) => TracingConfig::daemon().with_level(Level::DEBUG),
            (true, false) => TracingConfig::daemon(),
            (false, true) => TracingConfig::cli_debug(),
            (false, false) => TracingConfig::default().with_level(Level::WARN),
        }
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect and print incoming packets until interrupted
    Listen {
        /// Only print packets of this channel (can be repeated)
        #[arg(long = "channel", short, action = clap::ArgAction::Append)]
        channels: Vec<String>,

        /// Exit after this many packets
        #[arg(long)]
        count: Option<usize>,
    },

    /// Publish a single packet
    Send {
        /// Channel tag (system, chat, notify, event)
        #[arg(long, short)]
        channel: String,

        /// JSON payload
        #[arg(long, short, default_value = "{}")]
        data: String,

        /// Sender id
        #[arg(long, default_value = "")]
        source_id: String,

        /// Recipient user or event id
        #[arg(long)]
        recipient: Option<String>,

        /// Seconds to wait for the server handshake
        #[arg(long, default_value = "10")]
        timeout: u64,
    },

    /// Document cache commands
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Document cache actions.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Delete records not used for a number of days
    Purge {
        /// Maximum age in days (defaults to the configured expiration)
        #[arg(long)]
        days: Option<u64>,
    },

    /// Delete the whole cache
    Clear,

    /// Show the cache directory
    Path,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Show the configuration file path
    Path,
}
