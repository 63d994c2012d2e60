//! Shared plumbing for the m4e crates: tracing setup, wall-clock helpers and
//! the application-wide constants the connection and cache layers agree on.

pub mod time;
pub mod tracing;

use std::path::PathBuf;

pub use time::{MILLIS_PER_DAY, days_to_millis, now_millis};
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};

/// Application name, used for data and config directories.
pub const APP_NAME: &str = "m4e";

/// Period of the application-wide status update, in minutes.
///
/// The connection keepalive is derived from it.
pub const STATUS_UPDATE_PERIOD_MINUTES: u64 = 1;

/// Returns the platform data directory for the application.
///
/// Falls back to the current directory when the platform does not define one.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the platform config directory for the application.
pub fn app_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}
