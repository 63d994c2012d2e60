//! Command-line client for the Meet4Eat real-time connection and the
//! local document cache.
//!
//! This crate provides the `m4e` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
