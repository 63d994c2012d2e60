//! m4e CLI entry point.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use m4e_client::cli::{CacheAction, Cli, Command, ConfigAction};
use m4e_client::commands;
use m4e_client::config::ClientConfig;
use m4e_client::error::{ClientError, ClientResult};
use m4e_core::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_tracing(cli.tracing_config(config.debug)) {
        eprintln!("warning: logging disabled: {}", e);
    }

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> ClientResult<ClientConfig> {
    let mut config = match cli.config {
        Some(ref path) => ClientConfig::load_from(path).map_err(ClientError::Config)?,
        None => ClientConfig::load().map_err(ClientError::Config)?,
    };
    if let Some(ref server) = cli.server {
        config.server.url = server.clone();
    }
    Ok(config)
}

async fn run(command: Command, config: ClientConfig) -> ClientResult<()> {
    match command {
        Command::Listen { channels, count } => {
            commands::listen::run(&config, &channels, count).await
        }
        Command::Send {
            channel,
            data,
            source_id,
            recipient,
            timeout,
        } => {
            let packet =
                commands::send::build_packet(&channel, &data, &source_id, recipient.as_deref())?;
            commands::send::run(&config, packet, Duration::from_secs(timeout)).await
        }
        Command::Cache { action } => match action {
            CacheAction::Purge { days } => commands::cache::purge(&config, days),
            CacheAction::Clear => commands::cache::clear(&config),
            CacheAction::Path => commands::cache::path(&config),
        },
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Path => commands::config::path(),
        },
    }
}
