//! calpoll CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use calpoll_cli::cli::{Cli, Command, ConfigAction};
use calpoll_cli::commands;
use calpoll_cli::config::ClientConfig;
use calpoll_cli::error::{CliResult, ConfigResult};
use calpoll_core::{LogFormat, TracingConfig, init_tracing};

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

    let mut tracing_config = if cli.debug || config.debug {
        TracingConfig::debug()
    } else if matches!(cli.command, Some(Command::Watch)) {
        TracingConfig::watch()
    } else {
        TracingConfig::fetch()
    };
    if cli.json {
        tracing_config = tracing_config.with_format(LogFormat::Json);
    }
    if let Err(e) = init_tracing(&tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(&cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> ConfigResult<ClientConfig> {
    match cli.config {
        Some(ref path) => ClientConfig::load_from(path),
        None => ClientConfig::load(),
    }
}

async fn run(cli: &Cli, config: &ClientConfig) -> CliResult<()> {
    match cli.command {
        None | Some(Command::Fetch) => commands::fetch::run(cli, config).await,
        Some(Command::Watch) => commands::watch::run(cli, config).await,
        Some(Command::Config { ref action }) => match action {
            ConfigAction::Dump => commands::config::dump(cli, config),
            ConfigAction::Validate => commands::config::validate(config),
            ConfigAction::Path => commands::config::path(cli),
        },
    }
}
