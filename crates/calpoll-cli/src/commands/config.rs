//! Configuration commands.

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::CliResult;

/// Dump the current configuration to stdout.
pub fn dump(cli: &Cli, config: &ClientConfig) -> CliResult<()> {
    println!("# config.toml ({})", config_path(cli).display());
    println!("{}", config.to_toml()?);
    Ok(())
}

/// Validate every configured feed.
pub fn validate(config: &ClientConfig) -> CliResult<()> {
    let feeds = config.feed_configs()?;
    for feed in &feeds {
        println!(
            "ok: {} (every {}s, up to {} events)",
            feed.url,
            feed.reload_interval.as_secs(),
            feed.max_entries
        );
    }
    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path(cli: &Cli) -> CliResult<()> {
    println!("config: {}", config_path(cli).display());
    Ok(())
}

fn config_path(cli: &Cli) -> std::path::PathBuf {
    cli.config.clone().unwrap_or_else(ClientConfig::default_path)
}
