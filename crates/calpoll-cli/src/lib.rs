//! CLI, configuration loading and output for calpoll.
//!
//! This crate provides the `calpoll` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;

pub use cli::Cli;
pub use config::ClientConfig;
pub use error::{CliError, CliResult, ConfigError, ConfigResult};
