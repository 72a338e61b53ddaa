//! Command-line interface definition.

use std::path::PathBuf;

use calpoll_core::{FormatOptions, OutputFormat};
use clap::{Parser, Subcommand};

use crate::config::{ClientConfig, FeedSettings};

/// calpoll - keep calendar feeds fresh and print what's coming up
#[derive(Debug, Parser)]
#[command(name = "calpoll")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CALPOLL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Maximum title length (truncated with ellipsis)
    #[arg(long)]
    pub max_title_length: Option<usize>,

    /// Text to show when there are no events
    #[arg(long)]
    pub no_events_text: Option<String>,

    /// Poll this feed instead of the configured ones (can be repeated)
    #[arg(long = "url", action = clap::ArgAction::Append)]
    pub urls: Vec<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Returns the output format based on CLI flags.
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }

    /// Format options from the config file, overridden by flags.
    pub fn format_options(&self, config: &ClientConfig) -> FormatOptions {
        let mut options = config.format_options();
        if self.max_title_length.is_some() {
            options.max_title_length = self.max_title_length;
        }
        if let Some(ref text) = self.no_events_text {
            options.no_events_text = text.clone();
        }
        options
    }

    /// The feeds to poll: `--url` flags win over the config file.
    pub fn feed_settings(&self, config: &ClientConfig) -> Vec<FeedSettings> {
        if self.urls.is_empty() {
            config.feeds.clone()
        } else {
            self.urls.iter().map(FeedSettings::new).collect()
        }
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch every feed once and print the merged event list (default)
    Fetch,

    /// Keep polling every feed and print each update until interrupted
    Watch,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
