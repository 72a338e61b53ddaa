//! Logging setup for the `calpoll` binary.
//!
//! Logs always go to stderr so event output on stdout can be piped. Each
//! command picks a profile; `RUST_LOG` replaces the profile's filter.
//!
//! ```ignore
//! use calpoll_core::tracing::{LogFormat, TracingConfig, init_tracing};
//!
//! init_tracing(&TracingConfig::watch().with_format(LogFormat::Json))?;
//! ```

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*, util::TryInitError};

/// Crates whose events pass the default filter.
const CRATES: [&str; 5] = [
    "calpoll_core",
    "calpoll_feed",
    "calpoll_daemon",
    "calpoll_cli",
    "calpoll",
];

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),

    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
}

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One compact line per event
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Logging profile for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracingConfig {
    pub level: Level,
    pub format: LogFormat,
    pub timestamps: bool,
    /// Show module path, file and line.
    pub locations: bool,
}

impl TracingConfig {
    /// `calpoll fetch`: only warnings, a failed feed is already reported.
    pub fn fetch() -> Self {
        Self {
            level: Level::WARN,
            format: LogFormat::Text,
            timestamps: false,
            locations: false,
        }
    }

    /// `calpoll watch`: fetches, backoffs and shutdown, timestamped.
    pub fn watch() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Text,
            timestamps: true,
            locations: false,
        }
    }

    /// `--debug`: everything calpoll logs, with source locations.
    pub fn debug() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Text,
            timestamps: false,
            locations: true,
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Filter directive enabling every calpoll crate at this profile's level.
    pub fn directive(&self) -> String {
        CRATES
            .iter()
            .map(|target| format!("{}={}", target, self.level))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn filter(&self) -> Result<EnvFilter, TracingError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => Ok(EnvFilter::try_new(self.directive())?),
        }
    }

    fn layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        match self.format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_file(self.locations)
                .with_line_number(self.locations)
                .boxed(),
            LogFormat::Text => {
                let layer = fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_target(self.locations)
                    .with_file(self.locations)
                    .with_line_number(self.locations);
                if self.timestamps {
                    layer.boxed()
                } else {
                    layer.without_time().boxed()
                }
            }
        }
    }
}

/// Installs the global subscriber. Call once, before any command runs.
///
/// # Errors
///
/// Fails if a subscriber is already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<(), TracingError> {
    let filter = config.filter()?;
    tracing_subscriber::registry()
        .with(config.layer())
        .with(filter)
        .try_init()?;
    Ok(())
}
