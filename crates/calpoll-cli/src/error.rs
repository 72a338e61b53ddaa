//! CLI error types.

use std::path::PathBuf;

use calpoll_core::TracingError;
use calpoll_daemon::DaemonError;
use calpoll_feed::FeedError;
use thiserror::Error;

use crate::secret::SecretError;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while reading or validating `config.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("no feeds configured; add a [[feeds]] section to {}", .path.display())]
    NoFeeds { path: PathBuf },

    #[error("feed #{index}: {source}")]
    Feed {
        index: usize,
        #[source]
        source: FeedError,
    },

    #[error("feed #{index}: {message}")]
    Invalid { index: usize, message: String },

    #[error("feed #{index}: {source}")]
    Secret {
        index: usize,
        #[source]
        source: SecretError,
    },
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that end a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Daemon(#[from] DaemonError),

    #[error(transparent)]
    Tracing(#[from] TracingError),

    #[error("failed to encode JSON output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("all {0} feeds failed")]
    AllFeedsFailed(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_name_the_feed() {
        let err = ConfigError::Invalid {
            index: 2,
            message: "basic auth requires a user".to_string(),
        };
        assert_eq!(err.to_string(), "feed #2: basic auth requires a user");

        let err: CliError = err.into();
        assert!(err.to_string().starts_with("configuration error: feed #2"));
    }

    #[test]
    fn no_feeds_points_at_the_file() {
        let err = ConfigError::NoFeeds {
            path: PathBuf::from("/tmp/calpoll.toml"),
        };
        assert!(err.to_string().contains("/tmp/calpoll.toml"));
    }
}
