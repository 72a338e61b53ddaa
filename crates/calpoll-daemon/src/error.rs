//! Error types for the scheduler daemon.

use calpoll_feed::FeedError;
use thiserror::Error;

/// Errors that can occur while driving feed schedulers.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The session was shut down; no more fetches will run.
    #[error("scheduler for {url} has been shut down")]
    ShutDown { url: String },

    /// The scheduler task is gone without a shutdown request.
    #[error("scheduler for {url} is no longer running")]
    SchedulerGone { url: String },

    /// Installing an OS signal handler failed.
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    /// Building a transport or feed failed.
    #[error(transparent)]
    Feed(#[from] FeedError),
}

impl DaemonError {
    /// Creates a shut-down error.
    pub fn shut_down(url: impl Into<String>) -> Self {
        Self::ShutDown { url: url.into() }
    }

    /// Creates a scheduler-gone error.
    pub fn scheduler_gone(url: impl Into<String>) -> Self {
        Self::SchedulerGone { url: url.into() }
    }
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DaemonError::shut_down("https://example.com/cal.ics");
        assert_eq!(
            err.to_string(),
            "scheduler for https://example.com/cal.ics has been shut down"
        );

        let err = DaemonError::scheduler_gone("https://example.com/cal.ics");
        assert!(err.to_string().contains("no longer running"));
    }

    #[test]
    fn feed_errors_are_transparent() {
        let err: DaemonError = FeedError::configuration("reload interval must be positive").into();
        assert_eq!(
            err.to_string(),
            "configuration: reload interval must be positive"
        );
    }
}
