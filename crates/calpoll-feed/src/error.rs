//! Error types for feed fetching, parsing and normalization.
//!
//! Every failure a fetch pass can hit is a [`FeedError`] carrying a
//! [`FeedErrorCode`]. The scheduler classifies responses into these codes,
//! picks a retry delay from them and hands the error to the listener's
//! failure hook. None of them is fatal to a session.

use std::fmt;
use thiserror::Error;

/// The category of a feed error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedErrorCode {
    /// The request never produced a response: connection refused, DNS, TLS, timeout.
    Transport,
    /// The server rejected our credentials (401 / 403).
    Authentication,
    /// The server asked us to slow down (429).
    RateLimited,
    /// The server failed (5xx).
    Server,
    /// Any other 4xx response.
    Client,
    /// A non-success status outside the 4xx / 5xx ranges.
    UnexpectedStatus,
    /// The payload could not be read as a calendar document.
    Parse,
    /// A single entry inside a readable document was malformed.
    Entry,
    /// Missing or invalid feed configuration.
    Configuration,
}

impl FeedErrorCode {
    /// Returns true if this failure comes from the remote server being
    /// unwell rather than from us.
    pub fn is_server_side(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Server)
    }

    /// Returns a stable, snake_case name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Authentication => "authentication",
            Self::RateLimited => "rate_limited",
            Self::Server => "server",
            Self::Client => "client",
            Self::UnexpectedStatus => "unexpected_status",
            Self::Parse => "parse",
            Self::Entry => "entry",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for FeedErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised while fetching or reading a feed.
#[derive(Debug, Error)]
pub struct FeedError {
    code: FeedErrorCode,
    message: String,
    /// The feed this error belongs to, when known.
    url: Option<String>,
    /// HTTP status for response-classified errors.
    status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FeedError {
    /// Creates a new feed error with the given code and message.
    pub fn new(code: FeedErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            url: None,
            status: None,
            source: None,
        }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::Transport, message)
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::Parse, message)
    }

    /// Creates an entry error.
    pub fn entry(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::Entry, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::Configuration, message)
    }

    /// Creates an error for a non-success HTTP response.
    ///
    /// The code follows the status class and the message reads
    /// `HTTP <status> <status text>`.
    pub fn from_status(status: u16, status_text: &str) -> Self {
        let code = match status {
            401 | 403 => FeedErrorCode::Authentication,
            429 => FeedErrorCode::RateLimited,
            s if s >= 500 => FeedErrorCode::Server,
            s if s >= 400 => FeedErrorCode::Client,
            _ => FeedErrorCode::UnexpectedStatus,
        };
        let message = format!("HTTP {} {}", status, status_text);
        let mut err = Self::new(code, message.trim_end());
        err.status = Some(status);
        err
    }

    /// Sets the feed URL for this error.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> FeedErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the feed URL, if set.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Returns the HTTP status, for response-classified errors.
    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref url) = self.url {
            write!(f, "[{}] ", url)?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(
            FeedError::from_status(401, "Unauthorized").code(),
            FeedErrorCode::Authentication
        );
        assert_eq!(
            FeedError::from_status(403, "Forbidden").code(),
            FeedErrorCode::Authentication
        );
        assert_eq!(
            FeedError::from_status(429, "Too Many Requests").code(),
            FeedErrorCode::RateLimited
        );
        assert_eq!(
            FeedError::from_status(503, "Service Unavailable").code(),
            FeedErrorCode::Server
        );
        assert_eq!(
            FeedError::from_status(404, "Not Found").code(),
            FeedErrorCode::Client
        );
        assert_eq!(
            FeedError::from_status(304, "Not Modified").code(),
            FeedErrorCode::UnexpectedStatus
        );
    }

    #[test]
    fn status_message() {
        let err = FeedError::from_status(503, "Service Unavailable");
        assert_eq!(err.message(), "HTTP 503 Service Unavailable");
        assert_eq!(err.status(), Some(503));

        let err = FeedError::from_status(520, "");
        assert_eq!(err.message(), "HTTP 520");
    }

    #[test]
    fn server_side_codes() {
        assert!(FeedErrorCode::Server.is_server_side());
        assert!(FeedErrorCode::RateLimited.is_server_side());
        assert!(!FeedErrorCode::Authentication.is_server_side());
        assert!(!FeedErrorCode::Parse.is_server_side());
    }

    #[test]
    fn display_includes_url() {
        let err = FeedError::transport("connection refused").with_url("https://example.com/cal.ics");
        let display = format!("{}", err);
        assert!(display.starts_with("[https://example.com/cal.ics]"));
        assert!(display.contains("transport: connection refused"));
    }

    #[test]
    fn with_source() {
        use std::error::Error;
        let io_err = std::io::Error::other("reset by peer");
        let err = FeedError::transport("request failed").with_source(io_err);
        assert!(err.source().is_some());
        assert!(err.url().is_none());
    }
}
