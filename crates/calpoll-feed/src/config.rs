//! Per-feed configuration.

use std::collections::HashSet;
use std::time::Duration;

use url::Url;

use crate::error::{FeedError, FeedResult};

/// Credentials sent with every request to a feed.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Credential {
    /// No Authorization header.
    #[default]
    None,
    /// HTTP Basic authentication.
    Basic { user: String, pass: String },
    /// Bearer token authentication.
    Bearer { token: String },
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Basic { user, .. } => f
                .debug_struct("Basic")
                .field("user", user)
                .field("pass", &"<redacted>")
                .finish(),
            Self::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// Validated configuration for a single feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// The feed URL.
    pub url: Url,
    /// Nominal polling interval; also the floor of every retry delay.
    pub reload_interval: Duration,
    /// Titles dropped from the result (exact, case-sensitive).
    pub excluded_titles: HashSet<String>,
    /// Maximum number of events delivered per pass.
    pub max_entries: usize,
    /// How many days ahead an event may start.
    pub max_lookahead_days: u32,
    /// Keep events that already ended.
    pub include_past: bool,
    /// Credentials for the feed.
    pub credential: Credential,
    /// Accept self-signed or otherwise invalid certificates.
    pub accept_insecure_transport: bool,
}

impl FeedConfig {
    /// Default reload interval: one hour.
    pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(60 * 60);

    /// Default maximum number of entries.
    pub const DEFAULT_MAX_ENTRIES: usize = 10;

    /// Default lookahead in days.
    pub const DEFAULT_MAX_LOOKAHEAD_DAYS: u32 = 365;

    /// Creates a configuration for the given URL with default settings.
    ///
    /// `webcal://` URLs are fetched over plain HTTP.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL is invalid or not HTTP(S).
    pub fn new(url: impl AsRef<str>) -> FeedResult<Self> {
        let raw = url.as_ref().trim();
        let raw = match raw.strip_prefix("webcal://") {
            Some(rest) => format!("http://{}", rest),
            None => raw.to_string(),
        };

        let parsed = Url::parse(&raw).map_err(|e| {
            FeedError::configuration(format!("invalid feed url '{}'", raw)).with_source(e)
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FeedError::configuration(format!(
                "unsupported feed url scheme '{}'",
                parsed.scheme()
            )));
        }

        Ok(Self {
            url: parsed,
            reload_interval: Self::DEFAULT_RELOAD_INTERVAL,
            excluded_titles: HashSet::new(),
            max_entries: Self::DEFAULT_MAX_ENTRIES,
            max_lookahead_days: Self::DEFAULT_MAX_LOOKAHEAD_DAYS,
            include_past: false,
            credential: Credential::None,
            accept_insecure_transport: false,
        })
    }

    /// Sets the reload interval.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a zero interval.
    pub fn with_reload_interval(mut self, interval: Duration) -> FeedResult<Self> {
        if interval.is_zero() {
            return Err(FeedError::configuration("reload interval must be positive"));
        }
        self.reload_interval = interval;
        Ok(self)
    }

    /// Sets the excluded titles.
    pub fn with_excluded_titles<I, S>(mut self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_titles = titles.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the maximum number of entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Sets the lookahead in days.
    pub fn with_max_lookahead_days(mut self, days: u32) -> Self {
        self.max_lookahead_days = days;
        self
    }

    /// Keeps events that already ended.
    pub fn with_include_past(mut self, include: bool) -> Self {
        self.include_past = include;
        self
    }

    /// Sets the credentials.
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }

    /// Accepts invalid TLS certificates for this feed.
    pub fn with_insecure_transport(mut self, insecure: bool) -> Self {
        self.accept_insecure_transport = insecure;
        self
    }

    /// Returns the URL as a string.
    pub fn url_str(&self) -> &str {
        self.url.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedErrorCode;

    #[test]
    fn defaults() {
        let config = FeedConfig::new("https://example.com/cal.ics").unwrap();
        assert_eq!(config.reload_interval, Duration::from_secs(3600));
        assert_eq!(config.max_entries, 10);
        assert_eq!(config.max_lookahead_days, 365);
        assert!(!config.include_past);
        assert!(!config.accept_insecure_transport);
        assert_eq!(config.credential, Credential::None);
    }

    #[test]
    fn webcal_maps_to_http() {
        let config = FeedConfig::new("webcal://example.com/holidays.ics").unwrap();
        assert_eq!(config.url_str(), "http://example.com/holidays.ics");
    }

    #[test]
    fn rejects_invalid_urls() {
        let err = FeedConfig::new("not a url").unwrap_err();
        assert_eq!(err.code(), FeedErrorCode::Configuration);

        let err = FeedConfig::new("ftp://example.com/cal.ics").unwrap_err();
        assert!(err.message().contains("ftp"));
    }

    #[test]
    fn rejects_zero_interval() {
        let err = FeedConfig::new("https://example.com/cal.ics")
            .unwrap()
            .with_reload_interval(Duration::ZERO)
            .unwrap_err();
        assert_eq!(err.code(), FeedErrorCode::Configuration);
    }

    #[test]
    fn credential_debug_redacts_secrets() {
        let basic = Credential::Basic {
            user: "alice".to_string(),
            pass: "hunter2".to_string(),
        };
        let debug = format!("{:?}", basic);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));

        let bearer = Credential::Bearer {
            token: "s3cret".to_string(),
        };
        assert!(!format!("{:?}", bearer).contains("s3cret"));
    }
}
