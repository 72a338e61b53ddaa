//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/calpoll/config.toml` by default:
//!
//! ```toml
//! [display]
//! max_title_length = 40
//!
//! [[feeds]]
//! url = "webcal://example.com/team.ics"
//! reload_interval = 300000          # milliseconds
//! excluded_events = ["Lunch"]
//! maximum_entries = 10
//! maximum_number_of_days = 365
//!
//! [feeds.auth]
//! method = "bearer"
//! pass = "env::TEAM_CALENDAR_TOKEN"
//! ```
//!
//! `auth.user` and `auth.pass` accept secret references (see
//! [`crate::secret`]). Every feed is validated into a [`FeedConfig`] before
//! any polling starts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use calpoll_core::FormatOptions;
use calpoll_daemon::SchedulerOptions;
use calpoll_feed::{Credential, FeedConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::secret;

/// Configuration for the calpoll client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug logging.
    pub debug: bool,

    /// Never arm reload timers (also enabled by `CALPOLL_TEST_MODE`).
    pub test_mode: bool,

    /// Output settings.
    pub display: DisplaySettings,

    /// HTTP settings shared by all feeds.
    pub http: HttpSettings,

    /// The feeds to poll.
    pub feeds: Vec<FeedSettings>,
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Maximum title length (truncated with ellipsis).
    pub max_title_length: Option<usize>,

    /// Text printed when there are no events.
    pub no_events_text: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            max_title_length: None,
            no_events_text: "No events".to_string(),
        }
    }
}

/// HTTP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout: 30 }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// One `[[feeds]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSettings {
    pub url: String,

    /// Nominal reload interval in milliseconds.
    #[serde(default = "default_reload_interval", alias = "fetch_interval")]
    pub reload_interval: u64,

    /// Exact titles to drop.
    #[serde(default)]
    pub excluded_events: Vec<String>,

    #[serde(default = "default_maximum_entries")]
    pub maximum_entries: usize,

    #[serde(default = "default_maximum_number_of_days")]
    pub maximum_number_of_days: u32,

    #[serde(default)]
    pub include_past_events: bool,

    /// Accept self-signed or otherwise invalid certificates.
    #[serde(default)]
    pub self_signed_cert: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthSettings>,
}

fn default_reload_interval() -> u64 {
    FeedConfig::DEFAULT_RELOAD_INTERVAL.as_millis() as u64
}

fn default_maximum_entries() -> usize {
    FeedConfig::DEFAULT_MAX_ENTRIES
}

fn default_maximum_number_of_days() -> u32 {
    FeedConfig::DEFAULT_MAX_LOOKAHEAD_DAYS
}

/// Feed credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub method: AuthMethod,
    /// User name for basic auth (secret references allowed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Password, or the token for bearer auth (secret references allowed).
    pub pass: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    #[default]
    Basic,
    Bearer,
}

impl FeedSettings {
    /// Settings for `url` with every other key at its default.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reload_interval: default_reload_interval(),
            excluded_events: Vec::new(),
            maximum_entries: default_maximum_entries(),
            maximum_number_of_days: default_maximum_number_of_days(),
            include_past_events: false,
            self_signed_cert: false,
            auth: None,
        }
    }

    /// Validates this entry into a [`FeedConfig`]. `index` names the entry in errors.
    pub fn to_feed_config(&self, index: usize) -> ConfigResult<FeedConfig> {
        let feed_error = |source| ConfigError::Feed { index, source };

        let config = FeedConfig::new(&self.url)
            .map_err(feed_error)?
            .with_reload_interval(Duration::from_millis(self.reload_interval))
            .map_err(feed_error)?
            .with_excluded_titles(self.excluded_events.iter().cloned())
            .with_max_entries(self.maximum_entries)
            .with_max_lookahead_days(self.maximum_number_of_days)
            .with_include_past(self.include_past_events)
            .with_insecure_transport(self.self_signed_cert);

        match &self.auth {
            Some(auth) => Ok(config.with_credential(auth.to_credential(index)?)),
            None => Ok(config),
        }
    }
}

impl AuthSettings {
    fn to_credential(&self, index: usize) -> ConfigResult<Credential> {
        let resolve = |value: &str| {
            secret::resolve(value).map_err(|source| ConfigError::Secret { index, source })
        };

        match self.method {
            AuthMethod::Bearer => Ok(Credential::Bearer {
                token: resolve(&self.pass)?,
            }),
            AuthMethod::Basic => {
                let user = self.user.as_deref().ok_or_else(|| ConfigError::Invalid {
                    index,
                    message: "basic auth requires a user".to_string(),
                })?;
                Ok(Credential::Basic {
                    user: resolve(user)?,
                    pass: resolve(&self.pass)?,
                })
            }
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if it does not exist.
    pub fn load() -> ConfigResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calpoll")
    }

    /// Validates every feed. At least one feed is required.
    pub fn feed_configs(&self) -> ConfigResult<Vec<FeedConfig>> {
        if self.feeds.is_empty() {
            return Err(ConfigError::NoFeeds {
                path: Self::default_path(),
            });
        }
        self.feeds
            .iter()
            .enumerate()
            .map(|(index, feed)| feed.to_feed_config(index))
            .collect()
    }

    /// Options for formatting event lists.
    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            max_title_length: self.display.max_title_length,
            no_events_text: self.display.no_events_text.clone(),
        }
    }

    /// Scheduler options: test mode from the file or the environment.
    pub fn scheduler_options(&self) -> SchedulerOptions {
        let from_env = SchedulerOptions::from_env();
        from_env.with_test_mode(from_env.test_mode || self.test_mode)
    }
}
