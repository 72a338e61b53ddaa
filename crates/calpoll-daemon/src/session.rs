//! Per-feed fetch bookkeeping.
//!
//! A [`FetchSession`] holds everything the scheduler knows about one feed:
//! its configuration, the consecutive server error counter, the last known
//! good event list and the timestamps of the last attempt and success. It
//! does no I/O; the scheduler feeds it outcomes and asks it for delays.

use std::time::Duration;

use calpoll_core::NormalizedEvent;
use calpoll_feed::{FeedConfig, FeedError, FetchResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, warn};
use url::Url;

use crate::backoff::{delay_for_status, floor_at_nominal, parse_retry_after};

/// What the session is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPhase {
    /// Waiting for the timer or a manual trigger.
    Idle,
    /// A request is in flight.
    Fetching,
    /// The session has been shut down and will not fetch again.
    ShutDown,
}

/// A classified failure: what went wrong and when to try again.
#[derive(Debug)]
pub struct RetryDecision {
    pub error: FeedError,
    pub delay: Duration,
}

/// State of one feed.
#[derive(Debug, Clone)]
pub struct FetchSession {
    config: FeedConfig,
    phase: FetchPhase,
    consecutive_server_errors: u32,
    events: Vec<NormalizedEvent>,
    last_attempt: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
    last_error: Option<String>,
    next_fetch_at: Option<DateTime<Utc>>,
}

impl FetchSession {
    /// Creates an idle session that has never fetched.
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            phase: FetchPhase::Idle,
            consecutive_server_errors: 0,
            events: Vec::new(),
            last_attempt: None,
            last_success: None,
            last_error: None,
            next_fetch_at: None,
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn url(&self) -> &Url {
        &self.config.url
    }

    /// The nominal reload interval (N).
    pub fn nominal_interval(&self) -> Duration {
        self.config.reload_interval
    }

    pub fn phase(&self) -> FetchPhase {
        self.phase
    }

    pub fn consecutive_server_errors(&self) -> u32 {
        self.consecutive_server_errors
    }

    /// The last successfully delivered event list.
    pub fn events(&self) -> &[NormalizedEvent] {
        &self.events
    }

    pub fn last_attempt(&self) -> Option<DateTime<Utc>> {
        self.last_attempt
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// When the armed timer fires, if one is armed.
    pub fn next_fetch_at(&self) -> Option<DateTime<Utc>> {
        self.next_fetch_at
    }

    /// Marks the start of a fetch pass.
    pub fn begin_fetch(&mut self, now: DateTime<Utc>) {
        self.phase = FetchPhase::Fetching;
        self.last_attempt = Some(now);
        self.next_fetch_at = None;
    }

    /// Records a successful pass and returns the delay before the next one.
    ///
    /// Resets the server error counter and replaces the event list.
    pub fn record_success(&mut self, events: Vec<NormalizedEvent>, now: DateTime<Utc>) -> Duration {
        self.phase = FetchPhase::Idle;
        self.consecutive_server_errors = 0;
        self.events = events;
        self.last_success = Some(now);
        self.last_error = None;
        self.nominal_interval()
    }

    /// Records a failure whose delay is already known.
    ///
    /// The event list is left untouched.
    pub fn record_failure(&mut self, error: &FeedError, delay: Duration) -> Duration {
        self.phase = FetchPhase::Idle;
        self.last_error = Some(error.to_string());
        floor_at_nominal(delay, self.nominal_interval())
    }

    /// Classifies a non-success response and records it.
    pub fn classify_response(&mut self, response: &FetchResponse, now: DateTime<Utc>) -> RetryDecision {
        let nominal = self.nominal_interval();
        let retry_after = response
            .header("Retry-After")
            .and_then(|value| parse_retry_after(value, now));
        let delay = delay_for_status(
            response.status,
            retry_after,
            nominal,
            &mut self.consecutive_server_errors,
        );

        let error = FeedError::from_status(response.status, &response.status_text)
            .with_url(self.config.url_str());
        let url = self.config.url_str();
        match response.status {
            401 | 403 => error!(url, status = response.status, "authentication failed"),
            429 => warn!(url, retry_after = ?retry_after, "rate limited"),
            s if s >= 500 => warn!(
                url,
                status = s,
                consecutive = self.consecutive_server_errors,
                "server error"
            ),
            s => warn!(url, status = s, "unexpected response"),
        }

        let delay = self.record_failure(&error, delay);
        RetryDecision { error, delay }
    }

    /// Records the deadline of the armed timer.
    pub fn set_next_fetch(&mut self, at: Option<DateTime<Utc>>) {
        self.next_fetch_at = at;
    }

    /// Marks the session as shut down.
    pub fn shut_down(&mut self) {
        self.phase = FetchPhase::ShutDown;
        self.next_fetch_at = None;
    }

    /// True when no fetch has succeeded yet or the last success is at
    /// least one nominal interval old.
    pub fn should_refetch(&self, now: DateTime<Utc>) -> bool {
        match self.last_success {
            None => true,
            Some(at) => match (now - at).to_std() {
                Ok(age) => age >= self.nominal_interval(),
                Err(_) => false,
            },
        }
    }
}
