//! Event types produced by feed normalization.
//!
//! - [`NormalizedEvent`]: one display-ready occurrence of a feed entry
//! - [`RelativeDay`]: a coarse "Today" / "Tomorrow" / "Ends in N days" classification

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::time::{EventTime, calendar_days_between};

/// A normalized, display-ready event occurrence.
///
/// Built fresh on every normalization pass and never mutated afterwards;
/// consumers replace their whole list on each delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Identifier of the feed component this occurrence came from.
    pub uid: String,
    /// The event title.
    pub title: String,
    /// Start as published by the feed.
    pub start: EventTime,
    /// End as published by the feed (or derived from a duration).
    pub end: EventTime,
    /// Resolved start instant.
    pub starts_at: DateTime<Utc>,
    /// Resolved end instant.
    pub ends_at: DateTime<Utc>,
    /// Whether this is a full-day event.
    pub is_full_day: bool,
    /// Whether this occurrence was produced by recurrence expansion.
    pub is_recurring_instance: bool,
    /// Calendar days from today to the start date (negative once started on an earlier day).
    pub days_until_start: i64,
    /// Calendar days from today to the last day the event covers.
    pub days_until_end: i64,
}

impl NormalizedEvent {
    /// Builds an occurrence, deriving instants and day offsets relative to `now`.
    ///
    /// Full-day times resolve to local midnight in `now`'s timezone.
    pub fn new<Tz: TimeZone>(
        uid: impl Into<String>,
        title: impl Into<String>,
        start: EventTime,
        end: EventTime,
        is_full_day: bool,
        now: &DateTime<Tz>,
    ) -> Self {
        let tz = now.timezone();
        let starts_at = start.to_instant_in(&tz);
        let ends_at = end.to_instant_in(&tz);
        let today = now.date_naive();

        let start_date = starts_at.with_timezone(&tz).date_naive();
        let days_until_start = calendar_days_between(today, start_date);
        let days_until_end = calendar_days_between(today, last_day(starts_at, ends_at, &tz));

        Self {
            uid: uid.into(),
            title: title.into(),
            start,
            end,
            starts_at,
            ends_at,
            is_full_day,
            is_recurring_instance: false,
            days_until_start,
            days_until_end,
        }
    }

    /// Builder method to mark as recurring instance.
    pub fn with_recurring(mut self, is_recurring: bool) -> Self {
        self.is_recurring_instance = is_recurring;
        self
    }

    /// Checks if the event is in progress at the given time.
    pub fn is_in_progress_at(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && now < self.ends_at
    }

    /// Checks if the event has already ended at the given time.
    pub fn has_ended_at(&self, now: DateTime<Utc>) -> bool {
        self.ends_at <= now
    }

    /// Returns the duration of the event in minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.ends_at - self.starts_at).num_minutes()
    }

    /// Classifies the occurrence relative to today, from the derived day offsets.
    pub fn relative_day(&self) -> RelativeDay {
        if self.days_until_start < 0 {
            return match self.days_until_end {
                d if d < 0 => RelativeDay::Past,
                0 => RelativeDay::EndsToday,
                d => RelativeDay::EndsIn(d),
            };
        }
        match self.days_until_start {
            0 => RelativeDay::Today,
            1 => RelativeDay::Tomorrow,
            d => RelativeDay::InDays(d),
        }
    }
}

/// The last calendar day covered by `[start, end)`.
///
/// An end exactly at midnight belongs to the previous day.
fn last_day<Tz: TimeZone>(start: DateTime<Utc>, end: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    let inclusive_end = if end > start {
        end - chrono::Duration::nanoseconds(1)
    } else {
        start
    };
    inclusive_end.with_timezone(tz).date_naive()
}

/// Relative-day classification used for "Today" / "Tomorrow" style labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "days")]
pub enum RelativeDay {
    /// Ended before today.
    Past,
    /// Started on an earlier day and ends today.
    EndsToday,
    /// Started on an earlier day and ends in this many days.
    EndsIn(i64),
    /// Starts today.
    Today,
    /// Starts tomorrow.
    Tomorrow,
    /// Starts in this many days (two or more).
    InDays(i64),
}
