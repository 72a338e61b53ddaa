//! Raw entries as parsed from a feed.
//!
//! A [`RawEntry`] mirrors one VEVENT component before any filtering:
//! optional fields stay optional, recurrence data is kept verbatim and
//! nothing is validated. The normalizer decides what is usable.

use calpoll_core::{EventTime, NormalizedEvent};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The time specification for a raw entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum RawEventTime {
    /// A specific datetime, resolved to UTC.
    DateTime(DateTime<Utc>),
    /// A date without time of day (full-day entries).
    Date(NaiveDate),
}

impl RawEventTime {
    /// Creates a RawEventTime from a UTC datetime.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }

    /// Creates a RawEventTime from a date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::Date(date)
    }

    /// Returns true if this is a date-only value.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::Date(_))
    }
}

impl From<RawEventTime> for EventTime {
    fn from(time: RawEventTime) -> Self {
        match time {
            RawEventTime::DateTime(dt) => EventTime::DateTime(dt),
            RawEventTime::Date(date) => EventTime::AllDay(date),
        }
    }
}

impl From<EventTime> for RawEventTime {
    fn from(time: EventTime) -> Self {
        match time {
            EventTime::DateTime(dt) => RawEventTime::DateTime(dt),
            EventTime::AllDay(date) => RawEventTime::Date(date),
        }
    }
}

/// A raw feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Component UID. Empty when the feed omitted it.
    pub uid: String,
    /// The SUMMARY line.
    pub summary: Option<String>,
    /// DTSTART.
    pub start: Option<RawEventTime>,
    /// DTEND.
    pub end: Option<RawEventTime>,
    /// DURATION, used when DTEND is absent.
    pub duration: Option<Duration>,
    /// RRULE value, without the `RRULE:` prefix.
    pub rrule: Option<String>,
    /// Excluded occurrence starts.
    pub exdates: Vec<RawEventTime>,
    /// Set on overrides of a single occurrence of a recurring entry.
    pub recurrence_id: Option<RawEventTime>,
    /// STATUS, upper-cased as published (e.g. "CONFIRMED", "CANCELLED").
    pub status: Option<String>,
    /// Explicit full-day marker (X-MICROSOFT-CDO-ALLDAYEVENT and friends).
    pub full_day: Option<bool>,
    /// IANA timezone of DTSTART, when it carried a TZID.
    pub timezone: Option<String>,
}

impl RawEntry {
    /// Creates an entry with the given uid and nothing else.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            summary: None,
            start: None,
            end: None,
            duration: None,
            rrule: None,
            exdates: Vec::new(),
            recurrence_id: None,
            status: None,
            full_day: None,
            timezone: None,
        }
    }

    /// Builder method to set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder method to set start and end.
    pub fn with_times(mut self, start: RawEventTime, end: RawEventTime) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Builder method to set the start only.
    pub fn with_start(mut self, start: RawEventTime) -> Self {
        self.start = Some(start);
        self
    }

    /// Builder method to set the duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Builder method to set the recurrence rule.
    pub fn with_rrule(mut self, rrule: impl Into<String>) -> Self {
        self.rrule = Some(rrule.into());
        self
    }

    /// Builder method to add an excluded occurrence.
    pub fn with_exdate(mut self, exdate: RawEventTime) -> Self {
        self.exdates.push(exdate);
        self
    }

    /// Builder method to mark this entry as an override of one occurrence.
    pub fn with_recurrence_id(mut self, id: RawEventTime) -> Self {
        self.recurrence_id = Some(id);
        self
    }

    /// Builder method to set the status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Builder method to set the explicit full-day flag.
    pub fn with_full_day(mut self, full_day: bool) -> Self {
        self.full_day = Some(full_day);
        self
    }

    /// Builder method to set the timezone.
    pub fn with_timezone(mut self, tz: impl Into<String>) -> Self {
        self.timezone = Some(tz.into());
        self
    }

    /// Returns the title, or an empty string when the feed had none.
    pub fn title(&self) -> &str {
        self.summary.as_deref().unwrap_or_default()
    }

    /// Returns true if the entry is a recurrence master.
    pub fn is_recurring(&self) -> bool {
        self.rrule.is_some()
    }

    /// Returns true if the feed marked the entry cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("CANCELLED"))
    }

    /// Returns true if the entry is a full-day entry, either explicitly or
    /// because DTSTART is a date.
    pub fn is_all_day(&self) -> bool {
        self.full_day
            .unwrap_or_else(|| self.start.is_some_and(|s| s.is_all_day()))
    }
}

/// Turns a normalized occurrence back into a plain, non-recurring entry.
impl From<&NormalizedEvent> for RawEntry {
    fn from(event: &NormalizedEvent) -> Self {
        RawEntry::new(event.uid.clone())
            .with_summary(event.title.clone())
            .with_times(event.start.into(), event.end.into())
            .with_full_day(event.is_full_day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn all_day_detection() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 10).unwrap();
        let entry = RawEntry::new("a").with_start(RawEventTime::from_date(date));
        assert!(entry.is_all_day());

        let dt = Utc.with_ymd_and_hms(2025, 2, 10, 0, 0, 0).unwrap();
        let entry = RawEntry::new("b").with_start(RawEventTime::from_datetime(dt));
        assert!(!entry.is_all_day());

        let entry = entry.with_full_day(true);
        assert!(entry.is_all_day());
    }

    #[test]
    fn cancelled_status_is_case_insensitive() {
        assert!(RawEntry::new("a").with_status("CANCELLED").is_cancelled());
        assert!(RawEntry::new("a").with_status("Cancelled").is_cancelled());
        assert!(!RawEntry::new("a").with_status("CONFIRMED").is_cancelled());
        assert!(!RawEntry::new("a").is_cancelled());
    }

    #[test]
    fn title_defaults_to_empty() {
        assert_eq!(RawEntry::new("a").title(), "");
        assert_eq!(RawEntry::new("a").with_summary("Lunch").title(), "Lunch");
    }

    #[test]
    fn from_normalized_event() {
        let now = Utc.with_ymd_and_hms(2025, 2, 5, 8, 0, 0).unwrap();
        let start = Utc.with_ymd_and_hms(2025, 2, 5, 9, 0, 0).unwrap();
        let event = NormalizedEvent::new(
            "evt-1",
            "Standup",
            EventTime::from_utc(start),
            EventTime::from_utc(start + Duration::minutes(15)),
            false,
            &now,
        );

        let entry = RawEntry::from(&event);
        assert_eq!(entry.uid, "evt-1");
        assert_eq!(entry.title(), "Standup");
        assert_eq!(entry.start, Some(RawEventTime::DateTime(start)));
        assert_eq!(entry.full_day, Some(false));
        assert!(!entry.is_recurring());
    }
}
