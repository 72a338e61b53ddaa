//! Output formatting for normalized events.
//!
//! Two renderings are provided:
//! - **Text**: one line per event with a relative-day label ("Today", "Ends in 2 days")
//! - **JSON**: machine-readable event list

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::event::{NormalizedEvent, RelativeDay};

/// The output format for event display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Human-readable terminal output.
    #[default]
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Configuration options for output formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatOptions {
    /// Maximum length for event titles (truncated with ellipsis).
    pub max_title_length: Option<usize>,
    /// Text printed when a feed has no events.
    pub no_events_text: String,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            max_title_length: None,
            no_events_text: "No events".to_string(),
        }
    }
}

/// A single event in JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonEvent {
    pub uid: String,
    pub title: String,
    /// RFC 3339 start instant.
    pub start: String,
    /// RFC 3339 end instant.
    pub end: String,
    pub full_day: bool,
    pub relative: RelativeDay,
    pub label: String,
}

/// Renders event lists for terminals and scripts.
#[derive(Debug, Clone, Default)]
pub struct EventFormatter {
    options: FormatOptions,
}

impl EventFormatter {
    /// Creates a new formatter with the given options.
    pub fn new(options: FormatOptions) -> Self {
        Self { options }
    }

    /// Formats events as text lines, rendering clock times in `now`'s timezone.
    pub fn format_text<Tz: TimeZone>(&self, events: &[NormalizedEvent], now: &DateTime<Tz>) -> String
    where
        Tz::Offset: fmt::Display,
    {
        if events.is_empty() {
            return self.options.no_events_text.clone();
        }

        events
            .iter()
            .map(|event| {
                format!(
                    "{} {}  {}",
                    relative_label(event),
                    when(event, now),
                    self.truncate_title(&event.title)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Converts events to their JSON representation.
    pub fn format_json(&self, events: &[NormalizedEvent]) -> Vec<JsonEvent> {
        events
            .iter()
            .map(|event| JsonEvent {
                uid: event.uid.clone(),
                title: self.truncate_title(&event.title).into_owned(),
                start: event.starts_at.to_rfc3339(),
                end: event.ends_at.to_rfc3339(),
                full_day: event.is_full_day,
                relative: event.relative_day(),
                label: relative_label(event),
            })
            .collect()
    }

    fn truncate_title<'a>(&self, title: &'a str) -> Cow<'a, str> {
        match self.options.max_title_length {
            Some(max) => ellipsis(title, max),
            None => Cow::Borrowed(title),
        }
    }
}

/// Returns the human label for an event's relative day.
pub fn relative_label(event: &NormalizedEvent) -> String {
    match event.relative_day() {
        RelativeDay::Past => event.starts_at.format("%a %d %b").to_string(),
        RelativeDay::EndsToday => "Ends today".to_string(),
        RelativeDay::EndsIn(1) => "Ends tomorrow".to_string(),
        RelativeDay::EndsIn(days) => format!("Ends in {} days", days),
        RelativeDay::Today => "Today".to_string(),
        RelativeDay::Tomorrow => "Tomorrow".to_string(),
        RelativeDay::InDays(days) => format!("In {} days", days),
    }
}

fn when<Tz: TimeZone>(event: &NormalizedEvent, now: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    if event.is_full_day {
        return "(all day)".to_string();
    }
    let tz = now.timezone();
    format!(
        "{}-{}",
        event.starts_at.with_timezone(&tz).format("%H:%M"),
        event.ends_at.with_timezone(&tz).format("%H:%M")
    )
}

/// Truncates a string with ellipsis if it exceeds the given length.
pub fn ellipsis(s: &str, max_len: usize) -> Cow<'_, str> {
    if max_len == 0 {
        return Cow::Borrowed("");
    }

    if s.chars().count() <= max_len {
        return Cow::Borrowed(s);
    }

    let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
    Cow::Owned(format!("{}...", truncated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::EventTime;
    use chrono::{FixedOffset, NaiveDate, Utc};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_events(now: DateTime<Utc>) -> Vec<NormalizedEvent> {
        vec![
            NormalizedEvent::new(
                "a",
                "Standup",
                EventTime::from_utc(utc(2025, 2, 5, 9, 0)),
                EventTime::from_utc(utc(2025, 2, 5, 9, 15)),
                false,
                &now,
            ),
            NormalizedEvent::new(
                "b",
                "Conference",
                EventTime::from_date(date(2025, 2, 4)),
                EventTime::from_date(date(2025, 2, 8)),
                true,
                &now,
            ),
            NormalizedEvent::new(
                "c",
                "Architecture review",
                EventTime::from_utc(utc(2025, 2, 6, 14, 0)),
                EventTime::from_utc(utc(2025, 2, 6, 15, 0)),
                false,
                &now,
            ),
        ]
    }

    #[test]
    fn text_output() {
        let now = utc(2025, 2, 5, 8, 0);
        let text = EventFormatter::default().format_text(&sample_events(now), &now);

        insta::assert_snapshot!(text, @r"
        Today 09:00-09:15  Standup
        Ends in 2 days (all day)  Conference
        Tomorrow 14:00-15:00  Architecture review
        ");
    }

    #[test]
    fn text_output_in_local_offset() {
        let now = utc(2025, 2, 5, 8, 0);
        let paris = FixedOffset::east_opt(3600).unwrap();
        let text =
            EventFormatter::default().format_text(&sample_events(now), &now.with_timezone(&paris));

        insta::assert_snapshot!(text, @r"
        Today 10:00-10:15  Standup
        Ends in 2 days (all day)  Conference
        Tomorrow 15:00-16:00  Architecture review
        ");
    }

    #[test]
    fn text_output_without_events() {
        let now = utc(2025, 2, 5, 8, 0);
        let formatter = EventFormatter::new(FormatOptions {
            no_events_text: "Nothing planned".to_string(),
            ..Default::default()
        });

        assert_eq!(formatter.format_text(&[], &now), "Nothing planned");
    }

    #[test]
    fn json_output_truncates_titles() {
        let now = utc(2025, 2, 5, 8, 0);
        let formatter = EventFormatter::new(FormatOptions {
            max_title_length: Some(10),
            ..Default::default()
        });

        let json = formatter.format_json(&sample_events(now));

        assert_eq!(json.len(), 3);
        assert_eq!(json[2].title, "Archite...");
        assert_eq!(json[0].start, "2025-02-05T09:00:00+00:00");
        assert_eq!(json[1].relative, RelativeDay::EndsIn(2));
        assert_eq!(json[1].label, "Ends in 2 days");
        assert!(json[1].full_day);
    }

    #[test]
    fn ellipsis_behaviour() {
        assert_eq!(ellipsis("short", 10), "short");
        assert_eq!(ellipsis("a long title here", 8), "a lon...");
        assert_eq!(ellipsis("anything", 0), "");
    }
}
