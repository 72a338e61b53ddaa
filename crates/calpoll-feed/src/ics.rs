//! iCalendar (RFC 5545) feed parsing.
//!
//! [`IcsParser`] reads VEVENT components into [`RawEntry`] values. TZID
//! times are resolved through `chrono-tz`; floating times are read as UTC.

use chrono::{Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};
use tracing::{debug, trace};

use crate::error::{FeedError, FeedResult};
use crate::parser::FeedParser;
use crate::raw_event::{RawEntry, RawEventTime};

/// Parses iCalendar documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct IcsParser;

impl FeedParser for IcsParser {
    fn parse(&self, payload: &str) -> FeedResult<Vec<RawEntry>> {
        parse_ics_content(payload)
    }
}

/// Parses ICS content into raw entries.
///
/// # Errors
///
/// Returns a parse error if the payload is not an iCalendar document.
pub fn parse_ics_content(ics: &str) -> FeedResult<Vec<RawEntry>> {
    let trimmed = ics.trim_start_matches('\u{feff}').trim_start();
    if !trimmed
        .get(..15)
        .is_some_and(|head| head.eq_ignore_ascii_case("BEGIN:VCALENDAR"))
    {
        return Err(FeedError::parse("payload is not an iCalendar document"));
    }

    let unfolded = unfold(trimmed);
    let calendar = read_calendar(&unfolded)
        .map_err(|e| FeedError::parse(format!("failed to read iCalendar document: {}", e)))?;

    let entries: Vec<RawEntry> = calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .map(parse_event)
        .collect();

    debug!(count = entries.len(), "parsed feed entries");
    Ok(entries)
}

fn parse_event(vevent: &Component<'_>) -> RawEntry {
    let uid = vevent
        .find_prop("UID")
        .map(|p| p.val.to_string())
        .unwrap_or_default();
    let mut entry = RawEntry::new(uid);

    if let Some(summary) = vevent.find_prop("SUMMARY") {
        entry.summary = Some(summary.val.to_string());
    }

    if let Some((start, tzid)) = vevent.find_prop("DTSTART").and_then(convert_property) {
        entry.start = Some(start);
        entry.timezone = tzid;
    }
    entry.end = vevent
        .find_prop("DTEND")
        .and_then(convert_property)
        .map(|(end, _)| end);
    entry.duration = vevent
        .find_prop("DURATION")
        .and_then(|p| parse_duration(p.val.as_ref()));

    entry.rrule = vevent.find_prop("RRULE").map(|p| p.val.to_string());
    entry.exdates = vevent
        .properties
        .iter()
        .filter(|p| p.name == "EXDATE")
        .flat_map(parse_exdate_property)
        .collect();
    entry.recurrence_id = vevent
        .find_prop("RECURRENCE-ID")
        .and_then(convert_property)
        .map(|(id, _)| id);

    entry.status = vevent
        .find_prop("STATUS")
        .map(|p| p.val.as_ref().trim().to_ascii_uppercase());

    if let Some(flag) = vevent.find_prop("X-MICROSOFT-CDO-ALLDAYEVENT") {
        entry.full_day = Some(flag.val.as_ref().eq_ignore_ascii_case("TRUE"));
    }

    trace!(
        uid = %entry.uid,
        summary = ?entry.summary,
        start = ?entry.start,
        recurring = entry.is_recurring(),
        "parsed VEVENT"
    );
    entry
}

/// Converts a date/time property, returning the IANA zone it was expressed in.
fn convert_property(prop: &Property<'_>) -> Option<(RawEventTime, Option<String>)> {
    let dpt = DatePerhapsTime::try_from(prop).ok()?;
    Some(match dpt {
        DatePerhapsTime::Date(date) => (RawEventTime::from_date(date), None),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => {
            (RawEventTime::from_datetime(dt), None)
        }
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => {
            (RawEventTime::from_datetime(Utc.from_utc_datetime(&naive)), None)
        }
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            resolve_zoned(date_time, &tzid)
        }
    })
}

/// Resolves a TZID-qualified local time to UTC.
///
/// Unknown zone names (Windows names, custom VTIMEZONEs) fall back to UTC.
fn resolve_zoned(date_time: NaiveDateTime, tzid: &str) -> (RawEventTime, Option<String>) {
    match tzid.parse::<chrono_tz::Tz>() {
        Ok(tz) => {
            let utc = tz
                .from_local_datetime(&date_time)
                .earliest()
                .map(|local| local.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&date_time));
            (RawEventTime::from_datetime(utc), Some(tzid.to_string()))
        }
        Err(_) => {
            debug!(tzid, "unknown TZID, reading time as UTC");
            (
                RawEventTime::from_datetime(Utc.from_utc_datetime(&date_time)),
                None,
            )
        }
    }
}

/// Parses an EXDATE property, which may carry several comma-separated values.
fn parse_exdate_property(prop: &Property<'_>) -> Vec<RawEventTime> {
    let tzid = prop
        .params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()));

    let is_date = prop
        .params
        .iter()
        .any(|p| p.key == "VALUE" && p.val.as_ref().map(|v| v.as_ref()) == Some("DATE"));

    prop.val
        .as_ref()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            if is_date || s.len() == 8 {
                return NaiveDate::parse_from_str(s, "%Y%m%d")
                    .ok()
                    .map(RawEventTime::from_date);
            }
            if let Some(utc) = s.strip_suffix('Z') {
                return NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| RawEventTime::from_datetime(dt.and_utc()));
            }
            let naive = NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S").ok()?;
            Some(match tzid {
                Some(ref tz) => resolve_zoned(naive, tz).0,
                None => RawEventTime::from_datetime(naive.and_utc()),
            })
        })
        .collect()
}

/// Parses an RFC 5545 DURATION value such as `PT1H30M`, `P1D` or `-PT15M`.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (negative, rest) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };

    let parsed = iso8601::duration(rest).ok()?;
    let std_duration: std::time::Duration = parsed.into();
    let duration = Duration::from_std(std_duration).ok()?;
    Some(if negative { -duration } else { duration })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedErrorCode;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> RawEventTime {
        RawEventTime::from_datetime(Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap())
    }

    fn date(y: i32, m: u32, d: u32) -> RawEventTime {
        RawEventTime::from_date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn parse_basic_event() {
        let ics = "BEGIN:VCALENDAR\r\n\
                   VERSION:2.0\r\n\
                   PRODID:-//Test//Test//EN\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:team-1@example.com\r\n\
                   DTSTART:20250205T100000Z\r\n\
                   DTEND:20250205T110000Z\r\n\
                   SUMMARY:Team Meeting\r\n\
                   STATUS:CONFIRMED\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR";

        let entries = IcsParser.parse(ics).unwrap();

        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.uid, "team-1@example.com");
        assert_eq!(entry.title(), "Team Meeting");
        assert_eq!(entry.start, Some(utc(2025, 2, 5, 10, 0)));
        assert_eq!(entry.end, Some(utc(2025, 2, 5, 11, 0)));
        assert_eq!(entry.status.as_deref(), Some("CONFIRMED"));
        assert!(!entry.is_all_day());
    }

    #[test]
    fn parse_all_day_event() {
        let ics = "BEGIN:VCALENDAR\r\n\
                   VERSION:2.0\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:holiday@example.com\r\n\
                   DTSTART;VALUE=DATE:20250210\r\n\
                   DTEND;VALUE=DATE:20250211\r\n\
                   SUMMARY:Company Holiday\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR";

        let entries = IcsParser.parse(ics).unwrap();

        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_all_day());
        assert_eq!(entries[0].start, Some(date(2025, 2, 10)));
        assert_eq!(entries[0].end, Some(date(2025, 2, 11)));
    }

    #[test]
    fn parse_recurrence_fields() {
        let ics = "BEGIN:VCALENDAR\r\n\
                   VERSION:2.0\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:weekly@example.com\r\n\
                   DTSTART;TZID=Europe/Paris:20250106T090000\r\n\
                   DURATION:PT30M\r\n\
                   RRULE:FREQ=WEEKLY;BYDAY=MO\r\n\
                   EXDATE;TZID=Europe/Paris:20250113T090000,20250120T090000\r\n\
                   EXDATE:20250127T080000Z\r\n\
                   SUMMARY:Weekly\r\n\
                   END:VEVENT\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:weekly@example.com\r\n\
                   RECURRENCE-ID;TZID=Europe/Paris:20250203T090000\r\n\
                   DTSTART;TZID=Europe/Paris:20250203T100000\r\n\
                   DTEND;TZID=Europe/Paris:20250203T103000\r\n\
                   SUMMARY:Weekly (moved)\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR";

        let entries = IcsParser.parse(ics).unwrap();
        assert_eq!(entries.len(), 2);

        let master = &entries[0];
        // Paris is UTC+1 in January
        assert_eq!(master.start, Some(utc(2025, 1, 6, 8, 0)));
        assert_eq!(master.timezone.as_deref(), Some("Europe/Paris"));
        assert_eq!(master.duration, Some(Duration::minutes(30)));
        assert_eq!(master.rrule.as_deref(), Some("FREQ=WEEKLY;BYDAY=MO"));
        assert_eq!(
            master.exdates,
            vec![
                utc(2025, 1, 13, 8, 0),
                utc(2025, 1, 20, 8, 0),
                utc(2025, 1, 27, 8, 0)
            ]
        );

        let moved = &entries[1];
        assert_eq!(moved.recurrence_id, Some(utc(2025, 2, 3, 8, 0)));
        assert_eq!(moved.start, Some(utc(2025, 2, 3, 9, 0)));
    }

    #[test]
    fn cancelled_and_microsoft_all_day_flags() {
        let ics = "BEGIN:VCALENDAR\r\n\
                   VERSION:2.0\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:cancelled@example.com\r\n\
                   DTSTART:20250205T100000Z\r\n\
                   STATUS:CANCELLED\r\n\
                   X-MICROSOFT-CDO-ALLDAYEVENT:TRUE\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR";

        let entries = IcsParser.parse(ics).unwrap();
        assert!(entries[0].is_cancelled());
        assert_eq!(entries[0].full_day, Some(true));
        assert_eq!(entries[0].end, None);
    }

    #[test]
    fn unreadable_components_are_kept_without_times() {
        let ics = "BEGIN:VCALENDAR\r\n\
                   VERSION:2.0\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:broken@example.com\r\n\
                   DTSTART:not-a-date\r\n\
                   SUMMARY:Broken\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR";

        let entries = IcsParser.parse(ics).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].start, None);
    }

    #[test]
    fn rejects_non_calendar_payloads() {
        let err = IcsParser.parse("<html><body>Service down</body></html>").unwrap_err();
        assert_eq!(err.code(), FeedErrorCode::Parse);

        let err = IcsParser.parse("").unwrap_err();
        assert_eq!(err.code(), FeedErrorCode::Parse);
    }

    #[test]
    fn empty_calendar_has_no_entries() {
        let entries = IcsParser
            .parse("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nEND:VCALENDAR\r\n")
            .unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("PT1H30M"), Some(Duration::minutes(90)));
        assert_eq!(parse_duration("P1D"), Some(Duration::days(1)));
        assert_eq!(parse_duration("-PT15M"), Some(Duration::minutes(-15)));
        assert_eq!(parse_duration("soon"), None);
    }
}
