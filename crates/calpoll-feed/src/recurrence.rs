//! RRULE expansion for recurring entries.
//!
//! Occurrence starts are generated with the `rrule` crate over a
//! [`TimeWindow`]. TZID masters expand in their own zone so wall-clock times
//! survive DST transitions. Excluded dates are matched afterwards on the
//! UTC instant (or the date, for full-day masters).
//!
//! The `rrule` parser wants UNTIL in the same form as DTSTART. DTSTART is
//! always emitted in UTC or with a TZID, so a date or floating UNTIL is
//! rewritten to UTC first: dates become the last second of that day,
//! floating times are read in the master's zone.

use calpoll_core::{EventTime, TimeWindow};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rrule::RRuleSet;

use crate::error::{FeedError, FeedResult};
use crate::raw_event::{RawEntry, RawEventTime};

/// Upper bound on occurrences generated for a single rule.
pub const MAX_OCCURRENCES_PER_RULE: u16 = 1000;

const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Builds the DTSTART/RRULE block understood by the `rrule` parser.
fn build_rrule_string(start: EventTime, timezone: Option<&str>, rule: &str) -> String {
    let zone = match start {
        EventTime::DateTime(_) => timezone.and_then(|tzid| tzid.parse::<chrono_tz::Tz>().ok()),
        EventTime::AllDay(_) => None,
    };

    let dtstart = match (start, zone) {
        // the rrule crate needs a datetime, so dates become midnight UTC
        (EventTime::AllDay(date), _) => format!("DTSTART:{}T000000Z", date.format("%Y%m%d")),
        (EventTime::DateTime(dt), Some(tz)) => format!(
            "DTSTART;TZID={}:{}",
            tz.name(),
            dt.with_timezone(&tz).format("%Y%m%dT%H%M%S")
        ),
        (EventTime::DateTime(dt), None) => format!("DTSTART:{}", dt.format(UTC_FORMAT)),
    };

    let rule = rule.trim();
    let rule = rule.strip_prefix("RRULE:").unwrap_or(rule);
    format!("{}\nRRULE:{}", dtstart, rewrite_until(rule, zone))
}

/// Rewrites a date or floating UNTIL part of `rule` to UTC.
fn rewrite_until(rule: &str, zone: Option<chrono_tz::Tz>) -> String {
    rule.split(';')
        .map(|part| match part.split_once('=') {
            Some((key, value)) if key.eq_ignore_ascii_case("UNTIL") => match until_as_utc(value, zone) {
                Some(until) => format!("{}={}", key, until),
                None => part.to_string(),
            },
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Returns `None` for values already in UTC or not parseable.
fn until_as_utc(value: &str, zone: Option<chrono_tz::Tz>) -> Option<String> {
    let value = value.trim();
    if value.ends_with(['Z', 'z']) {
        return None;
    }

    let naive = if value.len() == 8 {
        NaiveDate::parse_from_str(value, "%Y%m%d")
            .ok()?
            .and_hms_opt(23, 59, 59)?
    } else {
        NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?
    };

    let utc = match zone {
        Some(tz) => tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| naive.and_utc()),
        None => naive.and_utc(),
    };
    Some(utc.format(UTC_FORMAT).to_string())
}

/// Expands a recurring entry into occurrence starts within `window`.
///
/// Starts keep the variant of the master's DTSTART. Excluded dates are
/// removed. Returns an empty list for entries without a rule.
///
/// # Errors
///
/// Returns an entry error if the entry has no start or the rule cannot be
/// parsed.
pub fn expand_occurrences(entry: &RawEntry, window: TimeWindow) -> FeedResult<Vec<EventTime>> {
    let Some(rule) = entry.rrule.as_deref() else {
        return Ok(Vec::new());
    };
    let start: EventTime = entry
        .start
        .ok_or_else(|| FeedError::entry(format!("recurring entry '{}' has no start", entry.uid)))?
        .into();

    let rrule_str = build_rrule_string(start, entry.timezone.as_deref(), rule);
    let rrule_set: RRuleSet = rrule_str.parse().map_err(|e| {
        FeedError::entry(format!("failed to parse RRULE for entry '{}': {}", entry.uid, e))
    })?;

    // after/before are exclusive
    let tz: rrule::Tz = Utc.into();
    let after = (window.start - Duration::seconds(1)).with_timezone(&tz);
    let before = (window.end + Duration::seconds(1)).with_timezone(&tz);

    let result = rrule_set
        .after(after)
        .before(before)
        .all(MAX_OCCURRENCES_PER_RULE);

    let occurrences = result
        .dates
        .iter()
        .map(|dt| match start {
            EventTime::AllDay(_) => EventTime::AllDay(dt.date_naive()),
            EventTime::DateTime(_) => EventTime::DateTime(dt.with_timezone(&Utc)),
        })
        .filter(|occ| !is_excluded(occ, &entry.exdates))
        .collect();

    Ok(occurrences)
}

fn is_excluded(occurrence: &EventTime, exdates: &[RawEventTime]) -> bool {
    exdates.iter().any(|ex| match (occurrence, ex) {
        (EventTime::DateTime(occ), RawEventTime::DateTime(ex)) => occ == ex,
        (EventTime::AllDay(occ), RawEventTime::Date(ex)) => occ == ex,
        (EventTime::AllDay(occ), RawEventTime::DateTime(ex)) => *occ == ex.date_naive(),
        (EventTime::DateTime(occ), RawEventTime::Date(ex)) => occ.date_naive() == *ex,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn window(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeWindow {
        TimeWindow::new(start, end).unwrap()
    }

    #[test]
    fn weekly_rule_with_exdate() {
        let entry = RawEntry::new("weekly")
            .with_start(RawEventTime::from_datetime(utc(2025, 1, 6, 9, 0)))
            .with_rrule("FREQ=WEEKLY;COUNT=5")
            .with_exdate(RawEventTime::from_datetime(utc(2025, 1, 13, 9, 0)));

        let occurrences = expand_occurrences(
            &entry,
            window(utc(2025, 1, 1, 0, 0), utc(2025, 12, 31, 0, 0)),
        )
        .unwrap();

        assert_eq!(
            occurrences,
            vec![
                EventTime::from_utc(utc(2025, 1, 6, 9, 0)),
                EventTime::from_utc(utc(2025, 1, 20, 9, 0)),
                EventTime::from_utc(utc(2025, 1, 27, 9, 0)),
                EventTime::from_utc(utc(2025, 2, 3, 9, 0)),
            ]
        );
    }

    #[test]
    fn expansion_is_bounded_by_range() {
        let entry = RawEntry::new("daily")
            .with_start(RawEventTime::from_datetime(utc(2020, 1, 1, 12, 0)))
            .with_rrule("FREQ=DAILY");

        let occurrences = expand_occurrences(
            &entry,
            window(utc(2025, 2, 5, 0, 0), utc(2025, 2, 8, 0, 0)),
        )
        .unwrap();

        assert_eq!(occurrences.len(), 3);
        assert_eq!(occurrences[0], EventTime::from_utc(utc(2025, 2, 5, 12, 0)));
    }

    #[test]
    fn occurrence_cap() {
        let entry = RawEntry::new("hourly")
            .with_start(RawEventTime::from_datetime(utc(2025, 1, 1, 0, 0)))
            .with_rrule("FREQ=HOURLY");

        let occurrences = expand_occurrences(
            &entry,
            window(utc(2025, 1, 1, 0, 0), utc(2026, 1, 1, 0, 0)),
        )
        .unwrap();

        assert_eq!(occurrences.len(), MAX_OCCURRENCES_PER_RULE as usize);
    }

    #[test]
    fn all_day_rule_keeps_dates() {
        let entry = RawEntry::new("birthday")
            .with_start(RawEventTime::from_date(date(2020, 3, 14)))
            .with_rrule("FREQ=YEARLY")
            .with_exdate(RawEventTime::from_date(date(2026, 3, 14)));

        let occurrences = expand_occurrences(
            &entry,
            window(utc(2025, 1, 1, 0, 0), utc(2027, 12, 31, 0, 0)),
        )
        .unwrap();

        assert_eq!(
            occurrences,
            vec![
                EventTime::from_date(date(2025, 3, 14)),
                EventTime::from_date(date(2027, 3, 14)),
            ]
        );
    }

    #[test]
    fn zoned_rule_follows_wall_clock_across_dst() {
        // 09:00 in New York: UTC-5 in winter, UTC-4 after 9 March 2025
        let entry = RawEntry::new("standup")
            .with_start(RawEventTime::from_datetime(utc(2025, 3, 3, 14, 0)))
            .with_timezone("America/New_York")
            .with_rrule("FREQ=WEEKLY;COUNT=2");

        let occurrences = expand_occurrences(
            &entry,
            window(utc(2025, 3, 1, 0, 0), utc(2025, 3, 31, 0, 0)),
        )
        .unwrap();

        assert_eq!(
            occurrences,
            vec![
                EventTime::from_utc(utc(2025, 3, 3, 14, 0)),
                EventTime::from_utc(utc(2025, 3, 10, 13, 0)),
            ]
        );
    }

    #[test]
    fn invalid_rule_is_an_entry_error() {
        let entry = RawEntry::new("broken")
            .with_start(RawEventTime::from_datetime(utc(2025, 1, 6, 9, 0)))
            .with_rrule("FREQ=SOMETIMES");

        let err = expand_occurrences(
            &entry,
            window(utc(2025, 1, 1, 0, 0), utc(2025, 2, 1, 0, 0)),
        )
        .unwrap_err();
        assert_eq!(err.code(), crate::error::FeedErrorCode::Entry);
        assert!(err.message().contains("broken"));
    }

    #[test]
    fn non_recurring_entry_expands_to_nothing() {
        let entry =
            RawEntry::new("single").with_start(RawEventTime::from_datetime(utc(2025, 1, 6, 9, 0)));
        let occurrences = expand_occurrences(
            &entry,
            window(utc(2025, 1, 1, 0, 0), utc(2025, 2, 1, 0, 0)),
        )
        .unwrap();
        assert!(occurrences.is_empty());
    }

    #[test]
    fn all_day_rule_with_date_until() {
        let entry = RawEntry::new("term")
            .with_start(RawEventTime::from_date(date(2025, 2, 1)))
            .with_rrule("FREQ=WEEKLY;UNTIL=20250301");

        let occurrences = expand_occurrences(
            &entry,
            window(utc(2025, 1, 1, 0, 0), utc(2025, 12, 31, 0, 0)),
        )
        .unwrap();

        assert_eq!(occurrences.len(), 5);
        assert_eq!(occurrences[0], EventTime::from_date(date(2025, 2, 1)));
        assert_eq!(occurrences[4], EventTime::from_date(date(2025, 3, 1)));
    }

    #[test]
    fn floating_until_on_utc_start() {
        let entry = RawEntry::new("sprint")
            .with_start(RawEventTime::from_datetime(utc(2025, 2, 3, 9, 0)))
            .with_rrule("FREQ=DAILY;UNTIL=20250207T090000");

        let occurrences = expand_occurrences(
            &entry,
            window(utc(2025, 1, 1, 0, 0), utc(2025, 12, 31, 0, 0)),
        )
        .unwrap();

        assert_eq!(occurrences.len(), 5);
        assert_eq!(occurrences[4], EventTime::from_utc(utc(2025, 2, 7, 9, 0)));
    }

    #[test]
    fn floating_until_is_read_in_master_zone() {
        // 09:00 Paris is 08:00 UTC in February
        let entry = RawEntry::new("paris")
            .with_start(RawEventTime::from_datetime(utc(2025, 2, 3, 8, 0)))
            .with_timezone("Europe/Paris")
            .with_rrule("FREQ=DAILY;UNTIL=20250205T090000");

        let occurrences = expand_occurrences(
            &entry,
            window(utc(2025, 1, 1, 0, 0), utc(2025, 12, 31, 0, 0)),
        )
        .unwrap();

        assert_eq!(
            occurrences,
            vec![
                EventTime::from_utc(utc(2025, 2, 3, 8, 0)),
                EventTime::from_utc(utc(2025, 2, 4, 8, 0)),
                EventTime::from_utc(utc(2025, 2, 5, 8, 0)),
            ]
        );
    }

    #[test]
    fn until_rewrite_keeps_other_parts() {
        assert_eq!(
            rewrite_until("FREQ=WEEKLY;UNTIL=20250301;BYDAY=SA", None),
            "FREQ=WEEKLY;UNTIL=20250301T235959Z;BYDAY=SA"
        );
        assert_eq!(
            rewrite_until("FREQ=DAILY;UNTIL=20250301T100000Z", None),
            "FREQ=DAILY;UNTIL=20250301T100000Z"
        );
        assert_eq!(rewrite_until("FREQ=DAILY;COUNT=3", None), "FREQ=DAILY;COUNT=3");
    }
}
