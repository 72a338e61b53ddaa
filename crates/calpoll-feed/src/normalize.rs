//! RawEntry to NormalizedEvent pipeline.
//!
//! The normalization pass:
//! 1. Expands recurring entries (RRULE + EXDATE) up to the lookahead horizon,
//!    back to the series start when past events are kept, letting
//!    RECURRENCE-ID overrides replace the occurrence they override
//! 2. Drops cancelled entries and excluded titles
//! 3. Applies the time window: in-progress events are always kept, events
//!    starting after the horizon are dropped, ended events are dropped
//!    unless past events are requested
//! 4. Deduplicates, sorts by (start, end, title) and truncates
//! 5. Builds [`NormalizedEvent`]s with calendar-day offsets relative to now
//!
//! Malformed entries are skipped with a debug log; normalization never fails.

use std::cmp::Ordering;
use std::collections::HashSet;

use calpoll_core::{EventTime, NormalizedEvent, TimeWindow};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::{debug, trace};

use crate::config::FeedConfig;
use crate::error::{FeedError, FeedResult};
use crate::raw_event::{RawEntry, RawEventTime};
use crate::recurrence::expand_occurrences;

/// Bounds applied by [`normalize_entries`].
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Titles dropped from the result (exact, case-sensitive).
    pub excluded_titles: HashSet<String>,
    /// Maximum number of events returned.
    pub max_entries: usize,
    /// How many days ahead an event may start.
    pub max_lookahead_days: u32,
    /// Keep events that already ended.
    pub include_past: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            excluded_titles: HashSet::new(),
            max_entries: FeedConfig::DEFAULT_MAX_ENTRIES,
            max_lookahead_days: FeedConfig::DEFAULT_MAX_LOOKAHEAD_DAYS,
            include_past: false,
        }
    }
}

impl From<&FeedConfig> for NormalizeOptions {
    fn from(config: &FeedConfig) -> Self {
        Self {
            excluded_titles: config.excluded_titles.clone(),
            max_entries: config.max_entries,
            max_lookahead_days: config.max_lookahead_days,
            include_past: config.include_past,
        }
    }
}

/// One occurrence before window filtering.
#[derive(Debug, Clone)]
struct Candidate<'a> {
    uid: &'a str,
    title: &'a str,
    start: EventTime,
    end: EventTime,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    full_day: bool,
    recurring: bool,
}

/// Start, end and full-day flag of an entry after end resolution.
#[derive(Debug, Clone, Copy)]
struct ResolvedTimes {
    start: EventTime,
    end: EventTime,
    full_day: bool,
}

impl ResolvedTimes {
    /// Shifts these times so they start at `occurrence`.
    fn at(&self, occurrence: EventTime) -> Self {
        let end = match (self.start, self.end, occurrence) {
            (EventTime::AllDay(start), EventTime::AllDay(end), EventTime::AllDay(occ)) => {
                EventTime::AllDay(occ + (end - start))
            }
            _ => EventTime::DateTime(
                occurrence.to_utc_datetime() + (self.end.to_utc_datetime() - self.start.to_utc_datetime()),
            ),
        };
        Self {
            start: occurrence,
            end,
            full_day: self.full_day,
        }
    }
}

/// Normalizes raw entries into a bounded, sorted event list.
///
/// Day offsets and full-day instants are computed in `now`'s timezone.
pub fn normalize_entries<Tz: TimeZone>(
    entries: &[RawEntry],
    options: &NormalizeOptions,
    now: &DateTime<Tz>,
) -> Vec<NormalizedEvent> {
    let tz = now.timezone();
    let now_utc = now.with_timezone(&Utc);
    let horizon = now_utc + Duration::days(i64::from(options.max_lookahead_days));

    let overridden: HashSet<(&str, EventTime)> = entries
        .iter()
        .filter_map(|e| e.recurrence_id.map(|id| (e.uid.as_str(), EventTime::from(id))))
        .collect();

    let mut candidates = Vec::new();
    for entry in entries {
        if entry.is_cancelled() {
            trace!(uid = %entry.uid, "dropping cancelled entry");
            continue;
        }

        let times = match resolve_times(entry, &tz) {
            Ok(times) => times,
            Err(e) => {
                debug!(uid = %entry.uid, error = %e, "skipping malformed entry");
                continue;
            }
        };

        if entry.is_recurring() && entry.recurrence_id.is_none() {
            let windows = expansion_windows(&times, now_utc, horizon, options.include_past);
            let occurrences = match windows
                .into_iter()
                .map(|window| expand_occurrences(entry, window))
                .collect::<FeedResult<Vec<_>>>()
            {
                Ok(occurrences) => occurrences.into_iter().flatten(),
                Err(e) => {
                    debug!(uid = %entry.uid, error = %e, "skipping malformed entry");
                    continue;
                }
            };

            for occurrence in occurrences {
                if overridden.contains(&(entry.uid.as_str(), occurrence)) {
                    continue;
                }
                candidates.push(candidate(entry, times.at(occurrence), true, &tz));
            }
        } else {
            let recurring = entry.recurrence_id.is_some();
            candidates.push(candidate(entry, times, recurring, &tz));
        }
    }

    let mut seen = HashSet::new();
    let mut kept: Vec<Candidate<'_>> = candidates
        .into_iter()
        .filter(|c| !options.excluded_titles.contains(c.title))
        .filter(|c| in_window(c, now_utc, horizon, options.include_past))
        .filter(|c| seen.insert((c.uid, c.starts_at, c.title)))
        .collect();

    kept.sort_by(compare_candidates);
    kept.truncate(options.max_entries);

    debug!(
        entries = entries.len(),
        events = kept.len(),
        "normalized feed entries"
    );

    kept.into_iter()
        .map(|c| {
            NormalizedEvent::new(c.uid, c.title, c.start, c.end, c.full_day, now)
                .with_recurring(c.recurring)
        })
        .collect()
}

fn candidate<'a, Tz: TimeZone>(
    entry: &'a RawEntry,
    times: ResolvedTimes,
    recurring: bool,
    tz: &Tz,
) -> Candidate<'a> {
    Candidate {
        uid: &entry.uid,
        title: entry.title(),
        start: times.start,
        end: times.end,
        starts_at: times.start.to_instant_in(tz),
        ends_at: times.end.to_instant_in(tz),
        full_day: times.full_day,
        recurring,
    }
}

/// Resolves start, end and full-day flag of an entry.
///
/// The end is the explicit end, else start + duration, else one day after
/// the start for full-day entries and the start itself for timed ones.
fn resolve_times<Tz: TimeZone>(entry: &RawEntry, tz: &Tz) -> FeedResult<ResolvedTimes> {
    let start = entry
        .start
        .ok_or_else(|| FeedError::entry("entry has no start"))?;
    let full_day = entry.is_all_day();

    let start: EventTime = match (start, full_day) {
        // flagged full-day but published with a time of day
        (RawEventTime::DateTime(_), true) => EventTime::AllDay(EventTime::from(start).date_in(tz)),
        _ => start.into(),
    };

    let end = match (entry.end, entry.duration) {
        (Some(end), _) => match (EventTime::from(end), full_day) {
            (EventTime::DateTime(dt), true) => {
                EventTime::AllDay(EventTime::DateTime(dt).date_in(tz))
            }
            (end, _) => end,
        },
        (None, Some(duration)) => start.shifted(duration),
        (None, None) if full_day => start.shifted(Duration::days(1)),
        (None, None) => start,
    };

    // a full-day end on the start date still covers that day
    let end = match (start, end) {
        (EventTime::AllDay(s), EventTime::AllDay(e)) if e == s && full_day => {
            EventTime::AllDay(s + Duration::days(1))
        }
        _ => end,
    };

    if end.to_instant_in(tz) < start.to_instant_in(tz) {
        return Err(FeedError::entry("entry ends before it starts"));
    }

    Ok(ResolvedTimes {
        start,
        end,
        full_day,
    })
}

fn span(times: &ResolvedTimes) -> Duration {
    times.end.to_utc_datetime() - times.start.to_utc_datetime()
}

/// Windows a recurring master is expanded over.
///
/// The current window reaches back far enough to catch an occurrence still
/// running at `now`. With past events, everything from the series start up
/// to the current window is expanded as a second window; the occurrence cap
/// applies to each window separately.
fn expansion_windows(
    times: &ResolvedTimes,
    now: DateTime<Utc>,
    horizon: DateTime<Utc>,
    include_past: bool,
) -> Vec<TimeWindow> {
    let current_from = now - span(times) - Duration::days(1);
    let mut windows: Vec<TimeWindow> = TimeWindow::new(current_from, horizon).into_iter().collect();
    if include_past {
        windows.extend(TimeWindow::new(times.start.to_utc_datetime(), current_from));
    }
    windows
}

fn in_window(
    candidate: &Candidate<'_>,
    now: DateTime<Utc>,
    horizon: DateTime<Utc>,
    include_past: bool,
) -> bool {
    let in_progress = candidate.starts_at <= now && now < candidate.ends_at;
    if in_progress {
        return true;
    }
    if candidate.starts_at > horizon {
        return false;
    }
    include_past || candidate.ends_at > now
}

fn compare_candidates(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    a.starts_at
        .cmp(&b.starts_at)
        .then_with(|| a.ends_at.cmp(&b.ends_at))
        .then_with(|| a.title.cmp(b.title))
}
