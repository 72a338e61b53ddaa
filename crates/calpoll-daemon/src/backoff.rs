//! Retry delays for failed fetches.
//!
//! | status        | delay                                                   |
//! |---------------|---------------------------------------------------------|
//! | 401 / 403     | max(5·N, 30 min)                                        |
//! | 429           | Retry-After if usable, else max(2·N, 15 min)            |
//! | 5xx           | N · 2^k, k = consecutive server errors (capped at 3)    |
//! | other 4xx     | max(2·N, 15 min)                                        |
//! | anything else | N                                                       |
//!
//! N is the nominal reload interval; every delay is floored at N.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Fifteen minutes.
pub const FIFTEEN_MINUTES: Duration = Duration::from_secs(15 * 60);

/// Thirty minutes.
pub const THIRTY_MINUTES: Duration = Duration::from_secs(30 * 60);

/// Cap on the consecutive server error counter.
pub const MAX_BACKOFF_STEPS: u32 = 3;

/// Computes the retry delay for a non-success status.
///
/// `server_errors` is the consecutive 5xx counter; it is incremented
/// (up to [`MAX_BACKOFF_STEPS`]) when `status` is a server error and left
/// untouched otherwise.
pub fn delay_for_status(
    status: u16,
    retry_after: Option<Duration>,
    nominal: Duration,
    server_errors: &mut u32,
) -> Duration {
    let delay = match status {
        401 | 403 => nominal.saturating_mul(5).max(THIRTY_MINUTES),
        429 => retry_after.unwrap_or_else(|| nominal.saturating_mul(2).max(FIFTEEN_MINUTES)),
        s if s >= 500 => {
            *server_errors = (*server_errors + 1).min(MAX_BACKOFF_STEPS);
            nominal.saturating_mul(1 << *server_errors)
        }
        s if s >= 400 => nominal.saturating_mul(2).max(FIFTEEN_MINUTES),
        _ => nominal,
    };
    floor_at_nominal(delay, nominal)
}

/// Raises `delay` to at least `nominal`.
pub fn floor_at_nominal(delay: Duration, nominal: Duration) -> Duration {
    delay.max(nominal)
}

/// Parses a `Retry-After` header value.
///
/// Accepts a non-negative number of seconds, or an HTTP date (RFC 2822 /
/// IMF-fixdate, then RFC 3339) from which the remaining time is computed,
/// floored at zero. Returns `None` for empty or unreadable values.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(seconds) = value.parse::<f64>() {
        if seconds.is_finite() && seconds >= 0.0 {
            return Duration::try_from_secs_f64(seconds).ok();
        }
        return None;
    }

    let at = DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()?
        .with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}
