//! Duration parsing and UTC to local wall-clock normalization.
//!
//! Source timestamps are UTC instants. They are converted into the destination
//! user's zone first and only then rounded to the nearest minute, so that the
//! rounding boundary is the local one (relevant for zones with sub-minute
//! historical offsets).

use std::sync::LazyLock;

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use regex::Regex;
use thiserror::Error;

/// Pre-compiled regex for `PT[n]H[n]M[n(.n)]S` durations.
static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?").unwrap()
});

/// Seconds at or above which a timestamp rounds up to the next minute.
const ROUND_UP_SECOND: u32 = 30;

/// Timezone resolution errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimezoneError {
    /// The name is not a known IANA zone.
    #[error("unknown timezone: {name}")]
    Unknown { name: String },
}

/// Resolves an IANA zone name, defaulting to UTC when none is configured.
pub fn resolve_timezone(name: Option<&str>) -> Result<Tz, TimezoneError> {
    match name.map(str::trim).filter(|name| !name.is_empty()) {
        None => Ok(Tz::UTC),
        Some(name) => name.parse::<Tz>().map_err(|_| TimezoneError::Unknown {
            name: name.to_string(),
        }),
    }
}

/// Parses an ISO 8601 time duration (`PT1H30M`, `PT45.5S`, ...) into decimal hours.
///
/// Missing components count as zero. Strings that do not start with `PT`
/// yield `0.0` rather than an error.
pub fn parse_duration_hours(duration: &str) -> f64 {
    let Some(caps) = DURATION_RE.captures(duration) else {
        return 0.0;
    };
    let component = |idx: usize| {
        caps.get(idx)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0)
    };
    component(1) + component(2) / 60.0 + component(3) / 3600.0
}

/// Rounds a wall-clock datetime to the nearest minute, half up at 30 seconds.
///
/// Carries into the hour and day: `23:59:30` becomes `00:00` of the next day.
pub fn round_to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    let seconds = dt.second();
    let truncated = dt
        - Duration::seconds(i64::from(seconds))
        - Duration::nanoseconds(i64::from(dt.nanosecond()));
    if seconds >= ROUND_UP_SECOND {
        truncated + Duration::minutes(1)
    } else {
        truncated
    }
}

/// Converts a UTC instant to rounded local wall-clock time in `tz`.
pub fn to_local(instant: DateTime<Utc>, tz: &Tz) -> NaiveDateTime {
    round_to_minute(instant.with_timezone(tz).naive_local())
}

/// A local working interval on a single calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalInterval {
    /// Calendar date of the (rounded) local start.
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl LocalInterval {
    /// Builds the local interval for a UTC start/end pair.
    ///
    /// The date comes from the start instant only; intervals crossing local
    /// midnight keep the end's wall-clock time without its date.
    pub fn from_utc(start: DateTime<Utc>, end: DateTime<Utc>, tz: &Tz) -> Self {
        let local_start = to_local(start, tz);
        let local_end = to_local(end, tz);
        Self {
            date: local_start.date(),
            start: local_start.time(),
            end: local_end.time(),
        }
    }
}

/// First instant of local `date` in `tz`, as UTC.
///
/// When midnight falls into a DST gap the day starts one hour later.
fn local_midnight(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => tz
            .from_local_datetime(&(midnight + Duration::hours(1)))
            .earliest()
            .map_or_else(|| midnight.and_utc(), |dt| dt.with_timezone(&Utc)),
    }
}

/// UTC bounds covering the local calendar days `[from, to]` in `tz`.
///
/// The end is the last whole second before the local midnight after `to`.
pub fn local_day_bounds(from: NaiveDate, to: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let after_to = to.succ_opt().unwrap_or(to);
    (
        local_midnight(from, tz),
        local_midnight(after_to, tz) - Duration::seconds(1),
    )
}

/// Formats a time as zero-padded `HH:MM`.
pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 25)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn assert_hours(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn duration_with_all_components() {
        assert_hours(parse_duration_hours("PT1H30M36S"), 1.51);
    }

    #[test]
    fn duration_with_partial_components() {
        assert_hours(parse_duration_hours("PT2H"), 2.0);
        assert_hours(parse_duration_hours("PT45M"), 0.75);
        assert_hours(parse_duration_hours("PT90S"), 0.025);
        assert_hours(parse_duration_hours("PT1.8S"), 0.0005);
    }

    #[test]
    fn malformed_duration_is_zero() {
        assert_hours(parse_duration_hours(""), 0.0);
        assert_hours(parse_duration_hours("1H"), 0.0);
        assert_hours(parse_duration_hours("P1D"), 0.0);
        assert_hours(parse_duration_hours("PT"), 0.0);
    }

    #[test]
    fn rounding_half_up_at_thirty_seconds() {
        assert_eq!(round_to_minute(naive(9, 30, 29)), naive(9, 30, 0));
        assert_eq!(round_to_minute(naive(9, 30, 30)), naive(9, 31, 0));
    }

    #[test]
    fn rounding_carries_into_hour() {
        assert_eq!(round_to_minute(naive(9, 59, 30)), naive(10, 0, 0));
    }

    #[test]
    fn rounding_carries_into_next_day() {
        let rounded = round_to_minute(naive(23, 59, 45));
        assert_eq!(
            rounded,
            NaiveDate::from_ymd_opt(2026, 2, 26)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn rounding_drops_subsecond_fraction() {
        let dt = naive(9, 30, 29) + Duration::milliseconds(999);
        assert_eq!(round_to_minute(dt), naive(9, 30, 0));
    }

    #[test]
    fn converts_to_winter_offset_before_rounding() {
        let tz = resolve_timezone(Some("Europe/Prague")).unwrap();
        let start = Utc.with_ymd_and_hms(2026, 2, 25, 8, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 2, 25, 12, 0, 0).unwrap();

        let interval = LocalInterval::from_utc(start, end, &tz);
        assert_eq!(format_hhmm(interval.start), "09:00");
        assert_eq!(format_hhmm(interval.end), "13:00");
        assert_eq!(interval.date, NaiveDate::from_ymd_opt(2026, 2, 25).unwrap());
    }

    #[test]
    fn local_date_follows_start_in_zone() {
        let tz = resolve_timezone(Some("America/New_York")).unwrap();
        let start = Utc.with_ymd_and_hms(2026, 2, 25, 2, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 2, 25, 3, 0, 0).unwrap();

        let interval = LocalInterval::from_utc(start, end, &tz);
        assert_eq!(interval.date, NaiveDate::from_ymd_opt(2026, 2, 24).unwrap());
        assert_eq!(format_hhmm(interval.start), "21:00");
    }

    #[test]
    fn day_bounds_in_utc_are_whole_days() {
        let day = NaiveDate::from_ymd_opt(2026, 2, 25).unwrap();
        let (start, end) = local_day_bounds(day, day, &Tz::UTC);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 2, 25, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 2, 25, 23, 59, 59).unwrap());
    }

    #[test]
    fn day_bounds_follow_local_midnight() {
        let tz = resolve_timezone(Some("Europe/Prague")).unwrap();
        let (start, end) = local_day_bounds(
            NaiveDate::from_ymd_opt(2026, 2, 25).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            &tz,
        );
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 2, 24, 23, 0, 0).unwrap());
        // Summer time from 2026-03-29.
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 31, 21, 59, 59).unwrap());
    }

    #[test]
    fn missing_timezone_defaults_to_utc() {
        assert_eq!(resolve_timezone(None).unwrap(), Tz::UTC);
        assert_eq!(resolve_timezone(Some("  ")).unwrap(), Tz::UTC);
    }

    #[test]
    fn unknown_timezone_is_an_error() {
        assert_eq!(
            resolve_timezone(Some("Mars/Olympus")),
            Err(TimezoneError::Unknown {
                name: "Mars/Olympus".to_string()
            })
        );
    }
}
