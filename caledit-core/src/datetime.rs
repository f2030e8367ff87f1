//! Date and date-time values as the editor sees them.

use std::fmt;

use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone};
use chrono_tz::Tz;

/// One end of an event's range: a pure date (all-day) or a zoned date-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Date(NaiveDate),
    DateTime(DateTime<Tz>),
}

impl Endpoint {
    pub fn is_date(&self) -> bool {
        matches!(self, Endpoint::Date(_))
    }

    /// The calendar date, local to the endpoint's own timezone.
    pub fn date(&self) -> NaiveDate {
        match self {
            Endpoint::Date(d) => *d,
            Endpoint::DateTime(dt) => dt.date_naive(),
        }
    }

    pub fn time(&self) -> Option<NaiveTime> {
        match self {
            Endpoint::Date(_) => None,
            Endpoint::DateTime(dt) => Some(dt.time()),
        }
    }

    pub fn timezone(&self) -> Option<Tz> {
        match self {
            Endpoint::Date(_) => None,
            Endpoint::DateTime(dt) => Some(dt.timezone()),
        }
    }

    /// Format with the configured date format, appending the time for timed values.
    pub fn format(&self, date_format: &str, time_format: &str) -> String {
        match self {
            Endpoint::Date(d) => d.format(date_format).to_string(),
            Endpoint::DateTime(dt) => {
                format!("{} {}", dt.format(date_format), dt.format(time_format))
            }
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Endpoint::DateTime(dt) => {
                write!(f, "{} ({})", dt.format("%Y-%m-%d %H:%M"), dt.timezone().name())
            }
        }
    }
}

/// Attach `tz` to a wall-clock time.
///
/// Ambiguous times (DST fold) resolve to the earlier instant. Times inside a
/// DST gap are read with the offset in force before the gap, which moves them
/// forward by the gap length.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let before_gap = tz.offset_from_utc_datetime(&(naive - Duration::days(1)));
            let offset_secs = i64::from(before_gap.fix().local_minus_utc());
            tz.from_utc_datetime(&(naive - Duration::seconds(offset_secs)))
        }
    }
}

/// Resolve an IANA timezone name.
pub fn parse_timezone(name: &str) -> Option<Tz> {
    name.parse::<Tz>().ok()
}
