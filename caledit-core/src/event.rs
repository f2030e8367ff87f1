//! The calendar event being edited.
//!
//! `Event` mirrors what an .ics file holds, plus the bookkeeping a collection
//! needs (which calendar it lives in and the etag of the stored copy). The
//! edit session reads it once when it opens and writes back through the
//! `update_*` methods on save.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::datetime::{Endpoint, localize, parse_timezone};
use crate::error::{CalEditError, CalEditResult};
use crate::ics::generate_ics;
use crate::recurrence::RecurrenceRule;

/// A calendar event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub uid: String,
    pub summary: String,
    pub description: String,
    pub location: String,
    /// Comma-separated, as typed by the user
    pub categories: String,
    pub start: EventTime,
    /// Exclusive for all-day events (ICS DTEND semantics)
    pub end: EventTime,
    pub status: EventStatus,
    pub rrule: Option<RecurrenceRule>,
    pub exdates: Vec<EventTime>,
    /// Reminders the editor can show and change
    pub reminders: Vec<Reminder>,
    /// VALARMs as read. On write, the ones `reminders` no longer lists are
    /// dropped and the rest are kept verbatim.
    pub alarms: Vec<RawComponent>,
    /// Revision sequence number (SEQUENCE)
    pub sequence: i64,
    /// Properties this crate does not model, kept verbatim for round-tripping
    pub extra_properties: Vec<RawProperty>,
    /// Other components of the file: VTIMEZONE definitions and
    /// RECURRENCE-ID overrides of single occurrences
    pub other_components: Vec<RawComponent>,

    /// Name of the calendar holding this event
    pub calendar: String,
    /// Persistence tag; `None` until the event has been stored
    pub etag: Option<String>,
}

/// An ICS property carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProperty {
    pub name: String,
    pub params: Vec<(String, String)>,
    pub value: String,
}

/// An ICS component carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawComponent {
    pub name: String,
    pub properties: Vec<RawProperty>,
    pub components: Vec<RawComponent>,
}

impl RawComponent {
    pub fn find_property(&self, name: &str) -> Option<&RawProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// A VEVENT replacing one occurrence of a repeating event.
    pub fn is_override(&self) -> bool {
        self.name == "VEVENT" && self.find_property("RECURRENCE-ID").is_some()
    }
}

impl RawProperty {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// A reminder/alarm for an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reminder {
    /// Minutes before the event to trigger
    pub minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTime {
    Date(NaiveDate),
    DateTimeUtc(DateTime<Utc>),
    DateTimeFloating(NaiveDateTime),
    DateTimeZoned { datetime: NaiveDateTime, tzid: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

impl EventTime {
    pub fn is_date(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }

    /// Resolve into an editor endpoint.
    ///
    /// UTC values are shown in `default_tz`; floating values and zones
    /// chrono-tz does not know are localized in `default_tz`.
    pub fn to_endpoint(&self, default_tz: Tz) -> Endpoint {
        match self {
            EventTime::Date(d) => Endpoint::Date(*d),
            EventTime::DateTimeUtc(dt) => Endpoint::DateTime(dt.with_timezone(&default_tz)),
            EventTime::DateTimeFloating(dt) => Endpoint::DateTime(localize(default_tz, *dt)),
            EventTime::DateTimeZoned { datetime, tzid } => {
                let tz = parse_timezone(tzid).unwrap_or_else(|| {
                    tracing::warn!(tzid = %tzid, fallback = %default_tz.name(), "Unknown timezone");
                    default_tz
                });
                Endpoint::DateTime(localize(tz, *datetime))
            }
        }
    }

    /// Storage form of an editor endpoint. UTC stays UTC, other zones keep their TZID.
    pub fn from_endpoint(endpoint: &Endpoint) -> Self {
        match endpoint {
            Endpoint::Date(d) => EventTime::Date(*d),
            Endpoint::DateTime(dt) if dt.timezone() == Tz::UTC => {
                EventTime::DateTimeUtc(dt.with_timezone(&Utc))
            }
            Endpoint::DateTime(dt) => EventTime::DateTimeZoned {
                datetime: dt.naive_local(),
                tzid: dt.timezone().name().to_string(),
            },
        }
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            EventTime::DateTimeUtc(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M UTC")),
            EventTime::DateTimeFloating(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M")),
            EventTime::DateTimeZoned { datetime, tzid } => {
                write!(f, "{} ({})", datetime.format("%Y-%m-%d %H:%M"), tzid)
            }
        }
    }
}

impl Event {
    /// A fresh, never-stored event in `calendar`.
    pub fn new(summary: &str, start: EventTime, end: EventTime, calendar: &str) -> Self {
        Event {
            uid: format!("{}@caledit", uuid::Uuid::new_v4()),
            summary: summary.to_string(),
            description: String::new(),
            location: String::new(),
            categories: String::new(),
            start,
            end,
            status: EventStatus::Confirmed,
            rrule: None,
            exdates: Vec::new(),
            reminders: Vec::new(),
            alarms: Vec::new(),
            sequence: 0,
            extra_properties: Vec::new(),
            other_components: Vec::new(),
            calendar: calendar.to_string(),
            etag: None,
        }
    }

    pub fn is_allday(&self) -> bool {
        self.start.is_date()
    }

    pub fn is_recurring(&self) -> bool {
        self.rrule.is_some()
    }

    pub fn start_local(&self, default_tz: Tz) -> Endpoint {
        self.start.to_endpoint(default_tz)
    }

    /// End as the editor shows it: the last day for all-day events.
    pub fn end_local(&self, default_tz: Tz) -> Endpoint {
        match (&self.start, &self.end) {
            (EventTime::Date(start), EventTime::Date(end)) => {
                let last = *end - Duration::days(1);
                Endpoint::Date(last.max(*start))
            }
            (_, end) => end.to_endpoint(default_tz),
        }
    }

    pub fn update_summary(&mut self, summary: &str) {
        self.summary = summary.to_string();
    }

    pub fn update_description(&mut self, description: &str) {
        self.description = description.to_string();
    }

    pub fn update_location(&mut self, location: &str) {
        self.location = location.to_string();
    }

    pub fn update_categories(&mut self, categories: &str) {
        self.categories = categories.to_string();
    }

    /// Write an editor range back. An all-day `end` is the inclusive last day.
    pub fn update_start_end(&mut self, start: &Endpoint, end: &Endpoint) {
        self.start = EventTime::from_endpoint(start);
        self.end = match end {
            Endpoint::Date(d) => EventTime::Date(*d + Duration::days(1)),
            timed => EventTime::from_endpoint(timed),
        };
    }

    /// Set the repetition rule. Without one, overridden occurrences go too.
    pub fn update_rrule(&mut self, rrule: Option<RecurrenceRule>) {
        if rrule.is_none() {
            self.other_components.retain(|c| !c.is_override());
        }
        self.rrule = rrule;
    }

    pub fn update_alarms(&mut self, reminders: Vec<Reminder>) {
        self.reminders = reminders;
    }

    pub fn increment_sequence(&mut self) {
        self.sequence += 1;
    }

    /// Write this event as a standalone .ics file.
    pub fn export_to_file(&self, path: &Path) -> CalEditResult<()> {
        let ics = generate_ics(self).map_err(|e| CalEditError::Export(e.to_string()))?;
        std::fs::write(path, ics)
            .map_err(|e| CalEditError::Export(format!("{}: {}", path.display(), e)))?;
        tracing::info!(uid = %self.uid, path = %path.display(), "Exported event");
        Ok(())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn allday_end_is_inclusive_in_editor() {
        let event = Event::new(
            "Holiday",
            EventTime::Date(date(2024, 6, 1)),
            EventTime::Date(date(2024, 6, 2)),
            "personal",
        );
        assert_eq!(event.end_local(Tz::UTC), Endpoint::Date(date(2024, 6, 1)));
    }

    #[test]
    fn malformed_allday_end_clamps_to_start() {
        let event = Event::new(
            "Holiday",
            EventTime::Date(date(2024, 6, 1)),
            EventTime::Date(date(2024, 6, 1)),
            "personal",
        );
        assert_eq!(event.end_local(Tz::UTC), Endpoint::Date(date(2024, 6, 1)));
    }

    #[test]
    fn update_start_end_makes_allday_end_exclusive() {
        let mut event = Event::new(
            "Trip",
            EventTime::Date(date(2024, 6, 1)),
            EventTime::Date(date(2024, 6, 2)),
            "personal",
        );
        event.update_start_end(
            &Endpoint::Date(date(2024, 6, 3)),
            &Endpoint::Date(date(2024, 6, 5)),
        );
        assert_eq!(event.start, EventTime::Date(date(2024, 6, 3)));
        assert_eq!(event.end, EventTime::Date(date(2024, 6, 6)));
    }

    #[test]
    fn zoned_endpoint_keeps_tzid() {
        let berlin = chrono_tz::Europe::Berlin;
        let start = berlin.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let time = EventTime::from_endpoint(&Endpoint::DateTime(start));
        match &time {
            EventTime::DateTimeZoned { datetime, tzid } => {
                assert_eq!(tzid, "Europe/Berlin");
                assert_eq!(datetime.hour(), 9);
            }
            other => panic!("Expected DateTimeZoned, got {:?}", other),
        }
        assert_eq!(time.to_endpoint(Tz::UTC), Endpoint::DateTime(start));
    }

    #[test]
    fn utc_endpoint_stays_utc() {
        let start = Tz::UTC.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let time = EventTime::from_endpoint(&Endpoint::DateTime(start));
        assert!(matches!(time, EventTime::DateTimeUtc(_)));
    }

    #[test]
    fn floating_time_is_localized_in_default_zone() {
        let floating = EventTime::DateTimeFloating(date(2024, 6, 1).and_hms_opt(9, 0, 0).unwrap());
        let endpoint = floating.to_endpoint(chrono_tz::America::New_York);
        assert_eq!(endpoint.timezone(), Some(chrono_tz::America::New_York));
        assert_eq!(endpoint.time().map(|t| t.hour()), Some(9));
    }

    #[test]
    fn unknown_tzid_falls_back_to_default_zone() {
        let zoned = EventTime::DateTimeZoned {
            datetime: date(2024, 6, 1).and_hms_opt(9, 0, 0).unwrap(),
            tzid: "Custom/Zone".to_string(),
        };
        let endpoint = zoned.to_endpoint(chrono_tz::Europe::Paris);
        assert_eq!(endpoint.timezone(), Some(chrono_tz::Europe::Paris));
    }

    #[test]
    fn removing_rrule_drops_overrides_but_keeps_timezones() {
        let mut event = Event::new(
            "Gym",
            EventTime::Date(date(2024, 6, 3)),
            EventTime::Date(date(2024, 6, 4)),
            "personal",
        );
        event.rrule = Some(RecurrenceRule::new(crate::recurrence::Frequency::Weekly));
        let property = |name: &str, value: &str| RawProperty {
            name: name.to_string(),
            params: vec![],
            value: value.to_string(),
        };
        event.other_components = vec![
            RawComponent {
                name: "VTIMEZONE".to_string(),
                properties: vec![property("TZID", "Europe/Berlin")],
                components: vec![],
            },
            RawComponent {
                name: "VEVENT".to_string(),
                properties: vec![property("RECURRENCE-ID", "20240610")],
                components: vec![],
            },
        ];

        event.update_rrule(None);

        assert!(event.rrule.is_none());
        assert_eq!(event.other_components.len(), 1);
        assert_eq!(event.other_components[0].name, "VTIMEZONE");
    }

    #[test]
    fn export_writes_ics_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lunch.ics");
        let event = Event::new(
            "Lunch",
            EventTime::Date(date(2024, 6, 1)),
            EventTime::Date(date(2024, 6, 2)),
            "personal",
        );

        event.export_to_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("SUMMARY:Lunch"), "ICS:\n{}", content);
    }

    #[test]
    fn export_to_missing_directory_is_export_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("lunch.ics");
        let event = Event::new(
            "Lunch",
            EventTime::Date(date(2024, 6, 1)),
            EventTime::Date(date(2024, 6, 2)),
            "personal",
        );

        let err = event.export_to_file(&path).unwrap_err();
        assert!(matches!(err, CalEditError::Export(_)));
    }
}
