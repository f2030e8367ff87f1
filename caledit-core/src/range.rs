//! Edit model for an event's start/end range.
//!
//! Start and end are edited as separate date and time fields. Each edit
//! replaces one component and keeps the other, along with the endpoint's
//! timezone. Both endpoints share the all-day flag.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime};
use chrono_tz::Tz;

use crate::config::LocaleConfig;
use crate::datetime::{Endpoint, localize};
use crate::error::{CalEditError, CalEditResult};
use crate::fields::EditorPart;

type DateHook = Box<dyn FnMut(NaiveDate)>;

pub struct DateTimeRangeModel {
    start: Endpoint,
    end: Endpoint,
    allday: bool,

    original_start: Endpoint,
    original_end: Endpoint,
    original_allday: bool,

    // Timed values from just before the last switch to all-day. Dropped by
    // any edit so a later switch back falls through to midnight.
    timed_memo: Option<(DateTime<Tz>, DateTime<Tz>)>,
    // Zone each endpoint had when it was last timed
    start_tz: Tz,
    end_tz: Tz,

    date_format: String,
    time_format: String,
    on_date_change: Option<DateHook>,
}

impl fmt::Debug for DateTimeRangeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DateTimeRangeModel")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("allday", &self.allday)
            .field("original_start", &self.original_start)
            .field("original_end", &self.original_end)
            .finish_non_exhaustive()
    }
}

impl DateTimeRangeModel {
    /// Build from the event's endpoints. The start decides whether the range
    /// is all-day; an end of the other kind is converted to match.
    pub fn new(start: Endpoint, end: Endpoint, locale: &LocaleConfig) -> Self {
        let allday = start.is_date();
        let start_tz = start.timezone().unwrap_or(locale.default_timezone);
        let end_tz = end.timezone().unwrap_or(start_tz);

        let end = match (allday, end) {
            (true, Endpoint::DateTime(dt)) => Endpoint::Date(dt.date_naive()),
            (false, Endpoint::Date(d)) => Endpoint::DateTime(at_midnight(end_tz, d)),
            (_, end) => end,
        };

        DateTimeRangeModel {
            start,
            end,
            allday,
            original_start: start,
            original_end: end,
            original_allday: allday,
            timed_memo: None,
            start_tz,
            end_tz,
            date_format: locale.date_format.clone(),
            time_format: locale.time_format.clone(),
            on_date_change: None,
        }
    }

    /// Called with the new date after every successful date edit.
    pub fn set_on_date_change(&mut self, hook: impl FnMut(NaiveDate) + 'static) {
        self.on_date_change = Some(Box::new(hook));
    }

    pub fn start(&self) -> Endpoint {
        self.start
    }

    pub fn end(&self) -> Endpoint {
        self.end
    }

    pub fn allday(&self) -> bool {
        self.allday
    }

    pub fn original_start(&self) -> Endpoint {
        self.original_start
    }

    pub fn original_end(&self) -> Endpoint {
        self.original_end
    }

    pub fn start_date_text(&self) -> String {
        self.start.date().format(&self.date_format).to_string()
    }

    pub fn end_date_text(&self) -> String {
        self.end.date().format(&self.date_format).to_string()
    }

    pub fn start_time_text(&self) -> Option<String> {
        self.start
            .time()
            .map(|t| t.format(&self.time_format).to_string())
    }

    pub fn end_time_text(&self) -> Option<String> {
        self.end.time().map(|t| t.format(&self.time_format).to_string())
    }

    pub fn toggle_allday(&mut self, allday: bool) {
        if allday == self.allday {
            return;
        }

        if allday {
            if let (Endpoint::DateTime(s), Endpoint::DateTime(e)) = (self.start, self.end) {
                self.start_tz = s.timezone();
                self.end_tz = e.timezone();
                self.timed_memo = Some((s, e));
            }
            self.start = Endpoint::Date(self.start.date());
            self.end = Endpoint::Date(self.end.date());
        } else {
            let (start, end) = match self.timed_memo.take() {
                Some(memo) => memo,
                None => (
                    at_midnight(self.start_tz, self.start.date()),
                    at_midnight(self.end_tz, self.end.date()),
                ),
            };
            self.start = Endpoint::DateTime(start);
            self.end = Endpoint::DateTime(end);
        }

        self.allday = allday;
        tracing::debug!(allday, start = %self.start, end = %self.end, "Toggled all-day");
    }

    pub fn set_start_date(&mut self, text: &str) -> CalEditResult<NaiveDate> {
        let date = self.parse_date(text)?;
        self.start = with_date(self.start, date);
        self.date_edited(date);
        Ok(date)
    }

    pub fn set_end_date(&mut self, text: &str) -> CalEditResult<NaiveDate> {
        let date = self.parse_date(text)?;
        self.end = with_date(self.end, date);
        self.date_edited(date);
        Ok(date)
    }

    pub fn set_start_time(&mut self, text: &str) -> CalEditResult<NaiveTime> {
        let time = self.parse_time(text)?;
        if let Endpoint::DateTime(dt) = self.start {
            self.start = Endpoint::DateTime(localize(dt.timezone(), dt.date_naive().and_time(time)));
        }
        self.timed_memo = None;
        Ok(time)
    }

    pub fn set_end_time(&mut self, text: &str) -> CalEditResult<NaiveTime> {
        let time = self.parse_time(text)?;
        if let Endpoint::DateTime(dt) = self.end {
            self.end = Endpoint::DateTime(localize(dt.timezone(), dt.date_naive().and_time(time)));
        }
        self.timed_memo = None;
        Ok(time)
    }

    fn parse_date(&self, text: &str) -> CalEditResult<NaiveDate> {
        NaiveDate::parse_from_str(text.trim(), &self.date_format).map_err(|e| {
            tracing::debug!(input = text, error = %e, "Rejected date");
            CalEditError::parse(text, &self.date_format)
        })
    }

    fn parse_time(&self, text: &str) -> CalEditResult<NaiveTime> {
        if self.allday {
            return Err(CalEditError::TimeOnAllDay);
        }
        NaiveTime::parse_from_str(text.trim(), &self.time_format).map_err(|e| {
            tracing::debug!(input = text, error = %e, "Rejected time");
            CalEditError::parse(text, &self.time_format)
        })
    }

    fn date_edited(&mut self, date: NaiveDate) {
        self.timed_memo = None;
        if let Some(hook) = self.on_date_change.as_mut() {
            hook(date);
        }
    }
}

impl EditorPart for DateTimeRangeModel {
    fn changed(&self) -> bool {
        if self.allday != self.original_allday {
            return true;
        }
        if self.allday {
            self.start.date() != self.original_start.date()
                || self.end.date() != self.original_end.date()
        } else {
            self.start != self.original_start || self.end != self.original_end
        }
    }

    fn validate(&self) -> bool {
        match (self.start, self.end) {
            (Endpoint::DateTime(s), Endpoint::DateTime(e)) if !self.allday => s <= e,
            (start, end) => start.date() <= end.date(),
        }
    }
}

fn at_midnight(tz: Tz, date: NaiveDate) -> DateTime<Tz> {
    localize(tz, date.and_time(NaiveTime::MIN))
}

fn with_date(endpoint: Endpoint, date: NaiveDate) -> Endpoint {
    match endpoint {
        Endpoint::Date(_) => Endpoint::Date(date),
        Endpoint::DateTime(dt) => Endpoint::DateTime(localize(dt.timezone(), date.and_time(dt.time()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike, Weekday};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn locale() -> LocaleConfig {
        LocaleConfig {
            date_format: "%d.%m.%Y".to_string(),
            time_format: "%H:%M".to_string(),
            default_timezone: chrono_tz::Europe::Berlin,
            first_weekday: Weekday::Mon,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn berlin(y: i32, m: u32, d: u32, h: u32, min: u32) -> Endpoint {
        Endpoint::DateTime(
            chrono_tz::Europe::Berlin
                .with_ymd_and_hms(y, m, d, h, min, 0)
                .unwrap(),
        )
    }

    fn timed() -> DateTimeRangeModel {
        DateTimeRangeModel::new(
            berlin(2024, 6, 1, 14, 30),
            berlin(2024, 6, 1, 15, 30),
            &locale(),
        )
    }

    fn allday() -> DateTimeRangeModel {
        DateTimeRangeModel::new(
            Endpoint::Date(date(2024, 6, 1)),
            Endpoint::Date(date(2024, 6, 1)),
            &locale(),
        )
    }

    #[test]
    fn date_then_time_equals_combined_components() {
        let mut range = timed();
        let d = range.set_start_date("03.07.2024").unwrap();
        let t = range.set_start_time("08:15").unwrap();

        assert_eq!(
            range.start(),
            Endpoint::DateTime(localize(chrono_tz::Europe::Berlin, d.and_time(t)))
        );
    }

    #[test]
    fn date_edit_keeps_time_and_zone() {
        let tokyo = chrono_tz::Asia::Tokyo;
        let mut range = DateTimeRangeModel::new(
            Endpoint::DateTime(tokyo.with_ymd_and_hms(2024, 6, 1, 14, 30, 0).unwrap()),
            Endpoint::DateTime(tokyo.with_ymd_and_hms(2024, 6, 1, 15, 0, 0).unwrap()),
            &locale(),
        );
        range.set_end_date("02.06.2024").unwrap();

        assert_eq!(range.end().timezone(), Some(tokyo));
        assert_eq!(range.end().time().map(|t| (t.hour(), t.minute())), Some((15, 0)));
        assert_eq!(range.end().date(), date(2024, 6, 2));
    }

    #[test]
    fn bad_text_leaves_state_unchanged() {
        let mut range = timed();
        assert!(matches!(
            range.set_start_date("2024-06-03"),
            Err(CalEditError::Parse { .. })
        ));
        assert!(range.set_end_time("25:99").is_err());
        assert_eq!(range.start(), berlin(2024, 6, 1, 14, 30));
        assert_eq!(range.end(), berlin(2024, 6, 1, 15, 30));
        assert!(!range.changed());
    }

    #[test]
    fn time_edit_on_allday_is_refused() {
        let mut range = allday();
        assert!(matches!(
            range.set_start_time("09:00"),
            Err(CalEditError::TimeOnAllDay)
        ));
    }

    #[test]
    fn toggle_to_same_state_is_noop() {
        let mut range = timed();
        range.toggle_allday(false);
        assert_eq!(range.start(), berlin(2024, 6, 1, 14, 30));
        assert!(!range.changed());
    }

    #[test_log::test]
    fn toggle_round_trip_restores_times_without_edits() {
        let mut range = timed();
        range.toggle_allday(true);
        assert_eq!(range.start(), Endpoint::Date(date(2024, 6, 1)));
        range.toggle_allday(false);

        assert_eq!(range.start(), berlin(2024, 6, 1, 14, 30));
        assert_eq!(range.end(), berlin(2024, 6, 1, 15, 30));
        assert!(!range.changed());
    }

    #[test_log::test]
    fn toggle_round_trip_after_edit_uses_midnight() {
        let mut range = timed();
        range.toggle_allday(true);
        range.set_start_date("02.06.2024").unwrap();
        range.toggle_allday(false);

        assert_eq!(range.start(), berlin(2024, 6, 2, 0, 0));
        assert_eq!(range.end(), berlin(2024, 6, 1, 0, 0));
        assert!(!range.validate());
    }

    #[test]
    fn allday_to_timed_uses_default_zone() {
        let mut range = allday();
        range.toggle_allday(false);
        assert_eq!(range.start(), berlin(2024, 6, 1, 0, 0));
        assert!(range.changed());
    }

    #[test]
    fn validate_uses_active_granularity() {
        let mut range = timed();
        range.set_end_time("14:00").unwrap();
        assert!(!range.validate());

        // same day once times are dropped
        range.toggle_allday(true);
        assert!(range.validate());

        range.set_end_date("31.05.2024").unwrap();
        assert!(!range.validate());
    }

    #[test]
    fn allday_changes_compare_dates_only() {
        let mut range = allday();
        range.set_end_date("01.06.2024").unwrap();
        assert!(!range.changed());
        range.set_end_date("02.06.2024").unwrap();
        assert!(range.changed());
    }

    #[test]
    fn date_hook_sees_each_successful_edit() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut range = allday();
        range.set_on_date_change(move |d| sink.borrow_mut().push(d));

        range.set_start_date("05.06.2024").unwrap();
        let _ = range.set_end_date("bogus");
        range.set_end_date("06.06.2024").unwrap();

        assert_eq!(*seen.borrow(), vec![date(2024, 6, 5), date(2024, 6, 6)]);
    }

    #[test]
    fn gap_time_moves_forward() {
        let mut range = DateTimeRangeModel::new(
            berlin(2024, 3, 31, 1, 0),
            berlin(2024, 3, 31, 4, 0),
            &locale(),
        );
        range.set_start_time("02:30").unwrap();
        assert_eq!(range.start(), berlin(2024, 3, 31, 3, 30));
    }

    #[test]
    fn mismatched_end_follows_start() {
        let range = DateTimeRangeModel::new(
            Endpoint::Date(date(2024, 6, 1)),
            berlin(2024, 6, 2, 10, 0),
            &locale(),
        );
        assert_eq!(range.end(), Endpoint::Date(date(2024, 6, 2)));
        assert_eq!(range.start_time_text(), None);
        assert_eq!(range.end_date_text(), "02.06.2024");
    }
}
