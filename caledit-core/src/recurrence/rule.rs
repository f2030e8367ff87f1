//! Structured RRULE values.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc, Weekday};

use crate::error::CalEditError;
use crate::recurrence::weekday::{parse_weekday_token, weekday_token};

/// Rule parts the editor cannot reproduce. A rule carrying any of them is
/// left alone until the user explicitly overrides it.
pub const UNSUPPORTED_PARTS: [&str; 9] = [
    "BYSECOND",
    "BYMINUTE",
    "BYHOUR",
    "BYMONTHDAY",
    "BYYEARDAY",
    "BYWEEKNO",
    "BYMONTH",
    "BYSETPOS",
    "WKST",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// The frequencies the editor offers, in menu order.
    pub const EDITABLE: [Frequency; 4] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
        Frequency::Yearly,
    ];

    pub fn is_editable(&self) -> bool {
        Self::EDITABLE.contains(self)
    }

    pub fn as_ics_str(&self) -> &'static str {
        match self {
            Frequency::Secondly => "SECONDLY",
            Frequency::Minutely => "MINUTELY",
            Frequency::Hourly => "HOURLY",
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }

    pub fn from_ics_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SECONDLY" => Some(Frequency::Secondly),
            "MINUTELY" => Some(Frequency::Minutely),
            "HOURLY" => Some(Frequency::Hourly),
            "DAILY" => Some(Frequency::Daily),
            "WEEKLY" => Some(Frequency::Weekly),
            "MONTHLY" => Some(Frequency::Monthly),
            "YEARLY" => Some(Frequency::Yearly),
            _ => None,
        }
    }

    /// Lowercase label shown in the frequency chooser.
    pub fn label(&self) -> &'static str {
        match self {
            Frequency::Secondly => "secondly",
            Frequency::Minutely => "minutely",
            Frequency::Hourly => "hourly",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }
}

/// UNTIL value: a date for all-day series, otherwise a date-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleUntil {
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Floating(NaiveDateTime),
}

impl RuleUntil {
    fn parse(value: &str) -> Option<Self> {
        if let Some(utc) = value.strip_suffix('Z') {
            return NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
                .ok()
                .map(|dt| RuleUntil::DateTime(dt.and_utc()));
        }
        if value.contains('T') {
            return NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
                .ok()
                .map(RuleUntil::Floating);
        }
        NaiveDate::parse_from_str(value, "%Y%m%d")
            .ok()
            .map(RuleUntil::Date)
    }
}

impl fmt::Display for RuleUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleUntil::Date(d) => write!(f, "{}", d.format("%Y%m%d")),
            RuleUntil::DateTime(dt) => write!(f, "{}", dt.format("%Y%m%dT%H%M%SZ")),
            RuleUntil::Floating(dt) => write!(f, "{}", dt.format("%Y%m%dT%H%M%S")),
        }
    }
}

/// A recurrence rule (the value of an RRULE property).
///
/// `by_weekday` holds plain weekdays in Monday-first order. Parts the type
/// does not model, including ordinal BYDAY lists, stay in `unknown` in the
/// order they were read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    pub by_weekday: Vec<Weekday>,
    pub count: Option<u32>,
    pub until: Option<RuleUntil>,
    pub unknown: Vec<(String, String)>,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        RecurrenceRule {
            frequency,
            interval: 1,
            by_weekday: Vec::new(),
            count: None,
            until: None,
            unknown: Vec::new(),
        }
    }

    /// True when the editor can reproduce this rule without dropping anything
    /// it would need to warn about.
    pub fn is_understood(&self) -> bool {
        self.frequency.is_editable()
            && !self
                .unknown
                .iter()
                .any(|(name, _)| UNSUPPORTED_PARTS.contains(&name.as_str()))
    }
}

impl FromStr for RecurrenceRule {
    type Err = CalEditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |msg: String| CalEditError::InvalidRule(msg);

        let mut frequency = None;
        let mut rule = RecurrenceRule::new(Frequency::Daily);

        for part in s.trim().split(';').filter(|p| !p.is_empty()) {
            let (name, value) = part
                .split_once('=')
                .ok_or_else(|| invalid(format!("'{}' is not NAME=VALUE", part)))?;
            let name = name.trim().to_ascii_uppercase();
            let value = value.trim();

            match name.as_str() {
                "FREQ" => {
                    let freq = Frequency::from_ics_str(value)
                        .ok_or_else(|| invalid(format!("unknown frequency '{}'", value)))?;
                    frequency = Some(freq);
                }
                "INTERVAL" => {
                    rule.interval = value
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| invalid(format!("bad INTERVAL '{}'", value)))?;
                }
                "COUNT" => {
                    let count = value
                        .parse::<u32>()
                        .map_err(|_| invalid(format!("bad COUNT '{}'", value)))?;
                    rule.count = Some(count);
                }
                "UNTIL" => {
                    let until = RuleUntil::parse(value)
                        .ok_or_else(|| invalid(format!("bad UNTIL '{}'", value)))?;
                    rule.until = Some(until);
                }
                "BYDAY" => {
                    let days: Option<Vec<Weekday>> =
                        value.split(',').map(|t| parse_weekday_token(t.trim())).collect();
                    match days {
                        Some(mut days) => {
                            days.sort_by_key(|d| d.num_days_from_monday());
                            days.dedup();
                            rule.by_weekday = days;
                        }
                        // ordinal forms like 2SA or -1FR
                        None => rule.unknown.push((name, value.to_string())),
                    }
                }
                _ => rule.unknown.push((name, value.to_string())),
            }
        }

        rule.frequency = frequency.ok_or_else(|| invalid(format!("missing FREQ in '{}'", s)))?;
        Ok(rule)
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={}", self.frequency.as_ics_str())?;
        if self.interval != 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        if !self.by_weekday.is_empty() {
            let days: Vec<&str> = self.by_weekday.iter().map(|d| weekday_token(*d)).collect();
            write!(f, ";BYDAY={}", days.join(","))?;
        }
        if let Some(count) = self.count {
            write!(f, ";COUNT={}", count)?;
        }
        if let Some(until) = self.until {
            write!(f, ";UNTIL={}", until)?;
        }
        for (name, value) in &self.unknown {
            write!(f, ";{}={}", name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_weekly_rule_with_days() {
        let rule: RecurrenceRule = "FREQ=WEEKLY;INTERVAL=2;BYDAY=WE,MO".parse().unwrap();
        assert_eq!(rule.frequency, Frequency::Weekly);
        assert_eq!(rule.interval, 2);
        assert_eq!(rule.by_weekday, vec![Weekday::Mon, Weekday::Wed]);
        assert!(rule.unknown.is_empty());
        assert!(rule.is_understood());
    }

    #[test]
    fn display_is_canonical() {
        let rule: RecurrenceRule = "byday=we,mo;freq=weekly;interval=1".parse().unwrap();
        assert_eq!(rule.to_string(), "FREQ=WEEKLY;BYDAY=MO,WE");
    }

    #[test]
    fn disallowed_parts_are_not_understood() {
        for part in UNSUPPORTED_PARTS {
            let rule: RecurrenceRule = format!("FREQ=YEARLY;{}=1", part).parse().unwrap();
            assert!(!rule.is_understood(), "{} should not be understood", part);
        }
    }

    #[test]
    fn unsupported_frequency_is_not_understood() {
        let rule: RecurrenceRule = "FREQ=HOURLY".parse().unwrap();
        assert!(!rule.is_understood());
    }

    #[test]
    fn ordinal_byday_is_kept_raw() {
        let rule: RecurrenceRule = "FREQ=MONTHLY;BYDAY=2SA".parse().unwrap();
        assert!(rule.by_weekday.is_empty());
        assert_eq!(rule.unknown, vec![("BYDAY".to_string(), "2SA".to_string())]);
        assert_eq!(rule.to_string(), "FREQ=MONTHLY;BYDAY=2SA");
    }

    #[test]
    fn count_and_until_roundtrip() {
        let rule: RecurrenceRule = "FREQ=DAILY;COUNT=5".parse().unwrap();
        assert_eq!(rule.count, Some(5));
        assert_eq!(rule.to_string(), "FREQ=DAILY;COUNT=5");

        let rule: RecurrenceRule = "FREQ=DAILY;UNTIL=20240630T220000Z".parse().unwrap();
        assert!(matches!(rule.until, Some(RuleUntil::DateTime(_))));
        assert_eq!(rule.to_string(), "FREQ=DAILY;UNTIL=20240630T220000Z");

        let rule: RecurrenceRule = "FREQ=DAILY;UNTIL=20240630".parse().unwrap();
        assert_eq!(
            rule.until,
            Some(RuleUntil::Date(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()))
        );
    }

    #[test]
    fn rejects_malformed_rules() {
        assert!("INTERVAL=2".parse::<RecurrenceRule>().is_err());
        assert!("FREQ=FORTNIGHTLY".parse::<RecurrenceRule>().is_err());
        assert!("FREQ=DAILY;INTERVAL=0".parse::<RecurrenceRule>().is_err());
        assert!("FREQ=DAILY;COUNT".parse::<RecurrenceRule>().is_err());
    }
}
