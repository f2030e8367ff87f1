//! Occurrence preview for a recurrence rule.

use chrono::{NaiveTime, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;

use crate::datetime::Endpoint;
use crate::error::{CalEditError, CalEditResult};
use crate::recurrence::rule::{RecurrenceRule, RuleUntil};

/// Build the DTSTART/RRULE block the rrule crate parses.
///
/// The rrule crate needs a date-time start, so all-day anchors become midnight
/// UTC. UNTIL is always written in UTC so it agrees with DTSTART.
fn build_rrule_string(rule: &RecurrenceRule, start: &Endpoint) -> String {
    let dtstart = match start {
        Endpoint::Date(d) => format!("DTSTART:{}T000000Z", d.format("%Y%m%d")),
        Endpoint::DateTime(dt) if dt.timezone() == Tz::UTC => {
            format!("DTSTART:{}", dt.format("%Y%m%dT%H%M%SZ"))
        }
        Endpoint::DateTime(dt) => format!(
            "DTSTART;TZID={}:{}",
            dt.timezone().name(),
            dt.format("%Y%m%dT%H%M%S")
        ),
    };

    let mut rule = rule.clone();
    rule.until = rule.until.map(|until| match until {
        RuleUntil::Date(d) => {
            let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
            RuleUntil::DateTime(d.and_time(end_of_day).and_utc())
        }
        RuleUntil::Floating(dt) => RuleUntil::DateTime(dt.and_utc()),
        utc => utc,
    });

    format!("{}\nRRULE:{}", dtstart, rule)
}

/// The first `limit` occurrences of `rule` anchored at `start`, in the
/// anchor's own form (dates for all-day, zoned date-times otherwise).
pub fn occurrences(
    rule: &RecurrenceRule,
    start: &Endpoint,
    limit: u16,
) -> CalEditResult<Vec<Endpoint>> {
    let rrule_str = build_rrule_string(rule, start);
    let rrule_set: RRuleSet = rrule_str
        .parse()
        .map_err(|e| CalEditError::InvalidRule(format!("{}: {}", rule, e)))?;

    let result = rrule_set.all(limit);
    tracing::debug!(rule = %rule, count = result.dates.len(), "Expanded recurrence preview");

    let dates = result
        .dates
        .iter()
        .map(|occ| match start {
            Endpoint::Date(_) => Endpoint::Date(occ.with_timezone(&Utc).date_naive()),
            Endpoint::DateTime(dt) => Endpoint::DateTime(occ.with_timezone(&dt.timezone())),
        })
        .collect();
    Ok(dates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::rule::Frequency;
    use chrono::{NaiveDate, TimeZone, Timelike, Weekday};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test_log::test]
    fn weekly_rule_on_two_days() {
        let mut rule = RecurrenceRule::new(Frequency::Weekly);
        rule.by_weekday = vec![Weekday::Mon, Weekday::Wed];

        // 2024-06-03 is a Monday
        let dates = occurrences(&rule, &Endpoint::Date(date(2024, 6, 3)), 4).unwrap();

        assert_eq!(
            dates,
            vec![
                Endpoint::Date(date(2024, 6, 3)),
                Endpoint::Date(date(2024, 6, 5)),
                Endpoint::Date(date(2024, 6, 10)),
                Endpoint::Date(date(2024, 6, 12)),
            ]
        );
    }

    #[test_log::test]
    fn count_limits_occurrences() {
        let mut rule = RecurrenceRule::new(Frequency::Daily);
        rule.count = Some(3);

        let dates = occurrences(&rule, &Endpoint::Date(date(2024, 6, 1)), 10).unwrap();

        assert_eq!(dates.len(), 3);
    }

    #[test_log::test]
    fn date_until_is_inclusive() {
        let mut rule = RecurrenceRule::new(Frequency::Daily);
        rule.until = Some(RuleUntil::Date(date(2024, 6, 3)));

        let dates = occurrences(&rule, &Endpoint::Date(date(2024, 6, 1)), 10).unwrap();

        assert_eq!(dates.last(), Some(&Endpoint::Date(date(2024, 6, 3))));
        assert_eq!(dates.len(), 3);
    }

    #[test_log::test]
    fn zoned_start_keeps_wall_clock_across_dst() {
        let berlin = chrono_tz::Europe::Berlin;
        let start = berlin.with_ymd_and_hms(2024, 3, 30, 9, 0, 0).unwrap();
        let rule = RecurrenceRule::new(Frequency::Daily);

        let dates = occurrences(&rule, &Endpoint::DateTime(start), 2).unwrap();

        assert_eq!(dates.len(), 2);
        assert_eq!(dates[1].date(), date(2024, 3, 31));
        assert_eq!(dates[1].time().map(|t| t.hour()), Some(9));
        assert_eq!(dates[1].timezone(), Some(berlin));
    }
}
